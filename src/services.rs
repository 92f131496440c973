pub mod categories;
pub mod recovery;
pub mod stats;
pub mod tasks;
