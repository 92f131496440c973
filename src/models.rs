pub mod category;
pub mod due;
pub mod settings;
pub mod store;
pub mod task;
