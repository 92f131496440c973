use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Reminder lead time given to tasks that don't pick one
pub const DEFAULT_REMINDER_MINUTES: u32 = 30;

/// Colour used when a flag icon is picked without one (red)
pub const DEFAULT_FLAG_COLOR: u32 = 0xFFEF4444;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TaskRecord", into = "TaskRecord")]
pub struct Task {
    /// UUID to identify the task
    pub id: Uuid,
    /// Title of the task, never blank once persisted
    pub title: String,
    /// Free-form notes
    pub description: Option<String>,
    /// When the task is due
    pub due_at: Timestamp,
    /// Whether `due_at` carries a time of day or only a date
    pub has_time: bool,
    pub priority: Priority,
    /// How the priority is drawn in lists
    pub priority_icon: PriorityIcon,
    pub is_completed: bool,
    /// The category of this task if it belongs to any
    pub category_id: Option<String>,
    /// Minutes before `due_at` at which the reminder fires
    pub reminder_minutes_before: u32,
    /// When the task was created
    pub created_at: Timestamp,
    /// Last time any field changed
    pub updated_at: Timestamp,
    pub is_recurring: bool,
    pub recurrence_period: RecurrencePeriod,
    /// Last instant a recurring task may roll forward to
    pub recurrence_end: Option<Timestamp>,
    /// Accumulated focus mode time
    pub focus_time_seconds: u64,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            title: String::new(),
            description: None,
            due_at: Timestamp::default(),
            has_time: true,
            priority: Priority::Medium,
            priority_icon: PriorityIcon::default(),
            is_completed: false,
            category_id: None,
            reminder_minutes_before: DEFAULT_REMINDER_MINUTES,
            created_at: Timestamp::default(),
            updated_at: Timestamp::default(),
            is_recurring: false,
            recurrence_period: RecurrencePeriod::None,
            recurrence_end: None,
            focus_time_seconds: 0,
        }
    }
}

impl Task {
    /// Fresh task with a generated id, stamped with the current time
    pub fn new(title: impl Into<String>, due_at: Timestamp) -> Self {
        let now = Timestamp::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            due_at,
            created_at: now,
            updated_at: now,
            ..Task::default()
        }
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::BlankTitle);
        }
        if let PriorityIcon::Progress(percentage) = self.priority_icon {
            if percentage > 100 {
                return Err(TaskValidationError::ProgressOutOfRange(i64::from(percentage)));
            }
        }
        Ok(())
    }

    /// Recurring flag set and a period other than `None`
    pub fn recurs(&self) -> bool {
        self.is_recurring && self.recurrence_period != RecurrencePeriod::None
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskValidationError {
    #[error("Task title cannot be empty")]
    BlankTitle,

    #[error("Progress must be between 0 and 100, got {0}")]
    ProgressOutOfRange(i64),

    #[error("Unknown priority '{0}' (expected low, medium or high)")]
    UnknownPriority(String),

    #[error("Unknown recurrence '{0}' (expected none, daily, weekly or monthly)")]
    UnknownRecurrence(String),

    #[error("Invalid priority icon '{0}'")]
    InvalidIcon(String),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn value(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }

    /// Unknown values map to `Medium`
    pub fn from_value(value: i64) -> Self {
        match value {
            0 => Priority::Low,
            2 => Priority::High,
            _ => Priority::Medium,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl FromStr for Priority {
    type Err = TaskValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            _ => Err(TaskValidationError::UnknownPriority(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePeriod {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl RecurrencePeriod {
    pub fn label(self) -> &'static str {
        match self {
            RecurrencePeriod::None => "Does not repeat",
            RecurrencePeriod::Daily => "Daily",
            RecurrencePeriod::Weekly => "Weekly",
            RecurrencePeriod::Monthly => "Monthly",
        }
    }
}

impl FromStr for RecurrencePeriod {
    type Err = TaskValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(RecurrencePeriod::None),
            "daily" | "day" => Ok(RecurrencePeriod::Daily),
            "weekly" | "week" => Ok(RecurrencePeriod::Weekly),
            "monthly" | "month" => Ok(RecurrencePeriod::Monthly),
            _ => Err(TaskValidationError::UnknownRecurrence(s.to_string())),
        }
    }
}

/// Visual marker for a task's priority.
///
/// Stored as a `KIND:VALUE` string. Decoding never fails: an unknown kind or a
/// malformed value falls back to the standard icon for the task's priority,
/// and an out-of-range progress value is clamped into `0..=100`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorityIcon {
    /// Text label derived from the priority
    Standard(Priority),
    /// Flag in an ARGB colour
    Flag(u32),
    /// A single emoji glyph
    Emoji(String),
    /// Progress circle, percentage in `0..=100`
    Progress(u8),
}

impl Default for PriorityIcon {
    fn default() -> Self {
        PriorityIcon::Standard(Priority::Medium)
    }
}

const NAMED_FLAG_COLORS: [(&str, u32); 6] = [
    ("red", 0xFFEF4444),
    ("orange", 0xFFF97316),
    ("yellow", 0xFFEAB308),
    ("green", 0xFF22C55E),
    ("blue", 0xFF3B82F6),
    ("purple", 0xFF8B5CF6),
];

impl PriorityIcon {
    /// Progress icon built from user input; out-of-range values are rejected
    pub fn progress(percentage: i64) -> Result<Self, TaskValidationError> {
        if !(0..=100).contains(&percentage) {
            return Err(TaskValidationError::ProgressOutOfRange(percentage));
        }
        Ok(PriorityIcon::Progress(percentage as u8))
    }

    pub fn to_storage_string(&self) -> String {
        match self {
            PriorityIcon::Standard(priority) => format!("STANDARD:{}", priority.value()),
            PriorityIcon::Flag(color) => format!("FLAG:{color}"),
            PriorityIcon::Emoji(glyph) => format!("EMOJI:{glyph}"),
            PriorityIcon::Progress(percentage) => format!("PROGRESS:{percentage}"),
        }
    }

    pub fn from_storage_str(value: &str, default_priority: Priority) -> Self {
        let fallback = PriorityIcon::Standard(default_priority);
        let Some((kind, raw)) = value.split_once(':') else {
            return fallback;
        };

        match kind {
            "STANDARD" => raw
                .parse::<i64>()
                .map(|v| PriorityIcon::Standard(Priority::from_value(v)))
                .unwrap_or(fallback),
            "FLAG" => raw.parse::<u32>().map(PriorityIcon::Flag).unwrap_or(fallback),
            "EMOJI" if !raw.is_empty() => PriorityIcon::Emoji(raw.to_string()),
            "PROGRESS" => raw
                .parse::<i64>()
                .map(|v| PriorityIcon::Progress(v.clamp(0, 100) as u8))
                .unwrap_or(fallback),
            _ => fallback,
        }
    }

    /// Parses the picker syntax: `standard`, `flag[:color]`, `emoji:<glyph>`,
    /// `progress:<0-100>`. Colours are a name or a hex ARGB/RGB value.
    pub fn parse_choice(input: &str, priority: Priority) -> Result<Self, TaskValidationError> {
        let invalid = || TaskValidationError::InvalidIcon(input.to_string());
        let (kind, raw) = match input.split_once(':') {
            Some((kind, raw)) => (kind.trim().to_lowercase(), Some(raw.trim())),
            None => (input.trim().to_lowercase(), None),
        };

        match (kind.as_str(), raw) {
            ("standard", None) => Ok(PriorityIcon::Standard(priority)),
            ("flag", None) => Ok(PriorityIcon::Flag(DEFAULT_FLAG_COLOR)),
            ("flag", Some(color)) => parse_color(color).map(PriorityIcon::Flag).ok_or_else(invalid),
            ("emoji", Some(glyph)) if !glyph.is_empty() => Ok(PriorityIcon::Emoji(glyph.to_string())),
            ("progress", Some(percentage)) => {
                let percentage = percentage.parse::<i64>().map_err(|_| invalid())?;
                PriorityIcon::progress(percentage)
            }
            _ => Err(invalid()),
        }
    }
}

/// A colour name from the flag palette or a hex `RRGGBB`/`AARRGGBB` value
pub fn parse_color(value: &str) -> Option<u32> {
    let lowered = value.to_lowercase();
    if let Some((_, color)) = NAMED_FLAG_COLORS.iter().find(|(name, _)| *name == lowered) {
        return Some(*color);
    }

    let hex = lowered.trim_start_matches('#').trim_start_matches("0x");
    let parsed = u32::from_str_radix(hex, 16).ok()?;
    match hex.len() {
        6 => Some(0xFF00_0000 | parsed),
        8 => Some(parsed),
        _ => None,
    }
}

impl fmt::Display for PriorityIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage_string())
    }
}

/// On-disk shape of a task; the icon travels as its `KIND:VALUE` string
#[derive(Serialize, Deserialize)]
struct TaskRecord {
    id: Uuid,
    title: String,
    description: Option<String>,
    due_at: Timestamp,
    has_time: bool,
    priority: Priority,
    priority_icon: String,
    is_completed: bool,
    category_id: Option<String>,
    reminder_minutes_before: u32,
    created_at: Timestamp,
    updated_at: Timestamp,
    is_recurring: bool,
    recurrence_period: RecurrencePeriod,
    recurrence_end: Option<Timestamp>,
    focus_time_seconds: u64,
}

impl From<TaskRecord> for Task {
    fn from(record: TaskRecord) -> Self {
        let priority_icon = PriorityIcon::from_storage_str(&record.priority_icon, record.priority);
        Task {
            id: record.id,
            title: record.title,
            description: record.description,
            due_at: record.due_at,
            has_time: record.has_time,
            priority: record.priority,
            priority_icon,
            is_completed: record.is_completed,
            category_id: record.category_id,
            reminder_minutes_before: record.reminder_minutes_before,
            created_at: record.created_at,
            updated_at: record.updated_at,
            is_recurring: record.is_recurring,
            recurrence_period: record.recurrence_period,
            recurrence_end: record.recurrence_end,
            focus_time_seconds: record.focus_time_seconds,
        }
    }
}

impl From<Task> for TaskRecord {
    fn from(task: Task) -> Self {
        TaskRecord {
            id: task.id,
            title: task.title,
            description: task.description,
            due_at: task.due_at,
            has_time: task.has_time,
            priority: task.priority,
            priority_icon: task.priority_icon.to_storage_string(),
            is_completed: task.is_completed,
            category_id: task.category_id,
            reminder_minutes_before: task.reminder_minutes_before,
            created_at: task.created_at,
            updated_at: task.updated_at,
            is_recurring: task.is_recurring,
            recurrence_period: task.recurrence_period,
            recurrence_end: task.recurrence_end,
            focus_time_seconds: task.focus_time_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_title_is_rejected() {
        let task = Task::new("   ", Timestamp::now());
        assert_eq!(task.validate(), Err(TaskValidationError::BlankTitle));
    }

    #[test]
    fn test_progress_over_100_is_rejected_by_validation() {
        let task = Task {
            title: String::from("Write report"),
            priority_icon: PriorityIcon::Progress(150),
            ..Task::default()
        };
        assert_eq!(
            task.validate(),
            Err(TaskValidationError::ProgressOutOfRange(150))
        );
    }

    #[test]
    fn test_progress_constructor_rejects_out_of_range() {
        assert!(PriorityIcon::progress(-1).is_err());
        assert!(PriorityIcon::progress(101).is_err());
        assert_eq!(PriorityIcon::progress(100), Ok(PriorityIcon::Progress(100)));
        assert_eq!(PriorityIcon::progress(0), Ok(PriorityIcon::Progress(0)));
    }

    #[test]
    fn test_storage_decoding_clamps_progress() {
        assert_eq!(
            PriorityIcon::from_storage_str("PROGRESS:250", Priority::Low),
            PriorityIcon::Progress(100)
        );
        assert_eq!(
            PriorityIcon::from_storage_str("PROGRESS:-5", Priority::Low),
            PriorityIcon::Progress(0)
        );
    }

    #[test]
    fn test_storage_decoding_falls_back_to_standard() {
        let cases = ["", "GARBAGE", "SPARKLE:1", "FLAG:not-a-colour", "PROGRESS:lots", "EMOJI:"];
        for case in cases {
            assert_eq!(
                PriorityIcon::from_storage_str(case, Priority::High),
                PriorityIcon::Standard(Priority::High),
                "input {case:?}"
            );
        }
    }

    #[test]
    fn test_storage_decoding_keeps_every_variant() {
        assert_eq!(
            PriorityIcon::from_storage_str("STANDARD:2", Priority::Low),
            PriorityIcon::Standard(Priority::High)
        );
        assert_eq!(
            PriorityIcon::from_storage_str("FLAG:4293870660", Priority::Low),
            PriorityIcon::Flag(0xFFEF4444)
        );
        assert_eq!(
            PriorityIcon::from_storage_str("EMOJI:🔥", Priority::Low),
            PriorityIcon::Emoji(String::from("🔥"))
        );
        // Only the first colon separates kind from value
        assert_eq!(
            PriorityIcon::from_storage_str("EMOJI::)", Priority::Low),
            PriorityIcon::Emoji(String::from(":)"))
        );
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!(
            PriorityIcon::parse_choice("flag:blue", Priority::Low),
            Ok(PriorityIcon::Flag(0xFF3B82F6))
        );
        assert_eq!(
            PriorityIcon::parse_choice("flag:#112233", Priority::Low),
            Ok(PriorityIcon::Flag(0xFF112233))
        );
        assert_eq!(
            PriorityIcon::parse_choice("standard", Priority::High),
            Ok(PriorityIcon::Standard(Priority::High))
        );
        assert_eq!(
            PriorityIcon::parse_choice("progress:140", Priority::Low),
            Err(TaskValidationError::ProgressOutOfRange(140))
        );
        assert!(PriorityIcon::parse_choice("flag:chartreuse", Priority::Low).is_err());
    }

    #[test]
    fn test_task_json_uses_icon_storage_string() {
        let task = Task {
            title: String::from("Stretch"),
            priority: Priority::Low,
            priority_icon: PriorityIcon::Progress(40),
            ..Task::default()
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["priority_icon"], "PROGRESS:40");

        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_recurs_requires_flag_and_period() {
        let mut task = Task {
            is_recurring: true,
            ..Task::default()
        };
        assert!(!task.recurs());
        task.recurrence_period = RecurrencePeriod::Daily;
        assert!(task.recurs());
        task.is_recurring = false;
        assert!(!task.recurs());
    }
}
