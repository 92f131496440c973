use std::io::Write;

use colored::*;
use jiff::{Timestamp, Zoned, civil::Date, tz::TimeZone};

use todolist::{
    focus::{FocusSnapshot, FocusState},
    models::{
        category::CategorySummary,
        settings::AppSettings,
        task::{Priority, PriorityIcon, Task},
    },
    notifications::{DeepLink, Notification},
    reminders::ReminderRequest,
    services::stats::{TaskCounts, WeeklyCompletion},
};

/// Get the terminal width, defaulting to 80 if unavailable
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

fn today(time_zone: &TimeZone) -> Date {
    Zoned::now().with_time_zone(time_zone.clone()).date()
}

/// First block of the task id, enough to pick it out on the command line
pub fn short_id(task: &Task) -> String {
    task.id.simple().to_string()[..8].to_string()
}

/// Get the appropriate status glyph for a task
pub fn get_status_glyph(task: &Task, is_overdue: bool) -> ColoredString {
    if task.is_completed {
        "✓".dimmed()
    } else if is_overdue {
        "●".red()
    } else {
        "○".normal()
    }
}

fn argb(color: u32) -> (u8, u8, u8) {
    ((color >> 16) as u8, (color >> 8) as u8, color as u8)
}

fn priority_text(priority: Priority) -> ColoredString {
    match priority {
        Priority::High => "!!!".red().bold(),
        Priority::Medium => "!!".yellow(),
        Priority::Low => "!".dimmed(),
    }
}

/// The task's priority icon as it shows in lists
pub fn priority_badge(task: &Task) -> ColoredString {
    match &task.priority_icon {
        PriorityIcon::Standard(priority) => priority_text(*priority),
        PriorityIcon::Flag(color) => {
            let (r, g, b) = argb(*color);
            "⚑".truecolor(r, g, b)
        }
        PriorityIcon::Emoji(glyph) => glyph.normal(),
        PriorityIcon::Progress(percentage) => format!("{percentage}%").cyan(),
    }
}

/// Category name for the right-hand side of a task line
pub fn get_task_context(task: &Task, categories: &[CategorySummary]) -> Option<String> {
    let category_id = task.category_id.as_deref()?;
    categories
        .iter()
        .find(|s| s.category.id == category_id)
        .map(|s| s.category.name.clone())
}

/// Due date for display (e.g. "Today 09:00", "Tomorrow", "Mon, Feb 17 18:30")
pub fn format_due(task: &Task, time_zone: &TimeZone) -> String {
    let zoned = task.due_at.to_zoned(time_zone.clone());
    let day = format_date_header(zoned.date(), time_zone);
    if task.has_time {
        format!("{} {}", day, zoned.strftime("%H:%M"))
    } else {
        day
    }
}

pub fn is_overdue(task: &Task, now: Timestamp) -> bool {
    !task.is_completed && task.due_at < now
}

/// Render a single task line with id, glyph, badge, title, and right-aligned
/// due date and category
pub fn render_task_line(
    task: &Task,
    categories: &[CategorySummary],
    time_zone: &TimeZone,
    is_overdue: bool,
) {
    let terminal_width = get_terminal_width();

    let id_str = short_id(task);
    let glyph = get_status_glyph(task, is_overdue);
    let badge = priority_badge(task);
    let repeat = if task.recurs() { " ↻" } else { "" };
    let title = format!("{}{}", task.title, repeat);

    let left_section = format!("  {}  {}  {}  {}", id_str.dimmed(), glyph, badge, title);
    let styled_left = if task.is_completed {
        left_section.dimmed()
    } else {
        left_section.bold()
    };

    let mut right_parts = vec![format_due(task, time_zone)];
    if let Some(context) = get_task_context(task, categories) {
        right_parts.push(context);
    }
    let right_section = right_parts.join("  ·  ");

    let left_visible_len = 2 + id_str.chars().count()
        + 2
        + 1
        + 2
        + badge.chars().count()
        + 2
        + title.chars().count();
    let right_visible_len = right_section.chars().count();
    let total_content = left_visible_len + right_visible_len;

    if total_content + 4 < terminal_width {
        let padding = terminal_width - total_content - 2;
        let right = if is_overdue {
            right_section.red()
        } else {
            right_section.dimmed()
        };
        println!("{}{}{}", styled_left, " ".repeat(padding), right);
    } else {
        // Not enough space for right alignment, just print normally
        println!("{}", styled_left);
    }
}

/// Render a view header with title and count
pub fn render_view_header(title: &str, count: usize) {
    let task_word = if count == 1 { "task" } else { "tasks" };
    println!("\n  {} ({} {})\n", title.cyan().bold(), count, task_word);
}

/// Render a section header (e.g., "Previous", "Future")
pub fn render_section_header(title: &str) {
    println!("\n  ─── {} ───\n", title.bold());
}

/// Format a date as a human-readable header (e.g., "Tomorrow", "Monday, Feb 17")
pub fn format_date_header(date: Date, time_zone: &TimeZone) -> String {
    let today = today(time_zone);

    if date == today {
        "Today".to_string()
    } else if today.tomorrow().is_ok_and(|tomorrow| tomorrow == date) {
        "Tomorrow".to_string()
    } else if today.yesterday().is_ok_and(|yesterday| yesterday == date) {
        "Yesterday".to_string()
    } else {
        date.strftime("%a, %b %d").to_string()
    }
}

/// "1h 05m", "12m 30s", "45s"
pub fn format_duration(seconds: u64) -> String {
    let (hours, minutes, secs) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}

fn render_field(label: &str, value: impl std::fmt::Display) {
    println!("    {:<12} {}", format!("{label}:").dimmed(), value);
}

/// Full view of a single task, as opened from a notification
pub fn render_task_detail(task: &Task, categories: &[CategorySummary], time_zone: &TimeZone) {
    let status = if task.is_completed { "Completed" } else { "Pending" };
    println!("\n  {} {}\n", priority_badge(task), task.title.bold());

    if let Some(description) = task.description.as_deref() {
        for line in description.lines() {
            println!("    {}", line);
        }
        println!();
    }

    render_field("Id", task.id);
    render_field("Status", status);
    render_field("Due", format_due(task, time_zone));
    render_field("Priority", task.priority.label());
    render_field(
        "Category",
        get_task_context(task, categories).unwrap_or_else(|| String::from("None")),
    );
    if task.has_time {
        render_field(
            "Reminder",
            format!("{} min before", task.reminder_minutes_before),
        );
    }
    if task.is_recurring {
        let until = task
            .recurrence_end
            .map(|end| format!(" until {}", end.to_zoned(time_zone.clone()).strftime("%b %d, %Y")))
            .unwrap_or_default();
        render_field("Repeats", format!("{}{}", task.recurrence_period.label(), until));
    }
    if task.focus_time_seconds > 0 {
        render_field("Focused", format_duration(task.focus_time_seconds));
    }
    render_field("Link", DeepLink::EditTask(task.id).to_string().dimmed());
    println!();
}

pub fn render_reminder(reminder: Option<&ReminderRequest>, time_zone: &TimeZone) {
    match reminder {
        Some(reminder) => {
            let at = reminder.fire_at.to_zoned(time_zone.clone());
            let urgency = if reminder.urgent { " (soon)".yellow() } else { "".normal() };
            println!(
                "  {} Reminder at {}{}",
                "⏰".normal(),
                at.strftime("%a %b %d, %H:%M"),
                urgency
            );
        }
        None => println!("  {}", "No reminder scheduled".dimmed()),
    }
}

pub fn render_notification(notification: &Notification) {
    println!("\n  {} {}", "🔔".normal(), notification.title.bold());
    for line in notification.body.lines() {
        println!("     {}", line);
    }
    println!("     {}", notification.link.to_string().dimmed());
}

pub fn render_categories(summaries: &[CategorySummary]) {
    if summaries.is_empty() {
        println!("No categories found");
        return;
    }

    println!(
        "{} ({} {})\n",
        "CATEGORIES".cyan(),
        summaries.len(),
        if summaries.len() == 1 { "category" } else { "categories" }
    );

    for summary in summaries {
        let (r, g, b) = argb(summary.category.color);
        let lock = if summary.category.is_default { " (default)" } else { "" };
        println!(
            "  {} {}{}",
            "●".truecolor(r, g, b),
            summary.category.name.bold(),
            lock.dimmed()
        );
        println!(
            "    {} {}  {}",
            summary.task_count.to_string().dimmed(),
            if summary.task_count == 1 { "task" } else { "tasks" }.dimmed(),
            summary.category.id.dimmed()
        );
        println!();
    }
}

pub fn render_stats(counts: &TaskCounts, completed_today: usize, week: &WeeklyCompletion) {
    println!("\n  {}\n", "STATISTICS".cyan().bold());
    render_field("Completed", counts.completed.to_string().green());
    render_field("Pending", counts.pending.to_string().yellow());
    render_field("Today", format!("{completed_today} done"));

    println!("\n  {} {}\n", "Week".bold(), week.label.dimmed());
    let busiest = week.busiest().max(1);
    let bar_width = 30usize;
    for day in &week.days {
        let filled = day.completed * bar_width / busiest;
        println!(
            "    {}  {}{} {}",
            day.date.strftime("%a"),
            "█".repeat(filled).green(),
            "░".repeat(bar_width - filled).dimmed(),
            day.completed
        );
    }
    println!();
}

/// Redraws the focus countdown in place
pub fn render_focus(title: &str, snapshot: &FocusSnapshot) {
    let bar_width = 24usize;
    let filled = (snapshot.progress() * bar_width as f64).round() as usize;
    let state = match snapshot.state {
        FocusState::Idle => "idle".dimmed(),
        FocusState::Running => "focusing".green(),
        FocusState::Paused => "paused".yellow(),
        FocusState::Completed => "done".cyan().bold(),
    };
    let remaining = snapshot.remaining_seconds();

    print!(
        "\r  {}  {}{}  {:02}:{:02}  {}   ",
        title.bold(),
        "█".repeat(filled).green(),
        "░".repeat(bar_width.saturating_sub(filled)).dimmed(),
        remaining / 60,
        remaining % 60,
        state
    );
    let _ = std::io::stdout().flush();
}

pub fn render_settings(settings: &AppSettings) {
    println!("\n  {}\n", "SETTINGS".cyan().bold());
    render_field(
        "Language",
        format!("{} ({})", settings.language.display_name(), settings.language.code()),
    );
    render_field("Theme", settings.theme_mode);
    println!();
}
