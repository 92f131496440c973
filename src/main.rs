use std::{fmt::Display, sync::Arc, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use jiff::{Timestamp, Zoned};
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use todolist::{
    config::Config,
    focus::{DEFAULT_FOCUS_SECONDS, FocusState, FocusTimer},
    models::{
        category::Category,
        due::Due,
        settings::{Language, ThemeMode},
        task::{Priority, PriorityIcon, RecurrencePeriod, Task, parse_color},
    },
    notifications::{DeepLink, TokioReminderScheduler, deliver},
    recurrence::ToggleOutcome,
    reminders::DetachedScheduler,
    repository::Repository,
    services::{
        categories::{
            CreateCategoryParameters, UpdateCategoryParameters, create_category, delete_category,
            find_category, list_categories, update_category,
        },
        recovery::{reschedule_pending, rescan},
        stats::{completed_on, task_counts, upcoming_tasks, weekly_completion},
        tasks::{
            TaskFilter, TaskQuery, ToggleTaskParameters, completed_today, delete_completed_tasks,
            delete_task, find_task, group_pending, list_tasks, toggle_task_completion, upsert_task,
        },
    },
    storage::{json::JsonFileStorage, settings::SettingsStorage},
};

mod ui;

#[derive(Parser)]
#[command(
    name = "todolist",
    about = "Personal tasks, reminders and focus sessions in your terminal"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pending tasks grouped around today
    Today,

    /// List tasks
    List {
        /// Which tasks to show
        #[arg(short, long, value_enum, default_value_t = FilterArg::Pending)]
        filter: FilterArg,

        /// Only tasks in this category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Add a new task
    Add {
        /// Task title
        title: String,

        /// When it is due (e.g., "tomorrow 09:00", "2025-03-01", "18:30")
        #[arg(short = 'D', long, default_value = "today")]
        due: String,

        /// Longer description
        #[arg(short, long)]
        description: Option<String>,

        /// low, medium or high
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Icon: standard, flag[:color], emoji:<glyph>, progress:<0-100>
        #[arg(short, long)]
        icon: Option<String>,

        /// File under a category
        #[arg(short, long)]
        category: Option<String>,

        /// Minutes before the due time to remind
        #[arg(short, long)]
        remind: Option<u32>,

        /// none, daily, weekly or monthly
        #[arg(long)]
        repeat: Option<String>,

        /// Last date a repeating task may move to
        #[arg(long)]
        until: Option<String>,
    },

    /// Change a task
    Edit {
        /// Task id (or its first characters) or part of its title
        task: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short = 'D', long)]
        due: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        priority: Option<String>,

        #[arg(short, long)]
        icon: Option<String>,

        /// Category to move to, or "none"
        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        remind: Option<u32>,

        #[arg(long)]
        repeat: Option<String>,

        /// Last date a repeating task may move to, or "none"
        #[arg(long)]
        until: Option<String>,
    },

    /// Complete a task, or reopen a completed one
    Done { task: String },

    /// Delete a task
    Delete { task: String },

    /// Delete every completed task
    ClearCompleted,

    /// Show every detail of a task
    Show { task: String },

    /// Open a notification link
    Open { link: String },

    /// Run a focus session for a task
    Focus {
        task: String,

        /// Session length in minutes
        #[arg(
            short,
            long,
            default_value_t = DEFAULT_FOCUS_SECONDS / 60,
            value_parser = clap::value_parser!(u64).range(1..=1440)
        )]
        minutes: u64,
    },

    /// Completion statistics
    Stats {
        /// Weeks back from the current one
        #[arg(short, long, default_value_t = 0)]
        weeks_ago: i64,

        /// Also list tasks due in the next N days
        #[arg(short, long, default_value_t = 7)]
        upcoming: i64,
    },

    /// Manage categories
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Show or change preferences
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Stay in the foreground and deliver reminders as they come due
    Remind,
}

#[derive(Debug, Subcommand)]
enum CategoryCommands {
    /// Create a new category
    New {
        name: String,
        /// Colour name or hex value
        #[arg(short, long, default_value = "blue")]
        color: String,
        #[arg(short, long, default_value = "Label")]
        icon: String,
    },
    /// List all categories
    List,
    /// Rename or restyle a category
    Edit {
        category: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        color: Option<String>,
        #[arg(short, long)]
        icon: Option<String>,
    },
    /// Delete a category; its tasks are kept
    Delete { category: String },
}

#[derive(Debug, Subcommand)]
enum SettingsCommands {
    /// Show current preferences
    Show,
    /// Set the language (en, vi)
    Language { code: String },
    /// Set the theme (light, dark, system)
    Theme { mode: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FilterArg {
    All,
    Pending,
    Completed,
}

impl From<FilterArg> for TaskFilter {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::All => TaskFilter::All,
            FilterArg::Pending => TaskFilter::Pending,
            FilterArg::Completed => TaskFilter::Completed,
        }
    }
}

type AppRepository = Repository<JsonFileStorage>;

fn fail(message: impl Display) -> ! {
    eprintln!("{} {}", "Error:".red(), message);
    std::process::exit(1);
}

fn resolve_task(repository: &AppRepository, query: &str) -> Task {
    find_task(repository, query).unwrap_or_else(|e| fail(e))
}

fn resolve_category_id(repository: &AppRepository, query: &str) -> String {
    match find_category(repository, query) {
        Ok(category) => category.id,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            let categories = list_categories(repository);
            if !categories.is_empty() {
                eprintln!("\nAvailable categories:");
                for summary in categories {
                    eprintln!("  - {}", summary.category.name);
                }
            }
            std::process::exit(1);
        }
    }
}

fn parse_due(input: &str, config: &Config) -> Due {
    let now = Zoned::now().with_time_zone(config.time_zone.clone());
    Due::parse(input, &now).unwrap_or_else(|e| fail(e))
}

fn parse_until(input: &str, config: &Config) -> Option<Timestamp> {
    if input.eq_ignore_ascii_case("none") {
        return None;
    }
    Some(parse_due(input, config).at)
}

fn parse_or_fail<T>(input: &str) -> T
where
    T: std::str::FromStr,
    T::Err: Display,
{
    input.parse().unwrap_or_else(|e| fail(e))
}

fn save_and_report(repository: &AppRepository, config: &Config, task: Task, verb: &str) {
    match upsert_task(repository, &DetachedScheduler, task) {
        Ok(outcome) => {
            println!("{} {}: {}", "✓".green(), verb, outcome.task.title.bold());
            ui::render_reminder(outcome.reminder.as_ref(), &config.time_zone);
        }
        Err(e) => fail(format!("Failed to save task: {e}")),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().unwrap_or_else(|e| fail(e));

    // Create the data directory if it doesn't exist
    std::fs::create_dir_all(&config.data_dir)
        .unwrap_or_else(|e| fail(format!("Failed to create data directory: {e}")));

    let repository = match Repository::open(JsonFileStorage::new(config.store_path())) {
        Ok(repository) => repository,
        Err(e) => fail(format!("Failed to load store: {e}")),
    };

    match cli.command {
        None | Some(Commands::Today) => show_today(&repository, &config),
        Some(Commands::List { filter, category }) => {
            let query = TaskQuery {
                filter: filter.into(),
                category_id: category.map(|c| resolve_category_id(&repository, &c)),
            };
            let tasks = list_tasks(&repository, &query);
            if tasks.is_empty() {
                println!("No tasks found");
            } else {
                let categories = repository.category_summaries();
                let now = Timestamp::now();
                ui::render_view_header("Tasks", tasks.len());
                for task in &tasks {
                    ui::render_task_line(
                        task,
                        &categories,
                        &config.time_zone,
                        ui::is_overdue(task, now),
                    );
                }
            }
        }
        Some(Commands::Add {
            title,
            due,
            description,
            priority,
            icon,
            category,
            remind,
            repeat,
            until,
        }) => {
            let due = parse_due(&due, &config);
            let priority: Priority = parse_or_fail(&priority);
            let priority_icon = match icon {
                Some(icon) => PriorityIcon::parse_choice(&icon, priority).unwrap_or_else(|e| fail(e)),
                None => PriorityIcon::Standard(priority),
            };
            let recurrence_period: RecurrencePeriod = repeat
                .as_deref()
                .map(parse_or_fail)
                .unwrap_or_default();

            let mut task = Task::new(title, due.at);
            task.description = description;
            task.has_time = due.has_time;
            task.priority = priority;
            task.priority_icon = priority_icon;
            task.category_id = category.map(|c| resolve_category_id(&repository, &c));
            if let Some(minutes) = remind {
                task.reminder_minutes_before = minutes;
            }
            task.is_recurring = recurrence_period != RecurrencePeriod::None;
            task.recurrence_period = recurrence_period;
            task.recurrence_end = until.and_then(|u| parse_until(&u, &config));

            save_and_report(&repository, &config, task, "Added");
        }
        Some(Commands::Edit {
            task,
            title,
            due,
            description,
            priority,
            icon,
            category,
            remind,
            repeat,
            until,
        }) => {
            let mut task = resolve_task(&repository, &task);

            if let Some(title) = title {
                task.title = title;
            }
            if let Some(due) = due {
                let due = parse_due(&due, &config);
                task.due_at = due.at;
                task.has_time = due.has_time;
            }
            if let Some(description) = description {
                task.description = Some(description).filter(|d| !d.trim().is_empty());
            }
            if let Some(priority) = priority {
                let priority: Priority = parse_or_fail(&priority);
                if let PriorityIcon::Standard(_) = task.priority_icon {
                    task.priority_icon = PriorityIcon::Standard(priority);
                }
                task.priority = priority;
            }
            if let Some(icon) = icon {
                task.priority_icon =
                    PriorityIcon::parse_choice(&icon, task.priority).unwrap_or_else(|e| fail(e));
            }
            if let Some(category) = category {
                task.category_id = if category.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(resolve_category_id(&repository, &category))
                };
            }
            if let Some(minutes) = remind {
                task.reminder_minutes_before = minutes;
            }
            if let Some(repeat) = repeat {
                let period: RecurrencePeriod = parse_or_fail(&repeat);
                task.is_recurring = period != RecurrencePeriod::None;
                task.recurrence_period = period;
            }
            if let Some(until) = until {
                task.recurrence_end = parse_until(&until, &config);
            }

            save_and_report(&repository, &config, task, "Updated");
        }
        Some(Commands::Done { task }) => {
            let task = resolve_task(&repository, &task);
            let parameters = ToggleTaskParameters {
                task_id: task.id,
                time_zone: config.time_zone.clone(),
            };
            match toggle_task_completion(&repository, &DetachedScheduler, parameters) {
                Ok(Some(ToggleOutcome::Completed(task))) => {
                    println!("{} Completed: {}", "✓".green(), task.title.bold());
                }
                Ok(Some(ToggleOutcome::RecurrenceEnded(task))) => {
                    println!(
                        "{} Completed: {} {}",
                        "✓".green(),
                        task.title.bold(),
                        "(last occurrence)".dimmed()
                    );
                }
                Ok(Some(ToggleOutcome::Reopened(task))) => {
                    println!("{} Reopened: {}", "○".normal(), task.title.bold());
                }
                Ok(Some(ToggleOutcome::Advanced { task, .. })) => {
                    println!(
                        "{} Done for now: {}, next due {}",
                        "↻".green(),
                        task.title.bold(),
                        ui::format_due(&task, &config.time_zone)
                    );
                }
                Ok(None) => println!("Task no longer exists"),
                Err(e) => fail(format!("Failed to update task: {e}")),
            }
        }
        Some(Commands::Delete { task }) => {
            let task = resolve_task(&repository, &task);
            match delete_task(&repository, &DetachedScheduler, task.id) {
                Ok(Some(task)) => println!("{} Deleted: {}", "✓".green(), task.title.bold()),
                Ok(None) => println!("Task no longer exists"),
                Err(e) => fail(format!("Failed to delete task: {e}")),
            }
        }
        Some(Commands::ClearCompleted) => {
            match delete_completed_tasks(&repository, &DetachedScheduler) {
                Ok(removed) if removed.is_empty() => println!("No completed tasks"),
                Ok(removed) => println!(
                    "{} Deleted {} completed {}",
                    "✓".green(),
                    removed.len(),
                    if removed.len() == 1 { "task" } else { "tasks" }
                ),
                Err(e) => fail(format!("Failed to delete tasks: {e}")),
            }
        }
        Some(Commands::Show { task }) => {
            let task = resolve_task(&repository, &task);
            ui::render_task_detail(&task, &repository.category_summaries(), &config.time_zone);
        }
        Some(Commands::Open { link }) => {
            let link: DeepLink = parse_or_fail(&link);
            match link {
                DeepLink::EditTask(id) => match repository.task(id) {
                    Some(task) => {
                        ui::render_task_detail(
                            &task,
                            &repository.category_summaries(),
                            &config.time_zone,
                        );
                        println!(
                            "  Edit with: {}",
                            format!("todolist edit {} --title ...", ui::short_id(&task)).cyan()
                        );
                    }
                    None => fail(format!("Task '{id}' no longer exists")),
                },
            }
        }
        Some(Commands::Focus { task, minutes }) => {
            let task = resolve_task(&repository, &task);
            run_focus(&repository, task, minutes).await;
        }
        Some(Commands::Stats {
            weeks_ago,
            upcoming,
        }) => {
            let today = Zoned::now().with_time_zone(config.time_zone.clone()).date();
            let week =
                weekly_completion(&repository, today, weeks_ago.saturating_neg(), &config.time_zone)
                    .unwrap_or_else(|e| fail(e));
            let done_today = completed_on(&repository, today, &config.time_zone);
            ui::render_stats(&task_counts(&repository), done_today, &week);

            let soon = upcoming_tasks(&repository, Timestamp::now(), upcoming);
            if !soon.is_empty() {
                let categories = repository.category_summaries();
                ui::render_section_header(&format!("Next {upcoming} days"));
                for task in &soon {
                    ui::render_task_line(task, &categories, &config.time_zone, false);
                }
            }
        }
        Some(Commands::Category(CategoryCommands::New { name, color, icon })) => {
            let color = parse_color(&color)
                .unwrap_or_else(|| fail(format!("Unknown colour '{color}'")));
            match create_category(
                &repository,
                CreateCategoryParameters {
                    name,
                    color,
                    icon_name: icon,
                },
            ) {
                Ok(category) => println!("{} Created: {}", "✓".green(), category.name.bold()),
                Err(e) => fail(format!("Failed to create category: {e}")),
            }
        }
        Some(Commands::Category(CategoryCommands::List)) => {
            ui::render_categories(&list_categories(&repository));
        }
        Some(Commands::Category(CategoryCommands::Edit {
            category,
            name,
            color,
            icon,
        })) => {
            let category_id = resolve_category_id(&repository, &category);
            let color = color.map(|color| {
                parse_color(&color).unwrap_or_else(|| fail(format!("Unknown colour '{color}'")))
            });
            match update_category(
                &repository,
                UpdateCategoryParameters {
                    category_id,
                    name,
                    color,
                    icon_name: icon,
                },
            ) {
                Ok(Some(Category { name, .. })) => {
                    println!("{} Updated: {}", "✓".green(), name.bold())
                }
                Ok(None) => println!("Category no longer exists"),
                Err(e) => fail(format!("Failed to update category: {e}")),
            }
        }
        Some(Commands::Category(CategoryCommands::Delete { category })) => {
            let category_id = resolve_category_id(&repository, &category);
            match delete_category(&repository, &category_id) {
                Ok(Some(result)) => println!(
                    "{} Deleted: {} {}",
                    "✓".green(),
                    result.category.name.bold(),
                    format!("({} tasks uncategorized)", result.cleared_tasks).dimmed()
                ),
                Ok(None) => println!("Category no longer exists"),
                Err(e) => fail(e),
            }
        }
        Some(Commands::Settings(command)) => {
            let settings = SettingsStorage::new(config.settings_path());
            let result = match command {
                SettingsCommands::Show => settings.load().map(|s| ui::render_settings(&s)),
                SettingsCommands::Language { code } => {
                    let language: Language = parse_or_fail(&code);
                    settings.set_language(language).map(|()| {
                        println!("{} Language: {}", "✓".green(), language);
                    })
                }
                SettingsCommands::Theme { mode } => {
                    let theme: ThemeMode = parse_or_fail(&mode);
                    settings.set_theme_mode(theme).map(|()| {
                        println!("{} Theme: {}", "✓".green(), theme);
                    })
                }
            };
            if let Err(e) = result {
                fail(format!("Failed to access settings: {e}"));
            }
        }
        Some(Commands::Remind) => run_reminder_daemon(repository, &config).await,
    }
}

fn show_today(repository: &AppRepository, config: &Config) {
    let now = Zoned::now().with_time_zone(config.time_zone.clone());
    let today = now.date();
    let groups = group_pending(repository, today, &config.time_zone);
    let done = completed_today(repository, today, &config.time_zone);

    if groups.is_empty() && done.is_empty() {
        println!("No tasks for today");
        return;
    }

    let categories = repository.category_summaries();
    ui::render_view_header(
        &format!("Today ({})", today.strftime("%b %d")),
        groups.today.len(),
    );

    if !groups.previous.is_empty() {
        ui::render_section_header("Previous");
        for task in &groups.previous {
            ui::render_task_line(task, &categories, &config.time_zone, true);
        }
    }

    if !groups.today.is_empty() {
        ui::render_section_header("Today");
        for task in &groups.today {
            let overdue = ui::is_overdue(task, now.timestamp());
            ui::render_task_line(task, &categories, &config.time_zone, overdue);
        }
    }

    if !groups.future.is_empty() {
        ui::render_section_header("Future");
        for task in &groups.future {
            ui::render_task_line(task, &categories, &config.time_zone, false);
        }
    }

    if !done.is_empty() {
        ui::render_section_header("Completed today");
        for task in &done {
            ui::render_task_line(task, &categories, &config.time_zone, false);
        }
    }
}

async fn run_focus(repository: &AppRepository, task: Task, minutes: u64) {
    let mut timer = FocusTimer::new(Duration::from_secs(minutes.saturating_mul(60)));
    timer.start().unwrap_or_else(|e| fail(e));
    let mut updates = timer.subscribe();

    println!("Focusing on {} (Ctrl-C to stop)\n", task.title.bold());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = updates.next() => match update {
                Some(snapshot) => {
                    ui::render_focus(&task.title, &snapshot);
                    if snapshot.state == FocusState::Completed {
                        break;
                    }
                }
                None => break,
            },
        }
    }
    println!();

    let session = timer.snapshot().elapsed_seconds;
    match timer.stop_and_save(repository, task.id) {
        Ok(Some(task)) => println!(
            "{} Focused {} (total {})",
            "✓".green(),
            ui::format_duration(session),
            ui::format_duration(task.focus_time_seconds)
        ),
        Ok(None) => println!("Task no longer exists, session not recorded"),
        Err(e) => fail(format!("Failed to record focus time: {e}")),
    }
}

async fn run_reminder_daemon(repository: AppRepository, config: &Config) {
    let (scheduler, mut fired_rx) =
        TokioReminderScheduler::new(config.notifications_enabled).unwrap_or_else(|e| fail(e));
    if !config.notifications_enabled {
        tracing::warn!("notifications are disabled, reminders will be skipped");
    }

    let repository = Arc::new(repository);
    let report = reschedule_pending(&*repository, &scheduler, Timestamp::now());
    println!(
        "Watching reminders: {} scheduled (Ctrl-C to quit)",
        report.scheduled.to_string().bold()
    );

    let delivery = {
        let repository = Arc::clone(&repository);
        let time_zone = config.time_zone.clone();
        tokio::spawn(async move {
            deliver(&*repository, &mut fired_rx, &time_zone, |notification| {
                ui::render_notification(&notification);
            })
            .await;
        })
    };

    let mut ticker = tokio::time::interval(config.rescan_interval);
    // The first tick completes immediately and the store was just read
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                match rescan(&*repository, &scheduler, Timestamp::now()) {
                    Ok(report) => tracing::debug!(scheduled = report.scheduled, "rescanned store"),
                    Err(e) => tracing::warn!(error = %e, "could not rescan store"),
                }
            }
        }
    }

    drop(scheduler);
    delivery.abort();
    println!("\nStopped watching reminders");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_minutes_are_bounded() {
        for minutes in ["0", "1441", "18446744073709551615"] {
            let parsed = Cli::try_parse_from(["todolist", "focus", "abcd", "--minutes", minutes]);
            assert!(parsed.is_err(), "{minutes} should be rejected");
        }

        let parsed = Cli::try_parse_from(["todolist", "focus", "abcd", "--minutes", "50"]).unwrap();
        assert!(matches!(
            parsed.command,
            Some(Commands::Focus { minutes: 50, .. })
        ));
    }
}
