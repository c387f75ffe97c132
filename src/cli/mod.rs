use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::{
    app::{self, AppConfig, Intent},
    model::{ChecklistItemId, EntryId, TaskId},
    persistence::processing::debounced_save::DEFAULT_AUTOSAVE_DELAY,
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::{CLI_PREFIX, enable_logging},
    },
};

#[derive(Parser, Debug)]
#[command(name = "tasktimer", version, long_about = None)]
#[command(about = "Time the entries of your tasks, one at a time", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Echo logs to stdout")]
    log: bool,
    #[arg(long, global = true, help = "Log level, e.g. debug. Falls back to RUST_LOG")]
    log_filter: Option<LevelFilter>,
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_AUTOSAVE_DELAY.as_millis() as u64,
        help = "Quiet period before a changed task is written, in milliseconds"
    )]
    autosave_delay_ms: u64,
}

#[derive(ClapArgs, Debug)]
struct TaskArg {
    #[arg(long)]
    task: String,
}

#[derive(ClapArgs, Debug)]
struct EntryArgs {
    #[arg(long)]
    task: String,
    #[arg(long)]
    entry: String,
}

#[derive(ClapArgs, Debug)]
struct QueueArg {
    #[arg(long, num_args = 1.., required = true, help = "Task ids in session order")]
    queue: Vec<String>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Create a task and print its id")]
    AddTask { title: String },
    #[command(about = "Append an entry to a task's log and print its id")]
    AddEntry {
        #[arg(long)]
        task: String,
        description: String,
        #[arg(long, help = "Add a chapter header instead of a timed entry")]
        header: bool,
        #[arg(long, help = "Checklist item whose logged time mirrors this entry")]
        checklist_item: Option<String>,
    },
    #[command(about = "Delete a task, dropping its timer")]
    RemoveTask { task: String },
    #[command(subcommand, about = "Edit a task's checklist")]
    Check(CheckCommand),
    #[command(about = "Start the entry, or pause it when it is running")]
    Toggle(EntryArgs),
    #[command(about = "Pause and deselect the active entry")]
    Stop,
    #[command(about = "Set an entry back to zero")]
    Reset(EntryArgs),
    #[command(about = "Forget the active entry without pausing it")]
    Clear,
    #[command(about = "Select a task for timing without starting it")]
    Prime(TaskArg),
    #[command(about = "Replace a task's log with one built from its checklist and select it")]
    PrimeChecklist {
        #[arg(long)]
        task: String,
        #[arg(long, help = "Title used when the log gets archived")]
        title: Option<String>,
    },
    #[command(about = "Switch to the next entry of the active task")]
    Next,
    #[command(about = "Switch to the previous entry of the active task")]
    Previous,
    #[command(about = "Switch to the first entry of the next chapter")]
    NextChapter,
    #[command(about = "Switch to the first entry of the previous chapter")]
    PreviousChapter,
    #[command(about = "Archive a task's log as a session")]
    Post {
        #[arg(long)]
        task: String,
        #[arg(long, help = "Zero the live log after archiving")]
        reset: bool,
    },
    #[command(about = "Zero every entry of a task without archiving")]
    ResetAll(TaskArg),
    #[command(subcommand, about = "Work through a queue of tasks")]
    Session(SessionCommand),
    #[command(about = "Print the timer and every task")]
    Status,
    #[command(about = "Print the active timer every second until Ctrl-C")]
    Watch,
}

#[derive(Subcommand, Debug)]
enum CheckCommand {
    #[command(about = "Add a checklist item and print its id")]
    Add {
        #[arg(long)]
        task: String,
        #[arg(long, help = "Section title. Items without one share an untitled section")]
        section: Option<String>,
        text: String,
    },
    #[command(about = "Mark a checklist item completed")]
    Done {
        #[arg(long)]
        task: String,
        #[arg(long)]
        item: String,
    },
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    #[command(about = "Start the first task of the queue")]
    Start(QueueArg),
    #[command(about = "Move to the next task of the queue")]
    Next(QueueArg),
    #[command(about = "Move to the previous task of the queue")]
    Previous(QueueArg),
    #[command(about = "Start a task from its log, its checklist or from scratch")]
    Task(TaskArg),
}

fn queue(arg: QueueArg) -> Vec<TaskId> {
    arg.queue.into_iter().map(TaskId::from).collect()
}

impl From<Commands> for Intent {
    fn from(value: Commands) -> Self {
        match value {
            Commands::AddTask { title } => Intent::AddTask { title },
            Commands::AddEntry {
                task,
                description,
                header,
                checklist_item,
            } => Intent::AddEntry {
                task: task.into(),
                description,
                header,
                checklist_item: checklist_item.map(ChecklistItemId::from),
            },
            Commands::RemoveTask { task } => Intent::RemoveTask { task: task.into() },
            Commands::Check(CheckCommand::Add {
                task,
                section,
                text,
            }) => Intent::AddChecklistItem {
                task: task.into(),
                section,
                text,
            },
            Commands::Check(CheckCommand::Done { task, item }) => Intent::CompleteChecklistItem {
                task: task.into(),
                item: item.into(),
            },
            Commands::Toggle(EntryArgs { task, entry }) => Intent::Toggle {
                task: task.into(),
                entry: EntryId::from(entry),
            },
            Commands::Stop => Intent::Stop,
            Commands::Reset(EntryArgs { task, entry }) => Intent::Reset {
                task: task.into(),
                entry: EntryId::from(entry),
            },
            Commands::Clear => Intent::Clear,
            Commands::Prime(TaskArg { task }) => Intent::Prime { task: task.into() },
            Commands::PrimeChecklist { task, title } => Intent::PrimeChecklist {
                task: task.into(),
                title,
            },
            Commands::Next => Intent::NextEntry,
            Commands::Previous => Intent::PreviousEntry,
            Commands::NextChapter => Intent::NextChapter,
            Commands::PreviousChapter => Intent::PreviousChapter,
            Commands::Post { task, reset } => Intent::Post {
                task: task.into(),
                reset,
            },
            Commands::ResetAll(TaskArg { task }) => Intent::ResetAll { task: task.into() },
            Commands::Session(SessionCommand::Start(arg)) => Intent::SessionStart { queue: queue(arg) },
            Commands::Session(SessionCommand::Next(arg)) => Intent::SessionNext { queue: queue(arg) },
            Commands::Session(SessionCommand::Previous(arg)) => {
                Intent::SessionPrevious { queue: queue(arg) }
            }
            Commands::Session(SessionCommand::Task(TaskArg { task })) => {
                Intent::SessionTask { task: task.into() }
            }
            Commands::Status => Intent::Status,
            Commands::Watch => Intent::Watch,
        }
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = match args.dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            dir
        }
        None => create_application_default_path()?,
    };
    let logging_level = match (args.log_filter, args.log) {
        (Some(level), _) => Some(level),
        (None, true) => Some(LevelFilter::TRACE),
        (None, false) => None,
    };
    enable_logging(CLI_PREFIX, &dir, logging_level, args.log)?;

    let config = AppConfig {
        dir,
        autosave_delay: Duration::from_millis(args.autosave_delay_ms),
    };
    app::run(&config, args.commands.into(), DefaultClock, &mut std::io::stdout()).await
}
