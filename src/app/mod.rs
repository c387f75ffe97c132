//! Wires the engine, the task collection and autosave together for a single run of the program.
//!
//! A run opens the stored state, applies one [Intent], hands whatever changed to the autosave
//! module and waits for it to flush before returning.

use std::{io::Write, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use tokio::{select, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    engine::{TimerEngine, TimerState},
    model::{Task, TaskId},
    persistence::{
        SaveEvent,
        processing::{ProcessingModule, debounced_save::DebouncedSaver},
        state_storage::{JsonStateStorage, StateStorage},
    },
    store::TaskBook,
    utils::clock::Clock,
};

pub use intent::{Intent, Outcome};

pub mod intent;
pub mod output;
pub mod shutdown;

const STATE_DIR: &str = "state";
const EVENT_BUFFER: usize = 32;
const WATCH_INTERVAL: Duration = Duration::from_secs(1);

pub struct AppConfig {
    pub dir: PathBuf,
    pub autosave_delay: Duration,
}

/// The engine together with the tasks it works on, as loaded for this run.
pub struct Workspace {
    engine: TimerEngine,
    book: TaskBook,
    deleted: Vec<TaskId>,
    published_timer: TimerState,
}

impl Workspace {
    pub fn restore(tasks: Vec<Task>, stored: TimerState, clock: impl Clock) -> Self {
        let mut book = TaskBook::new(tasks);
        let engine = TimerEngine::restore(Box::new(clock), stored.clone(), &mut book);
        Self {
            engine,
            book,
            deleted: vec![],
            published_timer: stored,
        }
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn book(&self) -> &TaskBook {
        &self.book
    }

    /// Everything that changed since the previous call, in the order it should be written.
    pub fn take_changes(&mut self) -> Vec<SaveEvent> {
        let mut events = self
            .deleted
            .drain(..)
            .map(SaveEvent::TaskDeleted)
            .collect::<Vec<_>>();
        events.extend(self.book.take_changed().into_iter().map(SaveEvent::Task));

        let timer = self.engine.snapshot();
        if timer != self.published_timer {
            self.published_timer = timer.clone();
            events.push(SaveEvent::Timer(timer));
        }
        events
    }
}

/// Loads tasks and the timer pointer and restores the engine from them.
pub async fn open(storage: &impl StateStorage, clock: impl Clock) -> Result<Workspace> {
    let tasks = storage.load_tasks().await.context("Failed to load tasks")?;
    let timer = storage
        .load_timer()
        .await
        .context("Failed to load the timer")?;
    info!("Opened {} tasks", tasks.len());
    Ok(Workspace::restore(tasks, timer, clock))
}

/// Represents the starting point of a single run.
pub async fn run(
    config: &AppConfig,
    intent: Intent,
    clock: impl Clock + Clone,
    out: &mut impl Write,
) -> Result<()> {
    let storage = Arc::new(JsonStateStorage::new(config.dir.join(STATE_DIR))?);
    let mut workspace = open(storage.as_ref(), clock.clone()).await?;

    let (sender, receiver) = mpsc::channel::<SaveEvent>(EVENT_BUFFER);
    let processor = create_processor(storage, receiver, config.autosave_delay, clock.clone());

    let (foreground_result, processing_result) = tokio::join!(
        async move {
            let result = drive(&mut workspace, intent, &sender, &clock, out).await;
            // Closing the channel is what lets the processor flush and finish.
            drop(sender);
            result
        },
        processor.run(),
    );

    if let Err(processing_result) = &processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }
    foreground_result?;
    processing_result
}

fn create_processor<S: StateStorage>(
    storage: Arc<S>,
    receiver: mpsc::Receiver<SaveEvent>,
    autosave_delay: Duration,
    clock: impl Clock,
) -> ProcessingModule<DebouncedSaver<S>> {
    let saver = DebouncedSaver::new(storage, autosave_delay, Arc::new(clock));
    ProcessingModule::new(receiver, saver)
}

async fn drive(
    workspace: &mut Workspace,
    intent: Intent,
    sender: &mpsc::Sender<SaveEvent>,
    clock: &impl Clock,
    out: &mut impl Write,
) -> Result<()> {
    // Restoring may already have folded in time or settled stray entries.
    publish(workspace, sender).await?;

    if intent == Intent::Watch {
        let shutdown_token = CancellationToken::new();
        let (_, watch_result) = tokio::join!(
            shutdown::detect_shutdown(shutdown_token.clone()),
            watch(workspace, clock, shutdown_token.clone(), out),
        );
        return watch_result;
    }

    debug!("Applying {intent:?}");
    let outcome = workspace.apply(intent)?;
    publish(workspace, sender).await?;
    write!(out, "{}", output::render(&outcome, workspace))?;
    Ok(())
}

async fn publish(workspace: &mut Workspace, sender: &mpsc::Sender<SaveEvent>) -> Result<()> {
    for event in workspace.take_changes() {
        sender
            .send(event)
            .await
            .map_err(|_| anyhow!("Autosave stopped accepting changes"))?;
    }
    Ok(())
}

/// Prints the active timer once a second until `shutdown` is cancelled. Only the display moves;
/// nothing is written.
pub async fn watch(
    workspace: &Workspace,
    clock: &impl Clock,
    shutdown: CancellationToken,
    out: &mut impl Write,
) -> Result<()> {
    let mut tick = clock.instant();
    loop {
        writeln!(out, "{}", output::timer_line(workspace.engine().display().as_ref()))?;
        out.flush()?;
        tick += WATCH_INTERVAL;
        select! {
            _ = shutdown.cancelled() => return Ok(()),
            _ = clock.sleep_until(tick) => {}
        }
    }
}
