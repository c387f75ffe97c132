use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    model::{Task, TaskId},
    persistence::{SaveEvent, state_storage::StateStorage},
    utils::clock::Clock,
};

use super::module::EventProcessor;

pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(500);

/// A task write waiting for its quiet period to pass.
struct PendingWrite {
    cancel: CancellationToken,
    /// Resolves to whether the write reached the storage.
    handle: JoinHandle<bool>,
    task: Task,
}

/// Keeps at most one scheduled write per task. Scheduling a task again cancels the previous
/// write, so a burst of updates ends up as a single write of the last version.
struct Debouncer<S: StateStorage> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
    delay: Duration,
    pending: HashMap<TaskId, PendingWrite>,
    /// Tasks whose delayed write hit a storage error. Retried on flush.
    failed: HashMap<TaskId, Task>,
}

impl<S: StateStorage> Debouncer<S> {
    async fn prune_finished(&mut self) {
        let finished = self
            .pending
            .iter()
            .filter(|(_, write)| write.handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();
        for id in finished {
            let Some(write) = self.pending.remove(&id) else {
                continue;
            };
            if !write.handle.await.unwrap_or(false) {
                debug!("Keeping failed write of task {id} for the final flush");
                self.failed.insert(id, write.task);
            }
        }
    }

    async fn schedule(&mut self, task: Task) {
        self.prune_finished().await;
        if self.cancel(&task.id).is_some() {
            debug!("Superseded pending write of task {}", task.id);
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            let storage = self.storage.clone();
            let clock = self.clock.clone();
            let delay = self.delay;
            let task = task.clone();
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => false,
                    _ = clock.sleep(delay) => match storage.save_task(&task).await {
                        Ok(_) => true,
                        Err(e) => {
                            error!("Failed to save task {}: {e:?}", task.id);
                            false
                        }
                    },
                }
            }
        });
        self.pending.insert(task.id.clone(), PendingWrite { cancel, handle, task });
    }

    fn cancel(&mut self, id: &TaskId) -> Option<PendingWrite> {
        self.failed.remove(id);
        let write = self.pending.remove(id)?;
        write.cancel.cancel();
        Some(write)
    }

    /// Writes everything that has not been written yet, without waiting for quiet periods.
    async fn flush(&mut self) -> Result<()> {
        let mut failures = 0;
        for (id, write) in self.pending.drain() {
            write.cancel.cancel();
            if write.handle.await.unwrap_or(false) {
                continue;
            }
            debug!("Flushing pending write of task {id}");
            if let Err(e) = self.storage.save_task(&write.task).await {
                error!("Failed to flush task {id}: {e:?}");
                failures += 1;
            }
        }
        for (id, task) in self.failed.drain() {
            debug!("Retrying failed write of task {id}");
            if let Err(e) = self.storage.save_task(&task).await {
                error!("Failed to flush task {id}: {e:?}");
                failures += 1;
            }
        }
        anyhow::ensure!(failures == 0, "{failures} tasks could not be saved");
        Ok(())
    }
}

/// Bridges [ProcessingModule](super::ProcessingModule) and [StateStorage]. Task updates are
/// debounced, the timer pointer and deletions are written right away.
pub struct DebouncedSaver<S: StateStorage> {
    storage: Arc<S>,
    debouncer: Debouncer<S>,
}

impl<S: StateStorage> DebouncedSaver<S> {
    pub fn new(storage: Arc<S>, delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            debouncer: Debouncer {
                storage: storage.clone(),
                clock,
                delay,
                pending: HashMap::new(),
                failed: HashMap::new(),
            },
            storage,
        }
    }
}

impl<S: StateStorage> EventProcessor for DebouncedSaver<S> {
    async fn process_next(&mut self, event: SaveEvent) -> Result<()> {
        match event {
            SaveEvent::Task(task) => {
                self.debouncer.schedule(task).await;
                Ok(())
            }
            SaveEvent::TaskDeleted(id) => {
                if let Some(write) = self.debouncer.cancel(&id) {
                    // A write already past its delay would bring the file back.
                    let _ = write.handle.await;
                }
                self.storage.delete_task(&id).await
            }
            SaveEvent::Timer(timer) => self.storage.save_timer(&timer).await,
        }
    }

    async fn finalize(&mut self) -> Result<()> {
        let pending = self.debouncer.pending.len() + self.debouncer.failed.len();
        self.debouncer.flush().await?;
        info!("Flushed {pending} pending task writes");
        Ok(())
    }
}
