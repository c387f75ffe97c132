use std::path::PathBuf;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    engine::TimerState,
    fs::operations::{read_locked, remove_if_exists, write_locked},
    model::{Task, TaskId},
};

const TASKS_DIR: &str = "tasks";
const TIMER_FILE: &str = "timer.json";
const EXTENSION: &str = "json";

/// Interface for abstracting where tasks and the timer pointer are kept.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStorage: Send + Sync + 'static {
    /// Loads every readable task. Unreadable task files are skipped.
    async fn load_tasks(&self) -> Result<Vec<Task>>;

    async fn save_task(&self, task: &Task) -> Result<()>;

    async fn delete_task(&self, id: &TaskId) -> Result<()>;

    /// Loads the timer pointer. A missing or unreadable pointer is an idle timer.
    async fn load_timer(&self) -> Result<TimerState>;

    async fn save_timer(&self, timer: &TimerState) -> Result<()>;
}

/// The main realization of [StateStorage]: pretty printed JSON files in a directory.
pub struct JsonStateStorage {
    tasks_dir: PathBuf,
    timer_path: PathBuf,
}

impl JsonStateStorage {
    pub fn new(state_dir: PathBuf) -> Result<Self, std::io::Error> {
        let tasks_dir = state_dir.join(TASKS_DIR);
        std::fs::create_dir_all(&tasks_dir)?;

        Ok(Self {
            tasks_dir,
            timer_path: state_dir.join(TIMER_FILE),
        })
    }

    fn task_path(&self, id: &TaskId) -> Result<PathBuf> {
        let name = id.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            bail!("Task id {name:?} can't be used as a file name");
        }
        Ok(self.tasks_dir.join(format!("{name}.{EXTENSION}")))
    }
}

#[async_trait]
impl StateStorage for JsonStateStorage {
    async fn load_tasks(&self) -> Result<Vec<Task>> {
        let mut paths = vec![];
        let mut dir = tokio::fs::read_dir(&self.tasks_dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().is_some_and(|extension| extension == EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut tasks = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(content) = read_locked(&path).await? else {
                continue;
            };
            match serde_json::from_str::<Task>(&content) {
                Ok(task) => tasks.push(task),
                // Possibly cut short by a crash.
                Err(e) => warn!("Skipping unreadable task file {path:?}: {e}"),
            }
        }
        debug!("Loaded {} tasks from {:?}", tasks.len(), self.tasks_dir);
        Ok(tasks)
    }

    async fn save_task(&self, task: &Task) -> Result<()> {
        let path = self.task_path(&task.id)?;
        let content = serde_json::to_vec_pretty(task)?;
        write_locked(&path, &content).await?;
        debug!("Saved task {} to {path:?}", task.id);
        Ok(())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<()> {
        let path = self.task_path(id)?;
        remove_if_exists(&path).await?;
        debug!("Deleted task file {path:?}");
        Ok(())
    }

    async fn load_timer(&self) -> Result<TimerState> {
        let Some(content) = read_locked(&self.timer_path).await? else {
            return Ok(TimerState::default());
        };
        match serde_json::from_str(&content) {
            Ok(timer) => Ok(timer),
            Err(e) => {
                warn!("Timer file {:?} is unreadable, starting idle: {e}", self.timer_path);
                Ok(TimerState::default())
            }
        }
    }

    async fn save_timer(&self, timer: &TimerState) -> Result<()> {
        let content = serde_json::to_vec_pretty(timer)?;
        write_locked(&self.timer_path, &content).await?;
        Ok(())
    }
}
