use anyhow::Result;
use module::EventProcessor;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, trace};

use super::SaveEvent;

pub mod debounced_save;
pub mod module;

/// Receives [SaveEvent]s from the foreground and hands them to a processor until every sender is
/// dropped. The foreground never waits for a write to finish.
pub struct ProcessingModule<Processor> {
    receiver: Receiver<SaveEvent>,
    processor: Processor,
}

impl<P: EventProcessor> ProcessingModule<P> {
    pub fn new(receiver: Receiver<SaveEvent>, processor: P) -> Self {
        Self {
            receiver,
            processor,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(event) = self.receiver.recv().await {
            trace!("Processing event {:?}", event);
            let description = describe(&event);
            match self.processor.process_next(event).await {
                Ok(_) => {
                    debug!("Processed {description}")
                }
                Err(e) => {
                    error!("Error processing {description}: {e:?}")
                }
            }
        }

        let result = self.processor.finalize().await;
        self.receiver.close();
        result
    }
}

fn describe(event: &SaveEvent) -> String {
    match event {
        SaveEvent::Task(task) => format!("update of task {}", task.id),
        SaveEvent::TaskDeleted(id) => format!("deletion of task {id}"),
        SaveEvent::Timer(_) => "timer pointer".to_string(),
    }
}
