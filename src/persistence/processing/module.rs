use anyhow::Result;

use crate::persistence::SaveEvent;

/// Represents an event processor. Implementations decide when and where a [SaveEvent] ends up.
pub trait EventProcessor {
    fn process_next(&mut self, event: SaveEvent) -> impl std::future::Future<Output = Result<()>>;

    /// Called once the foreground hung up. Nothing accepted earlier may be left unwritten.
    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>>;
}
