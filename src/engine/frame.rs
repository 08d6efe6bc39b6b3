//! Per-tick execution context.

use crate::engine::commands::Commands;
use crate::engine::storage::Storage;

/// Context handed to every system during one tick.
///
/// The fields are public so a system can split-borrow them: iterate
/// component data through `storage` while recording structural changes into
/// `commands` from inside the loop.
pub struct Frame<'w> {
    /// Seconds elapsed since the previous tick.
    pub delta_time: f64,
    /// Deferred mutation buffer, flushed by the scheduler after all systems
    /// have executed.
    pub commands: Commands,
    /// The live store, for direct reads, queries, and entity-ref creation.
    pub storage: &'w mut Storage,
}

impl<'w> Frame<'w> {
    pub(crate) fn new(delta_time: f64, storage: &'w mut Storage) -> Self {
        Self {
            delta_time,
            commands: Commands::new(),
            storage,
        }
    }
}
