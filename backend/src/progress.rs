//! Run progress events.
//!
//! Each pipeline run owns a [`ProgressBroadcaster`]. Anything interested in
//! live progress (the CLI, a test) subscribes before the run starts.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffered events per subscriber before the slowest one starts lagging.
const CHANNEL_CAPACITY: usize = 256;

/// A single progress event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ProgressEvent {
    /// The seed file was read and parsed.
    RowsRead { valid: usize, skipped: usize },
    /// A batch was handed to the worker pool.
    BatchSubmitted { batch: usize, seeds: usize },
    /// A batch's products were absorbed by the loader.
    BatchCompleted { batch: usize, products: usize },
    /// A bulk write succeeded.
    Flushed { records: usize, total: usize },
    /// The run is over.
    Finished { ingested: usize },
}

/// Broadcasts progress events to all subscribers
#[derive(Debug, Clone)]
pub struct ProgressBroadcaster {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Send an event to all subscribers
    pub fn emit(&self, event: ProgressEvent) {
        // no subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
