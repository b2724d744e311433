//! Worker pool ownership and shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use super::BatchWorkerPool;

/// How a shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every submitted batch finished within the grace period.
    Graceful,
    /// The grace period ran out; `cancelled` batches lost their products.
    Forced { cancelled: usize },
    /// Shutdown had already run.
    AlreadyShutDown,
}

/// Asks a running pipeline to stop submitting work and shut down.
#[derive(Debug)]
pub struct InterruptHandle {
    sender: watch::Sender<bool>,
}

impl InterruptHandle {
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

/// Receiving side of an [`InterruptHandle`].
#[derive(Debug, Clone)]
pub struct Interrupt {
    receiver: watch::Receiver<bool>,
}

impl Interrupt {
    pub fn channel() -> (InterruptHandle, Interrupt) {
        let (sender, receiver) = watch::channel(false);
        (InterruptHandle { sender }, Interrupt { receiver })
    }

    /// An interrupt that never fires.
    pub fn never() -> Self {
        Self::channel().1
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the interrupt fires; never if its handle is dropped first.
    pub async fn triggered(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|fired| *fired).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::never()
    }
}

/// Owns a [`BatchWorkerPool`] and shuts it down once.
pub struct LifecycleManager {
    pool: BatchWorkerPool,
    grace_period: Duration,
    shut_down: AtomicBool,
}

impl LifecycleManager {
    pub fn new(pool: BatchWorkerPool, grace_period: Duration) -> Self {
        Self {
            pool,
            grace_period,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn pool(&self) -> &BatchWorkerPool {
        &self.pool
    }

    /// Stop accepting batches, wait up to the grace period for submitted
    /// ones, then cancel whatever is left. Only the first call does work.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        if self
            .shut_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return ShutdownOutcome::AlreadyShutDown;
        }

        self.pool.close();
        match tokio::time::timeout(self.grace_period, self.pool.wait_idle()).await {
            Ok(()) => {
                info!("Worker pool shut down");
                ShutdownOutcome::Graceful
            }
            Err(_) => {
                let cancelled = self.pool.cancel_all();
                warn!(
                    "Worker pool did not drain within {:?}, cancelled {} batches; their products are lost",
                    self.grace_period, cancelled
                );
                ShutdownOutcome::Forced { cancelled }
            }
        }
    }
}
