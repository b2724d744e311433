//! Batch worker pool.
//!
//! A fixed number of batches run at once; the rest wait for a worker permit.
//! [`BatchWorkerPool::submit`] never blocks: it returns a [`BatchHandle`]
//! the caller awaits whenever it wants the batch's products.
//!
//! ```text
//! submit(batch) ──▶ Queued ──permit──▶ Running ──▶ Completed(products)
//!                     │                   │    └─▶ Failed(error)
//!                     └──── shutdown ─────┴──────▶ Cancelled
//! ```

pub mod lifecycle;
pub mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{watch, Semaphore};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

use crate::crypto::FieldEncryptor;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{GeneratedProduct, IndexedSeed};
use crate::transform::variants::VariantGenerator;

pub use lifecycle::{Interrupt, InterruptHandle, LifecycleManager, ShutdownOutcome};
pub use worker::process_batch;

/// Seed rows processed as one unit of work.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Submission sequence number, starting at 0.
    pub id: usize,
    pub seeds: Vec<IndexedSeed>,
}

/// Where a submitted batch is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl BatchState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

/// Counters for row-level problems absorbed by a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub seeds: usize,
    pub variants_generated: usize,
    pub variants_skipped: usize,
    pub encryption_failures: usize,
}

/// Products built from one batch, already shuffled.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub batch: usize,
    pub products: Vec<GeneratedProduct>,
    pub stats: BatchStats,
}

/// Everything a worker needs, shared by all workers.
pub struct WorkerContext {
    pub generator: VariantGenerator,
    pub encryptor: Arc<dyn FieldEncryptor>,
    pub run_seed: u64,
}

/// Result handle of a submitted batch.
#[derive(Debug)]
pub struct BatchHandle {
    batch: usize,
    state: watch::Receiver<BatchState>,
    task: JoinHandle<PipelineResult<BatchOutput>>,
}

impl BatchHandle {
    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn state(&self) -> BatchState {
        *self.state.borrow()
    }

    /// Wait until the batch has finished, without taking its result.
    pub async fn finished(&self) {
        let mut state = self.state.clone();
        // a dropped sender means the task is gone
        let _ = state.wait_for(|s| s.is_terminal()).await;
    }

    /// Wait for the batch to finish.
    pub async fn join(self) -> PipelineResult<BatchOutput> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(PipelineError::Cancelled { batch: self.batch }),
            Err(e) => Err(PipelineError::Join(e.to_string())),
        }
    }
}

/// Fixed-size pool of batch workers.
pub struct BatchWorkerPool {
    size: usize,
    permits: Arc<Semaphore>,
    context: Arc<WorkerContext>,
    in_flight: Arc<watch::Sender<usize>>,
    tasks: Mutex<Vec<AbortHandle>>,
    accepting: AtomicBool,
    cancelled: Arc<AtomicBool>,
}

impl BatchWorkerPool {
    pub fn new(size: usize, context: WorkerContext) -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            size,
            permits: Arc::new(Semaphore::new(size)),
            context: Arc::new(context),
            in_flight: Arc::new(in_flight),
            tasks: Mutex::new(Vec::new()),
            accepting: AtomicBool::new(true),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Batches submitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Queue a batch. Returns immediately.
    pub fn submit(&self, batch: Batch) -> PipelineResult<BatchHandle> {
        if !self.is_accepting() {
            return Err(PipelineError::PoolClosed);
        }

        let id = batch.id;
        let (state_tx, state_rx) = watch::channel(BatchState::Queued);
        self.in_flight.send_modify(|n| *n += 1);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        let permits = Arc::clone(&self.permits);
        let context = Arc::clone(&self.context);
        let cancelled = Arc::clone(&self.cancelled);

        let task = tokio::spawn(async move {
            let _guard = guard;
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    state_tx.send_replace(BatchState::Cancelled);
                    return Err(PipelineError::Cancelled { batch: id });
                }
            };

            state_tx.send_replace(BatchState::Running);
            debug!("Batch {} running ({} seeds)", id, batch.seeds.len());

            let result =
                tokio::task::spawn_blocking(move || process_batch(&context, batch, &cancelled))
                    .await
                    .map_err(|e| PipelineError::Join(e.to_string()))
                    .and_then(|r| r);

            state_tx.send_replace(match &result {
                Ok(_) => BatchState::Completed,
                Err(PipelineError::Cancelled { .. }) => BatchState::Cancelled,
                Err(_) => BatchState::Failed,
            });
            result
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|t| !t.is_finished());
        tasks.push(task.abort_handle());

        Ok(BatchHandle {
            batch: id,
            state: state_rx,
            task,
        })
    }

    /// Stop accepting new batches. Submitted ones keep running.
    pub fn close(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    /// Wait until every submitted batch has finished.
    pub async fn wait_idle(&self) {
        let mut rx = self.in_flight.subscribe();
        // the sender lives as long as the pool
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Cancel everything still queued or running. Returns how many
    /// batches were affected.
    pub fn cancel_all(&self) -> usize {
        self.close();
        self.cancelled.store(true, Ordering::Release);
        self.permits.close();

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let pending: Vec<AbortHandle> = tasks.drain(..).filter(|t| !t.is_finished()).collect();
        for task in &pending {
            task.abort();
        }
        pending.len()
    }
}

impl Drop for BatchWorkerPool {
    fn drop(&mut self) {
        let pending = self.cancel_all();
        if pending > 0 {
            debug!("Worker pool dropped with {} unfinished batches", pending);
        }
    }
}

/// Decrements the in-flight count when a batch task ends, aborted or not.
struct InFlightGuard(Arc<watch::Sender<usize>>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}
