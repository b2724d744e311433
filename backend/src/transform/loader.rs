//! Bulk loader.
//!
//! Takes batch results in submission order, accumulates products and writes
//! them to the sink in bulk once the accumulator reaches the threshold.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::{PipelineError, PipelineResult};
use crate::models::GeneratedProduct;
use crate::pool::{BatchHandle, BatchStats};
use crate::progress::{ProgressBroadcaster, ProgressEvent};
use crate::sink::ProductSink;

/// Totals after the final flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub ingested: usize,
    pub flushes: usize,
}

pub struct BulkLoader {
    sink: Arc<dyn ProductSink>,
    threshold: usize,
    accumulator: Vec<GeneratedProduct>,
    summary: LoadSummary,
    progress: ProgressBroadcaster,
}

impl BulkLoader {
    pub fn new(sink: Arc<dyn ProductSink>, threshold: usize, progress: ProgressBroadcaster) -> Self {
        Self {
            sink,
            threshold,
            accumulator: Vec::with_capacity(threshold),
            summary: LoadSummary::default(),
            progress,
        }
    }

    /// Products waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.accumulator.len()
    }

    pub fn summary(&self) -> LoadSummary {
        self.summary
    }

    /// Wait for a batch and absorb its products.
    pub async fn absorb_handle(&mut self, handle: BatchHandle) -> PipelineResult<BatchStats> {
        let output = handle.join().await?;
        self.progress.emit(ProgressEvent::BatchCompleted {
            batch: output.batch,
            products: output.products.len(),
        });
        self.absorb(output.products).await?;
        Ok(output.stats)
    }

    /// Add products, flushing when the threshold is reached.
    pub async fn absorb(&mut self, products: Vec<GeneratedProduct>) -> PipelineResult<()> {
        self.accumulator.extend(products);
        if self.accumulator.len() >= self.threshold {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flush whatever is left and return the totals.
    pub async fn finish(mut self) -> PipelineResult<LoadSummary> {
        if !self.accumulator.is_empty() {
            self.flush().await?;
        }
        Ok(self.summary)
    }

    async fn flush(&mut self) -> PipelineResult<()> {
        let records = self.accumulator.len();
        if let Err(source) = self.sink.save_all(&self.accumulator).await {
            error!("Bulk write of {} records failed: {}", records, source);
            return Err(PipelineError::IngestionFailed {
                lost: records,
                source,
            });
        }

        self.accumulator.clear();
        self.summary.ingested += records;
        self.summary.flushes += 1;
        info!(
            "Flushed {} records ({} total)",
            records, self.summary.ingested
        );
        self.progress.emit(ProgressEvent::Flushed {
            records,
            total: self.summary.ingested,
        });
        Ok(())
    }
}
