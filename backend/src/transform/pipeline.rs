//! High-level ingestion API.
//!
//! Reads a seed file, expands every seed into product variants on a worker
//! pool, encrypts their prompts and bulk loads the results into a sink.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use productload::{
//!     ingest_file, AesGcmEncryptor, IngestConfig, Interrupt, JsonLinesSink, ProgressBroadcaster,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sink = Arc::new(JsonLinesSink::create("products.jsonl").await?);
//!     let encryptor = Arc::new(AesGcmEncryptor::from_env()?);
//!     let report = ingest_file(
//!         "seeds.csv",
//!         &IngestConfig::default(),
//!         encryptor,
//!         sink,
//!         &ProgressBroadcaster::new(),
//!         &Interrupt::never(),
//!     )
//!     .await?;
//!
//!     println!("Ingested {} products", report.records_ingested);
//!     Ok(())
//! }
//! ```

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::loader::BulkLoader;
use super::variants::{IndexAllocator, VariantGenerator};
use crate::config::IngestConfig;
use crate::crypto::FieldEncryptor;
use crate::error::{PipelineError, PipelineResult};
use crate::models::IndexedSeed;
use crate::parser::{check_extension, parse_row, read_seed_bytes, SeedFile};
use crate::pool::{
    Batch, BatchHandle, BatchStats, BatchWorkerPool, Interrupt, LifecycleManager,
    ShutdownOutcome, WorkerContext,
};
use crate::progress::{ProgressBroadcaster, ProgressEvent};
use crate::sink::ProductSink;

/// Outcome of a successful ingestion run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub run_id: Uuid,

    /// Random seed the run used; pass it back in to reproduce the run
    pub seed: u64,

    /// Data rows read from the file
    pub rows_read: usize,

    /// Seed rows that failed validation
    pub rows_skipped: usize,

    /// Valid seed rows without any content triplet
    pub seeds_without_content: usize,

    pub batches: usize,
    pub variants_generated: usize,

    /// Variants that failed validation after synthesis
    pub variants_skipped: usize,

    /// Variants dropped because their prompt could not be encrypted
    pub encryption_failures: usize,

    pub records_ingested: usize,
    pub flushes: usize,
    pub elapsed_ms: u64,
}

/// Seeds that passed validation, plus what was rejected on the way.
#[derive(Debug, Clone)]
pub struct PreparedSeeds {
    /// Shuffled, each with its own index block
    pub seeds: Vec<IndexedSeed>,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub seeds_without_content: usize,
}

/// Ingest a seed CSV file.
pub async fn ingest_file<P: AsRef<Path>>(
    path: P,
    config: &IngestConfig,
    encryptor: Arc<dyn FieldEncryptor>,
    sink: Arc<dyn ProductSink>,
    progress: &ProgressBroadcaster,
    interrupt: &Interrupt,
) -> PipelineResult<IngestReport> {
    let path = path.as_ref();
    check_extension(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(crate::error::InputError::from)?;

    info!("Reading {}", path.display());
    ingest_bytes(&bytes, config, encryptor, sink, progress, interrupt).await
}

/// Ingest seed CSV content already in memory.
pub async fn ingest_bytes(
    bytes: &[u8],
    config: &IngestConfig,
    encryptor: Arc<dyn FieldEncryptor>,
    sink: Arc<dyn ProductSink>,
    progress: &ProgressBroadcaster,
    interrupt: &Interrupt,
) -> PipelineResult<IngestReport> {
    config.validate()?;
    let file = read_seed_bytes(bytes, config.delimiter)?;
    ingest_seed_file(file, config, encryptor, sink, progress, interrupt).await
}

/// Run the pipeline over an already read seed file.
///
/// When `interrupt` fires, no further batches are submitted and the pool
/// gets its grace period. Batches that finish in time are still stored and
/// the run ends with [`PipelineError::Interrupted`].
pub async fn ingest_seed_file(
    file: SeedFile,
    config: &IngestConfig,
    encryptor: Arc<dyn FieldEncryptor>,
    sink: Arc<dyn ProductSink>,
    progress: &ProgressBroadcaster,
    interrupt: &Interrupt,
) -> PipelineResult<IngestReport> {
    config.validate()?;
    let started = Instant::now();
    let run_id = Uuid::new_v4();
    let seed = config.seed.unwrap_or_else(rand::random);

    info!(
        "Run {} (seed {}): {} rows, encoding {}, delimiter {:?}",
        run_id,
        seed,
        file.rows.len(),
        file.encoding,
        file.delimiter as char
    );

    let prepared = prepare_seeds(file, config, seed);
    progress.emit(ProgressEvent::RowsRead {
        valid: prepared.seeds.len(),
        skipped: prepared.rows_skipped,
    });

    let report = IngestReport {
        run_id,
        seed,
        rows_read: prepared.rows_read,
        rows_skipped: prepared.rows_skipped,
        seeds_without_content: prepared.seeds_without_content,
        batches: 0,
        variants_generated: 0,
        variants_skipped: 0,
        encryption_failures: 0,
        records_ingested: 0,
        flushes: 0,
        elapsed_ms: 0,
    };

    let pool = BatchWorkerPool::new(
        config.pool_size,
        WorkerContext {
            generator: VariantGenerator::new(
                seed,
                config.min_variants,
                config.max_variants,
                config.price_ladder,
            ),
            encryptor,
            run_seed: seed,
        },
    );
    let lifecycle = LifecycleManager::new(pool, config.grace_period());

    let mut run = BatchRun {
        lifecycle: &lifecycle,
        loader: BulkLoader::new(sink, config.flush_threshold, progress.clone()),
        window: VecDeque::with_capacity(config.pool_size + 1),
        progress,
        report,
    };

    let submitted = run.submit_all(prepared.seeds, config.chunk_size, interrupt).await;

    if let ShutdownOutcome::Forced { cancelled } = lifecycle.shutdown().await {
        warn!("{} batches were cancelled at shutdown", cancelled);
    }

    match submitted {
        Ok(Submission::Done) => run.finish(started).await,
        Ok(Submission::Interrupted) => Err(run.finish_interrupted().await),
        Err(e) => Err(run.abort(e).await),
    }
}

/// Validate seed rows, reserve their uuid index blocks and shuffle them.
///
/// Index blocks are handed out over the rows sorted by content, so the
/// same rows in any file order get the same blocks.
pub fn prepare_seeds(file: SeedFile, config: &IngestConfig, seed: u64) -> PreparedSeeds {
    let rows_read = file.rows.len();
    let mut rows_skipped = 0;
    let mut seeds_without_content = 0;

    let mut valid = Vec::with_capacity(rows_read);
    for raw in file.rows {
        match parse_row(&raw) {
            Ok(parsed) => {
                if parsed.contents.is_empty() {
                    seeds_without_content += 1;
                }
                valid.push((raw, parsed));
            }
            Err(_) => rows_skipped += 1,
        }
    }

    if seeds_without_content > 0 {
        warn!("{} seed rows have no content", seeds_without_content);
    }

    valid.sort_by(|a, b| a.0.fields.cmp(&b.0.fields));

    let mut allocator = IndexAllocator::new(1, config.max_variants as u64);
    let mut seeds: Vec<IndexedSeed> = valid
        .into_iter()
        .map(|(raw, parsed)| IndexedSeed {
            raw,
            seed: parsed,
            start_index: allocator.reserve(),
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    seeds.shuffle(&mut rng);

    PreparedSeeds {
        seeds,
        rows_read,
        rows_skipped,
        seeds_without_content,
    }
}

/// How the submission loop ended.
enum Submission {
    Done,
    Interrupted,
}

/// State of one run between submission and the final flush.
///
/// At most `pool_size + 1` batch handles sit in `window`; their results
/// reach the loader strictly in submission order.
struct BatchRun<'a> {
    lifecycle: &'a LifecycleManager,
    loader: BulkLoader,
    window: VecDeque<BatchHandle>,
    progress: &'a ProgressBroadcaster,
    report: IngestReport,
}

impl BatchRun<'_> {
    async fn submit_all(
        &mut self,
        seeds: Vec<IndexedSeed>,
        chunk_size: usize,
        interrupt: &Interrupt,
    ) -> PipelineResult<Submission> {
        let lifecycle = self.lifecycle;
        let pool = lifecycle.pool();

        for (id, chunk) in seeds.chunks(chunk_size).enumerate() {
            if interrupt.is_triggered() {
                return Ok(Submission::Interrupted);
            }

            let handle = pool.submit(Batch {
                id,
                seeds: chunk.to_vec(),
            })?;
            self.progress.emit(ProgressEvent::BatchSubmitted {
                batch: id,
                seeds: chunk.len(),
            });
            self.report.batches += 1;
            self.window.push_back(handle);

            while self.window.len() > pool.size() {
                if self.wait_front(interrupt).await {
                    return Ok(Submission::Interrupted);
                }
                self.absorb_front().await?;
            }
        }

        while !self.window.is_empty() {
            if self.wait_front(interrupt).await {
                return Ok(Submission::Interrupted);
            }
            self.absorb_front().await?;
        }

        Ok(Submission::Done)
    }

    /// Wait for the oldest batch. True when the interrupt fired first.
    async fn wait_front(&self, interrupt: &Interrupt) -> bool {
        let Some(front) = self.window.front() else {
            return false;
        };
        tokio::select! {
            biased;
            _ = front.finished() => false,
            _ = interrupt.triggered() => true,
        }
    }

    async fn absorb_front(&mut self) -> PipelineResult<()> {
        if let Some(handle) = self.window.pop_front() {
            let stats = self.loader.absorb_handle(handle).await?;
            add_stats(&mut self.report, &stats);
        }
        Ok(())
    }

    async fn finish(self, started: Instant) -> PipelineResult<IngestReport> {
        let summary = self.loader.finish().await?;
        let mut report = self.report;
        report.records_ingested = summary.ingested;
        report.flushes = summary.flushes;
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        self.progress.emit(ProgressEvent::Finished {
            ingested: report.records_ingested,
        });
        info!(
            "Run {} finished: {} records in {} flushes, {} rows skipped, {}ms",
            report.run_id, report.records_ingested, report.flushes, report.rows_skipped, report.elapsed_ms
        );
        Ok(report)
    }

    /// Store what finished within the grace period. Runs after shutdown,
    /// so every handle left in the window is already settled.
    async fn finish_interrupted(mut self) -> PipelineError {
        let mut cancelled = 0;
        while let Some(handle) = self.window.pop_front() {
            match self.loader.absorb_handle(handle).await {
                Ok(stats) => add_stats(&mut self.report, &stats),
                Err(PipelineError::Cancelled { .. }) => cancelled += 1,
                Err(e) => return self.abort(e).await,
            }
        }

        let run_id = self.report.run_id;
        match self.loader.finish().await {
            Ok(summary) => {
                warn!(
                    "Run {} interrupted: {} records stored, {} batches cancelled",
                    run_id, summary.ingested, cancelled
                );
                PipelineError::Interrupted {
                    ingested: summary.ingested,
                    cancelled,
                }
            }
            Err(e) => e,
        }
    }

    /// Count and drop everything generated but not stored, then return
    /// the terminal error.
    async fn abort(mut self, err: PipelineError) -> PipelineError {
        let mut discarded = self.loader.pending();
        while let Some(handle) = self.window.pop_front() {
            if let Ok(output) = handle.join().await {
                discarded += output.products.len();
            }
        }

        error!(
            "Run {} aborted, {} generated records discarded: {}",
            self.report.run_id, discarded, err
        );
        match err {
            PipelineError::BatchFailed { batch, source, .. } => PipelineError::BatchFailed {
                batch,
                discarded,
                source,
            },
            other => other,
        }
    }
}

fn add_stats(report: &mut IngestReport, stats: &BatchStats) {
    report.variants_generated += stats.variants_generated;
    report.variants_skipped += stats.variants_skipped;
    report.encryption_failures += stats.encryption_failures;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::testing::{
        fake_cipher, seed_csv, seed_fields, FailingSink, FlakyEncryptor, PickyEncryptor,
        PrefixEncryptor, SlowPromptEncryptor, StallingEncryptor, UnavailableEncryptor, HEADER,
    };
    use std::collections::HashSet;
    use std::time::Duration;

    fn config(seed: u64) -> IngestConfig {
        IngestConfig {
            seed: Some(seed),
            chunk_size: 2,
            pool_size: 2,
            ..Default::default()
        }
    }

    async fn run(
        csv: &str,
        config: &IngestConfig,
        encryptor: Arc<dyn FieldEncryptor>,
    ) -> (PipelineResult<IngestReport>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let result = ingest_bytes(
            csv.as_bytes(),
            config,
            encryptor,
            sink.clone(),
            &ProgressBroadcaster::new(),
            &Interrupt::never(),
        )
        .await;
        (result, sink)
    }

    #[tokio::test]
    async fn test_two_rows_single_final_flush() {
        let (result, sink) = run(&seed_csv(2), &config(1), Arc::new(PrefixEncryptor)).await;
        let report = result.unwrap();

        let flushes = sink.flush_sizes();
        assert_eq!(flushes.len(), 1);
        assert!((100..=200).contains(&flushes[0]));
        assert_eq!(report.records_ingested, flushes[0]);
        assert_eq!(report.flushes, 1);
        assert_eq!(report.rows_read, 2);
        assert_eq!(report.rows_skipped, 0);
        assert_eq!(report.seeds_without_content, 2);
    }

    #[tokio::test]
    async fn test_each_seed_yields_bounded_variants() {
        let (result, sink) = run(&seed_csv(7), &config(2), Arc::new(PrefixEncryptor)).await;
        result.unwrap();

        let records = sink.records();
        for i in 0..7 {
            let prompt = fake_cipher(&format!("prompt for seed {}", i));
            let count = records.iter().filter(|r| r.encrypted_prompt == prompt).count();
            assert!((50..=100).contains(&count), "seed {} yielded {}", i, count);
        }
    }

    #[tokio::test]
    async fn test_uuids_unique_and_prompts_encrypted() {
        let (result, sink) = run(&seed_csv(10), &config(3), Arc::new(PrefixEncryptor)).await;
        let report = result.unwrap();

        let records = sink.records();
        let uuids: HashSet<&str> = records.iter().map(|r| r.product_uuid.as_str()).collect();
        assert_eq!(uuids.len(), records.len());
        assert_eq!(records.len(), report.records_ingested);
        assert!(records.iter().all(|r| !r.encrypted_prompt.starts_with("prompt for seed")));
    }

    #[tokio::test]
    async fn test_flushes_when_threshold_reached() {
        let config = IngestConfig {
            flush_threshold: 100,
            chunk_size: 1,
            ..config(4)
        };
        let (result, sink) = run(&seed_csv(4), &config, Arc::new(PrefixEncryptor)).await;
        let report = result.unwrap();

        // every batch holds at least 50 products, so two batches always cross 100
        assert!(report.flushes >= 2);
        assert_eq!(sink.flush_sizes().iter().sum::<usize>(), report.records_ingested);
    }

    #[tokio::test]
    async fn test_blank_required_field_skipped() {
        let mut bad = seed_fields(1);
        bad[4] = String::new();
        let csv = format!(
            "{}\n{}\n{}\n",
            HEADER,
            seed_fields(0).join(","),
            bad.join(",")
        );

        let (result, sink) = run(&csv, &config(5), Arc::new(PrefixEncryptor)).await;
        let report = result.unwrap();

        assert_eq!(report.rows_read, 2);
        assert_eq!(report.rows_skipped, 1);
        let bad_prompt = fake_cipher("prompt for seed 1");
        assert!(sink.records().iter().all(|r| r.encrypted_prompt != bad_prompt));
        assert!((50..=100).contains(&report.records_ingested));
    }

    #[tokio::test]
    async fn test_same_seed_shuffled_input_same_products() {
        let rows: Vec<String> = (0..6).map(|i| seed_fields(i).join(",")).collect();
        let forward = format!("{}\n{}\n", HEADER, rows.join("\n"));
        let mut reversed_rows = rows.clone();
        reversed_rows.reverse();
        let reversed = format!("{}\n{}\n", HEADER, reversed_rows.join("\n"));

        let key = |sink: &MemorySink| {
            let mut products: Vec<(String, String, String, u64)> = sink
                .records()
                .into_iter()
                .map(|r| (r.product_uuid, r.product_name, r.encrypted_prompt, r.price as u64))
                .collect();
            products.sort();
            products
        };

        let (a, sink_a) = run(&forward, &config(99), Arc::new(PrefixEncryptor)).await;
        let (b, sink_b) = run(&reversed, &config(99), Arc::new(PrefixEncryptor)).await;
        a.unwrap();
        b.unwrap();
        assert_eq!(key(&sink_a), key(&sink_b));
    }

    #[tokio::test]
    async fn test_sink_failure_stops_run() {
        let sink = Arc::new(FailingSink::default());
        let config = IngestConfig {
            flush_threshold: 50,
            chunk_size: 1,
            ..config(6)
        };

        let err = ingest_bytes(
            seed_csv(6).as_bytes(),
            &config,
            Arc::new(PrefixEncryptor),
            sink.clone(),
            &ProgressBroadcaster::new(),
            &Interrupt::never(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::IngestionFailed { lost, .. } if lost >= 50));
        assert_eq!(sink.calls(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_encryptor_aborts_run() {
        let (result, sink) = run(&seed_csv(3), &config(7), Arc::new(UnavailableEncryptor)).await;
        assert!(matches!(result, Err(PipelineError::BatchFailed { .. })));
        assert!(sink.flush_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_batch_failure_reports_discarded_records() {
        // batch 0 is absorbed but not yet flushed when batch 1 fails
        let config = IngestConfig {
            chunk_size: 1,
            pool_size: 1,
            ..config(13)
        };
        let (result, sink) = run(&seed_csv(6), &config, Arc::new(FlakyEncryptor::failing_after(1))).await;

        match result {
            Err(PipelineError::BatchFailed { batch, discarded, .. }) => {
                assert_eq!(batch, 1);
                assert!((50..=100).contains(&discarded), "discarded {}", discarded);
            }
            other => panic!("expected BatchFailed, got {:?}", other),
        }
        assert!(sink.flush_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_stores_batches_finished_within_grace() {
        let config = IngestConfig {
            chunk_size: 1,
            pool_size: 1,
            grace_period_ms: 2000,
            ..config(14)
        };
        let sink = Arc::new(MemorySink::new());
        let (handle, interrupt) = Interrupt::channel();
        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.trigger();
        });

        let err = ingest_bytes(
            seed_csv(4).as_bytes(),
            &config,
            Arc::new(StallingEncryptor::new(Duration::from_millis(150))),
            sink.clone(),
            &ProgressBroadcaster::new(),
            &interrupt,
        )
        .await
        .unwrap_err();
        trigger.await.unwrap();

        match err {
            PipelineError::Interrupted { ingested, cancelled } => {
                assert_eq!(cancelled, 0);
                // both submitted batches finish inside the grace period
                assert!((100..=200).contains(&ingested), "ingested {}", ingested);
                assert_eq!(sink.records().len(), ingested);
                assert_eq!(sink.flush_sizes().len(), 1);
            }
            other => panic!("expected Interrupted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_interrupt_cancels_batches_past_grace() {
        let config = IngestConfig {
            chunk_size: 1,
            pool_size: 1,
            grace_period_ms: 20,
            ..config(15)
        };
        let sink = Arc::new(MemorySink::new());
        let (handle, interrupt) = Interrupt::channel();
        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.trigger();
        });

        let err = ingest_bytes(
            seed_csv(3).as_bytes(),
            &config,
            Arc::new(StallingEncryptor::new(Duration::from_millis(300))),
            sink.clone(),
            &ProgressBroadcaster::new(),
            &interrupt,
        )
        .await
        .unwrap_err();
        trigger.await.unwrap();

        assert!(matches!(
            err,
            PipelineError::Interrupted { ingested: 0, cancelled: 2 }
        ));
        assert!(sink.flush_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_order_completion_absorbed_in_submission_order() {
        let config = IngestConfig {
            chunk_size: 1,
            pool_size: 2,
            ..config(16)
        };
        let csv = seed_csv(4);
        let file = read_seed_bytes(csv.as_bytes(), None).unwrap();
        let slow_prompt = prepare_seeds(file, &config, 16).seeds[0].seed.prompt.clone();
        let encryptor = Arc::new(SlowPromptEncryptor::new(&slow_prompt, Duration::from_millis(300)));

        let progress = ProgressBroadcaster::new();
        let mut rx = progress.subscribe();
        ingest_bytes(
            csv.as_bytes(),
            &config,
            encryptor.clone(),
            Arc::new(MemorySink::new()),
            &progress,
            &Interrupt::never(),
        )
        .await
        .unwrap();

        // batch 1 finished while batch 0 was still encrypting
        assert_ne!(encryptor.finish_order()[0], slow_prompt);

        let mut completed = Vec::new();
        let mut outstanding = 0usize;
        let mut max_outstanding = 0usize;
        while let Ok(event) = rx.try_recv() {
            match event {
                ProgressEvent::BatchSubmitted { .. } => {
                    outstanding += 1;
                    max_outstanding = max_outstanding.max(outstanding);
                }
                ProgressEvent::BatchCompleted { batch, .. } => {
                    outstanding -= 1;
                    completed.push(batch);
                }
                _ => {}
            }
        }
        assert_eq!(completed, vec![0, 1, 2, 3]);
        assert_eq!(max_outstanding, config.pool_size + 1);
    }

    #[tokio::test]
    async fn test_encryption_failure_drops_only_that_seed() {
        let (result, sink) = run(
            &seed_csv(3),
            &config(8),
            Arc::new(PickyEncryptor::rejecting("prompt for seed 2")),
        )
        .await;
        let report = result.unwrap();

        assert!(report.encryption_failures >= 50);
        assert_eq!(
            report.records_ingested + report.encryption_failures,
            report.variants_generated
        );
        assert!(sink.records().len() >= 100);
    }

    #[tokio::test]
    async fn test_empty_file_is_input_error() {
        let (result, sink) = run("  \n", &config(9), Arc::new(PrefixEncryptor)).await;
        assert!(matches!(result, Err(PipelineError::Input(_))));
        assert!(sink.flush_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.txt");
        std::fs::write(&path, seed_csv(1)).unwrap();

        let err = ingest_file(
            &path,
            &config(10),
            Arc::new(PrefixEncryptor),
            Arc::new(MemorySink::new()),
            &ProgressBroadcaster::new(),
            &Interrupt::never(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));
    }

    #[tokio::test]
    async fn test_progress_events_in_order() {
        let progress = ProgressBroadcaster::new();
        let mut rx = progress.subscribe();
        let report = ingest_bytes(
            seed_csv(1).as_bytes(),
            &config(11),
            Arc::new(PrefixEncryptor),
            Arc::new(MemorySink::new()),
            &progress,
            &Interrupt::never(),
        )
        .await
        .unwrap();

        assert_eq!(rx.recv().await.unwrap(), ProgressEvent::RowsRead { valid: 1, skipped: 0 });
        assert_eq!(rx.recv().await.unwrap(), ProgressEvent::BatchSubmitted { batch: 0, seeds: 1 });
        assert!(matches!(rx.recv().await.unwrap(), ProgressEvent::BatchCompleted { batch: 0, .. }));
        assert!(matches!(rx.recv().await.unwrap(), ProgressEvent::Flushed { .. }));
        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::Finished { ingested: report.records_ingested }
        );
    }

    #[test]
    fn test_prepare_seeds_disjoint_blocks() {
        let file = read_seed_bytes(seed_csv(5).as_bytes(), None).unwrap();
        let prepared = prepare_seeds(file, &IngestConfig::default(), 1);

        let mut starts: Vec<u64> = prepared.seeds.iter().map(|s| s.start_index).collect();
        starts.sort();
        assert_eq!(starts, vec![1, 101, 201, 301, 401]);
    }
}
