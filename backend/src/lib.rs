//! # Productload - seed product expansion and bulk ingestion
//!
//! Productload reads a CSV of seed products, expands every seed into 50 to
//! 100 randomized variants, encrypts each variant's prompt and bulk loads
//! the results into a sink.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│ Worker Pool │────▶│ Bulk Loader │──▶ Sink
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (expand+enc)│     │  (ordered)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use productload::{
//!     ingest_file, AesGcmEncryptor, IngestConfig, Interrupt, MemorySink, ProgressBroadcaster,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let sink = Arc::new(MemorySink::new());
//!     let encryptor = Arc::new(AesGcmEncryptor::new(b"secret").unwrap());
//!     let report = ingest_file(
//!         "seeds.csv",
//!         &IngestConfig::default(),
//!         encryptor,
//!         sink,
//!         &ProgressBroadcaster::new(),
//!         &Interrupt::never(),
//!     )
//!     .await
//!         .unwrap();
//!     println!("Ingested {} products", report.records_ingested);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Seed rows and generated products
//! - [`parser`] - CSV reading with auto-detection, line validation
//! - [`transform`] - Variant synthesis, bulk loading, pipeline
//! - [`pool`] - Batch worker pool and its lifecycle
//! - [`crypto`] - Prompt encryption
//! - [`sink`] - Persistence targets
//! - [`config`] - Run parameters
//! - [`progress`] - Live progress events

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Concurrency
pub mod pool;

// Collaborators
pub mod crypto;
pub mod sink;

// Observability
pub mod progress;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, EncryptionError, InputError, PipelineError, PipelineResult, RowParseError,
    SinkError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{ContentRef, GeneratedProduct, IndexedSeed, RawRow, SeedRow};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, error_report, parse_line, parse_row,
    read_seed_bytes, read_seed_file, SeedFile,
};

// =============================================================================
// Re-exports - Variants
// =============================================================================

pub use transform::variants::{IndexAllocator, PriceLadder, VariantGenerator};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use config::IngestConfig;
pub use pool::{BatchWorkerPool, Interrupt, InterruptHandle, LifecycleManager, ShutdownOutcome};
pub use progress::{ProgressBroadcaster, ProgressEvent};
pub use transform::loader::BulkLoader;
pub use transform::pipeline::{
    ingest_bytes, ingest_file, ingest_seed_file, prepare_seeds, IngestReport, PreparedSeeds,
};

// =============================================================================
// Re-exports - Collaborators
// =============================================================================

pub use crypto::{AesGcmEncryptor, FieldEncryptor};
pub use sink::{JsonLinesSink, MemorySink, ProductSink};
