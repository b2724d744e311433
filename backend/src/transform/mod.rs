//! Transformation module.
//!
//! This module turns seed rows into stored products:
//! - Variants: seed expansion, uuid indices, price ladder
//! - Loader: ordered consumption of batch results and bulk writes
//! - Pipeline: the end-to-end ingestion run

pub mod loader;
pub mod pipeline;
pub mod variants;

pub use loader::{BulkLoader, LoadSummary};
pub use pipeline::*;
pub use variants::{mix_seed, variant_name, variant_uuid, IndexAllocator, PriceLadder, VariantGenerator};
