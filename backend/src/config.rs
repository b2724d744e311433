//! Operational parameters of an ingestion run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::transform::variants::PriceLadder;

/// Options for the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Seed rows per batch handed to a worker
    pub chunk_size: usize,

    /// Number of batches processed concurrently
    pub pool_size: usize,

    /// Smallest number of variants generated per seed
    pub min_variants: usize,

    /// Largest number of variants generated per seed
    pub max_variants: usize,

    /// Accumulated products that trigger a bulk write
    pub flush_threshold: usize,

    /// How long shutdown waits for in-flight batches, in milliseconds
    pub grace_period_ms: u64,

    /// Prices variants are drawn from
    pub price_ladder: PriceLadder,

    /// Random seed for a reproducible run; drawn from entropy when absent
    pub seed: Option<u64>,

    /// CSV delimiter; detected from the header when absent
    pub delimiter: Option<u8>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            pool_size: 4,
            min_variants: 50,
            max_variants: 100,
            flush_threshold: 1000,
            grace_period_ms: 800,
            price_ladder: PriceLadder::default(),
            seed: None,
            delimiter: None,
        }
    }
}

impl IngestConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Check that the parameters describe a runnable pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("chunk_size", self.chunk_size),
            ("pool_size", self.pool_size),
            ("min_variants", self.min_variants),
            ("flush_threshold", self.flush_threshold),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    message: "must be greater than zero".to_string(),
                });
            }
        }

        if self.min_variants > self.max_variants {
            return Err(ConfigError::InvalidValue {
                field: "max_variants",
                message: format!(
                    "must be at least min_variants ({}), got {}",
                    self.min_variants, self.max_variants
                ),
            });
        }

        // uuids are zero-padded to six digits
        if self.max_variants > 999_999 {
            return Err(ConfigError::InvalidValue {
                field: "max_variants",
                message: "must fit in a six digit index".to_string(),
            });
        }

        self.price_ladder.validate()
    }
}
