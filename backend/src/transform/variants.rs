//! Variant synthesis.
//!
//! Every seed row expands into a random number of variants. A variant is a
//! copy of the seed's raw columns with a new uuid, a decorated name and a
//! price drawn from a [`PriceLadder`]. Variants come back as [`RawRow`]s so
//! they go through the same line parser as the seed file.
//!
//! Randomness is derived from the run seed and the seed row's start index,
//! so a seed row always expands the same way in a given run no matter which
//! worker picks it up or in which order rows arrive.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{IndexedSeed, RawRow, COL_PRICE, COL_PRODUCT_NAME, COL_PRODUCT_UUID};

/// What the product is for.
pub const PURPOSES: [&str; 10] = [
    "Creative",
    "Professional",
    "Educational",
    "Marketing",
    "Personal",
    "Business",
    "Artistic",
    "Technical",
    "Casual",
    "Premium",
];

/// How the product feels.
pub const CHARACTERISTICS: [&str; 10] = [
    "Template",
    "Assistant",
    "Generator",
    "Toolkit",
    "Guide",
    "Companion",
    "Studio",
    "Blueprint",
    "Workshop",
    "Formula",
];

/// Optional "for ..." suffix.
pub const TASKS: [&str; 10] = [
    "Content Creation",
    "Storytelling",
    "Copywriting",
    "Brainstorming",
    "Social Media",
    "Product Design",
    "Data Analysis",
    "Presentations",
    "Blog Writing",
    "Research",
];

/// Chance that a variant name gets a task suffix.
pub const TASK_SUFFIX_PROBABILITY: f64 = 0.3;

// =============================================================================
// Price ladder
// =============================================================================

/// Discrete prices: every multiple of `step` in `min..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLadder {
    pub min: u64,
    pub max: u64,
    pub step: u64,
}

impl Default for PriceLadder {
    fn default() -> Self {
        Self {
            min: 500,
            max: 5000,
            step: 500,
        }
    }
}

impl PriceLadder {
    /// Every price on the ladder, ascending.
    pub fn rungs(&self) -> Vec<u64> {
        if self.step == 0 {
            return Vec::new();
        }
        let first = self.min.div_ceil(self.step) * self.step;
        (first..=self.max).step_by(self.step as usize).collect()
    }

    /// Pick one rung uniformly.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let lowest = self.min.div_ceil(self.step);
        let highest = self.max / self.step;
        rng.gen_range(lowest..=highest) * self.step
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step == 0 {
            return Err(ConfigError::InvalidValue {
                field: "price_ladder.step",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.rungs().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "price_ladder",
                message: format!(
                    "no multiple of {} between {} and {}",
                    self.step, self.min, self.max
                ),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Index allocation
// =============================================================================

/// Hands out disjoint blocks of running indices, one block per seed row.
///
/// Allocation happens on the reading side before any batch is submitted,
/// so concurrently running workers never pick overlapping indices.
#[derive(Debug, Clone)]
pub struct IndexAllocator {
    next: u64,
    block: u64,
}

impl IndexAllocator {
    pub fn new(first: u64, block: u64) -> Self {
        Self { next: first, block }
    }

    /// Reserve the next block and return its first index.
    pub fn reserve(&mut self) -> u64 {
        let start = self.next;
        self.next += self.block;
        start
    }
}

// =============================================================================
// Generator
// =============================================================================

/// Expands seed rows into variants.
#[derive(Debug, Clone)]
pub struct VariantGenerator {
    run_seed: u64,
    min_variants: usize,
    max_variants: usize,
    ladder: PriceLadder,
}

impl VariantGenerator {
    pub fn new(run_seed: u64, min_variants: usize, max_variants: usize, ladder: PriceLadder) -> Self {
        Self {
            run_seed,
            min_variants,
            max_variants,
            ladder,
        }
    }

    /// Expand one seed into its variants, reproducibly for this run.
    pub fn expand(&self, seed: &IndexedSeed) -> Vec<RawRow> {
        let mut rng = StdRng::seed_from_u64(mix_seed(self.run_seed, seed.start_index));
        self.expand_with(seed, &mut rng)
    }

    /// Expand using the given random source.
    pub fn expand_with<R: Rng + ?Sized>(&self, seed: &IndexedSeed, rng: &mut R) -> Vec<RawRow> {
        let count = rng.gen_range(self.min_variants..=self.max_variants);

        (0..count as u64)
            .map(|offset| {
                let mut fields = seed.raw.fields.clone();
                fields[COL_PRODUCT_UUID] =
                    variant_uuid(&seed.seed.product_uuid, seed.start_index + offset);
                fields[COL_PRODUCT_NAME] = variant_name(&seed.seed.product_name, rng);
                fields[COL_PRICE] = self.ladder.sample(rng).to_string();
                RawRow::new(seed.raw.line, fields)
            })
            .collect()
    }
}

/// Combine the run seed with an index into a per-item seed.
pub fn mix_seed(run_seed: u64, index: u64) -> u64 {
    run_seed.wrapping_add(index.wrapping_mul(0x9E3779B97F4A7C15))
}

/// `PR-000001` + 42 -> `PR-000042`. Without a dash the prefix is empty.
pub fn variant_uuid(base_uuid: &str, index: u64) -> String {
    let prefix = base_uuid.rfind('-').map_or("", |pos| &base_uuid[..=pos]);
    format!("{}{:06}", prefix, index)
}

/// `"<base> - <purpose> <characteristic>"`, sometimes followed by `" for <task>"`.
pub fn variant_name<R: Rng + ?Sized>(base_name: &str, rng: &mut R) -> String {
    let purpose = PURPOSES.choose(rng).copied().unwrap_or_default();
    let characteristic = CHARACTERISTICS.choose(rng).copied().unwrap_or_default();
    let mut name = format!("{} - {} {}", base_name, purpose, characteristic);

    if rng.gen_bool(TASK_SUFFIX_PROBABILITY) {
        let task = TASKS.choose(rng).copied().unwrap_or_default();
        name.push_str(" for ");
        name.push_str(task);
    }

    name
}
