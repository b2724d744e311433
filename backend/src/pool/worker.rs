//! What a worker does with one batch.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, warn};

use super::{Batch, BatchOutput, BatchStats, WorkerContext};
use crate::error::{EncryptionError, PipelineError, PipelineResult};
use crate::models::{GeneratedProduct, SeedRow};
use crate::parser::parse_row;
use crate::transform::variants::mix_seed;

/// Expand, re-validate, encrypt and build every product of a batch.
///
/// Invalid variants and prompts that fail to encrypt are dropped and
/// counted. The batch only fails when the encryptor fails as a whole.
pub fn process_batch(
    context: &WorkerContext,
    batch: Batch,
    cancelled: &AtomicBool,
) -> PipelineResult<BatchOutput> {
    let mut stats = BatchStats {
        seeds: batch.seeds.len(),
        ..Default::default()
    };
    let mut products = Vec::new();

    for seed in &batch.seeds {
        if cancelled.load(Ordering::Acquire) {
            return Err(PipelineError::Cancelled { batch: batch.id });
        }

        let expanded = context.generator.expand(seed);
        stats.variants_generated += expanded.len();

        let variants: Vec<SeedRow> = expanded
            .iter()
            .filter_map(|raw| match parse_row(raw) {
                Ok(variant) => Some(variant),
                Err(e) => {
                    stats.variants_skipped += 1;
                    debug!("Skipping variant of line {}: {}", raw.line, e);
                    None
                }
            })
            .collect();

        let prompts: Vec<String> = variants.iter().map(|v| v.prompt.clone()).collect();
        let ciphertexts = context
            .encryptor
            .encrypt_batch(&prompts)
            .map_err(|source| PipelineError::BatchFailed {
                batch: batch.id,
                discarded: 0,
                source,
            })?;

        // a short or long answer cannot be matched back to its prompts
        if ciphertexts.len() != prompts.len() {
            return Err(PipelineError::BatchFailed {
                batch: batch.id,
                discarded: 0,
                source: EncryptionError::Unavailable(format!(
                    "encryptor returned {} results for {} prompts",
                    ciphertexts.len(),
                    prompts.len()
                )),
            });
        }

        for (variant, ciphertext) in variants.into_iter().zip(ciphertexts) {
            match ciphertext {
                Ok(c) if c != variant.prompt => {
                    products.push(GeneratedProduct::from_variant(variant, c));
                }
                Ok(_) => {
                    stats.encryption_failures += 1;
                    warn!(
                        "Dropping {}: encryptor returned the plaintext",
                        variant.product_uuid
                    );
                }
                Err(e) => {
                    stats.encryption_failures += 1;
                    warn!("Dropping {}: {}", variant.product_uuid, e);
                }
            }
        }
    }

    let mut rng = StdRng::seed_from_u64(mix_seed(!context.run_seed, batch.id as u64));
    products.shuffle(&mut rng);

    debug!(
        "Batch {} built {} products from {} seeds",
        batch.id,
        products.len(),
        stats.seeds
    );

    Ok(BatchOutput {
        batch: batch.id,
        products,
        stats,
    })
}
