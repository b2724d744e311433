//! Fixtures and collaborator doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};

use crate::crypto::FieldEncryptor;
use crate::error::{EncryptionError, EncryptionResult, SinkError, SinkResult};
use crate::models::{GeneratedProduct, IndexedSeed, RawRow};
use crate::parser::parse_row;
use crate::sink::ProductSink;

pub const HEADER: &str = "productUuid,sellerUuid,topCategoryUuid,subCategoryUuid,productName,price,prompt,description,llmId,deleted";

/// Fields of the `i`-th fixture seed row.
pub fn seed_fields(i: usize) -> Vec<String> {
    vec![
        format!("PR-{:06}", i + 1),
        "SE-000001".to_string(),
        "TC-000001".to_string(),
        "SC-000001".to_string(),
        format!("Seed {}", i),
        "1000".to_string(),
        format!("prompt for seed {}", i),
        "A generated product".to_string(),
        "1".to_string(),
        "false".to_string(),
    ]
}

/// A seed CSV with a header and `rows` valid data rows.
pub fn seed_csv(rows: usize) -> String {
    let mut csv = format!("{}\n", HEADER);
    for i in 0..rows {
        csv.push_str(&seed_fields(i).join(","));
        csv.push('\n');
    }
    csv
}

/// `count` parsed seeds with index blocks of 100 starting at `first_index`.
pub fn indexed_seeds(count: usize, first_index: u64) -> Vec<IndexedSeed> {
    (0..count)
        .map(|i| {
            let raw = RawRow::new(i + 2, seed_fields(i));
            let seed = parse_row(&raw).unwrap();
            IndexedSeed {
                raw,
                seed,
                start_index: first_index + i as u64 * 100,
            }
        })
        .collect()
}

/// The ciphertext [`PrefixEncryptor`] produces for `plaintext`.
pub fn fake_cipher(plaintext: &str) -> String {
    format!("enc:{}", general_purpose::STANDARD.encode(plaintext))
}

/// Deterministic, reversible stand-in for a real cipher.
pub struct PrefixEncryptor;

impl FieldEncryptor for PrefixEncryptor {
    fn encrypt_batch(&self, plaintexts: &[String]) -> EncryptionResult<Vec<EncryptionResult<String>>> {
        Ok(plaintexts.iter().map(|p| Ok(fake_cipher(p))).collect())
    }
}

/// Fails every prompt equal to `rejected`, encrypts the rest.
pub struct PickyEncryptor {
    rejected: String,
}

impl PickyEncryptor {
    pub fn rejecting(prompt: &str) -> Self {
        Self {
            rejected: prompt.to_string(),
        }
    }
}

impl FieldEncryptor for PickyEncryptor {
    fn encrypt_batch(&self, plaintexts: &[String]) -> EncryptionResult<Vec<EncryptionResult<String>>> {
        Ok(plaintexts
            .iter()
            .enumerate()
            .map(|(index, p)| {
                if *p == self.rejected {
                    Err(EncryptionError::Failed {
                        index,
                        message: "rejected".to_string(),
                    })
                } else {
                    Ok(fake_cipher(p))
                }
            })
            .collect())
    }
}

/// An encryption service that is down.
pub struct UnavailableEncryptor;

impl FieldEncryptor for UnavailableEncryptor {
    fn encrypt_batch(&self, _plaintexts: &[String]) -> EncryptionResult<Vec<EncryptionResult<String>>> {
        Err(EncryptionError::Unavailable("service down".to_string()))
    }
}

/// Sleeps before every call.
pub struct StallingEncryptor {
    delay: Duration,
}

impl StallingEncryptor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl FieldEncryptor for StallingEncryptor {
    fn encrypt_batch(&self, plaintexts: &[String]) -> EncryptionResult<Vec<EncryptionResult<String>>> {
        std::thread::sleep(self.delay);
        PrefixEncryptor.encrypt_batch(plaintexts)
    }
}

/// Serves the first `allowed` calls, then reports itself unavailable.
pub struct FlakyEncryptor {
    allowed: usize,
    calls: AtomicUsize,
}

impl FlakyEncryptor {
    pub fn failing_after(allowed: usize) -> Self {
        Self {
            allowed,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FieldEncryptor for FlakyEncryptor {
    fn encrypt_batch(&self, plaintexts: &[String]) -> EncryptionResult<Vec<EncryptionResult<String>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.allowed {
            return Err(EncryptionError::Unavailable("connection reset".to_string()));
        }
        PrefixEncryptor.encrypt_batch(plaintexts)
    }
}

/// Sleeps only on calls carrying `prompt` and records the order in which
/// calls finish, by their first prompt.
pub struct SlowPromptEncryptor {
    prompt: String,
    delay: Duration,
    finished: Mutex<Vec<String>>,
}

impl SlowPromptEncryptor {
    pub fn new(prompt: &str, delay: Duration) -> Self {
        Self {
            prompt: prompt.to_string(),
            delay,
            finished: Mutex::new(Vec::new()),
        }
    }

    pub fn finish_order(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

impl FieldEncryptor for SlowPromptEncryptor {
    fn encrypt_batch(&self, plaintexts: &[String]) -> EncryptionResult<Vec<EncryptionResult<String>>> {
        if plaintexts.iter().any(|p| *p == self.prompt) {
            std::thread::sleep(self.delay);
        }
        if let Some(first) = plaintexts.first() {
            self.finished.lock().unwrap().push(first.clone());
        }
        PrefixEncryptor.encrypt_batch(plaintexts)
    }
}

/// Rejects every write and counts the attempts.
#[derive(Default)]
pub struct FailingSink {
    calls: AtomicUsize,
}

impl FailingSink {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductSink for FailingSink {
    async fn save_all(&self, _records: &[GeneratedProduct]) -> SinkResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Rejected("database offline".to_string()))
    }
}
