//! Persistence sinks.
//!
//! The bulk loader writes through [`ProductSink`], one call per flush.
//! Each call is all-or-nothing from the pipeline's point of view.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::warn;

use crate::error::SinkResult;
use crate::models::GeneratedProduct;

/// Bulk writer for generated products.
///
/// ```ignore
/// async fn store<S: ProductSink>(sink: &S, batch: &[GeneratedProduct]) -> SinkResult<()> {
///     sink.save_all(batch).await
/// }
/// ```
#[async_trait]
pub trait ProductSink: Send + Sync {
    /// Store all records in a single bulk operation.
    async fn save_all(&self, records: &[GeneratedProduct]) -> SinkResult<()>;
}

// =============================================================================
// In-memory sink
// =============================================================================

/// Keeps every flush in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    flushes: Mutex<Vec<Vec<GeneratedProduct>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of products in each flush, in call order.
    pub fn flush_sizes(&self) -> Vec<usize> {
        self.lock().iter().map(Vec::len).collect()
    }

    /// Every stored product, in flush order.
    pub fn records(&self) -> Vec<GeneratedProduct> {
        self.lock().iter().flatten().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Vec<GeneratedProduct>>> {
        // a poisoned lock still holds complete flushes
        self.flushes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ProductSink for MemorySink {
    async fn save_all(&self, records: &[GeneratedProduct]) -> SinkResult<()> {
        self.lock().push(records.to_vec());
        Ok(())
    }
}

// =============================================================================
// JSON lines sink
// =============================================================================

/// Appends one JSON object per product to a file.
///
/// A failed write is rolled back to the length the file had before the
/// call, so the file never ends in a partial line.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: tokio::sync::Mutex<File>,
}

impl JsonLinesSink {
    /// Create (or truncate) the output file.
    pub async fn create(path: impl AsRef<Path>) -> SinkResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await?;
        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProductSink for JsonLinesSink {
    async fn save_all(&self, records: &[GeneratedProduct]) -> SinkResult<()> {
        let mut buffer = Vec::with_capacity(records.len() * 512);
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let mut file = self.file.lock().await;
        let committed = file.metadata().await?.len();
        if let Err(e) = append(&mut file, &buffer).await {
            if let Err(rollback) = truncate_to(&mut file, committed).await {
                warn!(
                    "Could not roll {} back to {} bytes: {}",
                    self.path.display(),
                    committed,
                    rollback
                );
            }
            return Err(e.into());
        }
        Ok(())
    }
}

async fn append(file: &mut File, buffer: &[u8]) -> std::io::Result<()> {
    file.write_all(buffer).await?;
    file.flush().await
}

/// Drop everything past `len` and continue writing from there.
async fn truncate_to(file: &mut File, len: u64) -> std::io::Result<()> {
    file.set_len(len).await?;
    file.seek(std::io::SeekFrom::Start(len)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeedRow;

    fn product(uuid: &str) -> GeneratedProduct {
        let seed = SeedRow {
            line: 2,
            product_uuid: uuid.into(),
            seller_uuid: "seller".into(),
            top_category_uuid: "top".into(),
            sub_category_uuid: "sub".into(),
            product_name: "Poster".into(),
            price: 500.0,
            prompt: "plain".into(),
            description: "desc".into(),
            llm_id: 1,
            contents: vec![],
        };
        GeneratedProduct::from_variant(seed, "cipher".into())
    }

    #[tokio::test]
    async fn test_memory_sink_records_flushes() {
        let sink = MemorySink::new();
        sink.save_all(&[product("PR-000001"), product("PR-000002")]).await.unwrap();
        sink.save_all(&[product("PR-000003")]).await.unwrap();

        assert_eq!(sink.flush_sizes(), vec![2, 1]);
        assert_eq!(sink.records()[2].product_uuid, "PR-000003");
    }

    #[tokio::test]
    async fn test_json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.jsonl");
        let sink = JsonLinesSink::create(&path).await.unwrap();

        sink.save_all(&[product("PR-000001")]).await.unwrap();
        sink.save_all(&[product("PR-000002"), product("PR-000003")]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let uuids: Vec<String> = content
            .lines()
            .map(|line| {
                let record: GeneratedProduct = serde_json::from_str(line).unwrap();
                record.product_uuid
            })
            .collect();
        assert_eq!(uuids, vec!["PR-000001", "PR-000002", "PR-000003"]);
    }

    #[tokio::test]
    async fn test_partial_write_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.jsonl");
        let sink = JsonLinesSink::create(&path).await.unwrap();
        sink.save_all(&[product("PR-000001")]).await.unwrap();

        {
            let mut file = sink.file.lock().await;
            let committed = file.metadata().await.unwrap().len();
            append(&mut file, b"{\"productUuid\":\"PR-0").await.unwrap();
            truncate_to(&mut file, committed).await.unwrap();
        }
        sink.save_all(&[product("PR-000002")]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let uuids: Vec<String> = content
            .lines()
            .map(|line| serde_json::from_str::<GeneratedProduct>(line).unwrap().product_uuid)
            .collect();
        assert_eq!(uuids, vec!["PR-000001", "PR-000002"]);
    }
}
