//! Domain models for the productload pipeline.
//!
//! - [`RawRow`] - one CSV record as plain strings, with its line number
//! - [`SeedRow`] - a validated seed product
//! - [`ContentRef`] - optional sample content attached to a product
//! - [`GeneratedProduct`] - a persistable, encrypted product variant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Column layout
// =============================================================================

/// Minimum number of columns in a seed row.
pub const MIN_COLUMNS: usize = 10;

/// Column names in file order, used for diagnostics.
pub const COLUMN_NAMES: [&str; 16] = [
    "productUuid",
    "sellerUuid",
    "topCategoryUuid",
    "subCategoryUuid",
    "productName",
    "price",
    "prompt",
    "description",
    "llmId",
    "deleted",
    "contentUrl1",
    "contentOrder1",
    "sampleValue1",
    "contentUrl2",
    "contentOrder2",
    "sampleValue2",
];

pub const COL_PRODUCT_UUID: usize = 0;
pub const COL_SELLER_UUID: usize = 1;
pub const COL_TOP_CATEGORY_UUID: usize = 2;
pub const COL_SUB_CATEGORY_UUID: usize = 3;
pub const COL_PRODUCT_NAME: usize = 4;
pub const COL_PRICE: usize = 5;
pub const COL_PROMPT: usize = 6;
pub const COL_DESCRIPTION: usize = 7;
pub const COL_LLM_ID: usize = 8;

/// First column of each optional content triplet (url, order, sample value).
pub const CONTENT_TRIPLETS: [usize; 2] = [10, 13];

// =============================================================================
// Raw rows
// =============================================================================

/// A CSV record before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based line number in the source file (header is line 1).
    pub line: usize,
    pub fields: Vec<String>,
}

impl RawRow {
    pub fn new(line: usize, fields: Vec<String>) -> Self {
        Self { line, fields }
    }

    /// True when every field is blank; such a row ends the input.
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|f| f.trim().is_empty())
    }

    /// `name: value` pairs for every known column, one per line.
    pub fn describe_columns(&self) -> String {
        COLUMN_NAMES
            .iter()
            .zip(self.fields.iter())
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// =============================================================================
// Seed rows
// =============================================================================

/// Sample content attached to a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    pub content_url: String,
    pub content_order: i32,
    pub sample_value: String,
}

/// A validated seed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRow {
    /// Line the row came from.
    #[serde(skip)]
    pub line: usize,
    pub product_uuid: String,
    pub seller_uuid: String,
    pub top_category_uuid: String,
    pub sub_category_uuid: String,
    pub product_name: String,
    pub price: f64,
    /// Plaintext prompt. Never serialized into a [`GeneratedProduct`].
    pub prompt: String,
    pub description: String,
    pub llm_id: i64,
    pub contents: Vec<ContentRef>,
}

/// A seed row with its pre-allocated index range for variant uuids.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedSeed {
    pub raw: RawRow,
    pub seed: SeedRow,
    /// First running index reserved for this seed's variants.
    pub start_index: u64,
}

// =============================================================================
// Generated products
// =============================================================================

/// A persistable product variant.
///
/// The prompt holds ciphertext only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedProduct {
    pub product_uuid: String,
    pub seller_uuid: String,
    pub top_category_uuid: String,
    pub sub_category_uuid: String,
    pub product_name: String,
    pub price: f64,
    pub encrypted_prompt: String,
    pub description: String,
    pub llm_id: i64,
    pub llm_version_id: Option<i64>,
    pub contents: Vec<ContentRef>,
    pub discount_rate: f32,
    pub deleted: bool,
    pub enabled: bool,
    pub approved: bool,
    pub temporary_enrolled: bool,
    pub sells: u64,
    pub like_count: u64,
    pub review_count: u64,
    pub avg_star: f64,
    pub created_at: DateTime<Utc>,
}

impl GeneratedProduct {
    /// Build a product from a validated variant and its encrypted prompt.
    pub fn from_variant(variant: SeedRow, encrypted_prompt: String) -> Self {
        Self {
            product_uuid: variant.product_uuid,
            seller_uuid: variant.seller_uuid,
            top_category_uuid: variant.top_category_uuid,
            sub_category_uuid: variant.sub_category_uuid,
            product_name: variant.product_name,
            price: variant.price,
            encrypted_prompt,
            description: variant.description,
            llm_id: variant.llm_id,
            llm_version_id: None,
            contents: variant.contents,
            discount_rate: 0.0,
            deleted: false,
            enabled: true,
            approved: true,
            temporary_enrolled: false,
            sells: 0,
            like_count: 0,
            review_count: 0,
            avg_star: 0.0,
            created_at: Utc::now(),
        }
    }
}
