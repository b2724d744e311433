//! Seed file reading and line parsing.
//!
//! Reading turns raw bytes into [`RawRow`]s (encoding and delimiter
//! auto-detection, header skipped, input ends at the first blank row).
//! Parsing turns one [`RawRow`] into a validated [`SeedRow`].

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{InputError, InputResult, RowParseError, RowResult};
use crate::models::{
    ContentRef, RawRow, SeedRow, COL_DESCRIPTION, COL_LLM_ID, COL_PRICE, COL_PRODUCT_NAME,
    COL_PRODUCT_UUID, COL_PROMPT, COL_SELLER_UUID, COL_SUB_CATEGORY_UUID, COL_TOP_CATEGORY_UUID,
    CONTENT_TRIPLETS, MIN_COLUMNS,
};

/// Content of a seed file after reading
#[derive(Debug, Clone)]
pub struct SeedFile {
    /// Data rows, header excluded, stopped at the first blank row
    pub rows: Vec<RawRow>,
    /// Header columns as found in the file
    pub headers: Vec<String>,
    /// Detected encoding
    pub encoding: String,
    /// Delimiter used
    pub delimiter: u8,
}

// =============================================================================
// Encoding and delimiter detection
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        // windows-1252 is a superset of latin-1
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        // UTF-8 and anything unknown: lossy UTF-8
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [b',', b';', b'\t', b'|'];
    let mut best_sep = b',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep as char).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Cut the content before the first blank line that is not inside a
/// quoted field. The header line is never cut.
fn truncate_at_blank_line(content: &str) -> &str {
    let mut in_quotes = false;
    let mut offset = 0;

    for (idx, line) in content.split_inclusive('\n').enumerate() {
        if idx > 0 && !in_quotes && line.trim().is_empty() {
            return &content[..offset];
        }
        let quotes = line.bytes().filter(|b| *b == b'"').count();
        if quotes % 2 == 1 {
            in_quotes = !in_quotes;
        }
        offset += line.len();
    }

    content
}

// =============================================================================
// Reading
// =============================================================================

/// Reject anything that does not look like a CSV file name
pub fn check_extension(path: &Path) -> InputResult<()> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    if is_csv {
        Ok(())
    } else {
        Err(InputError::WrongExtension(path.display().to_string()))
    }
}

/// Read a seed file from disk.
///
/// # Example
/// ```ignore
/// let file = read_seed_file("seeds.csv", None)?;
/// println!("Encoding: {}, rows: {}", file.encoding, file.rows.len());
/// ```
pub fn read_seed_file<P: AsRef<Path>>(path: P, delimiter: Option<u8>) -> InputResult<SeedFile> {
    let path = path.as_ref();
    check_extension(path)?;
    let bytes = std::fs::read(path)?;
    read_seed_bytes(&bytes, delimiter)
}

/// Read seed rows from raw bytes.
///
/// The first row is the header. Reading stops at the first row whose
/// fields are all blank.
pub fn read_seed_bytes(bytes: &[u8], delimiter: Option<u8>) -> InputResult<SeedFile> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(InputError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));
    let content = truncate_at_blank_line(&content);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(InputError::NoHeader);
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        // header is line 1
        let row = RawRow::new(idx + 2, record.iter().map(str::to_string).collect());
        if row.is_blank() {
            debug!("Blank row at line {}, end of data", row.line);
            break;
        }
        rows.push(row);
    }

    Ok(SeedFile {
        rows,
        headers,
        encoding,
        delimiter,
    })
}

// =============================================================================
// Line parsing
// =============================================================================

/// Parse one row into a validated seed.
///
/// On failure the full column dump of the row is logged as one message
/// before the error is returned.
pub fn parse_row(row: &RawRow) -> RowResult<SeedRow> {
    parse_line(&row.fields, row.line).map_err(|err| {
        warn!("{}", error_report(row, &err));
        err
    })
}

/// Parse raw fields into a validated seed.
pub fn parse_line(fields: &[String], line: usize) -> RowResult<SeedRow> {
    if fields.len() < MIN_COLUMNS {
        return Err(RowParseError::TooFewColumns {
            line,
            expected: MIN_COLUMNS,
            actual: fields.len(),
        });
    }

    let contents = parse_contents(fields, line)?;
    if contents.is_empty() {
        debug!("No valid contents found for line {}", line);
    }

    Ok(SeedRow {
        line,
        product_uuid: required(fields, COL_PRODUCT_UUID, "productUuid", line)?,
        seller_uuid: required(fields, COL_SELLER_UUID, "sellerUuid", line)?,
        top_category_uuid: required(fields, COL_TOP_CATEGORY_UUID, "topCategoryUuid", line)?,
        sub_category_uuid: required(fields, COL_SUB_CATEGORY_UUID, "subCategoryUuid", line)?,
        product_name: required(fields, COL_PRODUCT_NAME, "productName", line)?,
        price: parse_price(fields, line)?,
        prompt: required(fields, COL_PROMPT, "prompt", line)?,
        description: required(fields, COL_DESCRIPTION, "description", line)?,
        llm_id: parse_number(fields, COL_LLM_ID, "llmId", line)?,
        contents,
    })
}

/// Multi-line diagnostic with the cause and every column value of the row
pub fn error_report(row: &RawRow, err: &RowParseError) -> String {
    format!(
        "Error parsing line {}:\nCause: {}\nColumn values:\n{}",
        row.line,
        err,
        row.describe_columns()
    )
}

fn required(fields: &[String], idx: usize, field: &'static str, line: usize) -> RowResult<String> {
    let value = fields.get(idx).map(|s| s.trim()).unwrap_or("");
    if value.is_empty() {
        return Err(RowParseError::EmptyField { field, line });
    }
    Ok(value.to_string())
}

fn parse_number<T: std::str::FromStr>(
    fields: &[String],
    idx: usize,
    field: &'static str,
    line: usize,
) -> RowResult<T> {
    let value = required(fields, idx, field, line)?;
    value.parse().map_err(|_| RowParseError::InvalidFormat {
        field,
        line,
        value,
    })
}

fn parse_price(fields: &[String], line: usize) -> RowResult<f64> {
    let price: f64 = parse_number(fields, COL_PRICE, "price", line)?;
    if !price.is_finite() || price < 0.0 {
        return Err(RowParseError::InvalidFormat {
            field: "price",
            line,
            value: fields[COL_PRICE].trim().to_string(),
        });
    }
    Ok(price)
}

/// Build the optional content entries. A triplet with any blank member is
/// skipped; a complete triplet with a non-integer order is an error.
fn parse_contents(fields: &[String], line: usize) -> RowResult<Vec<ContentRef>> {
    const ORDER_FIELDS: [&str; 2] = ["contentOrder1", "contentOrder2"];

    let mut contents = Vec::new();
    for (slot, &start) in CONTENT_TRIPLETS.iter().enumerate() {
        let triplet: Vec<&str> = (start..start + 3)
            .map(|i| fields.get(i).map(|s| s.trim()).unwrap_or(""))
            .collect();

        if triplet.iter().any(|v| v.is_empty()) {
            continue;
        }

        let content_order = triplet[1]
            .parse()
            .map_err(|_| RowParseError::InvalidFormat {
                field: ORDER_FIELDS[slot],
                line,
                value: triplet[1].to_string(),
            })?;

        contents.push(ContentRef {
            content_url: triplet[0].to_string(),
            content_order,
            sample_value: triplet[2].to_string(),
        });
    }

    Ok(contents)
}
