use std::io::{BufRead as _, BufReader};
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// One table row, in source order, with the image column already resolved
/// into plain URLs. Remaining cell values pass through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowRecord {
    pub row_id: String,
    pub image_urls: Vec<String>,
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub retrieved_at: String,
}

/// One downloaded image, keyed by source URL. `file_name` is relative to the
/// image directory; identical content always maps to the identical name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub url: String,
    pub content_hash: String,
    pub file_name: String,
    pub byte_len: u64,
}

pub fn read_row_records(path: &Path) -> anyhow::Result<Vec<RowRecord>> {
    read_jsonl(path).with_context(|| format!("read rows snapshot: {}", path.display()))
}

pub fn read_asset_records(path: &Path) -> anyhow::Result<Vec<AssetRecord>> {
    read_jsonl(path).with_context(|| format!("read assets snapshot: {}", path.display()))
}

fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let file = std::fs::File::open(path).context("open jsonl file")?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("read jsonl line")?;
        if line.trim().is_empty() {
            continue;
        }
        let record =
            serde_json::from_str(&line).with_context(|| format!("parse jsonl line {}", idx + 1))?;
        records.push(record);
    }

    Ok(records)
}
