//! Record input: JSON lines, or a single JSON array.

use std::path::Path;

use serde_json::Value;

use crate::error::{DslError, Result};

pub fn parse_records(text: &str) -> Result<Vec<Value>> {
    if text.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(text)?);
    }
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str(line)
            .map_err(|e| DslError::Invalid(format!("input line {}: {}", idx + 1, e)))?;
        records.push(record);
    }
    Ok(records)
}

pub fn read_records(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)?;
    parse_records(&text)
}
