//! Dotted field paths over `serde_json::Value`.
//!
//! `a.b.0` walks object key `a`, object key `b`, then array index `0`.
//! A lone `.` is the identity path.

use std::fmt;

use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed == "." {
            return Ok(Self {
                raw: trimmed.to_string(),
                segments: Vec::new(),
            });
        }
        if trimmed.is_empty() {
            return Err(Error::Config("empty field path".into()));
        }
        let segments: Vec<String> = trimmed.split('.').map(|s| s.to_string()).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::Config(format!("malformed field path '{}'", raw)));
        }
        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_identity(&self) -> bool {
        self.segments.is_empty()
    }

    /// Walk the path; `None` when any segment is missing.
    pub fn resolve<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        let mut cur = value;
        for seg in &self.segments {
            cur = match cur {
                Value::Object(map) => map.get(seg)?,
                Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    /// Like `resolve`, but a miss is `Error::FieldNotFound`.
    pub fn require<'v>(&self, value: &'v Value) -> Result<&'v Value> {
        self.resolve(value).ok_or_else(|| Error::FieldNotFound {
            path: self.raw.clone(),
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
