//! Length/capacity hints passed from sources through `initialize`.

use serde::{Deserialize, Serialize};

/// Best known element count of a source or of a stage's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LengthHint {
    /// The count is known exactly (slices, collected buffers).
    Exact(usize),
    /// No cheap count exists (channels, lazy generators).
    #[default]
    Unknown,
}

impl LengthHint {
    pub fn exact(self) -> Option<usize> {
        match self {
            LengthHint::Exact(n) => Some(n),
            LengthHint::Unknown => None,
        }
    }

    /// Number of slots worth preallocating; zero when unknown.
    pub fn capacity(self) -> usize {
        self.exact().unwrap_or(0)
    }

    /// Derive a hint from `Iterator::size_hint`; only tight bounds count as exact.
    pub fn from_size_hint(bounds: (usize, Option<usize>)) -> Self {
        match bounds {
            (lo, Some(hi)) if lo == hi => LengthHint::Exact(lo),
            _ => LengthHint::Unknown,
        }
    }
}
