//! Per-pass statistics, reported through `tracing` once a terminal finishes.

use std::time::Duration;

use serde::Serialize;

use lazyflow_core::LengthHint;

#[derive(Debug, Clone, Serialize)]
pub struct PassStats {
    /// Name of the first fused stage.
    pub head: &'static str,
    pub hint: LengthHint,
    /// Elements pulled from the source, including the one that observed
    /// cancellation.
    pub pulled: usize,
    pub cancelled: bool,
    #[serde(serialize_with = "as_micros")]
    pub elapsed: Duration,
}

impl PassStats {
    pub(crate) fn new(head: &'static str, hint: LengthHint) -> Self {
        Self {
            head,
            hint,
            pulled: 0,
            cancelled: false,
            elapsed: Duration::ZERO,
        }
    }

    pub fn emit(&self, terminal: &'static str) {
        tracing::debug!(
            terminal,
            head = self.head,
            hint = ?self.hint,
            pulled = self.pulled,
            cancelled = self.cancelled,
            elapsed_us = self.elapsed.as_micros() as u64,
            "pass complete"
        );
    }
}

fn as_micros<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_micros() as u64)
}
