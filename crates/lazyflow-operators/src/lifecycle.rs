//! Helpers shared by stages that own per-pass resources.

use lazyflow_core::error::first_fault;
use lazyflow_core::Result;

/// Merge the body outcome with the release outcome, logging a dropped fault.
pub fn settle(stage: &'static str, body: Result<()>, release: Result<()>) -> Result<()> {
    let (res, dropped) = first_fault(body, release);
    if let Some(err) = dropped {
        tracing::warn!(stage, error = %err, "discarding secondary fault");
    }
    res
}
