//! Executor: drives exactly one pass over a fused chain.
//!
//! `initialize` with the source's hint, then pull / check cancel / consume
//! until the source is exhausted, cancellation is observed or a stage faults.
//! `finalize` always runs afterwards, with the pass's abort signal raised
//! when the body faulted. Panics raised by user closures on this
//! thread are caught per phase and reported as `Error::Panicked`.

use std::sync::Arc;
use std::time::Instant;

use lazyflow_core::error::{catch_panic, first_fault};
use lazyflow_core::source::Source;
use lazyflow_core::{PipelineConfig, Result, Setup, StageRef};

use crate::metrics::PassStats;

pub(crate) fn drive<T>(
    mut source: Box<dyn Source<T>>,
    head: StageRef<T>,
    config: Arc<PipelineConfig>,
) -> Result<PassStats> {
    config.validate()?;

    let hint = source.length_hint();
    let setup = Setup::new(hint, config);
    let mut stats = PassStats::new(head.name(), hint);
    let started = Instant::now();

    let span = tracing::trace_span!("pass", head = head.name());
    let _guard = span.enter();

    let body = catch_panic("initialize", || head.initialize(&setup)).and_then(|()| {
        catch_panic("consume", || {
            while let Some(item) = source.next() {
                stats.pulled += 1;
                if head.cancelled() {
                    stats.cancelled = true;
                    break;
                }
                head.consume(item)?;
            }
            Ok(())
        })
    });
    if let Err(e) = &body {
        setup.abort.raise();
        tracing::debug!(error = %e, pulled = stats.pulled, "pass aborted");
    }

    let released = catch_panic("finalize", || head.finalize());
    let (outcome, dropped) = first_fault(body, released);
    if let Some(dropped) = dropped {
        tracing::warn!(error = %dropped, "discarding fault raised while finalizing a failed pass");
    }

    stats.elapsed = started.elapsed();
    outcome.map(|()| stats)
}
