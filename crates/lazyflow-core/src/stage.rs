//! The stage protocol every fused operator implements.
//!
//! A pass calls, on the head of the fused chain:
//! 1. `initialize` once, before anything else;
//! 2. for each pulled element, `cancelled` then (if not cancelled) `consume`;
//! 3. `finalize` once, even after cancellation or a fault.
//!
//! Each stage forwards all four calls to its successor. `initialize` carries a
//! `Setup` that stages may rewrite on the way down (capacity hint, mode).
//!
//! Invariants:
//! - `consume` may run concurrently from worker threads once a parallel stage
//!   sits upstream, so stages take `&self` and keep state behind atomics or locks.
//! - `cancelled` is polled from one thread at a time (the executor loop, or a
//!   sort barrier replaying its buffer).
//! - A stage downstream of a sort barrier sees a second `initialize` (exact
//!   count) before its first `consume`; `initialize` therefore resets state.
//! - Once the pass has faulted its `AbortSignal` is raised before `finalize`
//!   runs; stages holding buffered elements drop them instead of flushing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::hint::LengthHint;

/// Shared handle to a fused stage.
pub type StageRef<T> = Arc<dyn Stage<T>>;

/// Whether `consume` calls arrive from one thread or from a worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    #[default]
    Sequential,
    /// Calls arrive from a pool with this many workers.
    Parallel(usize),
}

impl ExecMode {
    pub fn is_parallel(self) -> bool {
        matches!(self, ExecMode::Parallel(_))
    }

    pub fn workers(self) -> Option<usize> {
        match self {
            ExecMode::Parallel(n) => Some(n),
            ExecMode::Sequential => None,
        }
    }
}

/// Pass-wide flag raised once any stage or worker has faulted.
///
/// Every `Setup` derived from the same pass shares one flag.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Everything a stage learns when a pass starts.
#[derive(Debug, Clone)]
pub struct Setup {
    pub hint: LengthHint,
    pub mode: ExecMode,
    pub config: Arc<PipelineConfig>,
    pub abort: AbortSignal,
}

impl Setup {
    pub fn new(hint: LengthHint, config: Arc<PipelineConfig>) -> Self {
        Self {
            hint,
            mode: ExecMode::Sequential,
            config,
            abort: AbortSignal::default(),
        }
    }

    pub fn with_hint(&self, hint: LengthHint) -> Self {
        Self {
            hint,
            ..self.clone()
        }
    }

    pub fn with_mode(&self, mode: ExecMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }

    /// Capacity worth preallocating for this hint under the config cap.
    pub fn preallocation(&self) -> usize {
        self.config.preallocation(self.hint.capacity())
    }
}

/// One fused operator in a running pass.
pub trait Stage<T>: Send + Sync {
    /// Stable diagnostic name.
    fn name(&self) -> &'static str;

    /// Allocate fresh per-pass state, then forward downstream.
    fn initialize(&self, setup: &Setup) -> Result<()>;

    /// Process one element.
    fn consume(&self, item: T) -> Result<()>;

    /// Flush, release per-pass resources, then forward downstream.
    fn finalize(&self) -> Result<()>;

    /// True once nothing more pulled from the source can change the result.
    fn cancelled(&self) -> bool;
}
