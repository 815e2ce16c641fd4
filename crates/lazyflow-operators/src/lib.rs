#![forbid(unsafe_code)]
//! lazyflow-operators: the fusable stages a pipeline is built from.
//!
//! Every stage implements [`lazyflow_core::Stage`] and owns an
//! `Arc` to its downstream. Stages are shared between worker threads while a
//! parallel pass runs, so all per-pass state sits behind atomics or locks and
//! is reset in `initialize`.

#[macro_use]
mod macros;

#[cfg(test)]
mod testing;

pub mod distinct;
pub mod filter;
pub mod flat_map;
pub mod lifecycle;
pub mod limit;
pub mod map;
pub mod parallel;
pub mod pool;
pub mod sink;
pub mod sort;

pub use distinct::Distinct;
pub use filter::{Filter, TryFilter};
pub use flat_map::{FlatMap, Forward};
pub use limit::{Limit, Skip};
pub use map::{Map, MapField, Peek, TryMap};
pub use parallel::{Parallel, Width};
pub use pool::{FailureSlot, WorkerPool};
pub use sink::{
    CollectSink, CountSink, FirstSink, FoldSink, ForEachSink, MatchKind, MatchSink, ReduceSink,
};
pub use sort::Sorted;
