//! Description graph and fusion.
//!
//! A `Pipeline` is a chain of immutable nodes linked backwards by `Arc`.
//! Fusing starts at the terminal stage and walks to the source: every node
//! wraps the already fused successor and hands the result to its
//! predecessor. The source node pairs the head with a fresh cursor.

use std::sync::Arc;

use lazyflow_core::source::Source;
use lazyflow_core::{PipelineConfig, Result, StageRef};

use crate::metrics::PassStats;
use crate::runtime;

pub(crate) trait Node<T>: Send + Sync {
    fn fuse(&self, next: StageRef<T>) -> Pass;

    /// Push stage names from the source up to this node.
    fn chain(&self, names: &mut Vec<&'static str>);
}

/// A fused chain bound to an open cursor, ready to run exactly once.
pub(crate) struct Pass {
    drive: Box<dyn FnOnce() -> Result<PassStats>>,
}

impl Pass {
    pub(crate) fn run(self) -> Result<PassStats> {
        (self.drive)()
    }
}

pub(crate) type Opener<T> = dyn Fn() -> Box<dyn Source<T>> + Send + Sync;

pub(crate) struct SourceNode<T> {
    open: Arc<Opener<T>>,
    config: Arc<PipelineConfig>,
}

impl<T> SourceNode<T> {
    pub(crate) fn new(open: Arc<Opener<T>>, config: Arc<PipelineConfig>) -> Self {
        Self { open, config }
    }
}

impl<T: Send + 'static> Node<T> for SourceNode<T> {
    fn fuse(&self, head: StageRef<T>) -> Pass {
        let open = Arc::clone(&self.open);
        let config = Arc::clone(&self.config);
        Pass {
            drive: Box::new(move || runtime::drive(open(), head, config)),
        }
    }

    fn chain(&self, names: &mut Vec<&'static str>) {
        names.push("source");
    }
}

pub(crate) type Wrap<I, O> = dyn Fn(StageRef<O>) -> StageRef<I> + Send + Sync;

/// Intermediate operator: turns its successor into its own fused stage.
pub(crate) struct StageNode<I, O> {
    name: &'static str,
    prev: Arc<dyn Node<I>>,
    wrap: Box<Wrap<I, O>>,
}

impl<I, O> StageNode<I, O> {
    pub(crate) fn new(name: &'static str, prev: Arc<dyn Node<I>>, wrap: Box<Wrap<I, O>>) -> Self {
        Self { name, prev, wrap }
    }
}

impl<I: Send + 'static, O: Send + 'static> Node<O> for StageNode<I, O> {
    fn fuse(&self, next: StageRef<O>) -> Pass {
        self.prev.fuse((self.wrap)(next))
    }

    fn chain(&self, names: &mut Vec<&'static str>) {
        self.prev.chain(names);
        names.push(self.name);
    }
}
