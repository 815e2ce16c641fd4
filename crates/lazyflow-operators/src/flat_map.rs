//! Depth-first flattening: each element expands into a nested pass that is
//! drained into the downstream stage before the next element is handled.

use std::marker::PhantomData;
use std::sync::Arc;

use lazyflow_core::{Result, Setup, Stage, StageRef};

/// Tail of a nested pass: forwards elements into the outer downstream.
///
/// The outer downstream is already initialized and is finalized by the outer
/// pass, so `initialize` and `finalize` stop here. Cancellation is shared.
pub struct Forward<T> {
    next: StageRef<T>,
}

impl<T> Forward<T> {
    pub fn new(next: StageRef<T>) -> Self {
        Self { next }
    }
}

impl<T: Send + 'static> Stage<T> for Forward<T> {
    fn name(&self) -> &'static str {
        "forward"
    }

    fn initialize(&self, _setup: &Setup) -> Result<()> {
        Ok(())
    }

    fn consume(&self, item: T) -> Result<()> {
        self.next.consume(item)
    }

    fn finalize(&self) -> Result<()> {
        Ok(())
    }

    fn cancelled(&self) -> bool {
        self.next.cancelled()
    }
}

/// `expand(item, tail)` must run one complete nested pass into `tail`.
pub struct FlatMap<I, O, F> {
    expand: Arc<F>,
    next: StageRef<O>,
    tail: StageRef<O>,
    _in: PhantomData<fn(I)>,
}

impl<I, O: Send + 'static, F> FlatMap<I, O, F> {
    pub fn new(expand: Arc<F>, next: StageRef<O>) -> Self {
        let tail: StageRef<O> = Arc::new(Forward::new(Arc::clone(&next)));
        Self {
            expand,
            next,
            tail,
            _in: PhantomData,
        }
    }
}

impl<I, O, F> Stage<I> for FlatMap<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I, StageRef<O>) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &'static str {
        "flat_map"
    }

    fn consume(&self, item: I) -> Result<()> {
        (self.expand)(item, Arc::clone(&self.tail))
    }

    forward_lifecycle!();
}
