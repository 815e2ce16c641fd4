//! Terminal stages. Each one is the tail of a fused chain and owns the
//! result of the pass; the caller keeps an `Arc` and reads it afterwards.
//!
//! All sinks are safe to drive from a parallel stage. Under one, "first"
//! and fold order follow completion order, not source order.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use lazyflow_core::{Error, Result, Setup, Stage};
use parking_lot::Mutex;

/// Appends every element to a buffer presized from the capacity hint.
pub struct CollectSink<T> {
    items: Mutex<Vec<T>>,
}

impl<T> CollectSink<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }
}

impl<T> Default for CollectSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Stage<T> for CollectSink<T> {
    fn name(&self) -> &'static str {
        "to_vec"
    }

    fn initialize(&self, setup: &Setup) -> Result<()> {
        let mut items = self.items.lock();
        items.clear();
        items.reserve(setup.preallocation());
        Ok(())
    }

    fn consume(&self, item: T) -> Result<()> {
        self.items.lock().push(item);
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        Ok(())
    }

    fn cancelled(&self) -> bool {
        false
    }
}

pub struct ForEachSink<T, F> {
    effect: F,
    _item: PhantomData<fn(T)>,
}

impl<T, F> ForEachSink<T, F> {
    pub fn new(effect: F) -> Self {
        Self {
            effect,
            _item: PhantomData,
        }
    }
}

impl<T, F> Stage<T> for ForEachSink<T, F>
where
    T: Send + 'static,
    F: Fn(T) + Send + Sync,
{
    fn name(&self) -> &'static str {
        "for_each"
    }

    fn initialize(&self, _setup: &Setup) -> Result<()> {
        Ok(())
    }

    fn consume(&self, item: T) -> Result<()> {
        (self.effect)(item);
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        Ok(())
    }

    fn cancelled(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    All,
    Any,
    None,
}

impl MatchKind {
    /// Result for an empty input.
    pub fn identity(self) -> bool {
        match self {
            MatchKind::All | MatchKind::None => true,
            MatchKind::Any => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MatchKind::All => "all_match",
            MatchKind::Any => "any_match",
            MatchKind::None => "none_match",
        }
    }
}

/// Short-circuiting quantifier. Requests cancellation once the answer is
/// fixed, and skips the predicate for elements still in flight after that.
pub struct MatchSink<T, P> {
    kind: MatchKind,
    pred: P,
    outcome: AtomicBool,
    decided: AtomicBool,
    _item: PhantomData<fn(T)>,
}

impl<T, P> MatchSink<T, P> {
    pub fn new(kind: MatchKind, pred: P) -> Self {
        Self {
            kind,
            pred,
            outcome: AtomicBool::new(kind.identity()),
            decided: AtomicBool::new(false),
            _item: PhantomData,
        }
    }

    pub fn outcome(&self) -> bool {
        self.outcome.load(Ordering::Acquire)
    }
}

impl<T, P> Stage<T> for MatchSink<T, P>
where
    T: Send + 'static,
    P: Fn(&T) -> bool + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.kind.label()
    }

    fn initialize(&self, _setup: &Setup) -> Result<()> {
        self.outcome.store(self.kind.identity(), Ordering::Release);
        self.decided.store(false, Ordering::Release);
        Ok(())
    }

    fn consume(&self, item: T) -> Result<()> {
        if self.decided.load(Ordering::Acquire) {
            return Ok(());
        }
        let hit = (self.pred)(&item);
        let flips = match self.kind {
            MatchKind::All => !hit,
            MatchKind::Any | MatchKind::None => hit,
        };
        if flips {
            self.outcome.store(!self.kind.identity(), Ordering::Release);
            self.decided.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        Ok(())
    }

    fn cancelled(&self) -> bool {
        self.decided.load(Ordering::Acquire)
    }
}

/// Unseeded fold: the first element becomes the accumulator.
pub struct ReduceSink<T, F> {
    op: F,
    acc: Mutex<Option<T>>,
}

impl<T, F> ReduceSink<T, F> {
    pub fn new(op: F) -> Self {
        Self {
            op,
            acc: Mutex::new(None),
        }
    }

    pub fn take(&self) -> Option<T> {
        self.acc.lock().take()
    }
}

impl<T, F> Stage<T> for ReduceSink<T, F>
where
    T: Send + 'static,
    F: Fn(T, T) -> T + Send + Sync,
{
    fn name(&self) -> &'static str {
        "reduce"
    }

    fn initialize(&self, _setup: &Setup) -> Result<()> {
        *self.acc.lock() = None;
        Ok(())
    }

    fn consume(&self, item: T) -> Result<()> {
        let mut acc = self.acc.lock();
        let next = match acc.take() {
            Some(prev) => (self.op)(prev, item),
            None => item,
        };
        *acc = Some(next);
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        Ok(())
    }

    fn cancelled(&self) -> bool {
        false
    }
}

/// Seeded fold into an accumulator of a possibly different type.
///
/// The seed is supplied once, at construction, so `initialize` keeps it.
pub struct FoldSink<R, T, F> {
    op: F,
    acc: Mutex<Option<R>>,
    _item: PhantomData<fn(T)>,
}

impl<R, T, F> FoldSink<R, T, F> {
    pub fn new(seed: R, op: F) -> Self {
        Self {
            op,
            acc: Mutex::new(Some(seed)),
            _item: PhantomData,
        }
    }

    pub fn take(&self) -> Result<R> {
        self.acc
            .lock()
            .take()
            .ok_or_else(|| Error::Invariant("fold accumulator already taken".into()))
    }
}

impl<R, T, F> Stage<T> for FoldSink<R, T, F>
where
    R: Send + 'static,
    T: Send + 'static,
    F: Fn(R, T) -> R + Send + Sync,
{
    fn name(&self) -> &'static str {
        "reduce_with"
    }

    fn initialize(&self, _setup: &Setup) -> Result<()> {
        Ok(())
    }

    fn consume(&self, item: T) -> Result<()> {
        let mut acc = self.acc.lock();
        let prev = acc
            .take()
            .ok_or_else(|| Error::Invariant("fold accumulator lost".into()))?;
        *acc = Some((self.op)(prev, item));
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        Ok(())
    }

    fn cancelled(&self) -> bool {
        false
    }
}

/// Keeps the first element accepted by `pred`, then cancels.
pub struct FirstSink<T, P> {
    pred: P,
    found: Mutex<Option<T>>,
    done: AtomicBool,
}

impl<T, P> FirstSink<T, P> {
    pub fn new(pred: P) -> Self {
        Self {
            pred,
            found: Mutex::new(None),
            done: AtomicBool::new(false),
        }
    }

    pub fn take(&self) -> Option<T> {
        self.found.lock().take()
    }
}

impl<T, P> Stage<T> for FirstSink<T, P>
where
    T: Send + 'static,
    P: Fn(&T) -> bool + Send + Sync,
{
    fn name(&self) -> &'static str {
        "find_first"
    }

    fn initialize(&self, _setup: &Setup) -> Result<()> {
        *self.found.lock() = None;
        self.done.store(false, Ordering::Release);
        Ok(())
    }

    fn consume(&self, item: T) -> Result<()> {
        if self.done.load(Ordering::Acquire) || !(self.pred)(&item) {
            return Ok(());
        }
        let mut found = self.found.lock();
        if found.is_none() {
            *found = Some(item);
            self.done.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        Ok(())
    }

    fn cancelled(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

#[derive(Default)]
pub struct CountSink {
    count: AtomicUsize,
}

impl CountSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

impl<T: Send + 'static> Stage<T> for CountSink {
    fn name(&self) -> &'static str {
        "count"
    }

    fn initialize(&self, _setup: &Setup) -> Result<()> {
        self.count.store(0, Ordering::Release);
        Ok(())
    }

    fn consume(&self, _item: T) -> Result<()> {
        self.count.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        Ok(())
    }

    fn cancelled(&self) -> bool {
        false
    }
}
