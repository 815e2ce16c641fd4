//! Element-wise rewriting stages: map, fallible map, peek, field projection.

use std::marker::PhantomData;
use std::sync::Arc;

use lazyflow_core::error::BoxError;
use lazyflow_core::field::FieldPath;
use lazyflow_core::{Error, Result, Setup, Stage, StageRef};
use parking_lot::RwLock;
use serde_json::Value;

pub struct Map<I, O, F> {
    f: Arc<F>,
    next: StageRef<O>,
    _in: PhantomData<fn(I)>,
}

impl<I, O, F> Map<I, O, F> {
    pub fn new(f: Arc<F>, next: StageRef<O>) -> Self {
        Self {
            f,
            next,
            _in: PhantomData,
        }
    }
}

impl<I, O, F> Stage<I> for Map<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> O + Send + Sync,
{
    fn name(&self) -> &'static str {
        "map"
    }

    fn consume(&self, item: I) -> Result<()> {
        self.next.consume((self.f)(item))
    }

    forward_lifecycle!();
}

/// Map whose function may fail; the first failure aborts the pass.
pub struct TryMap<I, O, F, E> {
    f: Arc<F>,
    next: StageRef<O>,
    _sig: PhantomData<fn(I) -> E>,
}

impl<I, O, F, E> TryMap<I, O, F, E> {
    pub fn new(f: Arc<F>, next: StageRef<O>) -> Self {
        Self {
            f,
            next,
            _sig: PhantomData,
        }
    }
}

impl<I, O, F, E> Stage<I> for TryMap<I, O, F, E>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> std::result::Result<O, E> + Send + Sync,
    E: Into<BoxError> + 'static,
{
    fn name(&self) -> &'static str {
        "try_map"
    }

    fn consume(&self, item: I) -> Result<()> {
        let out = (self.f)(item).map_err(|e| Error::transform(self.name(), e))?;
        self.next.consume(out)
    }

    forward_lifecycle!();
}

pub struct Peek<T, F> {
    effect: Arc<F>,
    next: StageRef<T>,
}

impl<T, F> Peek<T, F> {
    pub fn new(effect: Arc<F>, next: StageRef<T>) -> Self {
        Self { effect, next }
    }
}

impl<T, F> Stage<T> for Peek<T, F>
where
    T: Send + 'static,
    F: Fn(&T) + Send + Sync,
{
    fn name(&self) -> &'static str {
        "peek"
    }

    fn consume(&self, item: T) -> Result<()> {
        (self.effect)(&item);
        self.next.consume(item)
    }

    forward_lifecycle!();
}

/// Projects a dotted path out of JSON records.
///
/// The path is parsed at `initialize`, so a malformed path aborts the pass
/// before any element flows. An element missing the path aborts the pass too.
pub struct MapField {
    raw: String,
    path: RwLock<Option<FieldPath>>,
    next: StageRef<Value>,
}

impl MapField {
    pub fn new(raw: impl Into<String>, next: StageRef<Value>) -> Self {
        Self {
            raw: raw.into(),
            path: RwLock::new(None),
            next,
        }
    }
}

impl Stage<Value> for MapField {
    fn name(&self) -> &'static str {
        "map_field"
    }

    fn initialize(&self, setup: &Setup) -> Result<()> {
        *self.path.write() = Some(FieldPath::parse(&self.raw)?);
        self.next.initialize(setup)
    }

    fn consume(&self, item: Value) -> Result<()> {
        let projected = {
            let guard = self.path.read();
            let path = guard
                .as_ref()
                .ok_or_else(|| Error::Invariant("map_field consumed before initialize".into()))?;
            path.require(&item)?.clone()
        };
        self.next.consume(projected)
    }

    fn finalize(&self) -> Result<()> {
        self.next.finalize()
    }

    fn cancelled(&self) -> bool {
        self.next.cancelled()
    }
}
