//! Key-based de-duplication.
//!
//! Two elements are duplicates when their keys are equal, even if the
//! elements themselves differ; the first one to arrive wins. Under a parallel
//! stage "first" means first to reach the set, not first in source order.

use std::collections::HashSet;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use lazyflow_core::{Result, Setup, Stage, StageRef};
use parking_lot::Mutex;

pub struct Distinct<T, K, F> {
    key: Arc<F>,
    seen: Mutex<HashSet<K>>,
    next: StageRef<T>,
    _item: PhantomData<fn(T)>,
}

impl<T, K, F> Distinct<T, K, F> {
    pub fn new(key: Arc<F>, next: StageRef<T>) -> Self {
        Self {
            key,
            seen: Mutex::new(HashSet::new()),
            next,
            _item: PhantomData,
        }
    }
}

impl<T, K, F> Stage<T> for Distinct<T, K, F>
where
    T: Send + 'static,
    K: Eq + Hash + Send,
    F: Fn(&T) -> K + Send + Sync,
{
    fn name(&self) -> &'static str {
        "distinct"
    }

    fn initialize(&self, setup: &Setup) -> Result<()> {
        *self.seen.lock() = HashSet::with_capacity(setup.preallocation());
        tracing::trace!(stage = self.name(), hint = ?setup.hint, "initialize");
        self.next.initialize(setup)
    }

    fn consume(&self, item: T) -> Result<()> {
        let key = (self.key)(&item);
        // Release the lock before forwarding.
        let fresh = self.seen.lock().insert(key);
        if fresh {
            self.next.consume(item)
        } else {
            Ok(())
        }
    }

    fn finalize(&self) -> Result<()> {
        let seen = std::mem::take(&mut *self.seen.lock());
        tracing::trace!(stage = self.name(), distinct = seen.len(), "finalize");
        drop(seen);
        self.next.finalize()
    }

    fn cancelled(&self) -> bool {
        self.next.cancelled()
    }
}
