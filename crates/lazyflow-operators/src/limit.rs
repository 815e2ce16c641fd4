//! Prefix stages: `Limit` keeps the first N elements, `Skip` drops them.
//!
//! Both count with a lock-free compare-and-swap loop, so under a parallel
//! stage exactly N callers win the race (which N is unspecified).

use std::sync::atomic::{AtomicUsize, Ordering};

use lazyflow_core::{Result, Setup, Stage, StageRef};

/// Claim one slot below `bound`; `false` once the counter reached it.
fn claim(counter: &AtomicUsize, bound: usize) -> bool {
    let mut cur = counter.load(Ordering::Acquire);
    while cur < bound {
        match counter.compare_exchange_weak(cur, cur + 1, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return true,
            Err(observed) => cur = observed,
        }
    }
    false
}

pub struct Limit<T> {
    limit: usize,
    taken: AtomicUsize,
    next: StageRef<T>,
}

impl<T> Limit<T> {
    pub fn new(limit: usize, next: StageRef<T>) -> Self {
        Self {
            limit,
            taken: AtomicUsize::new(0),
            next,
        }
    }
}

impl<T: Send + 'static> Stage<T> for Limit<T> {
    fn name(&self) -> &'static str {
        "limit"
    }

    fn initialize(&self, setup: &Setup) -> Result<()> {
        self.taken.store(0, Ordering::Release);
        self.next.initialize(setup)
    }

    fn consume(&self, item: T) -> Result<()> {
        if claim(&self.taken, self.limit) {
            self.next.consume(item)
        } else {
            Ok(())
        }
    }

    fn finalize(&self) -> Result<()> {
        self.taken.store(self.limit, Ordering::Release);
        self.next.finalize()
    }

    fn cancelled(&self) -> bool {
        self.taken.load(Ordering::Acquire) >= self.limit || self.next.cancelled()
    }
}

pub struct Skip<T> {
    skip: usize,
    dropped: AtomicUsize,
    next: StageRef<T>,
}

impl<T> Skip<T> {
    pub fn new(skip: usize, next: StageRef<T>) -> Self {
        Self {
            skip,
            dropped: AtomicUsize::new(0),
            next,
        }
    }
}

impl<T: Send + 'static> Stage<T> for Skip<T> {
    fn name(&self) -> &'static str {
        "skip"
    }

    fn initialize(&self, setup: &Setup) -> Result<()> {
        self.dropped.store(0, Ordering::Release);
        self.next.initialize(setup)
    }

    fn consume(&self, item: T) -> Result<()> {
        if claim(&self.dropped, self.skip) {
            Ok(())
        } else {
            self.next.consume(item)
        }
    }

    fn finalize(&self) -> Result<()> {
        self.dropped.store(self.skip, Ordering::Release);
        self.next.finalize()
    }

    // No upper bound on output, so only downstream can cancel.
    fn cancelled(&self) -> bool {
        self.next.cancelled()
    }
}
