//! Fan-out stage: downstream `consume` calls run on a bounded worker pool.
//!
//! Everything after this stage sees `ExecMode::Parallel` in its `Setup` and
//! must tolerate concurrent, out-of-order `consume` calls. `finalize` is the
//! barrier: it waits for every submitted task before forwarding. A worker
//! fault raises the pass's abort signal before `finalize` goes downstream.

use std::sync::Arc;

use lazyflow_core::{AbortSignal, ExecMode, Result, Setup, Stage, StageRef};
use parking_lot::{Mutex, RwLock};

use crate::lifecycle::settle;
use crate::pool::{FailureSlot, WorkerPool};

/// How many workers a parallel stage starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// `max(n, 1)` workers.
    Fixed(usize),
    /// `PipelineConfig::default_parallelism` workers.
    Configured,
    /// Same width as the incoming mode; inline forwarding when sequential.
    Inherit,
}

pub struct Parallel<T> {
    width: Width,
    next: StageRef<T>,
    pool: RwLock<Option<WorkerPool>>,
    failure: Arc<FailureSlot>,
    abort: Mutex<Option<AbortSignal>>,
}

impl<T> Parallel<T> {
    pub fn new(width: Width, next: StageRef<T>) -> Self {
        Self {
            width,
            next,
            pool: RwLock::new(None),
            failure: Arc::new(FailureSlot::new()),
            abort: Mutex::new(None),
        }
    }

    fn resolve_width(&self, setup: &Setup) -> Option<usize> {
        match self.width {
            Width::Fixed(n) => Some(n.max(1)),
            Width::Configured => Some(setup.config.default_parallelism.max(1)),
            Width::Inherit => setup.mode.workers(),
        }
    }
}

impl<T: Send + 'static> Stage<T> for Parallel<T> {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn initialize(&self, setup: &Setup) -> Result<()> {
        // A re-initialization (sort barrier upstream) replaces the idle pool.
        if let Some(stale) = self.pool.write().take() {
            stale.join()?;
        }
        self.failure.reset();
        *self.abort.lock() = Some(setup.abort.clone());

        match self.resolve_width(setup) {
            Some(width) => {
                let pool = WorkerPool::new(
                    width,
                    &setup.config.thread_name_prefix,
                    Arc::clone(&self.failure),
                )?;
                *self.pool.write() = Some(pool);
                tracing::trace!(stage = self.name(), workers = width, hint = ?setup.hint, "initialize");
                self.next.initialize(&setup.with_mode(ExecMode::Parallel(width)))
            }
            None => self.next.initialize(setup),
        }
    }

    fn consume(&self, item: T) -> Result<()> {
        let pool = self.pool.read();
        match pool.as_ref() {
            Some(pool) => {
                let next = Arc::clone(&self.next);
                pool.submit(Box::new(move || next.consume(item)))
            }
            None => self.next.consume(item),
        }
    }

    fn finalize(&self) -> Result<()> {
        let pool = self.pool.write().take();
        let mut body = match pool {
            Some(pool) => pool.join(),
            None => Ok(()),
        };
        if let Some(fault) = self.failure.take() {
            body = settle(self.name(), Err(fault), body);
        }
        if body.is_err() {
            if let Some(abort) = self.abort.lock().as_ref() {
                abort.raise();
            }
        }
        let released = self.next.finalize();
        settle(self.name(), body, released)
    }

    fn cancelled(&self) -> bool {
        self.failure.is_failed() || self.next.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{run, setup, Recorder};
    use lazyflow_core::Error;
    use std::sync::atomic::Ordering;

    #[test]
    fn all_items_arrive_and_barrier_holds() {
        let tail = Arc::new(Recorder::<u32>::new());
        let next: StageRef<u32> = tail.clone();
        let head = Parallel::new(Width::Fixed(4), next);
        run(&head, &setup(200), (0..200u32).collect()).unwrap();
        let mut got = tail.taken();
        got.sort_unstable();
        assert_eq!(got, (0..200u32).collect::<Vec<_>>());
        assert!(tail.parallel_seen.load(Ordering::SeqCst));
        assert_eq!(tail.finals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inherit_runs_inline_when_sequential() {
        let tail = Arc::new(Recorder::<u32>::new());
        let next: StageRef<u32> = tail.clone();
        let head = Parallel::new(Width::Inherit, next);
        run(&head, &setup(3), vec![3, 1, 2]).unwrap();
        assert_eq!(tail.taken(), vec![3, 1, 2]);
        assert!(!tail.parallel_seen.load(Ordering::SeqCst));
    }

    struct Exploding;

    impl Stage<u32> for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }
        fn initialize(&self, _setup: &Setup) -> Result<()> {
            Ok(())
        }
        fn consume(&self, item: u32) -> Result<()> {
            if item == 7 {
                panic!("seven");
            }
            Ok(())
        }
        fn finalize(&self) -> Result<()> {
            Ok(())
        }
        fn cancelled(&self) -> bool {
            false
        }
    }

    #[test]
    fn worker_panic_surfaces_at_finalize() {
        let next: StageRef<u32> = Arc::new(Exploding);
        let head = Parallel::new(Width::Fixed(2), next);
        let err = run(&head, &setup(100), (0..100u32).collect()).unwrap_err();
        match err {
            Error::Panicked { phase, message } => {
                assert_eq!(phase, "worker");
                assert_eq!(message, "seven");
            }
            other => panic!("unexpected: {other}"),
        }
    }
}
