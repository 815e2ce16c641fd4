//! Recording tail stage for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use lazyflow_core::{LengthHint, Result, Setup, Stage};
use parking_lot::Mutex;

pub(crate) struct Recorder<T> {
    pub items: Mutex<Vec<T>>,
    pub hints: Mutex<Vec<LengthHint>>,
    pub parallel_seen: AtomicBool,
    pub inits: AtomicUsize,
    pub finals: AtomicUsize,
    pub cancel_after: Option<usize>,
}

impl<T> Recorder<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            hints: Mutex::new(Vec::new()),
            parallel_seen: AtomicBool::new(false),
            inits: AtomicUsize::new(0),
            finals: AtomicUsize::new(0),
            cancel_after: None,
        }
    }

    /// Request cancellation once `n` items arrived.
    pub fn cancelling_after(n: usize) -> Self {
        Self {
            cancel_after: Some(n),
            ..Self::new()
        }
    }

    pub fn taken(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }
}

impl<T: Send> Stage<T> for Recorder<T> {
    fn name(&self) -> &'static str {
        "recorder"
    }

    fn initialize(&self, setup: &Setup) -> Result<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        self.hints.lock().push(setup.hint);
        if setup.mode.is_parallel() {
            self.parallel_seen.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn consume(&self, item: T) -> Result<()> {
        self.items.lock().push(item);
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        self.finals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn cancelled(&self) -> bool {
        match self.cancel_after {
            Some(n) => self.items.lock().len() >= n,
            None => false,
        }
    }
}

/// Feed `items` through `head` with the executor's protocol.
pub(crate) fn run<T, S>(head: &S, setup: &Setup, items: Vec<T>) -> Result<usize>
where
    S: Stage<T> + ?Sized,
{
    let mut pulled = 0;
    let mut outcome = head.initialize(setup);
    for item in items {
        if outcome.is_err() {
            break;
        }
        pulled += 1;
        if head.cancelled() {
            break;
        }
        if let Err(e) = head.consume(item) {
            outcome = Err(e);
            break;
        }
    }
    if outcome.is_err() {
        setup.abort.raise();
    }
    let released = head.finalize();
    outcome.and(released).map(|_| pulled)
}

pub(crate) fn setup(n: usize) -> Setup {
    Setup::new(
        LengthHint::Exact(n),
        std::sync::Arc::new(lazyflow_core::PipelineConfig::default()),
    )
}
