//! Bounded worker pool with a join barrier, plus the first-fault slot its
//! workers report into.
//!
//! Jobs travel through a bounded channel sized to the worker count, so a
//! submitter blocks while every worker is busy and the queue is full.
//! `join` is the barrier: it closes the queue, lets the workers drain it,
//! and joins every thread. There is no timeout: a job that never returns
//! blocks `join` forever.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use lazyflow_core::error::catch_panic;
use lazyflow_core::{Error, Result};
use parking_lot::Mutex;

/// Unit of work executed on a pool thread.
pub type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Holds the first fault raised by any worker; later faults are logged and dropped.
#[derive(Default)]
pub struct FailureSlot {
    failed: AtomicBool,
    first: Mutex<Option<Error>>,
}

impl FailureSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, err: Error) {
        let mut first = self.first.lock();
        if first.is_none() {
            *first = Some(err);
            self.failed.store(true, Ordering::Release);
        } else {
            tracing::warn!(error = %err, "discarding secondary worker fault");
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Remove the recorded fault, if any.
    pub fn take(&self) -> Option<Error> {
        let mut first = self.first.lock();
        self.failed.store(false, Ordering::Release);
        first.take()
    }

    pub fn reset(&self) {
        if let Some(stale) = self.take() {
            tracing::warn!(error = %stale, "dropping fault left over from a previous pass");
        }
    }
}

pub struct WorkerPool {
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `width` (at least one) named worker threads.
    pub fn new(width: usize, name_prefix: &str, failure: Arc<FailureSlot>) -> Result<Self> {
        let width = width.max(1);
        let (tx, rx) = crossbeam_channel::bounded::<Job>(width);
        let mut pool = Self {
            jobs: Some(tx),
            workers: Vec::with_capacity(width),
            pending: Arc::new(AtomicUsize::new(0)),
        };

        for idx in 0..width {
            let rx = rx.clone();
            let pending = Arc::clone(&pool.pending);
            let failure = Arc::clone(&failure);
            // On error `pool` drops here, which joins the workers spawned so far.
            let handle = thread::Builder::new()
                .name(format!("{}-worker-{}", name_prefix, idx))
                .spawn(move || worker_loop(rx, pending, failure))
                .map_err(|e| Error::Resource(format!("spawn worker {}: {}", idx, e)))?;
            pool.workers.push(handle);
        }

        tracing::debug!(workers = width, "worker pool started");
        Ok(pool)
    }

    pub fn width(&self) -> usize {
        self.workers.len()
    }

    /// Jobs submitted but not yet finished.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Queue a job, blocking while the queue is full.
    pub fn submit(&self, job: Job) -> Result<()> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| Error::Invariant("worker pool already joined".into()))?;
        self.pending.fetch_add(1, Ordering::AcqRel);
        jobs.send(job).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            Error::Invariant("worker pool queue closed".into())
        })
    }

    /// Wait for every submitted job, then stop and join the workers.
    pub fn join(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        drop(self.jobs.take());
        let mut res = Ok(());
        let workers = self.workers.len();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                res = Err(Error::Invariant("worker thread died outside a job".into()));
            }
        }
        if workers > 0 {
            tracing::debug!(workers, "worker pool joined");
        }
        res
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn worker_loop(rx: Receiver<Job>, pending: Arc<AtomicUsize>, failure: Arc<FailureSlot>) {
    for job in rx.iter() {
        // After a fault, queued jobs that have not started are skipped.
        if !failure.is_failed() {
            if let Err(err) = catch_panic("worker", job) {
                failure.record(err);
            }
        }
        pending.fetch_sub(1, Ordering::AcqRel);
    }
}
