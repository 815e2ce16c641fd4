//! Sort barrier.
//!
//! Buffers the whole input, stable-sorts it at `finalize`, then replays it
//! downstream in order. In sequential mode `consume` appends to the buffer
//! directly. Under a parallel stage `consume` posts into a bounded queue
//! drained by one dedicated thread, the only writer of the buffer.
//!
//! Downstream is re-initialized with the exact buffered count before the
//! replay. Unless `keep_parallel` is set the replay is sequential, so order
//! survives everything after this stage. When the pass has aborted the buffer
//! is dropped without a replay.

use std::cmp::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use lazyflow_core::error::catch_panic;
use lazyflow_core::{Error, ExecMode, LengthHint, Result, Setup, Stage, StageRef};
use parking_lot::{Mutex, RwLock};

use crate::lifecycle::settle;

pub struct Sorted<T, C> {
    cmp: Arc<C>,
    keep_parallel: bool,
    next: StageRef<T>,
    direct: Mutex<Vec<T>>,
    funnel: RwLock<Option<Sender<T>>>,
    drain: Mutex<Option<JoinHandle<Vec<T>>>>,
    setup: Mutex<Option<Setup>>,
}

impl<T, C> Sorted<T, C>
where
    T: Send + 'static,
    C: Fn(&T, &T) -> Ordering + Send + Sync,
{
    pub fn new(cmp: Arc<C>, keep_parallel: bool, next: StageRef<T>) -> Self {
        Self {
            cmp,
            keep_parallel,
            next,
            direct: Mutex::new(Vec::new()),
            funnel: RwLock::new(None),
            drain: Mutex::new(None),
            setup: Mutex::new(None),
        }
    }

    /// Setup handed downstream, both at pass start and for the replay.
    fn downstream(&self, setup: &Setup, hint: LengthHint) -> Setup {
        let mode = if self.keep_parallel {
            setup.mode
        } else {
            ExecMode::Sequential
        };
        setup.with_hint(hint).with_mode(mode)
    }

    fn open_funnel(&self, setup: &Setup) -> Result<()> {
        let bound = setup.config.funnel_bound(setup.hint.exact());
        let cap = setup.preallocation();
        let (tx, rx) = crossbeam_channel::bounded::<T>(bound);
        let handle = thread::Builder::new()
            .name(format!("{}-funnel", setup.config.thread_name_prefix))
            .spawn(move || {
                let mut buf = Vec::with_capacity(cap);
                for item in rx.iter() {
                    buf.push(item);
                }
                buf
            })
            .map_err(|e| Error::Resource(format!("spawn sort funnel: {}", e)))?;
        *self.funnel.write() = Some(tx);
        *self.drain.lock() = Some(handle);
        tracing::debug!(stage = "sorted", bound, "funnel opened");
        Ok(())
    }

    /// Close the funnel (if any) and gather everything buffered this pass.
    fn collect_buffer(&self) -> Result<Vec<T>> {
        let mut items = std::mem::take(&mut *self.direct.lock());
        drop(self.funnel.write().take());
        if let Some(handle) = self.drain.lock().take() {
            let drained = handle
                .join()
                .map_err(|_| Error::Invariant("sort funnel thread panicked".into()))?;
            items.extend(drained);
        }
        Ok(items)
    }

    fn replay(&self, setup: &Setup, mut items: Vec<T>) -> Result<()> {
        items.sort_by(|a, b| (self.cmp)(a, b));
        let downstream = self.downstream(setup, LengthHint::Exact(items.len()));
        tracing::trace!(stage = "sorted", count = items.len(), mode = ?downstream.mode, "replay");
        self.next.initialize(&downstream)?;
        for item in items {
            if self.next.cancelled() {
                break;
            }
            self.next.consume(item)?;
        }
        Ok(())
    }
}

impl<T, C> Stage<T> for Sorted<T, C>
where
    T: Send + 'static,
    C: Fn(&T, &T) -> Ordering + Send + Sync,
{
    fn name(&self) -> &'static str {
        "sorted"
    }

    fn initialize(&self, setup: &Setup) -> Result<()> {
        if let Err(err) = self.collect_buffer() {
            tracing::warn!(stage = self.name(), error = %err, "dropping buffer left over from a previous pass");
        }

        if setup.mode.is_parallel() {
            self.open_funnel(setup)?;
        } else {
            *self.direct.lock() = Vec::with_capacity(setup.preallocation());
        }
        *self.setup.lock() = Some(setup.clone());
        tracing::trace!(stage = self.name(), hint = ?setup.hint, mode = ?setup.mode, "initialize");
        self.next.initialize(&self.downstream(setup, setup.hint))
    }

    fn consume(&self, item: T) -> Result<()> {
        {
            let funnel = self.funnel.read();
            if let Some(tx) = funnel.as_ref() {
                return tx
                    .send(item)
                    .map_err(|_| Error::Invariant("sort funnel closed".into()));
            }
        }
        self.direct.lock().push(item);
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        let setup = self.setup.lock().take();
        let body = catch_panic("finalize", || {
            let items = self.collect_buffer()?;
            match &setup {
                Some(setup) if !setup.abort.is_raised() => self.replay(setup, items),
                Some(_) => {
                    tracing::debug!(stage = self.name(), dropped = items.len(), "pass aborted, replay skipped");
                    Ok(())
                }
                // initialize never ran to completion
                None => Ok(()),
            }
        });
        if body.is_err() {
            if let Some(setup) = &setup {
                setup.abort.raise();
            }
        }
        let released = self.next.finalize();
        settle(self.name(), body, released)
    }

    // A barrier needs its whole input.
    fn cancelled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limit::{Limit, Skip};
    use crate::map::{Map, TryMap};
    use crate::parallel::{Parallel, Width};
    use lazyflow_core::PipelineConfig;
    use crate::testing::{run, setup, Recorder};
    use std::sync::atomic::Ordering as AtomicOrdering;

    const INPUT: [u32; 17] = [1, 5, 2, 7, 7, 8, 10, 5, 12, 6, 2, 6, 9, 3, 2, 4, 11];

    fn ascending() -> Arc<impl Fn(&u32, &u32) -> Ordering + Send + Sync> {
        Arc::new(|a: &u32, b: &u32| a.cmp(b))
    }

    #[test]
    fn sorts_and_reinitializes_with_exact_count() {
        let tail = Arc::new(Recorder::<u32>::new());
        let next: StageRef<u32> = tail.clone();
        let head = Sorted::new(ascending(), false, next);
        let filtered: Vec<u32> = INPUT.iter().copied().filter(|x| x % 2 == 0).collect();
        run(&head, &setup(17), filtered).unwrap();
        assert_eq!(tail.taken(), vec![2, 2, 2, 4, 6, 6, 8, 10, 12]);
        assert_eq!(tail.inits.load(AtomicOrdering::SeqCst), 2);
        assert_eq!(
            *tail.hints.lock(),
            vec![LengthHint::Exact(17), LengthHint::Exact(9)]
        );
        assert_eq!(tail.finals.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn equal_keys_keep_arrival_order() {
        let tail = Arc::new(Recorder::<(u8, char)>::new());
        let next: StageRef<(u8, char)> = tail.clone();
        let head = Sorted::new(
            Arc::new(|a: &(u8, char), b: &(u8, char)| a.0.cmp(&b.0)),
            false,
            next,
        );
        let input = vec![(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd')];
        run(&head, &setup(4), input).unwrap();
        assert_eq!(tail.taken(), vec![(1, 'b'), (1, 'd'), (2, 'a'), (2, 'c')]);
    }

    #[test]
    fn sorted_limit_skip_window() {
        let tail = Arc::new(Recorder::<u32>::new());
        let next: StageRef<u32> = tail.clone();
        let skip: StageRef<u32> = Arc::new(Skip::new(3, next));
        let limit: StageRef<u32> = Arc::new(Limit::new(10, skip));
        let head = Sorted::new(ascending(), false, limit);
        run(&head, &setup(17), INPUT.to_vec()).unwrap();
        assert_eq!(tail.taken(), vec![2, 3, 4, 5, 5, 6, 6]);
    }

    #[test]
    fn funnel_collects_everything_under_parallel() {
        let tail = Arc::new(Recorder::<u32>::new());
        let next: StageRef<u32> = tail.clone();
        let sorted: StageRef<u32> = Arc::new(Sorted::new(ascending(), false, next));
        let head = Parallel::new(Width::Fixed(4), sorted);
        let input: Vec<u32> = (0..2000u32).rev().collect();
        run(&head, &setup(2000), input).unwrap();
        assert_eq!(tail.taken(), (0..2000u32).collect::<Vec<_>>());
        // replay is sequential again
        assert_eq!(tail.hints.lock().last(), Some(&LengthHint::Exact(2000)));
    }

    #[test]
    fn keep_parallel_carries_mode_downstream() {
        let tail = Arc::new(Recorder::<u32>::new());
        let next: StageRef<u32> = tail.clone();
        let sorted: StageRef<u32> = Arc::new(Sorted::new(ascending(), true, next));
        let head = Parallel::new(Width::Fixed(2), sorted);
        run(&head, &setup(10), (0..10u32).collect()).unwrap();
        assert!(tail.parallel_seen.load(AtomicOrdering::SeqCst));
        assert_eq!(tail.taken().len(), 10);
    }

    #[test]
    fn replay_stops_once_downstream_cancels() {
        let tail = Arc::new(Recorder::<u32>::cancelling_after(3));
        let next: StageRef<u32> = tail.clone();
        let head = Sorted::new(ascending(), false, next);
        run(&head, &setup(17), INPUT.to_vec()).unwrap();
        assert_eq!(tail.taken(), vec![1, 2, 2]);
    }

    #[test]
    fn faulted_pass_drops_the_buffer() {
        let tail = Arc::new(Recorder::<u32>::new());
        let next: StageRef<u32> = tail.clone();
        let sorted: StageRef<u32> = Arc::new(Sorted::new(ascending(), false, next));
        let head = TryMap::new(
            Arc::new(|x: u32| if x == 12 { Err("twelve") } else { Ok(x) }),
            sorted,
        );
        let err = run(&head, &setup(17), INPUT.to_vec()).unwrap_err();
        assert!(matches!(err, Error::Transform { stage: "try_map", .. }));
        assert!(tail.taken().is_empty());
        assert_eq!(tail.inits.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(tail.finals.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn worker_fault_upstream_drops_the_buffer() {
        let tail = Arc::new(Recorder::<u32>::new());
        let next: StageRef<u32> = tail.clone();
        let sorted: StageRef<u32> = Arc::new(Sorted::new(ascending(), false, next));
        let fallible: StageRef<u32> = Arc::new(TryMap::new(
            Arc::new(|x: u32| if x == 40 { Err("forty") } else { Ok(x) }),
            sorted,
        ));
        let head = Parallel::new(Width::Fixed(3), fallible);
        let err = run(&head, &setup(100), (0..100u32).collect()).unwrap_err();
        assert!(matches!(err, Error::Transform { stage: "try_map", .. }));
        assert!(tail.taken().is_empty());
        assert_eq!(tail.finals.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn replay_panic_still_finalizes_downstream() {
        let tail = Arc::new(Recorder::<u32>::new());
        let next: StageRef<u32> = tail.clone();
        let exploding: StageRef<u32> = Arc::new(Map::new(
            Arc::new(|x: u32| if x == 2 { panic!("two") } else { x }),
            next,
        ));
        let head = Sorted::new(ascending(), false, exploding);
        let err = run(&head, &setup(3), vec![3, 1, 2]).unwrap_err();
        assert!(matches!(err, Error::Panicked { phase: "finalize", .. }));
        assert_eq!(tail.taken(), vec![1]);
        assert_eq!(tail.finals.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn funnel_handles_unknown_length() {
        let tail = Arc::new(Recorder::<u32>::new());
        let next: StageRef<u32> = tail.clone();
        let sorted: StageRef<u32> = Arc::new(Sorted::new(ascending(), false, next));
        let head = Parallel::new(Width::Fixed(2), sorted);
        let cfg = PipelineConfig {
            fallback_funnel_capacity: 4,
            ..PipelineConfig::default()
        };
        let unknown = Setup::new(LengthHint::Unknown, Arc::new(cfg));
        let input: Vec<u32> = (0..500u32).rev().collect();
        run(&head, &unknown, input).unwrap();
        assert_eq!(tail.taken(), (0..500u32).collect::<Vec<_>>());
        assert_eq!(
            *tail.hints.lock(),
            vec![LengthHint::Unknown, LengthHint::Exact(500)]
        );
    }
}
