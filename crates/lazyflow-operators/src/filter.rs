//! Filter stages: forward an element only when a predicate holds.

use std::marker::PhantomData;
use std::sync::Arc;

use lazyflow_core::error::BoxError;
use lazyflow_core::{Error, Result, Stage, StageRef};

pub struct Filter<T, P> {
    pred: Arc<P>,
    next: StageRef<T>,
}

impl<T, P> Filter<T, P> {
    pub fn new(pred: Arc<P>, next: StageRef<T>) -> Self {
        Self { pred, next }
    }
}

impl<T, P> Stage<T> for Filter<T, P>
where
    T: Send + 'static,
    P: Fn(&T) -> bool + Send + Sync,
{
    fn name(&self) -> &'static str {
        "filter"
    }

    fn consume(&self, item: T) -> Result<()> {
        if (self.pred)(&item) {
            self.next.consume(item)
        } else {
            Ok(())
        }
    }

    forward_lifecycle!();
}

/// Filter whose predicate may fail; a failure aborts the pass.
pub struct TryFilter<T, P, E> {
    pred: Arc<P>,
    next: StageRef<T>,
    _err: PhantomData<fn() -> E>,
}

impl<T, P, E> TryFilter<T, P, E> {
    pub fn new(pred: Arc<P>, next: StageRef<T>) -> Self {
        Self {
            pred,
            next,
            _err: PhantomData,
        }
    }
}

impl<T, P, E> Stage<T> for TryFilter<T, P, E>
where
    T: Send + 'static,
    P: Fn(&T) -> std::result::Result<bool, E> + Send + Sync,
    E: Into<BoxError> + 'static,
{
    fn name(&self) -> &'static str {
        "try_filter"
    }

    fn consume(&self, item: T) -> Result<()> {
        match (self.pred)(&item) {
            Ok(true) => self.next.consume(item),
            Ok(false) => Ok(()),
            Err(e) => Err(Error::transform(self.name(), e)),
        }
    }

    forward_lifecycle!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{run, setup, Recorder};

    #[test]
    fn keeps_matching_in_order() {
        let tail = Arc::new(Recorder::<i32>::new());
        let next: StageRef<i32> = tail.clone();
        let head = Filter::new(Arc::new(|x: &i32| x % 2 == 0), next);
        run(&head, &setup(6), vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(tail.taken(), vec![2, 4, 6]);
    }

    #[test]
    fn failing_predicate_aborts() {
        let tail = Arc::new(Recorder::<&str>::new());
        let next: StageRef<&str> = tail.clone();
        let pred = |x: &&str| x.parse::<i32>().map(|v| v > 0);
        let head = TryFilter::new(Arc::new(pred), next);
        let err = run(&head, &setup(3), vec!["1", "oops", "3"]).unwrap_err();
        assert!(matches!(err, Error::Transform { stage: "try_filter", .. }));
        assert_eq!(tail.taken(), vec!["1"]);
        // finalize still ran
        assert_eq!(tail.finals.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
