//! Terminal operations. Each call fuses the chain against a fresh sink and
//! drives exactly one pass; the pipeline itself stays reusable.

use std::sync::Arc;

use lazyflow_core::{Result, StageRef};
use lazyflow_operators::{
    CollectSink, CountSink, FirstSink, FoldSink, ForEachSink, MatchKind, MatchSink, ReduceSink,
};

use crate::fuse::Node;
use crate::metrics::PassStats;
use crate::pipeline::Pipeline;

impl<T: Send + 'static> Pipeline<T> {
    fn execute(&self, terminal: &'static str, tail: StageRef<T>) -> Result<PassStats> {
        let stats = self.node.fuse(tail).run()?;
        stats.emit(terminal);
        Ok(stats)
    }

    /// Run a pass into a caller-supplied stage.
    pub fn drain_into(&self, tail: StageRef<T>) -> Result<PassStats> {
        self.execute("drain_into", tail)
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        let sink = Arc::new(CollectSink::<T>::new());
        self.execute("to_vec", sink.clone())?;
        Ok(sink.take())
    }

    pub fn collect<C: FromIterator<T>>(&self) -> Result<C> {
        Ok(self.to_vec()?.into_iter().collect())
    }

    pub fn for_each<F>(&self, effect: F) -> Result<()>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.execute("for_each", Arc::new(ForEachSink::<T, F>::new(effect)))
            .map(|_| ())
    }

    fn quantify<P>(&self, kind: MatchKind, pred: P) -> Result<bool>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let sink = Arc::new(MatchSink::<T, P>::new(kind, pred));
        self.execute(kind.label(), sink.clone())?;
        Ok(sink.outcome())
    }

    /// `true` on an empty pipeline.
    pub fn all_match<P>(&self, pred: P) -> Result<bool>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.quantify(MatchKind::All, pred)
    }

    /// `false` on an empty pipeline.
    pub fn any_match<P>(&self, pred: P) -> Result<bool>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.quantify(MatchKind::Any, pred)
    }

    /// `true` iff no element satisfies `pred`.
    pub fn none_match<P>(&self, pred: P) -> Result<bool>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.quantify(MatchKind::None, pred)
    }

    /// Unseeded fold; `None` for an empty pipeline.
    pub fn reduce<F>(&self, op: F) -> Result<Option<T>>
    where
        F: Fn(T, T) -> T + Send + Sync + 'static,
    {
        let sink = Arc::new(ReduceSink::<T, F>::new(op));
        self.execute("reduce", sink.clone())?;
        Ok(sink.take())
    }

    pub fn reduce_from<F>(&self, seed: T, op: F) -> Result<T>
    where
        F: Fn(T, T) -> T + Send + Sync + 'static,
    {
        self.reduce_with(seed, op)
    }

    pub fn reduce_with<R, F>(&self, seed: R, op: F) -> Result<R>
    where
        R: Send + 'static,
        F: Fn(R, T) -> R + Send + Sync + 'static,
    {
        let sink = Arc::new(FoldSink::<R, T, F>::new(seed, op));
        self.execute("reduce_with", sink.clone())?;
        sink.take()
    }

    pub fn find_first(&self) -> Result<Option<T>> {
        self.find_first_match(|_| true)
    }

    pub fn find_first_match<P>(&self, pred: P) -> Result<Option<T>>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let sink = Arc::new(FirstSink::<T, P>::new(pred));
        self.execute("find_first", sink.clone())?;
        Ok(sink.take())
    }

    pub fn count(&self) -> Result<usize> {
        let sink = Arc::new(CountSink::new());
        self.execute("count", sink.clone())?;
        Ok(sink.count())
    }
}
