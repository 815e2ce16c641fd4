//! `Pipeline<T>`: a persistent, cloneable description of a lazy pass.
//!
//! Every intermediate operator returns a new handle sharing the chain built so
//! far, so a pipeline can be branched freely. Nothing runs until a terminal
//! operation (see `terminal.rs`) fuses the chain.

use std::cmp::Ordering;
use std::hash::Hash;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use serde_json::Value;

use lazyflow_core::error::BoxError;
use lazyflow_core::source::{ChannelSource, IterSource, SliceSource, Source};
use lazyflow_core::{PipelineConfig, Result, Stage, StageRef};
use lazyflow_operators::{
    Distinct, Filter, FlatMap, Limit, Map, MapField, Parallel, Peek, Skip, Sorted, TryFilter,
    TryMap, Width,
};

use crate::fuse::{Node, Opener, SourceNode, StageNode};

pub struct Pipeline<T> {
    pub(crate) node: Arc<dyn Node<T>>,
}

impl<T> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

fn stage<T, S: Stage<T> + 'static>(s: S) -> StageRef<T> {
    Arc::new(s)
}

/// Source constructors bound to one `PipelineConfig`. The `Pipeline::from_*`
/// shorthands use `Origin::default()`.
#[derive(Debug, Clone, Default)]
pub struct Origin {
    config: Arc<PipelineConfig>,
}

impl Origin {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Every pass calls `open` for a fresh cursor.
    pub fn from_source<T, S, F>(&self, open: F) -> Pipeline<T>
    where
        T: Send + 'static,
        S: Source<T> + 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let open: Arc<Opener<T>> = Arc::new(move || Box::new(open()) as Box<dyn Source<T>>);
        Pipeline {
            node: Arc::new(SourceNode::new(open, Arc::clone(&self.config))),
        }
    }

    /// Shared buffer; each pass clones the elements out.
    pub fn from_vec<T>(&self, items: Vec<T>) -> Pipeline<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let items: Arc<[T]> = items.into();
        self.from_source(move || SliceSource::new(Arc::clone(&items)))
    }

    pub fn of<T, I>(&self, items: I) -> Pipeline<T>
    where
        T: Clone + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        self.from_vec(items.into_iter().collect())
    }

    /// Re-openable iterator factory.
    pub fn from_iter_fn<I, F>(&self, make: F) -> Pipeline<I::Item>
    where
        I: IntoIterator,
        I::IntoIter: 'static,
        I::Item: Send + 'static,
        F: Fn() -> I + Send + Sync + 'static,
    {
        self.from_source(move || IterSource::new(make().into_iter()))
    }

    /// Single-shot: the first pass drains the channel, later passes see it
    /// empty (or block until more senders deliver).
    pub fn from_channel<T: Send + 'static>(&self, rx: Receiver<T>) -> Pipeline<T> {
        self.from_source(move || ChannelSource::new(rx.clone()))
    }
}

impl<T: Clone + Send + Sync + 'static> Pipeline<T> {
    pub fn from_vec(items: Vec<T>) -> Self {
        Origin::default().from_vec(items)
    }

    pub fn of(items: impl IntoIterator<Item = T>) -> Self {
        Origin::default().of(items)
    }
}

impl<T: Send + 'static> Pipeline<T> {
    pub fn from_iter_fn<I, F>(make: F) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'static,
        F: Fn() -> I + Send + Sync + 'static,
    {
        Origin::default().from_iter_fn(make)
    }

    pub fn from_channel(rx: Receiver<T>) -> Self {
        Origin::default().from_channel(rx)
    }

    fn then<U, W>(&self, name: &'static str, wrap: W) -> Pipeline<U>
    where
        U: Send + 'static,
        W: Fn(StageRef<U>) -> StageRef<T> + Send + Sync + 'static,
    {
        Pipeline {
            node: Arc::new(StageNode::new(name, Arc::clone(&self.node), Box::new(wrap))),
        }
    }

    pub fn filter<P>(&self, pred: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let pred = Arc::new(pred);
        self.then("filter", move |next| stage(Filter::new(Arc::clone(&pred), next)))
    }

    /// Like `filter`, but an `Err` from `pred` aborts the pass.
    pub fn try_filter<P, E>(&self, pred: P) -> Self
    where
        P: Fn(&T) -> std::result::Result<bool, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        let pred = Arc::new(pred);
        self.then("try_filter", move |next| {
            stage(TryFilter::new(Arc::clone(&pred), next))
        })
    }

    pub fn map<U, F>(&self, f: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.then("map", move |next| stage(Map::new(Arc::clone(&f), next)))
    }

    pub fn try_map<U, F, E>(&self, f: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: Fn(T) -> std::result::Result<U, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        let f = Arc::new(f);
        self.then("try_map", move |next| stage(TryMap::new(Arc::clone(&f), next)))
    }

    pub fn peek<F>(&self, effect: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let effect = Arc::new(effect);
        self.then("peek", move |next| stage(Peek::new(Arc::clone(&effect), next)))
    }

    /// Each element expands into a sub-pipeline that is drained, in order,
    /// before the next element is pulled.
    pub fn flat_map<U, F>(&self, f: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Pipeline<U> + Send + Sync + 'static,
    {
        let expand = Arc::new(move |item: T, tail: StageRef<U>| -> Result<()> {
            f(item).node.fuse(tail).run().map(|_| ())
        });
        self.then("flat_map", move |next| stage(FlatMap::new(Arc::clone(&expand), next)))
    }

    /// Everything after this runs on `max(workers, 1)` pool threads.
    pub fn parallel(&self, workers: usize) -> Self {
        self.then("parallel", move |next| stage(Parallel::new(Width::Fixed(workers), next)))
    }

    /// `parallel` with `PipelineConfig::default_parallelism` workers.
    pub fn parallel_default(&self) -> Self {
        self.then("parallel", |next| stage(Parallel::new(Width::Configured, next)))
    }

    pub fn distinct(&self) -> Self
    where
        T: Eq + Hash + Clone,
    {
        self.distinct_by(|item: &T| item.clone())
    }

    /// Keeps the first element seen for each key; unequal elements sharing a
    /// key count as duplicates.
    pub fn distinct_by<K, F>(&self, key: F) -> Self
    where
        K: Eq + Hash + Send + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let key = Arc::new(key);
        self.then("distinct", move |next| stage(Distinct::new(Arc::clone(&key), next)))
    }

    pub fn sorted(&self) -> Self
    where
        T: Ord,
    {
        self.sorted_by(|a: &T, b: &T| a.cmp(b))
    }

    pub fn sorted_by<C>(&self, cmp: C) -> Self
    where
        C: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.sorted_with(cmp, false)
    }

    pub fn sorted_by_key<K, F>(&self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.sorted_by(move |a, b| key(a).cmp(&key(b)))
    }

    /// Stable sort barrier. With `keep_parallel`, a parallel upstream stays
    /// parallel after the barrier (replay fans out again at the same width).
    pub fn sorted_with<C>(&self, cmp: C, keep_parallel: bool) -> Self
    where
        C: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        let cmp = Arc::new(cmp);
        let sorted = self.then("sorted", move |next| {
            stage(Sorted::new(Arc::clone(&cmp), keep_parallel, next))
        });
        if keep_parallel {
            sorted.then("parallel", |next| stage(Parallel::new(Width::Inherit, next)))
        } else {
            sorted
        }
    }

    pub fn limit(&self, n: usize) -> Self {
        self.then("limit", move |next| stage(Limit::new(n, next)))
    }

    pub fn skip(&self, n: usize) -> Self {
        self.then("skip", move |next| stage(Skip::new(n, next)))
    }

    /// Stage names from the source to the last operator. Runs nothing.
    pub fn explain(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        self.node.chain(&mut names);
        names
    }
}

impl Pipeline<Value> {
    /// Replace every record by the value at a dotted path (`"a.b.0"`).
    /// A malformed path fails the pass at initialize; a path that does not
    /// resolve on some record aborts it with `FieldNotFound`.
    pub fn map_field(&self, path: impl Into<String>) -> Self {
        let raw: String = path.into();
        self.then("map_field", move |next| stage(MapField::new(raw.clone(), next)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explain_lists_stages_from_the_source() {
        let p = Pipeline::from_vec(vec![1u8, 2, 3])
            .filter(|x| *x > 1)
            .map(|x| x as u32)
            .parallel(2)
            .sorted_with(|a: &u32, b: &u32| a.cmp(b), true)
            .limit(1);
        assert_eq!(
            p.explain(),
            vec!["source", "filter", "map", "parallel", "sorted", "parallel", "limit"]
        );
    }

    #[test]
    fn handles_branch_without_affecting_each_other() {
        let base = Pipeline::from_vec((1..=6).collect::<Vec<u32>>());
        let evens = base.filter(|x| x % 2 == 0);
        let doubled = base.map(|x| x * 2);
        assert_eq!(evens.to_vec().unwrap(), vec![2, 4, 6]);
        assert_eq!(doubled.to_vec().unwrap(), vec![2, 4, 6, 8, 10, 12]);
        assert_eq!(base.count().unwrap(), 6);
    }

    #[test]
    fn building_runs_nothing() {
        let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let p = Pipeline::from_vec(vec![1, 2, 3]).peek(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 0);
        p.count().unwrap();
        p.count().unwrap();
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 6);
    }

    #[test]
    fn iterator_factories_reopen_per_pass() {
        let p = Pipeline::from_iter_fn(|| 0..5u64).map(|x| x * x);
        assert_eq!(p.to_vec().unwrap(), vec![0, 1, 4, 9, 16]);
        assert_eq!(p.reduce(|a, b| a + b).unwrap(), Some(30));
    }

    #[test]
    fn channel_sources_drain_once() {
        let (tx, rx) = crossbeam_channel::unbounded();
        for i in 0..4 {
            tx.send(i).unwrap();
        }
        drop(tx);
        let p = Pipeline::from_channel(rx);
        assert_eq!(p.to_vec().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(p.count().unwrap(), 0);
    }

    #[test]
    fn origin_carries_config_into_passes() {
        let origin = Origin::new(PipelineConfig {
            default_parallelism: 3,
            thread_name_prefix: "cfgtest".into(),
            ..PipelineConfig::default()
        });
        let names = Arc::new(parking_lot::Mutex::new(std::collections::HashSet::new()));
        let sink = Arc::clone(&names);
        origin
            .of(0..32u32)
            .parallel_default()
            .for_each(move |_| {
                let name = std::thread::current().name().unwrap_or("").to_string();
                sink.lock().insert(name);
            })
            .unwrap();
        let names = names.lock();
        assert!(!names.is_empty() && names.len() <= 3);
        assert!(names.iter().all(|n| n.starts_with("cfgtest-worker-")));
    }

    #[test]
    fn map_field_projects_json_records() {
        let records = vec![
            serde_json::json!({"user": {"name": "ada", "tags": ["x", "y"]}}),
            serde_json::json!({"user": {"name": "bob", "tags": ["z"]}}),
        ];
        let names = Pipeline::from_vec(records.clone())
            .map_field("user.name")
            .to_vec()
            .unwrap();
        assert_eq!(names, vec![serde_json::json!("ada"), serde_json::json!("bob")]);

        let err = Pipeline::from_vec(records)
            .map_field("user.tags.1")
            .to_vec()
            .unwrap_err();
        assert!(matches!(err, lazyflow_core::Error::FieldNotFound { .. }));
    }
}
