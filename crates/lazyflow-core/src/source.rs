//! Source primitives: forward-only cursors plus a length hint.
//!
//! A pipeline never holds a cursor; it holds an *opener* and asks for a fresh
//! cursor at the start of every pass.

use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::hint::LengthHint;

/// Forward-only cursor over the elements of one pass.
pub trait Source<T> {
    /// Exact remaining count, or `Unknown` for channel-like sources.
    fn length_hint(&self) -> LengthHint;

    /// Pull the next element; `None` once exhausted.
    fn next(&mut self) -> Option<T>;
}

/// Cursor over a shared, immutable buffer. Elements are cloned out.
pub struct SliceSource<T> {
    items: Arc<[T]>,
    pos: usize,
}

impl<T> SliceSource<T> {
    pub fn new(items: Arc<[T]>) -> Self {
        Self { items, pos: 0 }
    }
}

impl<T: Clone> Source<T> for SliceSource<T> {
    fn length_hint(&self) -> LengthHint {
        LengthHint::Exact(self.items.len() - self.pos)
    }

    fn next(&mut self) -> Option<T> {
        let item = self.items.get(self.pos)?.clone();
        self.pos += 1;
        Some(item)
    }
}

/// Adapter turning any iterator into a source.
pub struct IterSource<I> {
    iter: I,
}

impl<I: Iterator> IterSource<I> {
    pub fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<I: Iterator> Source<I::Item> for IterSource<I> {
    fn length_hint(&self) -> LengthHint {
        LengthHint::from_size_hint(self.iter.size_hint())
    }

    fn next(&mut self) -> Option<I::Item> {
        self.iter.next()
    }
}

/// Drains a channel until every sender is dropped. Length is always unknown.
pub struct ChannelSource<T> {
    rx: Receiver<T>,
}

impl<T> ChannelSource<T> {
    pub fn new(rx: Receiver<T>) -> Self {
        Self { rx }
    }
}

impl<T> Source<T> for ChannelSource<T> {
    fn length_hint(&self) -> LengthHint {
        LengthHint::Unknown
    }

    fn next(&mut self) -> Option<T> {
        self.rx.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_counts_down() {
        let mut src = SliceSource::new(Arc::from(vec![1, 2, 3]));
        assert_eq!(src.length_hint(), LengthHint::Exact(3));
        assert_eq!(src.next(), Some(1));
        assert_eq!(src.length_hint(), LengthHint::Exact(2));
        assert_eq!(src.next(), Some(2));
        assert_eq!(src.next(), Some(3));
        assert_eq!(src.next(), None);
        assert_eq!(src.length_hint(), LengthHint::Exact(0));
    }

    #[test]
    fn iter_source_reports_exact_ranges_only() {
        let src = IterSource::new(0..5);
        assert_eq!(src.length_hint(), LengthHint::Exact(5));
        let src = IterSource::new((0..5).filter(|x| x % 2 == 0));
        assert_eq!(src.length_hint(), LengthHint::Unknown);
    }

    #[test]
    fn channel_source_ends_when_senders_drop() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send("a").unwrap();
        tx.send("b").unwrap();
        drop(tx);
        let mut src = ChannelSource::new(rx);
        assert_eq!(src.length_hint(), LengthHint::Unknown);
        assert_eq!(src.next(), Some("a"));
        assert_eq!(src.next(), Some("b"));
        assert_eq!(src.next(), None);
    }
}
