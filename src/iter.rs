use crate::node::Node;
use crossbeam_epoch::Guard;
use core::marker::PhantomData as marker;
use std::iter::FusedIterator;
use std::vec;

/// Oldest-first iterator over a queue snapshot.
///
/// Produced by [`DropQueue::iter`](crate::DropQueue::iter). The values are
/// collected when the iterator is created.
#[derive(Debug, Clone)]
pub struct Iter<T> {
    values: vec::IntoIter<T>,
}

impl<T> Iter<T> {
    pub(crate) fn new(values: Vec<T>) -> Self {
        Self {
            values: values.into_iter(),
        }
    }
}

impl<T> Iterator for Iter<T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.values.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl<T> DoubleEndedIterator for Iter<T> {
    #[inline]
    fn next_back(&mut self) -> Option<T> {
        self.values.next_back()
    }
}

impl<T> ExactSizeIterator for Iter<T> {}
impl<T> FusedIterator for Iter<T> {}

/// Newest-first iterator over a queue snapshot.
///
/// Produced by [`DropQueue::iter_rev`](crate::DropQueue::iter_rev). Walks
/// the chain one node per step and holds an epoch guard for its whole
/// life, so the snapshot it started from stays intact even while other
/// threads keep pushing and polling.
pub struct RevIter<'a, T> {
    guard: Guard,
    node: *const Node<T>,
    remaining: usize,
    marker: marker<&'a T>,
}

impl<T> RevIter<'_, T> {
    pub(crate) fn new(guard: Guard, newest: *const Node<T>, len: usize) -> Self {
        Self {
            guard,
            node: newest,
            remaining: len,
            marker,
        }
    }
}

impl<T: Clone> Iterator for RevIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.remaining == 0 || self.node.is_null() {
            return None;
        }
        // SAFETY: `node` lies inside the window of a snapshot loaded under
        // `self.guard`, which is still pinned.
        let node = unsafe { &*self.node };
        self.remaining -= 1;
        if self.remaining > 0 {
            self.node = node.next(&self.guard).as_raw();
        }
        Some(node.value.clone())
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: Clone> ExactSizeIterator for RevIter<'_, T> {}
impl<T: Clone> FusedIterator for RevIter<'_, T> {}

// NOTE: RevIter is !Send + !Sync because it owns a Guard pinning the
// current thread. It must be dropped on the thread that created it.
