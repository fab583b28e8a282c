use crossbeam_epoch::{Atomic, Guard, Shared};
use std::sync::atomic::Ordering;

/// One cell of the chain. `next` points toward older values.
///
/// `value` never changes. `next` is written only while the node is still
/// private to the thread that built it: once a compare-and-swap publishes
/// the node inside a snapshot, the link is frozen. Nodes that fall out of
/// the window are handed whole to the thread that won the transition.
pub(crate) struct Node<T> {
    pub(crate) value: T,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            value,
            next: Atomic::null(),
        }
    }

    /// Points this node at an older chain.
    ///
    /// The publishing CAS releases this store, so `Relaxed` is enough.
    #[inline]
    pub(crate) fn link(&self, older: Shared<'_, Node<T>>) {
        self.next.store(older, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn next<'g>(&self, guard: &'g Guard) -> Shared<'g, Node<T>> {
        self.next.load(Ordering::Acquire, guard)
    }

    /// Follows `next` `n` times; `at(0)` is `self`.
    ///
    /// Returns `None` when the chain ends first.
    pub(crate) fn at<'g>(&'g self, n: usize, guard: &'g Guard) -> Option<&'g Node<T>> {
        let mut current = self;
        for _ in 0..n {
            // SAFETY: every node reachable from a snapshot loaded under
            // `guard` is retired through the epoch, never freed in place.
            current = unsafe { current.next(guard).as_ref() }?;
        }
        Some(current)
    }
}

/// Walks at most `remaining` nodes from `head` toward older values.
///
/// The bound matters: below a window's oldest node the links may lead into
/// nodes another thread already owns.
pub(crate) struct Chain<'g, T> {
    head: Shared<'g, Node<T>>,
    remaining: usize,
    guard: &'g Guard,
}

impl<'g, T> Chain<'g, T> {
    pub(crate) fn new(head: Shared<'g, Node<T>>, len: usize, guard: &'g Guard) -> Self {
        Self {
            head,
            remaining: len,
            guard,
        }
    }
}

impl<'g, T> Iterator for Chain<'g, T> {
    type Item = &'g Node<T>;

    fn next(&mut self) -> Option<&'g Node<T>> {
        if self.remaining == 0 {
            return None;
        }
        // SAFETY: see `Node::at`.
        let node = unsafe { self.head.as_ref() }?;
        self.remaining -= 1;
        if self.remaining > 0 {
            self.head = node.next(self.guard);
        }
        Some(node)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_epoch::{self as epoch, Owned};

    /// Links `values` oldest-first and returns the newest node.
    fn chain<'g>(values: &[i32], guard: &'g Guard) -> Shared<'g, Node<i32>> {
        let mut newest = Shared::null();
        for &v in values {
            let node = Owned::new(Node::new(v)).into_shared(guard);
            unsafe { node.deref() }.link(newest);
            newest = node;
        }
        newest
    }

    fn free(newest: Shared<'_, Node<i32>>, guard: &Guard) {
        let mut current = newest;
        while !current.is_null() {
            let next = unsafe { current.deref() }.next(guard);
            drop(unsafe { current.into_owned() });
            current = next;
        }
    }

    #[test]
    fn at_walks_toward_older_values() {
        let guard = epoch::pin();
        let newest = chain(&[1, 2, 3, 4], &guard);
        let head = unsafe { newest.deref() };

        assert_eq!(head.at(0, &guard).map(|n| n.value), Some(4));
        assert_eq!(head.at(1, &guard).map(|n| n.value), Some(3));
        assert_eq!(head.at(3, &guard).map(|n| n.value), Some(1));
        assert!(head.at(4, &guard).is_none());

        free(newest, &guard);
    }

    #[test]
    fn chain_stops_at_its_bound() {
        let guard = epoch::pin();
        let newest = chain(&[1, 2, 3, 4, 5], &guard);

        let seen: Vec<i32> = Chain::new(newest, 3, &guard).map(|n| n.value).collect();
        assert_eq!(seen, vec![5, 4, 3]);

        let all: Vec<i32> = Chain::new(newest, 10, &guard).map(|n| n.value).collect();
        assert_eq!(all, vec![5, 4, 3, 2, 1]);

        assert_eq!(Chain::new(newest, 0, &guard).count(), 0);
        assert_eq!(Chain::<i32>::new(Shared::null(), 3, &guard).count(), 0);

        free(newest, &guard);
    }
}
