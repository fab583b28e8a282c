//! Immutable window descriptions and the pure transitions between them.
//!
//! A [`Snapshot`] names a contiguous run of the node chain: `size` nodes
//! from `newest` down to `oldest`. Transitions never touch a published
//! node. They allocate the incoming nodes, graft them on top of the
//! previous head and describe the new window; whatever slides out of the
//! window is detached afterwards by the thread that installed it.

use crate::node::{Chain, Node};
use crossbeam_epoch::{Atomic, Guard, Owned, Shared};
use std::sync::atomic::Ordering;

/// The queue's visible content at one instant.
///
/// Fields are written once at construction. A snapshot reaches other
/// threads only through the controller's cell, whose acquire load makes
/// the fields visible, so they are read with `Relaxed`.
pub(crate) struct Snapshot<T> {
    capacity: usize,
    size: usize,
    newest: Atomic<Node<T>>,
    oldest: Atomic<Node<T>>,
}

impl<T> Snapshot<T> {
    pub(crate) fn empty(capacity: usize) -> Self {
        Self {
            capacity,
            size: 0,
            newest: Atomic::null(),
            oldest: Atomic::null(),
        }
    }

    fn with(
        capacity: usize,
        size: usize,
        newest: Shared<'_, Node<T>>,
        oldest: Shared<'_, Node<T>>,
    ) -> Self {
        debug_assert!(size <= capacity);
        debug_assert_eq!(size == 0, newest.is_null());
        debug_assert_eq!(size == 0, oldest.is_null());
        Self {
            capacity,
            size,
            newest: Atomic::from(newest),
            oldest: Atomic::from(oldest),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn newest<'g>(&self, guard: &'g Guard) -> Shared<'g, Node<T>> {
        self.newest.load(Ordering::Relaxed, guard)
    }

    #[inline]
    pub(crate) fn oldest<'g>(&self, guard: &'g Guard) -> Shared<'g, Node<T>> {
        self.oldest.load(Ordering::Relaxed, guard)
    }

    /// The window, newest-first.
    pub(crate) fn chain<'g>(&self, guard: &'g Guard) -> Chain<'g, T> {
        Chain::new(self.newest(guard), self.size, guard)
    }

    /// The node `n` steps below `newest`; `n` must lie inside the window.
    fn node_at<'g>(&self, n: usize, guard: &'g Guard) -> Shared<'g, Node<T>> {
        debug_assert!(n < self.size);
        // SAFETY: window nodes stay allocated while `guard` is pinned.
        let node = unsafe { self.newest(guard).as_ref() }
            .and_then(|head| head.at(n, guard))
            .expect("snapshot window is shorter than its size");
        Shared::from(node as *const Node<T>)
    }

    /// Builds a private chain from `values`, oldest first.
    ///
    /// Only the last `capacity` values get a node. The rest come back as
    /// overflow, oldest-first, without ever being linked.
    pub(crate) fn build<I>(capacity: usize, values: I, guard: &Guard) -> (Self, Vec<T>)
    where
        I: IntoIterator<Item = T>,
    {
        let mut overflow: Vec<T> = values.into_iter().collect();
        let kept = overflow.split_off(overflow.len().saturating_sub(capacity));

        let size = kept.len();
        let mut newest = Shared::null();
        let mut oldest = Shared::null();
        for value in kept {
            let node = Owned::new(Node::new(value)).into_shared(guard);
            // SAFETY: just allocated, nobody else can see it.
            unsafe { node.deref() }.link(newest);
            if oldest.is_null() {
                oldest = node;
            }
            newest = node;
        }
        (Self::with(capacity, size, newest, oldest), overflow)
    }

    /// Stacks the private `incoming` window on top of `self`.
    ///
    /// The graft rewrites `incoming.oldest.next`, so `incoming` must not
    /// have been published. Calling it again after a failed install simply
    /// re-points the graft at the fresher head.
    pub(crate) fn append(&self, incoming: &Self, guard: &Guard) -> Self {
        debug_assert!(incoming.size > 0);
        let capacity = self.capacity;
        let incoming_newest = incoming.newest(guard);
        let incoming_oldest = incoming.oldest(guard);
        // SAFETY: `incoming` is non-empty and still private.
        unsafe { incoming_oldest.deref() }.link(self.newest(guard));

        if incoming.size == capacity {
            return Self::with(capacity, capacity, incoming_newest, incoming_oldest);
        }
        if self.size + incoming.size <= capacity {
            let oldest = if self.size == 0 {
                incoming_oldest
            } else {
                self.oldest(guard)
            };
            return Self::with(
                capacity,
                self.size + incoming.size,
                incoming_newest,
                oldest,
            );
        }
        let oldest = self.node_at(capacity - incoming.size - 1, guard);
        Self::with(capacity, capacity, incoming_newest, oldest)
    }

    /// Drops the `count` oldest values from the window.
    pub(crate) fn shrink(&self, count: usize, guard: &Guard) -> Self {
        if count >= self.size {
            return Self::empty(self.capacity);
        }
        let size = self.size - count;
        Self::with(
            self.capacity,
            size,
            self.newest(guard),
            self.node_at(size - 1, guard),
        )
    }

    /// Nodes that were visible in `self` (or grafted by `added` incoming
    /// values) but are outside `next`, newest-first.
    fn detached<'g>(&self, next: &Self, added: usize, guard: &'g Guard) -> Chain<'g, T> {
        let count = (self.size + added).saturating_sub(next.size);
        let head = if next.size == 0 {
            self.newest(guard)
        } else {
            // SAFETY: a non-empty window has an oldest node.
            unsafe { next.oldest(guard).deref() }.next(guard)
        };
        Chain::new(head, count, guard)
    }

    /// Retires every node `next` dropped from `self` and returns their
    /// values oldest-first.
    ///
    /// # Safety
    ///
    /// `next` must be the snapshot that replaced `self` in the cell and the
    /// caller the thread whose CAS installed it. That thread is the only
    /// owner of the detached nodes, so each one is retired exactly once.
    pub(crate) unsafe fn purge(&self, next: &Self, added: usize, guard: &Guard) -> Vec<T>
    where
        T: Clone,
    {
        let mut values = Vec::new();
        for node in self.detached(next, added, guard) {
            values.push(node.value.clone());
            // SAFETY: owned by the caller; pinned readers of `self` keep the
            // node alive until they unpin.
            unsafe { guard.defer_destroy(Shared::from(node as *const Node<T>)) };
        }
        values.reverse();
        values
    }

    /// Like [`purge`](Self::purge) without collecting the values.
    ///
    /// # Safety
    ///
    /// Same contract as [`purge`](Self::purge).
    pub(crate) unsafe fn reclaim(&self, next: &Self, added: usize, guard: &Guard) {
        for node in self.detached(next, added, guard) {
            // SAFETY: see `purge`.
            unsafe { guard.defer_destroy(Shared::from(node as *const Node<T>)) };
        }
    }

    /// The `n` oldest values (all of them if `n` exceeds the size),
    /// oldest-first.
    pub(crate) fn peek_window(&self, n: usize, guard: &Guard) -> Vec<T>
    where
        T: Clone,
    {
        let n = n.min(self.size);
        match n {
            0 => Vec::new(),
            1 => {
                // SAFETY: window nodes stay allocated while `guard` is pinned.
                let oldest = unsafe { self.oldest(guard).as_ref() };
                oldest.map(|node| node.value.clone()).into_iter().collect()
            }
            _ => {
                let start = self.node_at(self.size - n, guard);
                let mut values: Vec<T> = Chain::new(start, n, guard)
                    .map(|node| node.value.clone())
                    .collect();
                values.reverse();
                values
            }
        }
    }
}
