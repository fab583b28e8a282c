//! `DropQueue<T>`: the bounded drop-oldest queue.
//!
//! The queue is a single cache-padded cell holding the current
//! [`Snapshot`]. Every mutation loads the snapshot, computes a successor
//! with the snapshot algebra and tries to install it with one
//! compare-and-swap. The winner of a transition then owns whatever fell out
//! of the window: it reads the values, retires the nodes and retires the
//! replaced snapshot. Losers retry against the fresher snapshot.

use crate::error::{Error, Result};
use crate::iter::{Iter, RevIter};
use crate::snapshot::Snapshot;
use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use crossbeam_utils::{Backoff, CachePadded};
use std::fmt;
use std::sync::atomic::Ordering;
use tracing::{debug, trace};

/// A lock-free bounded MPMC queue that discards its oldest elements when
/// new ones do not fit.
///
/// Index 0 of every sequence the queue returns is the oldest value. No
/// operation blocks: conflicting writers retry their compare-and-swap, and
/// readers work on whatever snapshot was current when they loaded it.
///
/// Values are shared between overlapping snapshots, so reads hand out
/// clones. Store `Arc<_>` for heavy payloads.
///
/// # Examples
///
/// ```rust
/// use droplast::DropQueue;
///
/// let queue = DropQueue::new(3).unwrap();
///
/// assert!(queue.push([1, 2, 3]).is_empty());
/// assert_eq!(queue.push([4, 5]), vec![1, 2]);
/// assert_eq!(queue.to_vec(), vec![3, 4, 5]);
///
/// assert_eq!(queue.poll(2), vec![3, 4]);
/// assert_eq!(queue.peek(), Some(5));
/// ```
pub struct DropQueue<T> {
    capacity: usize,
    current: CachePadded<Atomic<Snapshot<T>>>,
}

impl<T: Clone + Send + Sync + 'static> DropQueue<T> {
    /// Creates an empty queue holding at most `capacity` values.
    ///
    /// Fails with [`Error::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < 1 {
            return Err(Error::InvalidCapacity(capacity));
        }
        debug!(capacity, "drop queue created");
        Ok(Self {
            capacity,
            current: CachePadded::new(Atomic::new(Snapshot::empty(capacity))),
        })
    }

    // ---- Reading ----

    /// Maximum number of values the queue retains.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of values in the current snapshot.
    pub fn len(&self) -> usize {
        self.with_current(|snapshot, _| snapshot.len())
    }

    /// Returns `true` if the current snapshot holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The oldest value, without removing it.
    pub fn peek(&self) -> Option<T> {
        self.peek_n(1).pop()
    }

    /// The `n` oldest values (all of them if fewer), oldest-first, without
    /// removing them.
    pub fn peek_n(&self, n: usize) -> Vec<T> {
        self.with_current(|snapshot, guard| snapshot.peek_window(n, guard))
    }

    /// Every value, oldest-first.
    pub fn to_vec(&self) -> Vec<T> {
        self.with_current(|snapshot, guard| snapshot.peek_window(snapshot.len(), guard))
    }

    /// Iterates oldest-first over the values of the current snapshot.
    ///
    /// The chain is linked newest to oldest, so this view is collected up
    /// front. Prefer [`iter_rev`](Self::iter_rev) when order does not matter.
    pub fn iter(&self) -> Iter<T> {
        Iter::new(self.to_vec())
    }

    /// Iterates newest-first over the values of the current snapshot,
    /// walking the chain lazily.
    ///
    /// The iterator pins the current epoch until it is dropped, which holds
    /// back reclamation of everything retired in the meantime.
    pub fn iter_rev(&self) -> RevIter<'_, T> {
        let guard = epoch::pin();
        let current = self.current.load(Ordering::Acquire, &guard);
        // SAFETY: the cell never holds null.
        let snapshot = unsafe { current.deref() };
        let newest = snapshot.newest(&guard).as_raw();
        let len = snapshot.len();
        RevIter::new(guard, newest, len)
    }

    fn with_current<R>(&self, f: impl FnOnce(&Snapshot<T>, &Guard) -> R) -> R {
        let guard = epoch::pin();
        let current = self.current.load(Ordering::Acquire, &guard);
        // SAFETY: the cell never holds null, and replaced snapshots are
        // retired through the epoch.
        f(unsafe { current.deref() }, &guard)
    }

    // ---- Writing ----

    /// Appends `values` in order and returns what had to make room,
    /// oldest-first.
    ///
    /// The result lists evicted queue values first, then any leading input
    /// values that did not fit at all (only possible when more than
    /// `capacity` values are pushed at once). Empty input is a no-op.
    pub fn push<I>(&self, values: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        let guard = epoch::pin();
        let (incoming, mut overflow) = Snapshot::build(self.capacity, values, &guard);
        if incoming.len() == 0 {
            return overflow;
        }

        let backoff = Backoff::new();
        let mut retries = 0usize;
        loop {
            let previous = self.current.load(Ordering::Acquire, &guard);
            // SAFETY: non-null, kept alive by `guard`.
            let prev = unsafe { previous.deref() };
            let candidate = Owned::new(prev.append(&incoming, &guard));

            match self.current.compare_exchange(
                previous,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
                &guard,
            ) {
                Ok(installed) => {
                    // SAFETY: our CAS replaced `prev` with `installed`.
                    let mut evicted =
                        unsafe { prev.purge(installed.deref(), incoming.len(), &guard) };
                    unsafe { self.retire(previous, &guard) };
                    evicted.append(&mut overflow);
                    if retries > 0 {
                        trace!(retries, "push installed after contention");
                    }
                    if !evicted.is_empty() {
                        trace!(evicted = evicted.len(), "push dropped oldest values");
                    }
                    return evicted;
                }
                Err(_) => {
                    retries += 1;
                    backoff.spin();
                }
            }
        }
    }

    /// Appends one value and returns the value it displaced, if any.
    pub fn push_one(&self, value: T) -> Option<T> {
        self.push(Some(value)).pop()
    }

    /// Removes the `n` oldest values and returns them oldest-first.
    ///
    /// Returns fewer than `n` values when the queue holds fewer. The result
    /// is read straight from the snapshot this call replaced, so it is
    /// exactly what the winning transition removed.
    pub fn poll(&self, n: usize) -> Vec<T> {
        self.shrink("poll", n, |previous, installed, guard| {
            let polled = previous.peek_window(n, guard);
            // SAFETY: `installed` replaced `previous` through our CAS.
            unsafe { previous.reclaim(installed, 0, guard) };
            polled
        })
    }

    /// Removes and returns the oldest value.
    pub fn poll_one(&self) -> Option<T> {
        self.poll(1).pop()
    }

    /// Removes the `n` oldest values, reporting the ones detached by the
    /// purge step, oldest-first.
    ///
    /// Has the same effect on the queue as [`poll`](Self::poll). The
    /// returned values are best effort: they are the nodes this call's purge
    /// walked, which is what [`poll`](Self::poll) returns whenever the two
    /// are not racing other writers. Use `poll` when the exact values matter.
    pub fn remove(&self, n: usize) -> Vec<T> {
        self.shrink("remove", n, |previous, installed, guard| {
            // SAFETY: `installed` replaced `previous` through our CAS.
            unsafe { previous.purge(installed, 0, guard) }
        })
    }

    /// Empties the queue and returns everything it held, oldest-first.
    pub fn clear(&self) -> Vec<T> {
        let guard = epoch::pin();
        let empty = Snapshot::empty(self.capacity);
        let previous = self.current.swap(
            Owned::new(Snapshot::empty(self.capacity)),
            Ordering::AcqRel,
            &guard,
        );
        // SAFETY: the swap handed `previous` to this thread alone.
        let drained = unsafe { previous.deref().purge(&empty, 0, &guard) };
        unsafe { self.retire(previous, &guard) };
        debug!(drained = drained.len(), "drop queue cleared");
        drained
    }

    /// Shared retry loop of `poll` and `remove`.
    fn shrink<F>(&self, op: &'static str, n: usize, removed: F) -> Vec<T>
    where
        F: Fn(&Snapshot<T>, &Snapshot<T>, &Guard) -> Vec<T>,
    {
        if n == 0 {
            return Vec::new();
        }
        let guard = epoch::pin();
        let backoff = Backoff::new();
        let mut retries = 0usize;
        loop {
            let previous = self.current.load(Ordering::Acquire, &guard);
            // SAFETY: non-null, kept alive by `guard`.
            let prev = unsafe { previous.deref() };
            if prev.len() == 0 {
                return Vec::new();
            }
            let candidate = Owned::new(prev.shrink(n, &guard));

            match self.current.compare_exchange(
                previous,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
                &guard,
            ) {
                Ok(installed) => {
                    // SAFETY: `installed` is non-null and kept alive by `guard`.
                    let values = removed(prev, unsafe { installed.deref() }, &guard);
                    unsafe { self.retire(previous, &guard) };
                    if retries > 0 {
                        trace!(op, retries, "installed after contention");
                    }
                    return values;
                }
                Err(_) => {
                    retries += 1;
                    backoff.spin();
                }
            }
        }
    }

    /// Retires a snapshot this thread just replaced.
    ///
    /// # Safety
    ///
    /// `snapshot` must have been unlinked from the cell by this thread.
    unsafe fn retire(&self, snapshot: Shared<'_, Snapshot<T>>, guard: &Guard) {
        unsafe { guard.defer_destroy(snapshot) };
    }
}

impl<T> Drop for DropQueue<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` rules out concurrent access. Nodes outside the
        // window were already retired by the transitions that dropped them.
        unsafe {
            let guard = epoch::unprotected();
            let current = self.current.load(Ordering::Relaxed, guard);
            let snapshot = current.into_owned();
            let mut node = snapshot.newest(guard);
            for _ in 0..snapshot.len() {
                let next = node.deref().next(guard);
                drop(node.into_owned());
                node = next;
            }
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Extend<T> for DropQueue<T> {
    /// Pushes everything, discarding what gets evicted.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.push(iter);
    }
}

impl<'a, T: Clone + Send + Sync + 'static> IntoIterator for &'a DropQueue<T> {
    type Item = T;
    type IntoIter = Iter<T>;

    fn into_iter(self) -> Iter<T> {
        self.iter()
    }
}

impl<T: Clone + Send + Sync + 'static> Clone for DropQueue<T> {
    fn clone(&self) -> Self {
        let queue = Self {
            capacity: self.capacity,
            current: CachePadded::new(Atomic::new(Snapshot::empty(self.capacity))),
        };
        queue.push(self.to_vec());
        queue
    }
}

impl<T: Clone + Send + Sync + 'static + PartialEq> PartialEq for DropQueue<T> {
    fn eq(&self, other: &Self) -> bool {
        self.capacity == other.capacity && self.to_vec() == other.to_vec()
    }
}

impl<T: Clone + Send + Sync + 'static + Eq> Eq for DropQueue<T> {}

impl<T: Clone + Send + Sync + 'static + fmt::Debug> fmt::Debug for DropQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.to_vec();
        f.debug_struct("DropQueue")
            .field("capacity", &self.capacity)
            .field("len", &values.len())
            .field("values", &values)
            .finish()
    }
}
