//! droplast: a lock-free bounded queue that drops its oldest elements.
//!
//! [`DropQueue`] keeps at most `capacity` values. Pushing into a full queue
//! never fails and never blocks: the oldest values make room and are handed
//! back to the caller.
//!
//! # Key Features
//!
//! - **Lock-Free**: every mutation is one compare-and-swap on a snapshot
//!   cell, retried on conflict
//! - **Persistent Chain**: snapshots share nodes; a push allocates only the
//!   nodes it adds
//! - **Exact Bound**: every installed snapshot holds at most `capacity`
//!   values, also under contention
//! - **Epoch Reclamation**: evicted nodes are retired by the thread that
//!   evicted them and freed once no reader can observe them
//!
//! # Example
//!
//! ```rust
//! use droplast::DropQueue;
//!
//! let queue = DropQueue::new(20).unwrap();
//!
//! let evicted = queue.push(1..=23);
//! assert_eq!(evicted, vec![1, 2, 3]);
//! assert_eq!(queue.to_vec(), (4..=23).collect::<Vec<_>>());
//!
//! assert_eq!(queue.poll(4), vec![4, 5, 6, 7]);
//! assert_eq!(queue.iter_rev().next(), Some(23));
//! ```

#![warn(missing_docs)]

mod error;
mod iter;
mod node;
mod queue;
mod snapshot;

pub use error::{Error, Result};
pub use iter::{Iter, RevIter};
pub use queue::DropQueue;
