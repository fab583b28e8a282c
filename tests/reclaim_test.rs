//! Reclamation behaviour: the live window is released when the queue is
//! dropped, and evicted values are eventually freed through the epoch.

use droplast::DropQueue;
use std::sync::Arc;
use std::thread;

/// Pins and flushes until `done` holds or the attempts run out.
fn settle(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..100_000 {
        if done() {
            return true;
        }
        crossbeam_epoch::pin().flush();
        thread::yield_now();
    }
    done()
}

fn tokens(n: usize) -> Vec<Arc<usize>> {
    (0..n).map(Arc::new).collect()
}

#[test]
fn drop_releases_the_window_immediately() {
    let tokens = tokens(5);
    let queue = DropQueue::new(8).unwrap();
    queue.push(tokens.iter().cloned());

    assert!(tokens.iter().all(|t| Arc::strong_count(t) == 2));

    // Reads hand out clones that die with the returned vectors.
    assert_eq!(queue.peek_n(3).len(), 3);
    assert_eq!(queue.iter_rev().count(), 5);
    assert!(tokens.iter().all(|t| Arc::strong_count(t) == 2));

    drop(queue);
    assert!(tokens.iter().all(|t| Arc::strong_count(t) == 1));
}

#[test]
fn drop_after_sliding_releases_the_window_immediately() {
    let tokens = tokens(12);
    let queue = DropQueue::new(4).unwrap();
    for t in &tokens {
        queue.push_one(t.clone());
    }
    queue.poll(1);

    let window: Vec<usize> = queue.to_vec().iter().map(|t| **t).collect();
    assert_eq!(window, vec![9, 10, 11]);

    drop(queue);
    assert!(tokens[9..].iter().all(|t| Arc::strong_count(t) == 1));
}

#[test]
#[cfg_attr(miri, ignore)]
fn evicted_values_are_eventually_freed() {
    let tokens = tokens(64);
    let queue = DropQueue::new(8).unwrap();

    for chunk in tokens.chunks(8) {
        queue.push(chunk.iter().cloned());
    }
    queue.poll(3);
    queue.remove(2);

    let (gone, kept) = tokens.split_at(61);
    assert!(settle(|| gone.iter().all(|t| Arc::strong_count(t) == 1)));
    assert!(kept.iter().all(|t| Arc::strong_count(t) == 2));

    queue.clear();
    assert!(settle(|| tokens.iter().all(|t| Arc::strong_count(t) == 1)));
}

#[test]
#[cfg_attr(miri, ignore)]
fn concurrent_churn_frees_everything() {
    let tokens = Arc::new(tokens(256));
    let queue = Arc::new(DropQueue::new(16).unwrap());
    let mut handles = vec![];

    for tid in 0..4 {
        let tokens = tokens.clone();
        let queue = queue.clone();
        handles.push(thread::spawn(move || {
            for round in 0..50 {
                let start = (tid * 64 + round) % 256;
                let batch: Vec<Arc<usize>> = tokens
                    .iter()
                    .cycle()
                    .skip(start)
                    .take(5)
                    .cloned()
                    .collect();
                queue.push(batch);
                queue.poll(2);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    drop(queue);
    assert!(settle(|| tokens.iter().all(|t| Arc::strong_count(t) == 1)));
}
