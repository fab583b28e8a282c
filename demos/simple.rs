//! Simple example demonstrating DropQueue's basic API
//!
//! Run with `RUST_LOG=droplast=trace` to see the queue's own events.

use droplast::DropQueue;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Keep the five most recent readings
    let readings = DropQueue::new(5).expect("capacity is non-zero");

    // Fill past capacity: the oldest values come back to the caller
    let dropped = readings.push(1..=7);
    println!("dropped while filling: {:?}", dropped);
    println!("window (oldest first): {:?}", readings.to_vec());
    println!("window (newest first): {:?}", readings.iter_rev().collect::<Vec<_>>());

    // Consume from the old end
    println!("polled: {:?}", readings.poll(2));
    println!("peek: {:?}", readings.peek());

    // Share between threads; the bound holds under contention
    let shared = Arc::new(DropQueue::new(16).expect("capacity is non-zero"));
    let handles: Vec<_> = (0..4)
        .map(|tid| {
            let shared = shared.clone();
            thread::spawn(move || {
                let mut dropped = 0;
                for i in 0..1_000 {
                    dropped += shared.push_one(tid * 1_000 + i).is_some() as usize;
                }
                dropped
            })
        })
        .collect();

    let dropped: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    println!("dropped under contention: {}", dropped);
    println!("retained: {} of {}", shared.len(), shared.capacity());
    assert_eq!(dropped + shared.len(), 4_000);
}
