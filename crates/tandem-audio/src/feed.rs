//! Channel-drained hand-off between capture callbacks and a ring.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::ring::RingBuffer;

/// How long the feed thread sleeps in `recv` before re-checking its stop flag.
const FEED_POLL: Duration = Duration::from_millis(50);

/// Moves sample buffers from a capture callback into a [`RingBuffer`].
///
/// Audio callbacks must not contend on anything slower than a short
/// mutex, so they do a single non-blocking send into an unbounded
/// channel; a dedicated thread drains the channel into the ring. On
/// [`stop`](RingFeed::stop) the thread empties whatever is still queued
/// before exiting, so a final flush of the ring sees every buffer that
/// was in flight.
pub struct RingFeed {
    sender: Sender<Vec<f32>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RingFeed {
    /// Spawn a feed thread draining into `ring`.
    pub fn spawn(name: &str, ring: Arc<Mutex<RingBuffer>>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name(format!("{name}-ring-feed"))
            .spawn(move || feed_loop(receiver, ring, flag))
            .expect("failed to spawn ring feed thread");

        Self {
            sender,
            running,
            handle: Some(handle),
        }
    }

    /// A sender for the producing callback. Sending never blocks.
    pub fn sender(&self) -> Sender<Vec<f32>> {
        self.sender.clone()
    }

    /// Stop the feed thread after it drains all queued buffers.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RingFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

fn feed_loop(receiver: Receiver<Vec<f32>>, ring: Arc<Mutex<RingBuffer>>, running: Arc<AtomicBool>) {
    debug!("ring feed started");

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(FEED_POLL) {
            Ok(samples) => ring.lock().write(&samples),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Producers may have raced the stop flag; empty the queue so nothing
    // captured before the stop is lost.
    let mut drained = 0usize;
    while let Ok(samples) = receiver.try_recv() {
        drained += samples.len();
        ring.lock().write(&samples);
    }
    if drained > 0 {
        trace!(drained, "flushed queued samples on shutdown");
    }

    debug!("ring feed exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_buffers_into_ring() {
        let ring = Arc::new(Mutex::new(RingBuffer::new(64)));
        let mut feed = RingFeed::spawn("test", Arc::clone(&ring));

        let tx = feed.sender();
        tx.send(vec![1.0, 2.0]).unwrap();
        tx.send(vec![3.0]).unwrap();

        feed.stop();
        assert_eq!(ring.lock().read(8), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn stop_flushes_queued_buffers() {
        let ring = Arc::new(Mutex::new(RingBuffer::new(1024)));
        let mut feed = RingFeed::spawn("flush", Arc::clone(&ring));

        let tx = feed.sender();
        for i in 0..100 {
            tx.send(vec![i as f32; 4]).unwrap();
        }

        // stop() must not drop anything still sitting in the channel.
        feed.stop();
        assert_eq!(ring.lock().count(), 400);
    }

    #[test]
    fn stop_is_idempotent() {
        let ring = Arc::new(Mutex::new(RingBuffer::new(8)));
        let mut feed = RingFeed::spawn("twice", ring);
        feed.stop();
        feed.stop();
    }
}
