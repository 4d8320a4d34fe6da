//! Bounded hand-off queue between the receiver and the dispatcher.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::model::TelemetryBatch;

/// Default number of batches held before the oldest is evicted.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Bounded FIFO with drop-oldest overflow.
///
/// `push` never blocks and is safe to call from synchronous callbacks.
/// `pop_timeout` waits asynchronously for an item.
#[derive(Debug)]
pub struct BatchQueue<T = TelemetryBatch> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    available: Notify,
}

/// Shareable queue handle.
pub type SharedQueue = Arc<BatchQueue>;

impl<T> BatchQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_QUEUE_CAPACITY))),
            capacity,
            available: Notify::new(),
        }
    }

    /// Append an item, evicting and returning the oldest one when full.
    pub fn push(&self, item: T) -> Option<T> {
        let evicted = {
            let mut items = self.items.lock();
            let evicted = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(item);
            evicted
        };

        self.available.notify_one();
        evicted
    }

    /// Take the oldest item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Take the oldest item, waiting up to `timeout` for one to arrive.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;

        loop {
            let notified = self.available.notified();

            if let Some(item) = self.try_pop() {
                return Some(item);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_pop();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = BatchQueue::new(10);
        for i in 0..5 {
            assert!(queue.push(i).is_none());
        }

        let drained: Vec<i32> = std::iter::from_fn(|| queue.try_pop()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let queue = BatchQueue::new(3);
        let evicted: Vec<i32> = (0..5).filter_map(|i| queue.push(i)).collect();

        assert_eq!(evicted, vec![0, 1]);
        assert_eq!(queue.len(), 3);

        let drained: Vec<i32> = std::iter::from_fn(|| queue.try_pop()).collect();
        assert_eq!(drained, vec![2, 3, 4]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = BatchQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.push(1).is_none());
        assert_eq!(queue.push(2), Some(1));
    }

    #[tokio::test]
    async fn test_pop_timeout_when_empty() {
        let queue: BatchQueue<u8> = BatchQueue::new(4);
        let started = std::time::Instant::now();

        assert!(queue.pop_timeout(Duration::from_millis(50)).await.is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_pop_returns_queued_item_immediately() {
        let queue = BatchQueue::new(4);
        queue.push("a");

        let item = queue.pop_timeout(Duration::from_secs(5)).await;
        assert_eq!(item, Some("a"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pop_wakes_on_push() {
        let queue = Arc::new(BatchQueue::new(4));

        let producer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                queue.push(99u32);
            })
        };

        let item = queue.pop_timeout(Duration::from_secs(5)).await;
        assert_eq!(item, Some(99));
        producer.join().unwrap();
    }
}
