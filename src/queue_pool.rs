//! Pool of idle pipe queues
//!
//! Queues are handed out empty and must come back empty. [`QueuePool::release`]
//! drains whatever is left in a queue, returning data chunks to the buffer
//! pool, before storing it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::buffer_pool::BufferPool;
use crate::queue::{Frame, PipeQueue};

/// A thread-safe pool of empty [`PipeQueue`]s of a single capacity
#[derive(Clone, Debug)]
pub struct QueuePool {
    queues: Arc<Mutex<VecDeque<PipeQueue>>>,
    capacity: usize,
    max_queues: usize,
}

impl QueuePool {
    /// Creates an empty pool of queues holding `capacity` frames each
    ///
    /// At most `max_queues` released queues are retained.
    pub fn new(capacity: usize, max_queues: usize) -> Self {
        Self {
            queues: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
            max_queues,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PipeQueue>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires an empty queue, allocating one if the pool is empty
    ///
    /// # Panics
    ///
    /// Panics if a pooled queue still holds frames. That can only happen if
    /// a queue was stored without going through [`QueuePool::release`], and
    /// handing it out would leak one pipe's data into another.
    pub fn acquire(&self) -> PipeQueue {
        let pooled = self.lock().pop_front();
        match pooled {
            Some(queue) => {
                if !queue.is_empty() {
                    panic!("BUG: non-empty pipe queue acquired ({} frames)", queue.len());
                }
                queue
            }
            None => {
                pipe_debug!("queue pool empty, allocating queue of capacity {}", self.capacity);
                PipeQueue::new(self.capacity)
            }
        }
    }

    /// Drains `queue` into `buffers` and returns it to the pool
    ///
    /// Any data still queued is discarded; its buffers go back to `buffers`.
    /// Queues of a different capacity are dropped instead of pooled.
    pub fn release(&self, queue: PipeQueue, buffers: &BufferPool) {
        for frame in queue.drain() {
            if let Frame::Data(buffer) = frame {
                buffers.release(buffer);
            }
        }

        if queue.capacity() != self.capacity {
            return;
        }
        let mut queues = self.lock();
        if queues.len() < self.max_queues {
            queues.push_back(queue);
        } else {
            pipe_debug!("queue pool at capacity ({}), dropping queue", self.max_queues);
        }
    }

    /// Number of idle queues in the pool
    pub fn available_count(&self) -> usize {
        self.lock().len()
    }

    /// Capacity of the queues this pool hands out
    pub fn queue_capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_allocates_on_demand() {
        let pool = QueuePool::new(4, 8);
        assert_eq!(pool.available_count(), 0);

        let queue = pool.acquire();
        assert_eq!(queue.capacity(), 4);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_release_drains_into_buffer_pool() {
        let pool = QueuePool::new(4, 8);
        let buffers = BufferPool::new(0, 16, 8);

        let queue = pool.acquire();
        queue.push(Frame::Data(b"left over".to_vec())).unwrap();
        queue.push(Frame::Data(b"more".to_vec())).unwrap();
        queue.push(Frame::Eof).unwrap();

        pool.release(queue, &buffers);
        assert_eq!(pool.available_count(), 1);
        assert_eq!(buffers.available_count(), 2);
        assert!(pool.acquire().is_empty());
    }

    #[test]
    fn test_retention_limit() {
        let pool = QueuePool::new(2, 1);
        let buffers = BufferPool::default();

        let a = pool.acquire();
        let b = pool.acquire();
        pool.release(a, &buffers);
        pool.release(b, &buffers);
        assert_eq!(pool.available_count(), 1);
    }

    #[test]
    fn test_foreign_capacity_is_not_pooled() {
        let pool = QueuePool::new(2, 4);
        pool.release(PipeQueue::new(8), &BufferPool::default());
        assert_eq!(pool.available_count(), 0);
    }

    #[test]
    #[should_panic(expected = "non-empty pipe queue acquired")]
    fn test_non_empty_queue_is_fatal() {
        let pool = QueuePool::new(2, 4);
        let queue = pool.acquire();
        queue.push(Frame::Eof).unwrap();
        // Bypass `release` so the queue goes back dirty.
        pool.lock().push_back(queue);
        let _ = pool.acquire();
    }
}
