//! Chunk buffer pool for pipe writes
//!
//! Every `write` on a pipe endpoint copies the caller's bytes into a chunk
//! buffer that travels through the queue to the peer. This module keeps a
//! thread-safe free list of those buffers so a steady stream of writes does
//! not allocate once the pool has warmed up.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A thread-safe pool of chunk buffers
///
/// The pool is a shared free list of byte vectors. Cloning a `BufferPool`
/// yields another handle to the same free list, so buffers released through
/// one handle can be acquired through any other.
///
/// # Examples
///
/// ```rust
/// use horizon_pipes::buffer_pool::BufferPool;
///
/// let pool = BufferPool::new(4, 1024, 16);
/// let mut buffer = pool.acquire();
///
/// buffer.extend_from_slice(b"hello");
///
/// // Return buffer to pool when the peer has consumed it
/// pool.release(buffer);
/// assert_eq!(pool.available_count(), 4);
/// ```
#[derive(Clone, Debug)]
pub struct BufferPool {
    /// Internal storage for available buffers
    buffers: Arc<Mutex<VecDeque<Vec<u8>>>>,
    /// Default capacity for new buffers
    default_capacity: usize,
    /// Maximum number of buffers to keep in pool
    max_buffers: usize,
}

impl BufferPool {
    /// Creates a new buffer pool
    ///
    /// # Arguments
    ///
    /// * `initial_count` - Number of buffers to pre-allocate
    /// * `buffer_capacity` - Default capacity for each buffer in bytes
    /// * `max_buffers` - Number of released buffers retained for reuse
    pub fn new(initial_count: usize, buffer_capacity: usize, max_buffers: usize) -> Self {
        let max_buffers = max_buffers.max(initial_count);
        let mut buffers = VecDeque::with_capacity(initial_count);

        for _ in 0..initial_count {
            buffers.push_back(Vec::with_capacity(buffer_capacity));
        }

        Self {
            buffers: Arc::new(Mutex::new(buffers)),
            default_capacity: buffer_capacity,
            max_buffers,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Vec<u8>>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires an empty buffer from the pool
    ///
    /// If no buffers are available a new one is allocated with the default
    /// capacity, so this never blocks and never fails.
    pub fn acquire(&self) -> Vec<u8> {
        match self.lock().pop_front() {
            Some(buffer) => buffer,
            None => {
                pipe_debug!("buffer pool empty, allocating {} byte buffer", self.default_capacity);
                Vec::with_capacity(self.default_capacity)
            }
        }
    }

    /// Acquires a buffer holding a copy of `data`
    pub fn acquire_copy(&self, data: &[u8]) -> Vec<u8> {
        let mut buffer = self.acquire();
        buffer.extend_from_slice(data);
        buffer
    }

    /// Returns a buffer to the pool for reuse
    ///
    /// The buffer is cleared and shrunk back to the default capacity before
    /// it is stored, so one large write does not pin its allocation in the
    /// pool. If the pool already holds `max_buffers` buffers the released one
    /// is dropped.
    pub fn release(&self, mut buffer: Vec<u8>) {
        buffer.clear();
        buffer.shrink_to(self.default_capacity);

        let mut buffers = self.lock();
        if buffers.len() < self.max_buffers {
            buffers.push_back(buffer);
        } else {
            pipe_debug!("buffer pool at capacity ({}), dropping buffer", self.max_buffers);
        }
    }

    /// Returns the number of buffers currently available in the pool
    pub fn available_count(&self) -> usize {
        self.lock().len()
    }

    /// Returns the default buffer capacity in bytes
    pub fn default_capacity(&self) -> usize {
        self.default_capacity
    }
}

impl Default for BufferPool {
    /// 1024 retained buffers of 4KB, none pre-allocated
    fn default() -> Self {
        Self::new(0, 4096, 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_pool_basic_operations() {
        let pool = BufferPool::new(4, 1024, 8);

        assert_eq!(pool.available_count(), 4);

        let buffer = pool.acquire();
        assert_eq!(buffer.capacity(), 1024);
        assert_eq!(pool.available_count(), 3);

        pool.release(buffer);
        assert_eq!(pool.available_count(), 4);
    }

    #[test]
    fn test_released_buffer_is_cleared() {
        let pool = BufferPool::new(0, 64, 8);

        let buffer = pool.acquire_copy(b"stale bytes");
        assert_eq!(buffer, b"stale bytes");
        pool.release(buffer);

        let reused = pool.acquire();
        assert!(reused.is_empty());
        assert!(reused.capacity() >= 11);
    }

    #[test]
    fn test_oversized_buffer_is_shrunk_on_release() {
        let pool = BufferPool::new(0, 1024, 8);

        let large = pool.acquire_copy(&vec![7u8; 1 << 20]);
        assert!(large.capacity() >= 1 << 20);
        pool.release(large);

        let reused = pool.acquire();
        assert!(reused.is_empty());
        assert!(reused.capacity() >= 1024);
        assert!(reused.capacity() < 1 << 20);
    }

    #[test]
    fn test_buffer_pool_overflow_allocation() {
        let pool = BufferPool::new(2, 256, 2);

        let buffers: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        assert_eq!(pool.available_count(), 0);
        for buffer in &buffers {
            assert_eq!(buffer.capacity(), 256);
        }

        // Only `max_buffers` are retained
        for buffer in buffers {
            pool.release(buffer);
        }
        assert_eq!(pool.available_count(), 2);
    }

    #[test]
    fn test_clones_share_free_list() {
        let pool = BufferPool::new(0, 16, 4);
        let other = pool.clone();

        other.release(Vec::new());
        assert_eq!(pool.available_count(), 1);
    }
}
