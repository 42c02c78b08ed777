//! Pipe configuration and pool tuning
//!
//! This module provides the configuration options for in-memory connection
//! pairs. The `PipeConfig` struct controls how much data may be in flight
//! between the two endpoints of a pair and how many reusable resources the
//! backing pools retain between pairs.
//!
//! # Tuning Categories
//!
//! ## Backpressure
//! - `queue_capacity`: number of writes that may be queued before the writer blocks
//!
//! ## Allocation Reuse
//! - `buffer_capacity`: initial capacity of freshly allocated chunk buffers
//! - `initial_buffers`: chunk buffers pre-allocated when a pool is created
//! - `max_buffers`/`max_queues`: retention limits for released resources
//!
//! # Examples
//!
//! ```rust
//! use horizon_pipes::PipeConfig;
//!
//! // Writers block as soon as a single chunk is pending
//! let lockstep = PipeConfig {
//!     queue_capacity: 1,
//!     ..Default::default()
//! };
//!
//! // Deep queues for bulk transfer benchmarks
//! let bulk = PipeConfig::high_throughput();
//! assert!(bulk.queue_capacity > lockstep.queue_capacity);
//! ```

/// Number of chunks a pipe queue holds before writers block.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// Configuration for connection pairs and the pools behind them
///
/// All parameters have defaults matching the classic in-memory pipe: four
/// queue slots per direction and unbounded growth of the pools under load,
/// with released resources retained up to a fixed limit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipeConfig {
    /// Capacity of each direction's queue, in chunks
    ///
    /// Every successful `write` occupies one slot until the peer reads it, and
    /// closing an endpoint occupies one slot with the end-of-stream marker.
    /// A value of `0` is treated as `1`.
    ///
    /// **Default**: `4`
    pub queue_capacity: usize,

    /// Initial capacity of chunk buffers allocated by the buffer pool
    ///
    /// Buffers grow past this size when a larger write arrives.
    ///
    /// **Default**: `4096`
    pub buffer_capacity: usize,

    /// Number of chunk buffers allocated up front
    ///
    /// **Default**: `0`
    pub initial_buffers: usize,

    /// Maximum number of released chunk buffers kept for reuse
    ///
    /// **Default**: `1024`
    pub max_buffers: usize,

    /// Maximum number of released queues kept for reuse
    ///
    /// **Default**: `256`
    pub max_queues: usize,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            buffer_capacity: 4096,
            initial_buffers: 0,
            max_buffers: 1024,
            max_queues: 256,
        }
    }
}

impl PipeConfig {
    /// Creates a configuration where writers and readers run in lockstep
    ///
    /// A single queue slot means a second write blocks until the peer has
    /// picked up the first one. Useful for exercising interleavings in tests.
    pub fn low_latency() -> Self {
        Self {
            queue_capacity: 1,
            buffer_capacity: 512,
            initial_buffers: 0,
            max_buffers: 256,
            max_queues: 64,
        }
    }

    /// Creates a configuration for bulk transfers
    ///
    /// # Trade-offs
    /// - Up to 64 chunks may be buffered per direction before backpressure applies
    /// - More memory is retained by the pools between pairs
    pub fn high_throughput() -> Self {
        Self {
            queue_capacity: 64,
            buffer_capacity: 64 * 1024,
            initial_buffers: 64,
            max_buffers: 4096,
            max_queues: 1024,
        }
    }

    /// Returns a copy of this configuration with a different queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Queue capacity actually used when building queues
    pub(crate) fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }
}
