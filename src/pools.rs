//! Shared resource pools behind connection pairs
//!
//! A `PipePools` bundles the buffer pool and the queue pool that pairs draw
//! from. Pairs built with [`PipeConns::new`](crate::PipeConns::new) share the
//! process-wide instance returned by [`PipePools::global`]; pairs built from
//! a custom [`PipeConfig`] share a pool set created for that configuration.

use std::sync::{Arc, OnceLock};

use crate::buffer_pool::BufferPool;
use crate::config::PipeConfig;
use crate::queue::{Frame, PipeQueue, QueueReceiver, QueueSender};
use crate::queue_pool::QueuePool;

/// Buffer and queue pools used by a family of connection pairs
#[derive(Debug)]
pub struct PipePools {
    buffers: BufferPool,
    queues: QueuePool,
}

static GLOBAL: OnceLock<Arc<PipePools>> = OnceLock::new();

impl PipePools {
    /// Creates a fresh pool set for `cfg`
    pub fn new(cfg: &PipeConfig) -> Arc<Self> {
        Arc::new(Self {
            buffers: BufferPool::new(cfg.initial_buffers, cfg.buffer_capacity, cfg.max_buffers),
            queues: QueuePool::new(cfg.effective_queue_capacity(), cfg.max_queues),
        })
    }

    /// The process-wide pool set built from `PipeConfig::default()`
    pub fn global() -> Arc<Self> {
        GLOBAL
            .get_or_init(|| PipePools::new(&PipeConfig::default()))
            .clone()
    }

    /// Pool of chunk buffers
    pub fn buffers(&self) -> &BufferPool {
        &self.buffers
    }

    /// Pool of idle queues
    pub fn queues(&self) -> &QueuePool {
        &self.queues
    }

    pub(crate) fn acquire_queue(&self) -> PipeQueue {
        self.queues.acquire()
    }

    pub(crate) fn release_queue(&self, queue: PipeQueue) {
        self.queues.release(queue, &self.buffers);
    }

    /// Returns whatever is left of a split queue
    ///
    /// A queue whose sending or receiving end was dropped is disconnected for
    /// good, so only its queued chunks are recycled.
    pub(crate) fn reclaim(&self, tx: Option<QueueSender>, rx: Option<QueueReceiver>) {
        match (tx, rx) {
            (Some(tx), Some(rx)) => self.release_queue(PipeQueue::from_parts(tx, rx)),
            (None, Some(rx)) => {
                for frame in rx.drain() {
                    if let Frame::Data(buffer) = frame {
                        self.buffers.release(buffer);
                    }
                }
                pipe_debug!("discarding disconnected pipe queue");
            }
            (_, None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_is_shared() {
        let a = PipePools::global();
        let b = PipePools::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.queues().queue_capacity(), 4);
    }

    #[test]
    fn test_custom_pools_follow_config() {
        let pools = PipePools::new(&PipeConfig::low_latency());
        assert_eq!(pools.queues().queue_capacity(), 1);
        assert_eq!(pools.buffers().default_capacity(), 512);

        let queue = pools.acquire_queue();
        pools.release_queue(queue);
        assert_eq!(pools.queues().available_count(), 1);
    }

    #[test]
    fn test_reclaim_split_queue() {
        let pools = PipePools::new(&PipeConfig::default());

        let (tx, rx) = pools.acquire_queue().split();
        tx.push(Frame::Data(b"kept".to_vec())).unwrap();
        pools.reclaim(Some(tx), Some(rx));
        assert_eq!(pools.queues().available_count(), 1);
        assert_eq!(pools.buffers().available_count(), 1);

        // Without its sender the queue is disconnected and not pooled.
        let (tx, rx) = pools.acquire_queue().split();
        tx.push(Frame::Data(b"orphan".to_vec())).unwrap();
        drop(tx);
        pools.reclaim(None, Some(rx));
        assert_eq!(pools.queues().available_count(), 0);
        assert_eq!(pools.buffers().available_count(), 2);
    }
}
