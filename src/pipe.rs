//! In-memory duplex connection pairs
//!
//! This module provides [`PipeConns`], two linked endpoints that behave like
//! the two ends of a connected stream socket without touching the operating
//! system. Bytes written on one endpoint are read from the other, each
//! direction is an independent half that can be closed on its own, and a
//! small bounded queue per direction throttles a fast writer to the pace of
//! its reader.
//!
//! # Key Features
//!
//! - **Stream semantics**: `std::io::Read`/`Write` on both `PipeConn` and `&PipeConn`
//! - **Half-close**: closing an endpoint signals end-of-stream to its peer only
//! - **Backpressure**: a write blocks while the peer's queue is full
//! - **Pooling**: chunk buffers and queues are recycled across writes and pairs
//!
//! # Examples
//!
//! ```rust
//! use horizon_pipes::PipeConns;
//! use std::io::{Read, Write};
//! use std::thread;
//!
//! let (mut client, mut server) = PipeConns::new().into_conns();
//!
//! let echo = thread::spawn(move || {
//!     let mut buf = [0u8; 64];
//!     let n = server.read(&mut buf).unwrap();
//!     server.write_all(&buf[..n]).unwrap();
//!     server.close().unwrap();
//! });
//!
//! client.write_all(b"ping").unwrap();
//! let mut reply = Vec::new();
//! client.read_to_end(&mut reply).unwrap();
//! assert_eq!(reply, b"ping");
//!
//! client.close().unwrap();
//! echo.join().unwrap();
//! ```

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::addr::PipeAddr;
use crate::config::PipeConfig;
use crate::error::PipeError;
use crate::pools::PipePools;
use crate::queue::{Frame, QueueReceiver, QueueSender, TryPop};

static NEXT_PAIR_ID: AtomicU64 = AtomicU64::new(1);

/// Creates a connected pair of endpoints backed by the global pools
///
/// Shorthand for `PipeConns::new().into_conns()`.
pub fn pipe() -> (PipeConn, PipeConn) {
    PipeConns::new().into_conns()
}

/// A pair of linked in-memory endpoints
///
/// Whatever `conn1` writes, `conn2` reads, and vice versa. Construction
/// cannot fail: queues come from the pool, which allocates when empty.
///
/// The queues are returned to their pool once both endpoints have been
/// closed, and not before, so data already written by an endpoint stays
/// readable by its peer after that endpoint closes.
pub struct PipeConns {
    conn1: PipeConn,
    conn2: PipeConn,
}

impl PipeConns {
    /// Creates a pair backed by the process-wide pools
    ///
    /// Each direction has a queue of
    /// [`DEFAULT_QUEUE_CAPACITY`](crate::config::DEFAULT_QUEUE_CAPACITY) chunks.
    pub fn new() -> Self {
        Self::with_pools(PipePools::global())
    }

    /// Creates a pair backed by fresh pools built from `cfg`
    ///
    /// Pairs created this way do not share pools with each other. To reuse
    /// resources across many pairs with a custom configuration, build the
    /// pools once with [`PipePools::new`] and use [`PipeConns::with_pools`].
    pub fn with_config(cfg: &PipeConfig) -> Self {
        Self::with_pools(PipePools::new(cfg))
    }

    /// Creates a pair drawing its queues and buffers from `pools`
    pub fn with_pools(pools: Arc<PipePools>) -> Self {
        let (tx1, rx1) = pools.acquire_queue().split();
        let (tx2, rx2) = pools.acquire_queue().split();

        let id = NEXT_PAIR_ID.fetch_add(1, Ordering::Relaxed);
        pipe_trace!("pipe pair {} created (queue capacity {})", id, tx1.capacity());

        // conn1 reads queue 1 and writes queue 2; conn2 reads queue 2 and writes queue 1.
        let shared = Arc::new(Shared {
            id,
            sides: [Side::new(rx1, tx2), Side::new(rx2, tx1)],
            released: AtomicBool::new(false),
            pools,
        });

        Self {
            conn1: PipeConn {
                shared: shared.clone(),
                side: 0,
            },
            conn2: PipeConn { shared, side: 1 },
        }
    }

    /// The first endpoint
    pub fn conn1(&self) -> &PipeConn {
        &self.conn1
    }

    /// The second endpoint
    pub fn conn2(&self) -> &PipeConn {
        &self.conn2
    }

    /// Splits the pair into its two endpoints
    pub fn into_conns(self) -> (PipeConn, PipeConn) {
        (self.conn1, self.conn2)
    }

    /// Closes both endpoints
    ///
    /// Like [`PipeConn::close`], each close blocks while the queue it signals
    /// end-of-stream on is full.
    pub fn close(&self) -> io::Result<()> {
        self.conn1.close()?;
        self.conn2.close()
    }

    /// Returns true once the pair's queues have gone back to the pool
    pub fn is_released(&self) -> bool {
        self.conn1.shared.released.load(Ordering::Acquire)
    }
}

impl Default for PipeConns {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PipeConns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeConns")
            .field("id", &self.conn1.shared.id)
            .field("released", &self.is_released())
            .finish()
    }
}

/// State shared by the two endpoints of a pair
struct Shared {
    id: u64,
    sides: [Side; 2],
    released: AtomicBool,
    pools: Arc<PipePools>,
}

struct Side {
    write: Mutex<WriteHalf>,
    read: Mutex<ReadHalf>,
}

/// Sending half of an endpoint; its mutex is the endpoint's write lock
struct WriteHalf {
    closed: bool,
    queue: Option<QueueSender>,
}

/// Receiving half of an endpoint
///
/// `pending[offset..]` holds bytes from the last dequeued chunk that no read
/// has consumed yet.
struct ReadHalf {
    queue: Option<QueueReceiver>,
    pending: Option<Vec<u8>>,
    offset: usize,
    closed: bool,
}

enum Fill {
    Ready,
    WouldBlock,
    Eof,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Side {
    fn new(recv: QueueReceiver, send: QueueSender) -> Self {
        Self {
            write: Mutex::new(WriteHalf {
                closed: false,
                queue: Some(send),
            }),
            read: Mutex::new(ReadHalf {
                queue: Some(recv),
                pending: None,
                offset: 0,
                closed: false,
            }),
        }
    }
}

impl Shared {
    /// Returns the pair's queues and buffers to the pools if both endpoints
    /// are closed for writing
    ///
    /// Write locks are always taken side 0 first. Only the first caller to
    /// see both sides closed performs the release.
    fn release(&self) {
        let senders = {
            let mut first = lock(&self.sides[0].write);
            let mut second = lock(&self.sides[1].write);
            let both_closed = first.closed && second.closed;
            if !both_closed || self.released.swap(true, Ordering::AcqRel) {
                return;
            }
            [first.queue.take(), second.queue.take()]
        };

        // Every queue now ends in a marker or has lost its sender, so a
        // reader blocked in `pop` wakes up and lets go of its read lock.
        for (writer, tx) in senders.into_iter().enumerate() {
            let mut read = lock(&self.sides[1 - writer].read);
            read.closed = true;
            read.offset = 0;
            if let Some(buffer) = read.pending.take() {
                self.pools.buffers().release(buffer);
            }
            self.pools.reclaim(tx, read.queue.take());
        }
        pipe_trace!("pipe pair {} released", self.id);
    }
}

impl ReadHalf {
    fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|buffer| self.offset < buffer.len())
    }

    /// Makes sure `pending` has unread bytes, fetching the next chunk if needed
    fn fill(&mut self, pools: &PipePools, may_block: bool) -> Fill {
        if self.has_pending() {
            return Fill::Ready;
        }
        if let Some(buffer) = self.pending.take() {
            pools.buffers().release(buffer);
        }
        self.offset = 0;

        if self.closed {
            return Fill::Eof;
        }
        let Some(queue) = self.queue.as_ref() else {
            self.closed = true;
            return Fill::Eof;
        };

        let frame = if may_block {
            queue.pop()
        } else {
            match queue.try_pop() {
                TryPop::Frame(frame) => frame,
                TryPop::Empty => return Fill::WouldBlock,
            }
        };

        match frame {
            Frame::Data(buffer) => {
                self.pending = Some(buffer);
                Fill::Ready
            }
            Frame::Eof => {
                self.closed = true;
                Fill::Eof
            }
        }
    }

    fn copy_to(&mut self, dst: &mut [u8]) -> usize {
        let Some(buffer) = self.pending.as_ref() else {
            return 0;
        };
        let src = &buffer[self.offset..];
        let n = src.len().min(dst.len());
        dst[..n].copy_from_slice(&src[..n]);
        self.offset += n;
        n
    }
}

/// One endpoint of a [`PipeConns`] pair
///
/// Reads, writes, and closes may be issued from different threads through
/// `&PipeConn`. Each endpoint is meant to have one reader and one writer at
/// a time; concurrent writers are serialized by the write lock.
///
/// Dropping an endpoint never blocks. The peer reads whatever was already
/// written and then end-of-stream, and the peer's writes fail with
/// `ErrorKind::BrokenPipe`. Queues of a pair with an endpoint dropped before
/// both were closed are discarded instead of pooled.
pub struct PipeConn {
    shared: Arc<Shared>,
    side: usize,
}

impl PipeConn {
    fn half(&self) -> &Side {
        &self.shared.sides[self.side]
    }

    /// Reads into `dst`, blocking only until the first byte is available
    ///
    /// Once some bytes have been copied the call keeps draining chunks that
    /// are already queued and returns as soon as the queue is empty.
    fn read_chunks(&self, dst: &mut [u8]) -> io::Result<usize> {
        let mut read = lock(&self.half().read);
        let pools = &self.shared.pools;

        let mut may_block = true;
        let mut copied = 0;
        while copied < dst.len() {
            match read.fill(pools, may_block) {
                Fill::Ready => {}
                Fill::WouldBlock | Fill::Eof => break,
            }
            let n = read.copy_to(&mut dst[copied..]);
            if n > 0 {
                copied += n;
                may_block = false;
            }
        }
        Ok(copied)
    }

    /// Hands `data` to the peer as a single chunk
    fn write_chunk(&self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return if lock(&self.half().write).closed {
                Err(PipeError::WriteClosed.into())
            } else {
                Ok(0)
            };
        }

        let buffers = self.shared.pools.buffers();
        let buffer = buffers.acquire_copy(data);

        let write = lock(&self.half().write);
        match write.queue.as_ref() {
            Some(queue) if !write.closed => match queue.push(Frame::Data(buffer)) {
                Ok(()) => Ok(data.len()),
                Err(frame) => {
                    if let Frame::Data(buffer) = frame {
                        buffers.release(buffer);
                    }
                    Err(PipeError::PeerDropped.into())
                }
            },
            _ => {
                drop(write);
                buffers.release(buffer);
                Err(PipeError::WriteClosed.into())
            }
        }
    }

    /// Closes this endpoint for writing
    ///
    /// The peer's reads return the data written so far and then report
    /// end-of-stream. This endpoint can still read what the peer writes until
    /// the peer closes too, at which point the pair's resources go back to
    /// the pools.
    ///
    /// Closing blocks while the peer's queue is full, since the end-of-stream
    /// marker needs a slot. Closing an already closed endpoint does nothing.
    pub fn close(&self) -> io::Result<()> {
        {
            let mut write = lock(&self.half().write);
            if write.closed {
                return Ok(());
            }
            write.closed = true;
            if let Some(queue) = write.queue.as_ref() {
                // Fails only if the peer is gone, leaving no one to notify.
                let _ = queue.push(Frame::Eof);
            }
        }
        pipe_trace!("pipe pair {} endpoint {} closed", self.shared.id, self.side + 1);

        self.shared.release();
        Ok(())
    }

    /// Returns true once [`close`](PipeConn::close) has run on this endpoint
    pub fn is_write_closed(&self) -> bool {
        lock(&self.half().write).closed
    }

    /// Returns true once this endpoint has observed end-of-stream
    ///
    /// Waits for any read in progress on this endpoint to finish.
    pub fn is_read_closed(&self) -> bool {
        lock(&self.half().read).closed
    }

    /// Local address of the endpoint, always [`PipeAddr`]
    pub fn local_addr(&self) -> PipeAddr {
        PipeAddr
    }

    /// Remote address of the endpoint, always [`PipeAddr`]
    pub fn peer_addr(&self) -> PipeAddr {
        PipeAddr
    }

    /// Deadlines are not supported; always fails with `ErrorKind::Unsupported`
    ///
    /// Callers needing timeouts must wrap reads and writes in their own
    /// cancellation, for example by closing the endpoint from a timer thread.
    pub fn set_deadline(&self, _deadline: Option<Instant>) -> io::Result<()> {
        Err(PipeError::DeadlineNotSupported.into())
    }

    /// Deadlines are not supported; see [`set_deadline`](PipeConn::set_deadline)
    pub fn set_read_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.set_deadline(deadline)
    }

    /// Deadlines are not supported; see [`set_deadline`](PipeConn::set_deadline)
    pub fn set_write_deadline(&self, deadline: Option<Instant>) -> io::Result<()> {
        self.set_deadline(deadline)
    }
}

impl Drop for PipeConn {
    fn drop(&mut self) {
        // Dropping the receiver fails the peer's pending and future writes.
        {
            let mut read = lock(&self.half().read);
            read.closed = true;
            read.offset = 0;
            if let Some(buffer) = read.pending.take() {
                self.shared.pools.buffers().release(buffer);
            }
            self.shared.pools.reclaim(None, read.queue.take());
        }

        // Dropping the sender reads as end-of-stream once the peer has
        // consumed what is queued, so no marker slot is needed.
        let was_open = {
            let mut write = lock(&self.half().write);
            let was_open = !write.closed;
            if was_open {
                write.closed = true;
                write.queue = None;
            }
            was_open
        };
        if was_open {
            pipe_trace!("pipe pair {} endpoint {} dropped", self.shared.id, self.side + 1);
        }

        self.shared.release();
    }
}

impl Read for PipeConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_chunks(buf)
    }
}

impl Read for &PipeConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_chunks(buf)
    }
}

impl Write for PipeConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunk(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Write for &PipeConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunk(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for PipeConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeConn")
            .field("pair", &self.shared.id)
            .field("side", &(self.side + 1))
            .finish()
    }
}
