//! Bounded chunk queue carrying data from one endpoint to the other
//!
//! A `PipeQueue` is a fixed-capacity FIFO of [`Frame`]s backed by a
//! `crossbeam-channel` bounded channel. An idle queue owns both ends of the
//! channel. A connection pair splits it into a [`QueueSender`] for the
//! writing endpoint and a [`QueueReceiver`] for the reading one, so dropping
//! either endpoint disconnects the channel and wakes whoever waits on the
//! other end.

use crossbeam_channel::{bounded, Receiver, RecvError, Sender, TryRecvError};

/// One item travelling through a pipe queue
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// A chunk of bytes from a single `write` call
    Data(Vec<u8>),
    /// End-of-stream marker: nothing more will ever be pushed by this writer
    Eof,
}

/// Outcome of a non-blocking pop
#[derive(Debug, PartialEq, Eq)]
pub enum TryPop {
    /// A frame was available
    Frame(Frame),
    /// The queue is empty right now
    Empty,
}

/// Writing end of a queue
#[derive(Debug)]
pub struct QueueSender {
    tx: Sender<Frame>,
    capacity: usize,
}

impl QueueSender {
    /// Pushes a frame, blocking while the queue is full
    ///
    /// Returns the frame back if the receiving end has been dropped.
    pub fn push(&self, frame: Frame) -> Result<(), Frame> {
        self.tx.send(frame).map_err(|err| err.into_inner())
    }

    /// Pushes a frame only if a slot is free
    ///
    /// Returns the frame back if the queue is full or the receiving end has
    /// been dropped.
    pub fn try_push(&self, frame: Frame) -> Result<(), Frame> {
        self.tx.try_send(frame).map_err(|err| err.into_inner())
    }

    /// Maximum number of frames the queue holds
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Reading end of a queue
///
/// Once the sending end is gone and the queued frames are consumed, every
/// pop yields [`Frame::Eof`].
#[derive(Debug)]
pub struct QueueReceiver {
    rx: Receiver<Frame>,
}

impl QueueReceiver {
    /// Pops the oldest frame, blocking while the queue is empty
    pub fn pop(&self) -> Frame {
        match self.rx.recv() {
            Ok(frame) => frame,
            Err(RecvError) => Frame::Eof,
        }
    }

    /// Pops the oldest frame without blocking
    pub fn try_pop(&self) -> TryPop {
        match self.rx.try_recv() {
            Ok(frame) => TryPop::Frame(frame),
            Err(TryRecvError::Empty) => TryPop::Empty,
            Err(TryRecvError::Disconnected) => TryPop::Frame(Frame::Eof),
        }
    }

    /// Removes every queued frame without blocking
    pub fn drain(&self) -> impl Iterator<Item = Frame> + '_ {
        self.rx.try_iter()
    }

    /// Number of frames currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if no frames are queued
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// A bounded blocking FIFO of frames owning both of its ends
#[derive(Debug)]
pub struct PipeQueue {
    tx: QueueSender,
    rx: QueueReceiver,
}

impl PipeQueue {
    /// Creates an empty queue holding at most `capacity` frames
    ///
    /// A capacity of `0` is raised to `1`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self {
            tx: QueueSender { tx, capacity },
            rx: QueueReceiver { rx },
        }
    }

    /// Splits the queue into its writing and reading ends
    pub fn split(self) -> (QueueSender, QueueReceiver) {
        (self.tx, self.rx)
    }

    /// Puts back together the two ends returned by [`PipeQueue::split`]
    ///
    /// The ends must come from the same queue.
    pub(crate) fn from_parts(tx: QueueSender, rx: QueueReceiver) -> Self {
        Self { tx, rx }
    }

    /// Pushes a frame, blocking while the queue is full
    pub fn push(&self, frame: Frame) -> Result<(), Frame> {
        self.tx.push(frame)
    }

    /// Pushes a frame only if a slot is free
    ///
    /// Returns the frame back if the queue is full.
    pub fn try_push(&self, frame: Frame) -> Result<(), Frame> {
        self.tx.try_push(frame)
    }

    /// Pops the oldest frame, blocking while the queue is empty
    pub fn pop(&self) -> Frame {
        self.rx.pop()
    }

    /// Pops the oldest frame without blocking
    pub fn try_pop(&self) -> TryPop {
        self.rx.try_pop()
    }

    /// Removes every queued frame without blocking
    pub fn drain(&self) -> impl Iterator<Item = Frame> + '_ {
        self.rx.drain()
    }

    /// Number of frames currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if no frames are queued
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Maximum number of frames the queue holds
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}
