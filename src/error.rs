use std::io;

use thiserror::Error;

/// Errors reported by pipe endpoints
///
/// Endpoints speak `std::io`, so these are delivered wrapped in an
/// `io::Error`; use [`PipeError::from_io`] to get the variant back.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeError {
    /// The endpoint was closed for writing
    #[error("connection closed for writing")]
    WriteClosed,

    /// The peer endpoint was dropped, so nothing can read what is written
    #[error("connection closed by peer")]
    PeerDropped,

    /// Deadlines are not implemented by in-memory pipes
    #[error("deadline not supported")]
    DeadlineNotSupported,
}

impl PipeError {
    /// The `io::ErrorKind` this error is reported as
    pub fn kind(self) -> io::ErrorKind {
        match self {
            PipeError::WriteClosed | PipeError::PeerDropped => io::ErrorKind::BrokenPipe,
            PipeError::DeadlineNotSupported => io::ErrorKind::Unsupported,
        }
    }

    /// Extracts a `PipeError` from an `io::Error` produced by this crate
    pub fn from_io(err: &io::Error) -> Option<PipeError> {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<PipeError>())
            .copied()
    }
}

impl From<PipeError> for io::Error {
    fn from(err: PipeError) -> Self {
        io::Error::new(err.kind(), err)
    }
}
