#![deny(unsafe_code)]

// Lifecycle logging goes through `log` when the `logging` feature is on and
// compiles to nothing otherwise.
cfg_if::cfg_if! {
    if #[cfg(feature = "logging")] {
        macro_rules! pipe_trace { ($($arg:tt)*) => { log::trace!($($arg)*) } }
        macro_rules! pipe_debug { ($($arg:tt)*) => { log::debug!($($arg)*) } }
    } else {
        macro_rules! pipe_trace { ($($arg:tt)*) => { { let _ = format_args!($($arg)*); } } }
        macro_rules! pipe_debug { ($($arg:tt)*) => { { let _ = format_args!($($arg)*); } } }
    }
}

pub mod addr;
pub mod buffer_pool;
pub mod config;
pub mod error;
pub mod pipe;
pub mod pools;
pub mod queue;
pub mod queue_pool;

/// Convenience re-exports
pub use addr::PipeAddr;
pub use config::PipeConfig;
pub use error::PipeError;
pub use pipe::{pipe, PipeConn, PipeConns};
pub use pools::PipePools;
