use std::fmt;

/// Address of a pipe endpoint
///
/// Pipes have no network identity; every endpoint reports the same
/// placeholder for both its local and its remote address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PipeAddr;

impl PipeAddr {
    /// Name of the pseudo network, always `"pipe"`
    pub fn network(&self) -> &'static str {
        "pipe"
    }
}

impl fmt::Display for PipeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("pipe")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_identity() {
        assert_eq!(PipeAddr.network(), "pipe");
        assert_eq!(PipeAddr.to_string(), "pipe");
    }
}
