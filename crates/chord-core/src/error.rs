//! Error kinds for the ring state machine (spec.md §7).

/// Errors produced by the ring-membership and lookup state machine.
///
/// The event loop itself is infallible: these are returned to the immediate
/// caller of an operation (a maintenance task, a handler, or a client
/// request) and never abort the node.
pub enum ChordError {
    /// No reply arrived within the RPC deadline.
    Timeout,

    /// A datagram failed to decode: bad length prefix or unrecognized tag.
    MalformedFrame,

    /// A response arrived whose correlation id matches no pending call.
    CorrelationUnknown,

    /// Recursive `find_successor` could not make progress.
    LookupFailed,

    /// Underlying socket operation failed.
    SocketError(std::io::Error),

    /// Invalid configuration supplied at startup.
    ConfigError(String),
}

impl From<std::io::Error> for ChordError {
    #[cold]
    fn from(e: std::io::Error) -> Self {
        Self::SocketError(e)
    }
}

impl std::fmt::Display for ChordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => f.write_str("Timeout"),
            Self::MalformedFrame => f.write_str("MalformedFrame"),
            Self::CorrelationUnknown => f.write_str("CorrelationUnknown"),
            Self::LookupFailed => f.write_str("LookupFailed"),
            Self::SocketError(e) => write!(f, "SocketError({})", e),
            Self::ConfigError(msg) => write!(f, "ConfigError({})", msg),
        }
    }
}

impl std::fmt::Debug for ChordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for ChordError {}

pub type Result<T> = std::result::Result<T, ChordError>;
