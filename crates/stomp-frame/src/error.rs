use thiserror::Error;

/// Errors surfaced while decoding a STOMP frame from the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String },
}
