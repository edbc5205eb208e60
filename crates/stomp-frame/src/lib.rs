//! The STOMP 1.2 wire codec: parsing and serializing frames.
//!
//! Recognized methods, header names, and the frame grammar all follow the
//! STOMP 1.2 text protocol as spoken by this broker (method line, headers,
//! blank line, body). Integer-shaped headers are kept as raw bytes; callers
//! coerce them to numbers at the point of use via [`parse_ascii_u64_lenient`].

mod error;
mod frame;
pub mod headers;
mod method;
mod pool;

pub use error::ParseError;
pub use frame::{Frame, parse_ascii_u64_lenient};
pub use method::Method;
pub use pool::{FramePool, random_token};
