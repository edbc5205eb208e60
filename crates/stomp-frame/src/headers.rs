//! Recognized STOMP header names, as they appear on the wire.

pub const ACCEPT_VERSION: &[u8] = b"accept-version";
pub const ACK: &[u8] = b"ack";
pub const EXPIRES: &[u8] = b"expires";
pub const DESTINATION: &[u8] = b"destination";
pub const HOST: &[u8] = b"host";
pub const LOGIN: &[u8] = b"login";
pub const PASSCODE: &[u8] = b"passcode";
pub const ID: &[u8] = b"id";
pub const MESSAGE_ID: &[u8] = b"message-id";
pub const PERSIST: &[u8] = b"persist";
pub const PREFETCH_COUNT: &[u8] = b"prefetch-count";
pub const RECEIPT: &[u8] = b"receipt";
pub const RECEIPT_ID: &[u8] = b"receipt-id";
pub const RETAIN: &[u8] = b"retain";
pub const SELECTOR: &[u8] = b"selector";
pub const SERVER: &[u8] = b"server";
pub const SESSION: &[u8] = b"session";
pub const SUBSCRIPTION: &[u8] = b"subscription";
pub const VERSION: &[u8] = b"version";

/// Common header values.
pub mod values {
    pub const ACK_AUTO: &[u8] = b"auto";
    pub const ACK_CLIENT: &[u8] = b"client";
    pub const PERSIST_TRUE: &[u8] = b"true";
    pub const RETAIN_LAST: &[u8] = b"last";
    pub const RETAIN_ALL: &[u8] = b"all";
    pub const RETAIN_REMOVE: &[u8] = b"remove";
}
