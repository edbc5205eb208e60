use bytes::{Bytes, BytesMut};

use crate::error::ParseError;
use crate::headers;
use crate::method::Method;

/// A parsed STOMP frame.
///
/// Every header-shaped field is kept as the raw bytes seen on the wire
/// (`Bytes`, a cheap refcounted slice into the original input when parsed
/// via [`Frame::parse`]) rather than coerced to an integer at parse time —
/// coercion happens at the point of use (e.g. `prefetch-count` is only
/// interpreted as a number when a subscription is built, `expires` only
/// when a queue checks it against the clock).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub method: Method,
    pub proto: Option<Bytes>,
    pub user: Option<Bytes>,
    pub pass: Option<Bytes>,
    pub dest: Option<Bytes>,
    pub id: Option<Bytes>,
    pub subs: Option<Bytes>,
    pub ack: Option<Bytes>,
    pub message_id: Option<Bytes>,
    pub persist: Option<Bytes>,
    pub retain: Option<Bytes>,
    pub prefetch: Option<Bytes>,
    pub expires: Option<Bytes>,
    pub receipt: Option<Bytes>,
    pub selector: Option<Bytes>,
    pub body: Bytes,
    /// Custom headers not recognized by any of the fields above, in
    /// wire order.
    pub headers: Vec<(Bytes, Bytes)>,
}

impl Frame {
    /// Returns a blank frame of the given method with every optional
    /// header unset, empty body, and no extra headers.
    pub fn new(method: Method) -> Self {
        Frame {
            method,
            proto: None,
            user: None,
            pass: None,
            dest: None,
            id: None,
            subs: None,
            ack: None,
            message_id: None,
            persist: None,
            retain: None,
            prefetch: None,
            expires: None,
            receipt: None,
            selector: None,
            body: Bytes::new(),
            headers: Vec::new(),
        }
    }

    /// Looks up a custom (non-dedicated) header by name.
    pub fn header(&self, name: &[u8]) -> Option<&Bytes> {
        self.headers
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Parses one complete frame body (method line, headers, blank line,
    /// body) with the trailing NUL terminator already stripped by the
    /// transport layer.
    pub fn parse(input: Bytes) -> Result<Self, ParseError> {
        let buf = input.as_ref();
        let total = buf.len();

        // method line
        let mut off = 0usize;
        loop {
            if off == total {
                return Err(ParseError::MalformedFrame {
                    reason: "missing method terminator".into(),
                });
            }
            if buf[off] == b'\n' {
                break;
            }
            off += 1;
        }
        let method = Method::parse(&buf[..off])?;
        off += 1; // past the method's newline
        let mut pos = off;

        let mut frame = Frame::new(method);

        // header section
        loop {
            if off == total {
                return Err(ParseError::MalformedFrame {
                    reason: "unexpected eof in header section".into(),
                });
            }
            if buf[off] == b'\n' {
                // blank line: end of headers
                off += 1;
                pos = off;
                break;
            }

            // header name, up to ':'
            let name_start = pos;
            loop {
                if off >= total {
                    return Err(ParseError::MalformedFrame {
                        reason: "unexpected eof in header name".into(),
                    });
                }
                if buf[off] == b':' {
                    break;
                }
                if buf[off] == b'\n' {
                    return Err(ParseError::MalformedFrame {
                        reason: "missing header colon".into(),
                    });
                }
                off += 1;
            }
            let name = input.slice(name_start..off);
            off += 1; // past ':'
            pos = off;

            // header value, up to '\n'
            loop {
                if off >= total {
                    return Err(ParseError::MalformedFrame {
                        reason: "unexpected eof in header value".into(),
                    });
                }
                if buf[off] == b'\n' {
                    break;
                }
                off += 1;
            }
            let value = input.slice(pos..off);
            off += 1; // past '\n'
            pos = off;

            assign_header(&mut frame, name, value);
        }

        if total > pos {
            frame.body = input.slice(pos..total);
        }
        Ok(frame)
    }

    /// Serializes this frame into `buf`, method-dependent header order
    /// first, then any extra headers in insertion order, a blank line,
    /// then the body. Does not append the NUL terminator — that is the
    /// transport layer's job.
    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(self.method.as_bytes());
        buf.extend_from_slice(b"\n");

        match self.method {
            Method::Stomp => {
                if let Some(proto) = &self.proto {
                    write_header(buf, headers::ACCEPT_VERSION, proto);
                }
                if let Some(user) = &self.user {
                    write_header(buf, headers::LOGIN, user);
                }
                if let Some(pass) = &self.pass {
                    write_header(buf, headers::PASSCODE, pass);
                }
            }
            Method::Connected => {
                if let Some(proto) = &self.proto {
                    write_header(buf, headers::VERSION, proto);
                }
            }
            Method::Send => {
                if let Some(dest) = &self.dest {
                    write_header(buf, headers::DESTINATION, dest);
                }
                if let Some(expires) = &self.expires {
                    write_header(buf, headers::EXPIRES, expires);
                }
                if let Some(retain) = &self.retain {
                    write_header(buf, headers::RETAIN, retain);
                }
                if let Some(persist) = &self.persist {
                    write_header(buf, headers::PERSIST, persist);
                }
            }
            Method::Subscribe => {
                if let Some(id) = &self.id {
                    write_header(buf, headers::ID, id);
                }
                if let Some(dest) = &self.dest {
                    write_header(buf, headers::DESTINATION, dest);
                }
                if let Some(selector) = &self.selector {
                    write_header(buf, headers::SELECTOR, selector);
                }
                if let Some(prefetch) = &self.prefetch {
                    write_header(buf, headers::PREFETCH_COUNT, prefetch);
                }
                if let Some(ack) = &self.ack {
                    write_header(buf, headers::ACK, ack);
                }
            }
            Method::Unsubscribe | Method::Ack | Method::Nack => {
                if let Some(id) = &self.id {
                    write_header(buf, headers::ID, id);
                }
            }
            Method::Message => {
                if let Some(message_id) = &self.message_id {
                    write_header(buf, headers::MESSAGE_ID, message_id);
                }
                if let Some(dest) = &self.dest {
                    write_header(buf, headers::DESTINATION, dest);
                }
                if let Some(subs) = &self.subs {
                    write_header(buf, headers::SUBSCRIPTION, subs);
                }
                if let Some(ack) = &self.ack {
                    write_header(buf, headers::ACK, ack);
                }
            }
            Method::Receipt => {
                if let Some(receipt) = &self.receipt {
                    write_header(buf, headers::RECEIPT_ID, receipt);
                }
            }
            Method::Disconnect | Method::Error => {}
        }

        if let Some(receipt) = &self.receipt {
            if self.method != Method::Receipt {
                write_header(buf, headers::RECEIPT, receipt);
            }
        }

        for (name, value) in &self.headers {
            write_header(buf, name, value);
        }

        buf.extend_from_slice(b"\n");
        buf.extend_from_slice(&self.body);
    }

    /// Returns the serialized frame as an owned byte buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.serialize(&mut buf);
        buf.freeze()
    }
}

fn write_header(buf: &mut BytesMut, name: &[u8], value: &[u8]) {
    buf.extend_from_slice(name);
    buf.extend_from_slice(b":");
    buf.extend_from_slice(value);
    buf.extend_from_slice(b"\n");
}

fn assign_header(frame: &mut Frame, name: Bytes, value: Bytes) {
    match name.as_ref() {
        headers::ACCEPT_VERSION | headers::VERSION => frame.proto = Some(value),
        headers::ACK => frame.ack = Some(value),
        headers::DESTINATION => frame.dest = Some(value),
        headers::EXPIRES => frame.expires = Some(value),
        headers::LOGIN => frame.user = Some(value),
        headers::PASSCODE => frame.pass = Some(value),
        headers::ID => frame.id = Some(value),
        headers::MESSAGE_ID => frame.message_id = Some(value),
        headers::PERSIST => frame.persist = Some(value),
        headers::PREFETCH_COUNT => frame.prefetch = Some(value),
        headers::RECEIPT | headers::RECEIPT_ID => frame.receipt = Some(value),
        headers::RETAIN => frame.retain = Some(value),
        headers::SELECTOR => frame.selector = Some(value),
        headers::SUBSCRIPTION => frame.subs = Some(value),
        _ => frame.headers.push((name, value)),
    }
}

/// Parses an ASCII-digit byte string into a `u64`, mirroring the source's
/// `parseInt64`: empty input or any non-digit byte yields `0` rather than
/// an error. Used at the point of use for headers whose value is
/// sometimes read as a number (`expires`, `prefetch-count`).
pub fn parse_ascii_u64_lenient(bytes: &[u8]) -> u64 {
    let mut n: u64 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return 0;
        }
        n = n.saturating_mul(10).saturating_add(u64::from(b - b'0'));
    }
    n
}
