use crate::error::ParseError;

/// One of the STOMP 1.2 frame methods this broker understands.
///
/// The wire grammar only requires "non-'\n' chars" for the method line; this
/// crate strengthens that to a closed set (`MalformedFrame` on anything
/// else) rather than carrying the method around as an opaque byte slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Method {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Method::Stomp => b"STOMP",
            Method::Connected => b"CONNECTED",
            Method::Send => b"SEND",
            Method::Subscribe => b"SUBSCRIBE",
            Method::Unsubscribe => b"UNSUBSCRIBE",
            Method::Ack => b"ACK",
            Method::Nack => b"NACK",
            Method::Disconnect => b"DISCONNECT",
            Method::Message => b"MESSAGE",
            Method::Receipt => b"RECEIPT",
            Method::Error => b"ERROR",
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        Ok(match bytes {
            b"STOMP" => Method::Stomp,
            b"CONNECTED" => Method::Connected,
            b"SEND" => Method::Send,
            b"SUBSCRIBE" => Method::Subscribe,
            b"UNSUBSCRIBE" => Method::Unsubscribe,
            b"ACK" => Method::Ack,
            b"NACK" => Method::Nack,
            b"DISCONNECT" => Method::Disconnect,
            b"MESSAGE" => Method::Message,
            b"RECEIPT" => Method::Receipt,
            b"ERROR" => Method::Error,
            other => {
                return Err(ParseError::MalformedFrame {
                    reason: format!("unrecognized method {:?}", String::from_utf8_lossy(other)),
                });
            }
        })
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(std::str::from_utf8(self.as_bytes()).unwrap())
    }
}
