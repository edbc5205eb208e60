use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("peer closed before CONNECTED was received")]
    Closed,

    #[error("expected CONNECTED, got {0}")]
    UnexpectedMethod(stomp_frame::Method),

    #[error("peer error: {0}")]
    Peer(#[from] stomp_broker::PeerError),
}
