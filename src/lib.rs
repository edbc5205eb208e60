//! Facade crate for the STOMP 1.2 message broker core: re-exports the
//! frame codec, selector engine, broker runtime, and client across this
//! workspace's crate split, so a downstream binary (an acceptor, a CLI)
//! can depend on a single crate.

pub use stomp_frame::{Frame, FramePool, Method, ParseError as FrameParseError, random_token};

pub use stomp_selector::{EvalError, ParseError as SelectorParseError, Row, Selector};

pub use stomp_broker::{
    AckMode, Authorizer, Destination, Peer, PeerError, Queue, Router, RouterConfig, RouterError,
    Session, SessionInfo, Subscription, Topic, basic_auth,
};

pub use stomp_client::{Client, ClientError, Handler};
