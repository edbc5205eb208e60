//! The bidirectional, bounded frame channel abstraction that decouples the
//! router from any particular transport.
//!
//! Both required implementations — a NUL-delimited byte-stream transport
//! and an in-memory pipe pair for tests — construct the same [`Peer`]
//! type; they differ only in how its two `mpsc` channels get wired up.

use std::time::Duration;

use bytes::{Buf, BytesMut};
use futures_util::{SinkExt, StreamExt};
use stomp_frame::Frame;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout};
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::{debug, warn};

/// Capacity of both the inbound and outbound channel of a [`Peer`].
pub const CHANNEL_CAPACITY: usize = 10;

const READ_DEADLINE: Duration = Duration::from_secs(5);
const WRITE_DEADLINE: Duration = Duration::from_secs(5);
const FLUSH_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PeerError {
    #[error("peer closed")]
    Closed,
}

/// A NUL-delimited `Frame` codec for framing any byte stream.
///
/// The trailing NUL is the wire terminator (stripped on decode, appended
/// on encode); `Frame::parse`/`serialize` never see it.
struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        let Some(pos) = buf.iter().position(|&b| b == 0) else {
            return Ok(None);
        };
        let body = buf.split_to(pos).freeze();
        buf.advance(1);
        Frame::parse(body)
            .map(Some)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = std::io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        frame.serialize(dst);
        dst.extend_from_slice(&[0]);
        Ok(())
    }
}

/// A bidirectional frame channel over any transport.
///
/// `send`/`receive` never block indefinitely on a closed peer — both
/// observe the shared `closed` watch and return promptly once it fires.
pub struct Peer {
    addr: String,
    outgoing: mpsc::Sender<Frame>,
    incoming: mpsc::Receiver<Frame>,
    closed: watch::Sender<bool>,
}

impl Peer {
    /// Wraps any `AsyncRead + AsyncWrite` byte stream as a transport-backed
    /// peer: a read task decoding NUL-delimited frames into a bounded
    /// channel with a 5s read deadline per frame, and a write task
    /// flushing on a 100ms tick with a 5s write deadline, draining
    /// best-effort on close.
    pub fn connect<S>(stream: S, addr: String) -> Peer
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let framed = Framed::new(stream, FrameCodec);
        let (mut sink, mut source) = framed.split();

        let (out_tx, mut out_rx) = mpsc::channel::<Frame>(CHANNEL_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<Frame>(CHANNEL_CAPACITY);
        let (closed_tx, mut closed_rx) = watch::channel(false);

        let reader_closed = closed_tx.clone();
        let mut reader_closed_rx = closed_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = reader_closed_rx.changed() => {
                        if changed.is_err() || *reader_closed_rx.borrow() { break; }
                    }
                    res = timeout(READ_DEADLINE, source.next()) => {
                        match res {
                            Ok(Some(Ok(frame))) => {
                                if in_tx.send(frame).await.is_err() {
                                    break;
                                }
                            }
                            Ok(Some(Err(e))) => {
                                warn!(error = %e, "peer read error");
                                break;
                            }
                            Ok(None) => break,
                            Err(_) => continue, // read deadline elapsed; reset and keep listening
                        }
                    }
                }
            }
            let _ = reader_closed.send(true);
        });

        tokio::spawn(async move {
            let mut tick = interval(FLUSH_TICK);
            loop {
                tokio::select! {
                    _ = closed_rx.changed() => {
                        if *closed_rx.borrow() { break; }
                    }
                    _ = tick.tick() => {
                        if timeout(WRITE_DEADLINE, sink.flush()).await.is_err() {
                            break;
                        }
                    }
                    maybe = out_rx.recv() => {
                        match maybe {
                            Some(frame) => {
                                if sink.feed(frame).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
            out_rx.close();
            while let Ok(frame) = out_rx.try_recv() {
                let _ = sink.feed(frame).await;
            }
            let _ = timeout(WRITE_DEADLINE, sink.flush()).await;
            debug!("peer write task drained and closed");
        });

        Peer {
            addr,
            outgoing: out_tx,
            incoming: in_rx,
            closed: closed_tx,
        }
    }

    /// Builds a synchronous in-memory pipe pair: reads on one end are
    /// matched with writes on the other, bounded at [`CHANNEL_CAPACITY`].
    /// Useful for direct client/server wiring in tests and benchmarks.
    pub fn pipe() -> (Peer, Peer) {
        let (a_tx, b_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (b_tx, a_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (a_closed, _) = watch::channel(false);
        let (b_closed, _) = watch::channel(false);
        (
            Peer {
                addr: "pipe".to_owned(),
                outgoing: a_tx,
                incoming: a_rx,
                closed: a_closed,
            },
            Peer {
                addr: "pipe".to_owned(),
                outgoing: b_tx,
                incoming: b_rx,
                closed: b_closed,
            },
        )
    }

    /// Enqueues `frame`. Fails with `Closed` once the peer has been
    /// closed; never blocks indefinitely on a full-but-closed channel.
    pub async fn send(&self, frame: Frame) -> Result<(), PeerError> {
        if *self.closed.borrow() {
            return Err(PeerError::Closed);
        }
        self.outgoing.send(frame).await.map_err(|_| PeerError::Closed)
    }

    /// A cheap, cloneable send handle — used to hand subscriptions a
    /// direct path to their owning session's outbound channel without a
    /// back-reference to the `Session` itself.
    pub fn sender(&self) -> mpsc::Sender<Frame> {
        self.outgoing.clone()
    }

    /// Yields frames until the peer closes (`None` then signals EOF).
    pub async fn receive(&mut self) -> Option<Frame> {
        self.incoming.recv().await
    }

    /// Idempotent. Releases in-flight send/receive endpoints and signals
    /// the transport tasks (if any) to drain and close.
    pub fn close(&self) {
        let _ = self.closed.send(true);
    }

    /// Opaque diagnostic identifier for this peer.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}
