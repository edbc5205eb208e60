//! A symmetric user-facing client for the codec implemented by
//! `stomp-frame` and served by `stomp-broker::Router` — not part of the
//! broker core itself, kept here for interface completeness and for
//! exercising the broker end to end in tests.

mod error;

pub use error::ClientError;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use bytes::Bytes;
use stomp_broker::Peer;
use stomp_frame::{Frame, Method};
use tokio::sync::{Mutex, oneshot};
use tracing::warn;

/// Invoked with every MESSAGE frame delivered to a subscription. Called
/// synchronously off the listen task; a handler that wants to do async
/// work should hand the frame off rather than block in place.
pub type Handler = Arc<dyn Fn(Frame) + Send + Sync>;

/// Drives one connection: issues STOMP, awaits CONNECTED, then lets
/// callers SEND/SUBSCRIBE/UNSUBSCRIBE/ACK/NACK while a background task
/// routes inbound MESSAGE/RECEIPT frames.
pub struct Client {
    sender: tokio::sync::mpsc::Sender<Frame>,
    subs: Mutex<HashMap<Bytes, Handler>>,
    wait: Mutex<HashMap<Bytes, oneshot::Sender<()>>>,
    seq: AtomicI64,
}

impl Client {
    /// Completes the STOMP/CONNECTED handshake over `peer`, then spawns
    /// a task that owns `peer`'s receiving half for the life of the
    /// connection. The returned `oneshot::Receiver` resolves once with
    /// the reason the listen task stopped (peer closed or a protocol
    /// violation).
    pub async fn connect(mut peer: Peer) -> Result<(Arc<Client>, oneshot::Receiver<ClientError>), ClientError> {
        let mut hello = Frame::new(Method::Stomp);
        hello.proto = Some(Bytes::from_static(b"1.2"));
        peer.send(hello).await?;

        let reply = peer.receive().await.ok_or(ClientError::Closed)?;
        if reply.method != Method::Connected {
            return Err(ClientError::UnexpectedMethod(reply.method));
        }

        let sender = peer.sender();
        let client = Arc::new(Client {
            sender,
            subs: Mutex::new(HashMap::new()),
            wait: Mutex::new(HashMap::new()),
            seq: AtomicI64::new(0),
        });

        let (done_tx, done_rx) = oneshot::channel();
        let listener = client.clone();
        tokio::spawn(async move { listener.listen(peer, done_tx).await });

        Ok((client, done_rx))
    }

    /// Sends a SEND frame with no further customization.
    pub async fn send(&self, dest: impl Into<Bytes>, body: impl Into<Bytes>) -> Result<(), ClientError> {
        self.send_with(dest, body, |_| {}).await
    }

    /// Sends a SEND frame, letting `configure` set any additional headers
    /// (e.g. `retain`, `receipt`, `expires`) before it goes out.
    pub async fn send_with(
        &self,
        dest: impl Into<Bytes>,
        body: impl Into<Bytes>,
        configure: impl FnOnce(&mut Frame),
    ) -> Result<(), ClientError> {
        let mut frame = Frame::new(Method::Send);
        frame.dest = Some(dest.into());
        frame.body = body.into();
        configure(&mut frame);
        self.send_message(frame).await
    }

    /// Subscribes to `dest`, registering `handler` for every MESSAGE
    /// delivered under the generated subscription id. The handler is
    /// deregistered if the SUBSCRIBE itself fails to send.
    pub async fn subscribe(&self, dest: impl Into<Bytes>, handler: Handler) -> Result<Bytes, ClientError> {
        self.subscribe_with(dest, handler, |_| {}).await
    }

    pub async fn subscribe_with(
        &self,
        dest: impl Into<Bytes>,
        handler: Handler,
        configure: impl FnOnce(&mut Frame),
    ) -> Result<Bytes, ClientError> {
        let id = self.next_id();

        let mut frame = Frame::new(Method::Subscribe);
        frame.id = Some(id.clone());
        frame.dest = Some(dest.into());
        configure(&mut frame);

        self.subs.lock().await.insert(id.clone(), handler);

        if let Err(e) = self.send_message(frame).await {
            self.subs.lock().await.remove(&id);
            return Err(e);
        }
        Ok(id)
    }

    /// Unsubscribes `id`, removing its handler immediately (before the
    /// UNSUBSCRIBE is even sent) so no further MESSAGE is routed to it.
    pub async fn unsubscribe(&self, id: Bytes) -> Result<(), ClientError> {
        self.subs.lock().await.remove(&id);
        let mut frame = Frame::new(Method::Unsubscribe);
        frame.id = Some(id);
        self.send_message(frame).await
    }

    /// Acknowledges the message delivered under `ack_token` (the frame's
    /// `ack` header, not its subscription id).
    pub async fn ack(&self, ack_token: Bytes) -> Result<(), ClientError> {
        let mut frame = Frame::new(Method::Ack);
        frame.id = Some(ack_token);
        self.send_message(frame).await
    }

    /// Negative-acknowledges the message delivered under `ack_token`.
    pub async fn nack(&self, ack_token: Bytes) -> Result<(), ClientError> {
        let mut frame = Frame::new(Method::Nack);
        frame.id = Some(ack_token);
        self.send_message(frame).await
    }

    /// Sends DISCONNECT best-effort; does not wait for the peer to close.
    pub async fn disconnect(&self) {
        let frame = Frame::new(Method::Disconnect);
        let _ = self.sender.send(frame).await;
    }

    fn next_id(&self) -> Bytes {
        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        Bytes::from(n.to_string())
    }

    /// Sends `frame` as-is. If it carries a `receipt` header, registers a
    /// one-shot waiter for that token before sending and blocks until the
    /// RECEIPT echo arrives.
    async fn send_message(&self, frame: Frame) -> Result<(), ClientError> {
        let Some(token) = frame.receipt.clone() else {
            return self
                .sender
                .send(frame)
                .await
                .map_err(|_| ClientError::Peer(stomp_broker::PeerError::Closed));
        };

        let (tx, rx) = oneshot::channel();
        self.wait.lock().await.insert(token.clone(), tx);

        let sent = self.sender.send(frame).await;
        if sent.is_err() {
            self.wait.lock().await.remove(&token);
            return Err(ClientError::Peer(stomp_broker::PeerError::Closed));
        }

        let result = rx.await;
        self.wait.lock().await.remove(&token);
        result.map_err(|_| ClientError::Peer(stomp_broker::PeerError::Closed))
    }

    async fn listen(self: Arc<Self>, mut peer: Peer, done: oneshot::Sender<ClientError>) {
        loop {
            let Some(frame) = peer.receive().await else {
                let _ = done.send(ClientError::Closed);
                return;
            };

            match frame.method {
                Method::Message => self.handle_message(frame).await,
                Method::Receipt => self.handle_receipt(frame).await,
                other => warn!(method = %other, "unexpected message type from server"),
            }
        }
    }

    async fn handle_message(&self, frame: Frame) {
        let Some(sub_id) = frame.subs.clone() else {
            warn!("message frame with no subscription id");
            return;
        };
        let handler = self.subs.lock().await.get(&sub_id).cloned();
        match handler {
            Some(handler) => handler(frame),
            None => warn!(sub_id = ?sub_id, "no subscription handler for message"),
        }
    }

    async fn handle_receipt(&self, frame: Frame) {
        let Some(token) = frame.receipt.clone() else {
            warn!("receipt frame with no receipt id");
            return;
        };
        let waiter = self.wait.lock().await.remove(&token);
        match waiter {
            Some(tx) => {
                let _ = tx.send(());
            }
            None => warn!(receipt = ?token, "no pending waiter for receipt"),
        }
    }
}
