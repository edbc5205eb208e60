//! Per-connection state: subscriptions, pending acks, and the peer handle
//! used to write frames back to the client.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use stomp_frame::{Frame, headers, parse_ascii_u64_lenient};
use stomp_selector::Selector;
use tokio::sync::{Mutex, mpsc};
use tracing::warn;

use crate::peer::{Peer, PeerError};

/// Whether a subscription's messages must be explicitly acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    Auto,
    Client,
}

/// A session's subscription to a destination.
///
/// Does **not** hold a strong reference back to its owning `Session` (that
/// would make the pair a reference cycle with no natural teardown order).
/// Instead it carries the session's id, for membership checks, and a
/// cloned sender into the session's peer, so a destination's dispatch loop
/// can deliver directly without reaching back through the router.
pub struct Subscription {
    pub id: Bytes,
    pub dest: Bytes,
    pub session_id: u64,
    pub ack_mode: AckMode,
    pub prefetch: u64,
    pending: std::sync::atomic::AtomicUsize,
    pub selector: Option<Selector>,
    sender: mpsc::Sender<Frame>,
    unacked: Arc<Mutex<HashMap<Bytes, UnackedEntry>>>,
}

/// An in-flight, not-yet-acknowledged frame plus the subscription it was
/// dispatched to — kept together so `Router::ack` can find the
/// subscription whose `pending` counter the ACK should release.
pub struct UnackedEntry {
    pub frame: Frame,
    pub subscription: Arc<Subscription>,
}

impl Subscription {
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn pending_incr(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrements the in-flight counter, saturating at zero. Note this
    /// decrements `pending` — the live in-flight count — never
    /// `prefetch`, which is the subscriber's configured limit.
    pub fn pending_decr(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |p| {
                Some(p.saturating_sub(1))
            });
    }

    /// `true` once this subscription has as many in-flight messages as its
    /// prefetch limit allows (a limit of 0 means unbounded).
    pub fn prefetch_blocked(&self) -> bool {
        self.prefetch != 0 && self.prefetch as usize == self.pending()
    }

    /// Delivers `frame` directly to the owning session's peer.
    pub async fn send(&self, frame: Frame) -> Result<(), PeerError> {
        self.sender.send(frame).await.map_err(|_| PeerError::Closed)
    }

}

/// Records `frame` as awaiting acknowledgement on `sub`'s owning session,
/// under `token`. A free function (rather than a method taking `&self`)
/// because it needs an `Arc<Subscription>` to stash alongside the frame,
/// and `Arc<Self>`-receiver methods aren't available on a plain `&self`
/// caller without already holding the Arc.
pub async fn track_unacked(sub: &Arc<Subscription>, token: Bytes, frame: Frame) {
    sub.unacked.lock().await.insert(
        token,
        UnackedEntry {
            frame,
            subscription: sub.clone(),
        },
    );
}

/// A per-connection container. Owns its subscriptions and its
/// not-yet-acknowledged message table.
pub struct Session {
    pub id: u64,
    addr: String,
    peer_sender: mpsc::Sender<Frame>,
    /// The authenticating STOMP frame, kept for diagnostics (admin
    /// listing of active sessions).
    pub hello: Frame,
    subs: Mutex<HashMap<Bytes, Arc<Subscription>>>,
    unacked: Arc<Mutex<HashMap<Bytes, UnackedEntry>>>,
    next_sub_seq: AtomicU64,
}

impl Session {
    pub fn new(id: u64, peer: &Peer, hello: Frame) -> Self {
        Session {
            id,
            addr: peer.addr().to_owned(),
            peer_sender: peer.sender(),
            hello,
            subs: Mutex::new(HashMap::new()),
            unacked: Arc::new(Mutex::new(HashMap::new())),
            next_sub_seq: AtomicU64::new(0),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Writes `frame` directly to this session's peer.
    pub async fn send(&self, frame: Frame) -> Result<(), PeerError> {
        self.peer_sender.send(frame).await.map_err(|_| PeerError::Closed)
    }

    /// Builds a subscription from a SUBSCRIBE frame's fields and registers
    /// it in this session's subscription map.
    ///
    /// A malformed `selector` header does not reject the SUBSCRIBE: per
    /// the source's own behavior, the subscription is still created, just
    /// with no filter, and the parse failure is only logged.
    pub async fn open_subscription(&self, frame: &Frame) -> Arc<Subscription> {
        let id = frame
            .id
            .clone()
            .unwrap_or_else(|| Bytes::from(self.next_sub_seq.fetch_add(1, Ordering::SeqCst).to_string()));
        let dest = frame.dest.clone().unwrap_or_default();
        let ack_mode = match frame.ack.as_deref() {
            Some(headers::values::ACK_CLIENT) => AckMode::Client,
            _ => {
                if frame.prefetch.is_some() {
                    AckMode::Client
                } else {
                    AckMode::Auto
                }
            }
        };
        let prefetch = frame
            .prefetch
            .as_deref()
            .map(parse_ascii_u64_lenient)
            .unwrap_or(0);
        let selector = match &frame.selector {
            Some(raw) => match std::str::from_utf8(raw) {
                Ok(text) => match Selector::parse(text) {
                    Ok(sel) => Some(sel),
                    Err(e) => {
                        warn!(error = %e, selector = text, "ignoring unparsable selector");
                        None
                    }
                },
                Err(_) => {
                    warn!("ignoring non-utf8 selector header");
                    None
                }
            },
            None => None,
        };

        let sub = Arc::new(Subscription {
            id: id.clone(),
            dest,
            session_id: self.id,
            ack_mode,
            prefetch,
            pending: std::sync::atomic::AtomicUsize::new(0),
            selector,
            sender: self.peer_sender.clone(),
            unacked: self.unacked.clone(),
        });

        self.subs.lock().await.insert(id, sub.clone());
        sub
    }

    /// Looks up a subscription by id.
    pub async fn subscription(&self, id: &[u8]) -> Option<Arc<Subscription>> {
        self.subs.lock().await.get(id).cloned()
    }

    /// Removes a subscription from this session's map, returning it if it
    /// was present.
    pub async fn close_subscription(&self, id: &[u8]) -> Option<Arc<Subscription>> {
        self.subs.lock().await.remove(id)
    }

    /// Every currently open subscription, for teardown.
    pub async fn subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.subs.lock().await.values().cloned().collect()
    }

    /// Removes and returns the entry awaiting acknowledgement under
    /// `token`, if any.
    pub async fn take_unacked(&self, token: &[u8]) -> Option<UnackedEntry> {
        self.unacked.lock().await.remove(token)
    }

    /// Every currently unacknowledged frame, draining the table — used on
    /// disconnect to redeliver them.
    pub async fn drain_unacked(&self) -> Vec<Frame> {
        self.unacked
            .lock()
            .await
            .drain()
            .map(|(_, entry)| entry.frame)
            .collect()
    }
}
