//! The directory of destinations and the per-session `serve` loop that
//! drives frame dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use stomp_frame::{Frame, Method};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::auth::Authorizer;
use crate::destination::{Destination, is_topic};
use crate::error::RouterError;
use crate::peer::Peer;
use crate::session::Session;

/// Tunable knobs for a [`Router`], supplied at construction rather than
/// read from the environment — env parsing belongs to whatever external
/// front-end owns `main`.
#[derive(Default)]
pub struct RouterConfig {
    /// Installed as the session's authorizer, invoked on the first frame.
    pub authorizer: Option<Authorizer>,
}

/// A projection of session state for an external admin surface (not part
/// of this crate's public wire protocol). Gains `serde::Serialize` under
/// the `admin` feature so a caller can hand it straight to `serde_json`
/// without this crate depending on `serde` in its default build.
#[cfg_attr(feature = "admin", derive(serde::Serialize))]
pub struct SessionInfo {
    pub addr: String,
    pub user: Option<String>,
    pub headers: Vec<(String, String)>,
}

/// The shared directory of destinations plus the active session set. One
/// `Router` is shared across every connection task.
pub struct Router {
    config: RouterConfig,
    destinations: RwLock<HashMap<Bytes, Arc<Destination>>>,
    sessions: RwLock<HashMap<u64, Arc<Session>>>,
    next_session_id: AtomicU64,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Router {
            config,
            destinations: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            next_session_id: AtomicU64::new(0),
        }
    }

    /// Drives one connection end to end: awaits the initial STOMP frame,
    /// authorizes it, replies CONNECTED, then loops dispatching frames by
    /// method until DISCONNECT or the peer closes. Always tears the
    /// session down (handler notification + unacked redelivery) before
    /// returning, even on error.
    #[instrument(skip(self, peer), fields(addr = peer.addr()))]
    pub async fn serve(&self, mut peer: Peer) -> Result<(), RouterError> {
        let hello = match peer.receive().await {
            Some(frame) => frame,
            None => return Ok(()),
        };

        if hello.method != Method::Stomp {
            return Err(RouterError::ExpectedStomp);
        }

        if let Some(authorizer) = &self.config.authorizer {
            authorizer(&hello)?;
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let session = Arc::new(Session::new(session_id, &peer, hello));
        self.sessions
            .write()
            .await
            .insert(session_id, session.clone());
        info!(session_id, "session connected");

        let mut connected = Frame::new(Method::Connected);
        connected.proto = Some(Bytes::from_static(b"1.2"));
        let _ = session.send(connected).await;

        let result = self.serve_loop(&session, &mut peer).await;

        self.disconnect(&session).await;
        self.sessions.write().await.remove(&session_id);
        peer.close();
        info!(session_id, "session disconnected");

        result
    }

    async fn serve_loop(&self, session: &Arc<Session>, peer: &mut Peer) -> Result<(), RouterError> {
        loop {
            let Some(frame) = peer.receive().await else {
                return Ok(());
            };

            if frame.method == Method::Disconnect {
                return Ok(());
            }

            let receipt = frame.receipt.clone();
            let result = self.dispatch(session, frame).await;
            if let Err(e) = &result {
                warn!(error = %e, "error handling frame");
            }

            if let Some(token) = receipt {
                let mut receipt_frame = Frame::new(Method::Receipt);
                receipt_frame.receipt = Some(token);
                let _ = session.send(receipt_frame).await;
            }
        }
    }

    async fn dispatch(&self, session: &Arc<Session>, frame: Frame) -> Result<(), RouterError> {
        match frame.method {
            Method::Send => self.publish(frame).await,
            Method::Subscribe => self.subscribe(session, frame).await,
            Method::Unsubscribe => self.unsubscribe(session, &frame).await,
            Method::Ack => {
                self.ack(session, &frame).await;
                Ok(())
            }
            Method::Nack => {
                self.nack(session, &frame).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Publishes `frame` to its destination, auto-creating queues (and
    /// topics that carry a `retain` header) on demand. Publishing to a
    /// `/topic/*` with no subscribers and no `retain` is reported as
    /// `NoDestination` rather than silently creating an empty topic.
    pub async fn publish(&self, frame: Frame) -> Result<(), RouterError> {
        let Some(dest) = frame.dest.clone() else {
            return Err(RouterError::NoDestination);
        };

        let existing = self.destinations.read().await.get(&dest).cloned();
        let handler = match existing {
            Some(h) => h,
            None => {
                if is_topic(&dest) && frame.retain.is_none() {
                    return Err(RouterError::NoDestination);
                }
                let mut destinations = self.destinations.write().await;
                destinations
                    .entry(dest.clone())
                    .or_insert_with(|| Arc::new(Destination::new(dest.clone())))
                    .clone()
            }
        };

        handler.publish(frame).await;
        Ok(())
    }

    /// Subscribes `session` to the destination named in `frame`, creating
    /// it if it does not yet exist.
    pub async fn subscribe(&self, session: &Arc<Session>, frame: Frame) -> Result<(), RouterError> {
        let dest = frame.dest.clone().unwrap_or_default();
        let handler = {
            let mut destinations = self.destinations.write().await;
            destinations
                .entry(dest.clone())
                .or_insert_with(|| Arc::new(Destination::new(dest.clone())))
                .clone()
        };

        let sub = session.open_subscription(&frame).await;
        handler.subscribe(sub).await;
        Ok(())
    }

    /// Unsubscribes `session` from the subscription named in `frame`'s
    /// `id` header. `NoSubscription` if the id is not open on this
    /// session.
    pub async fn unsubscribe(&self, session: &Arc<Session>, frame: &Frame) -> Result<(), RouterError> {
        let Some(id) = &frame.id else {
            return Err(RouterError::NoSubscription);
        };

        let Some(sub) = session.close_subscription(id).await else {
            return Err(RouterError::NoSubscription);
        };

        if let Some(handler) = self.destinations.read().await.get(&sub.dest).cloned() {
            handler.unsubscribe(&sub).await;
            self.collect(&handler).await;
        }
        Ok(())
    }

    /// Removes `frame.id`'s entry from the session's unacked table. If the
    /// subscription it belonged to has prefetch enabled, releases one
    /// slot and re-runs the destination's dispatch loop so a previously
    /// skipped-over message can go out.
    pub async fn ack(&self, session: &Arc<Session>, frame: &Frame) {
        let Some(token) = &frame.id else { return };
        let Some(entry) = session.take_unacked(token).await else {
            return;
        };

        if entry.subscription.prefetch != 0 {
            entry.subscription.pending_decr();
        }

        if let Some(handler) = self.destinations.read().await.get(&entry.subscription.dest).cloned() {
            handler.redispatch().await;
        }
    }

    /// Removes `frame.id`'s entry from the session's unacked table and,
    /// if present, republishes the original frame — causing redelivery to
    /// some other eligible subscriber (or re-enqueue if none).
    pub async fn nack(&self, session: &Arc<Session>, frame: &Frame) {
        let Some(token) = &frame.id else { return };
        if let Some(entry) = session.take_unacked(token).await {
            let _ = self.publish(entry.frame).await;
        }
    }

    /// Tears a session down: notifies every destination it was subscribed
    /// to, collects now-empty destinations, and redelivers every
    /// unacknowledged frame.
    pub async fn disconnect(&self, session: &Arc<Session>) {
        for sub in session.subscriptions().await {
            if let Some(handler) = self.destinations.read().await.get(&sub.dest).cloned() {
                handler.disconnect(session.id).await;
                self.collect(&handler).await;
            }
        }

        for frame in session.drain_unacked().await {
            let _ = self.publish(frame).await;
        }
    }

    /// Removes `handler` from the directory if it reports itself empty.
    async fn collect(&self, handler: &Arc<Destination>) {
        if handler.recycle().await {
            self.destinations.write().await.remove(handler.destination());
        }
    }

    /// A plain synchronous projection of active sessions, for an external
    /// admin HTTP surface to serialize.
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .map(|s| SessionInfo {
                addr: s.addr().to_owned(),
                user: s
                    .hello
                    .user
                    .as_deref()
                    .map(|u| String::from_utf8_lossy(u).into_owned()),
                headers: s
                    .hello
                    .headers
                    .iter()
                    .map(|(k, v)| {
                        (
                            String::from_utf8_lossy(k).into_owned(),
                            String::from_utf8_lossy(v).into_owned(),
                        )
                    })
                    .collect(),
            })
            .collect()
    }

    /// A plain synchronous projection of destination names, for an
    /// external admin HTTP surface to serialize.
    pub async fn list_destinations(&self) -> Vec<String> {
        let destinations = self.destinations.read().await;
        destinations
            .keys()
            .map(|d| String::from_utf8_lossy(d).into_owned())
            .collect()
    }
}
