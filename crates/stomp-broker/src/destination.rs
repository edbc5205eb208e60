//! Topic (fan-out + retained history) and Queue (competing consumers +
//! redelivery) destination handlers, behind one shared interface.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use rand::seq::SliceRandom;
use stomp_frame::{Frame, Method, headers, parse_ascii_u64_lenient, random_token};
use stomp_selector::Row;
use tokio::sync::RwLock;
use tracing::warn;

use crate::session::{self, AckMode, Subscription};

/// A prefix-routed destination name decides which handler kind it gets.
pub const TOPIC_PREFIX: &[u8] = b"/topic/";

pub fn is_topic(name: &[u8]) -> bool {
    name.starts_with(TOPIC_PREFIX)
}

/// Read-only view of a frame's custom headers for selector evaluation.
/// Only the headers the codec didn't recognize as dedicated fields are
/// visible here, matching the source's `Header.Get` surface.
struct FrameRow<'a>(&'a Frame);

impl Row for FrameRow<'_> {
    fn field(&self, name: &str) -> Option<&str> {
        self.0
            .headers
            .iter()
            .find(|(k, _)| k.as_ref() == name.as_bytes())
            .and_then(|(_, v)| std::str::from_utf8(v).ok())
    }
}

fn matches(sub: &Subscription, frame: &Frame) -> bool {
    match &sub.selector {
        None => true,
        Some(selector) => match selector.eval(&FrameRow(frame)) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(error = %e, "selector evaluation error, treating as non-match");
                false
            }
        },
    }
}

fn tag_as_message(frame: &mut Frame, sub_id: Bytes) {
    frame.method = Method::Message;
    frame.message_id = Some(random_token());
    frame.subs = Some(sub_id);
}

/// A `/topic/*` destination: stateless fan-out plus optional retained
/// history replayed to new subscribers.
pub struct Topic {
    dest: Bytes,
    inner: RwLock<TopicInner>,
}

struct TopicInner {
    subs: Vec<Arc<Subscription>>,
    retained: Vec<Frame>,
}

impl Topic {
    pub fn new(dest: Bytes) -> Self {
        Topic {
            dest,
            inner: RwLock::new(TopicInner {
                subs: Vec::new(),
                retained: Vec::new(),
            }),
        }
    }

    pub async fn publish(&self, frame: Frame) {
        let subs = self.inner.read().await.subs.clone();
        for sub in &subs {
            if !matches(sub, &frame) {
                continue;
            }
            let mut copy = frame.clone();
            tag_as_message(&mut copy, sub.id.clone());
            let _ = sub.send(copy).await;
        }

        if let Some(retain) = frame.retain.clone() {
            let mut inner = self.inner.write().await;
            match retain.as_ref() {
                headers::values::RETAIN_LAST => {
                    inner.retained.clear();
                    inner.retained.push(frame);
                }
                headers::values::RETAIN_ALL => {
                    inner.retained.push(frame);
                }
                headers::values::RETAIN_REMOVE => {
                    inner.retained.clear();
                }
                _ => {}
            }
        }
    }

    pub async fn subscribe(&self, sub: Arc<Subscription>) {
        let retained = {
            let mut inner = self.inner.write().await;
            inner.subs.push(sub.clone());
            inner.retained.clone()
        };
        for frame in retained {
            let mut copy = frame;
            tag_as_message(&mut copy, sub.id.clone());
            let _ = sub.send(copy).await;
        }
    }

    pub async fn unsubscribe(&self, sub: &Arc<Subscription>) {
        let mut inner = self.inner.write().await;
        inner.subs.retain(|s| !Arc::ptr_eq(s, sub));
    }

    pub async fn disconnect(&self, session_id: u64) {
        let mut inner = self.inner.write().await;
        inner.subs.retain(|s| s.session_id != session_id);
    }

    /// Topics never honor `expires` or support redelivery: a NACKed/
    /// session-aborted topic message is simply dropped, matching the
    /// source (`topic.restore` is a no-op).
    pub async fn restore(&self, _frame: Frame) {}

    pub async fn recycle(&self) -> bool {
        let inner = self.inner.read().await;
        inner.subs.is_empty() && inner.retained.is_empty()
    }

    pub fn destination(&self) -> &Bytes {
        &self.dest
    }
}

/// A `/queue/*` destination: competing consumers over a FIFO-ish pending
/// list, with prefetch blocking and client-ack redelivery.
pub struct Queue {
    dest: Bytes,
    inner: RwLock<QueueInner>,
}

struct QueueInner {
    subs: Vec<Arc<Subscription>>,
    pending: VecDeque<Frame>,
}

impl Queue {
    pub fn new(dest: Bytes) -> Self {
        Queue {
            dest,
            inner: RwLock::new(QueueInner {
                subs: Vec::new(),
                pending: VecDeque::new(),
            }),
        }
    }

    pub async fn publish(&self, frame: Frame) {
        let mut copy = frame;
        copy.method = Method::Message;
        copy.message_id = Some(random_token());
        {
            let mut inner = self.inner.write().await;
            inner.pending.push_back(copy);
        }
        self.dispatch().await;
    }

    pub async fn subscribe(&self, sub: Arc<Subscription>) {
        {
            let mut inner = self.inner.write().await;
            inner.subs.push(sub);
        }
        self.dispatch().await;
    }

    pub async fn unsubscribe(&self, sub: &Arc<Subscription>) {
        let mut inner = self.inner.write().await;
        inner.subs.retain(|s| !Arc::ptr_eq(s, sub));
    }

    pub async fn disconnect(&self, session_id: u64) {
        let mut inner = self.inner.write().await;
        inner.subs.retain(|s| s.session_id != session_id);
    }

    /// Pushes a redelivered frame to the *front* of the pending list, so
    /// it is retried ahead of later arrivals, then runs one dispatch pass.
    pub async fn restore(&self, frame: Frame) {
        {
            let mut inner = self.inner.write().await;
            inner.pending.push_front(frame);
        }
        self.dispatch().await;
    }

    pub async fn recycle(&self) -> bool {
        let inner = self.inner.read().await;
        inner.subs.is_empty() && inner.pending.is_empty()
    }

    pub fn destination(&self) -> &Bytes {
        &self.dest
    }

    /// A single pass over the pending list, holding this queue's
    /// exclusive lock for the duration: drop expired frames, and for each
    /// remaining frame try a randomized subscriber in turn. A frame with
    /// no willing subscriber this pass is left in place — it isn't
    /// guaranteed to be the next one dispatched on a later pass.
    pub async fn dispatch(&self) {
        let mut inner = self.inner.write().await;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut order: Vec<usize> = (0..inner.subs.len()).collect();
        order.shuffle(&mut rand::thread_rng());

        let mut i = 0;
        while i < inner.pending.len() {
            let frame = &inner.pending[i];
            if let Some(expires) = &frame.expires {
                if !expires.is_empty() && parse_ascii_u64_lenient(expires) < now {
                    inner.pending.remove(i);
                    continue;
                }
            }

            let mut delivered = false;
            for &idx in &order {
                let sub = inner.subs[idx].clone();
                if !matches(&sub, &inner.pending[i]) || sub.prefetch_blocked() {
                    continue;
                }

                let mut msg = inner.pending.remove(i).expect("index in bounds");
                tag_as_message(&mut msg, sub.id.clone());

                if sub.ack_mode == AckMode::Client {
                    let token = random_token();
                    msg.ack = Some(token.clone());
                    if sub.prefetch != 0 {
                        sub.pending_incr();
                    }
                    session::track_unacked(&sub, token, msg.clone()).await;
                    let _ = sub.send(msg).await;
                } else {
                    let _ = sub.send(msg).await;
                }
                delivered = true;
                break;
            }

            if !delivered {
                i += 1;
            }
        }
    }
}

/// The tagged variant dispatched through the uniform destination
/// capability set.
pub enum Destination {
    Topic(Topic),
    Queue(Queue),
}

impl Destination {
    pub fn new(name: Bytes) -> Self {
        if is_topic(&name) {
            Destination::Topic(Topic::new(name))
        } else {
            Destination::Queue(Queue::new(name))
        }
    }

    pub fn destination(&self) -> &Bytes {
        match self {
            Destination::Topic(t) => t.destination(),
            Destination::Queue(q) => q.destination(),
        }
    }

    pub async fn publish(&self, frame: Frame) {
        match self {
            Destination::Topic(t) => t.publish(frame).await,
            Destination::Queue(q) => q.publish(frame).await,
        }
    }

    pub async fn subscribe(&self, sub: Arc<Subscription>) {
        match self {
            Destination::Topic(t) => t.subscribe(sub).await,
            Destination::Queue(q) => q.subscribe(sub).await,
        }
    }

    pub async fn unsubscribe(&self, sub: &Arc<Subscription>) {
        match self {
            Destination::Topic(t) => t.unsubscribe(sub).await,
            Destination::Queue(q) => q.unsubscribe(sub).await,
        }
    }

    pub async fn disconnect(&self, session_id: u64) {
        match self {
            Destination::Topic(t) => t.disconnect(session_id).await,
            Destination::Queue(q) => q.disconnect(session_id).await,
        }
    }

    pub async fn restore(&self, frame: Frame) {
        match self {
            Destination::Topic(t) => t.restore(frame).await,
            Destination::Queue(q) => q.restore(frame).await,
        }
    }

    pub async fn recycle(&self) -> bool {
        match self {
            Destination::Topic(t) => t.recycle().await,
            Destination::Queue(q) => q.recycle().await,
        }
    }

    /// Re-runs the dispatch loop after an ACK frees up prefetch headroom.
    /// A no-op for topics, which have no pending list.
    pub async fn redispatch(&self) {
        if let Destination::Queue(q) = self {
            q.dispatch().await;
        }
    }
}
