use std::sync::Mutex;

use bytes::Bytes;
use rand::Rng;

use crate::frame::Frame;
use crate::method::Method;

/// Generates a random token suitable for a message id, ack token, or
/// subscription id: an ASCII decimal rendering of a random 63-bit
/// non-negative integer, mirroring the source's `stomp.Rand()`.
pub fn random_token() -> Bytes {
    let n: u64 = rand::thread_rng().gen_range(0..=i64::MAX as u64);
    Bytes::from(n.to_string())
}

/// A bounded free-list of reusable [`Frame`]s.
///
/// Pooling is a performance optimization, not a correctness requirement —
/// callers are free to just construct `Frame::new(..)` directly. When
/// used, `release` resets every field (the sentinel method included) so a
/// reused frame can never leak a previous caller's data, matching the
/// source's pool-reset contract.
pub struct FramePool {
    free: Mutex<Vec<Frame>>,
    capacity: usize,
}

impl FramePool {
    pub fn new(capacity: usize) -> Self {
        FramePool {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Acquires a blank frame, reusing one from the pool if available.
    pub fn acquire(&self) -> Frame {
        self.free
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Frame::new(Method::Error))
    }

    /// Resets `frame` to a blank state and returns it to the pool,
    /// dropping it instead once the pool is at capacity.
    pub fn release(&self, mut frame: Frame) {
        reset(&mut frame);
        let mut free = self.free.lock().unwrap();
        if free.len() < self.capacity {
            free.push(frame);
        }
    }
}

fn reset(frame: &mut Frame) {
    frame.method = Method::Error;
    frame.proto = None;
    frame.user = None;
    frame.pass = None;
    frame.dest = None;
    frame.id = None;
    frame.subs = None;
    frame.ack = None;
    frame.message_id = None;
    frame.persist = None;
    frame.retain = None;
    frame.prefetch = None;
    frame.expires = None;
    frame.receipt = None;
    frame.selector = None;
    frame.body = Bytes::new();
    frame.headers.clear();
}
