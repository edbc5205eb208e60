//! The STOMP broker core: the peer abstraction, topic/queue destination
//! handlers, the router directory, and per-connection session state.
//!
//! The wire codec ([`stomp_frame`]) and selector engine ([`stomp_selector`])
//! live in their own crates; this crate is the concurrent machinery that
//! ties them together into a working broker. It never opens a socket
//! itself — [`Peer::connect`] takes anything implementing
//! `tokio::io::AsyncRead + AsyncWrite`, leaving TCP/WebSocket acceptance,
//! TLS, and CLI configuration to an external front-end.

mod auth;
mod destination;
mod error;
mod peer;
mod router;
mod session;

pub use auth::{Authorizer, basic_auth};
pub use destination::{Destination, Queue, Topic};
pub use error::RouterError;
pub use peer::{Peer, PeerError};
pub use router::{Router, RouterConfig, SessionInfo};
pub use session::{AckMode, Session, Subscription};

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use stomp_frame::{Frame, Method};
    use std::time::Duration;

    async fn expect_message(peer: &mut Peer, body: &[u8]) -> Frame {
        let frame = tokio::time::timeout(Duration::from_secs(1), peer.receive())
            .await
            .expect("frame within timeout")
            .expect("peer open");
        assert_eq!(frame.method, Method::Message);
        assert_eq!(frame.body.as_ref(), body);
        frame
    }

    async fn connect(peer: &mut Peer) {
        let mut stomp = Frame::new(Method::Stomp);
        stomp.proto = Some(Bytes::from_static(b"1.2"));
        peer.send(stomp).await.unwrap();
        let connected = peer.receive().await.unwrap();
        assert_eq!(connected.method, Method::Connected);
    }

    #[tokio::test]
    async fn topic_pub_sub_fan_out() {
        let router = Router::new(RouterConfig::default());
        let (mut publisher, pub_peer) = Peer::pipe();
        let (mut subscriber, sub_peer) = Peer::pipe();

        let router = std::sync::Arc::new(router);
        let r1 = router.clone();
        tokio::spawn(async move { r1.serve(pub_peer).await });
        let r2 = router.clone();
        tokio::spawn(async move { r2.serve(sub_peer).await });

        connect(&mut publisher).await;
        connect(&mut subscriber).await;

        let mut sub = Frame::new(Method::Subscribe);
        sub.id = Some(Bytes::from_static(b"1"));
        sub.dest = Some(Bytes::from_static(b"/topic/t"));
        subscriber.send(sub).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut send = Frame::new(Method::Send);
        send.dest = Some(Bytes::from_static(b"/topic/t"));
        send.body = Bytes::from_static(b"hello");
        publisher.send(send).await.unwrap();

        let msg = expect_message(&mut subscriber, b"hello").await;
        assert_eq!(msg.subs.as_deref(), Some(b"1".as_ref()));
    }

    #[tokio::test]
    async fn queue_competing_consumers_no_duplicates() {
        let router = std::sync::Arc::new(Router::new(RouterConfig::default()));
        let (mut publisher, pub_peer) = Peer::pipe();
        let (mut a, a_peer) = Peer::pipe();
        let (mut b, b_peer) = Peer::pipe();

        for peer in [pub_peer, a_peer, b_peer] {
            let r = router.clone();
            tokio::spawn(async move { r.serve(peer).await });
        }
        connect(&mut publisher).await;
        connect(&mut a).await;
        connect(&mut b).await;

        for (peer, id) in [(&mut a, "a"), (&mut b, "b")] {
            let mut sub = Frame::new(Method::Subscribe);
            sub.id = Some(Bytes::copy_from_slice(id.as_bytes()));
            sub.dest = Some(Bytes::from_static(b"/queue/q"));
            peer.send(sub).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        for i in 0..3 {
            let mut send = Frame::new(Method::Send);
            send.dest = Some(Bytes::from_static(b"/queue/q"));
            send.body = Bytes::copy_from_slice(format!("m{i}").as_bytes());
            publisher.send(send).await.unwrap();
        }

        let mut received = 0;
        loop {
            tokio::select! {
                Some(f) = a.receive() => { assert_eq!(f.method, Method::Message); received += 1; }
                Some(f) = b.receive() => { assert_eq!(f.method, Method::Message); received += 1; }
                _ = tokio::time::sleep(Duration::from_millis(200)) => break,
            }
            if received == 3 {
                break;
            }
        }
        assert_eq!(received, 3);
    }

    #[tokio::test]
    async fn selector_filters_topic_messages() {
        let router = std::sync::Arc::new(Router::new(RouterConfig::default()));
        let (mut publisher, pub_peer) = Peer::pipe();
        let (mut subscriber, sub_peer) = Peer::pipe();
        for peer in [pub_peer, sub_peer] {
            let r = router.clone();
            tokio::spawn(async move { r.serve(peer).await });
        }
        connect(&mut publisher).await;
        connect(&mut subscriber).await;

        let mut sub = Frame::new(Method::Subscribe);
        sub.id = Some(Bytes::from_static(b"1"));
        sub.dest = Some(Bytes::from_static(b"/topic/t"));
        sub.selector = Some(Bytes::from_static(b"skip != true"));
        subscriber.send(sub).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut keep = Frame::new(Method::Send);
        keep.dest = Some(Bytes::from_static(b"/topic/t"));
        keep.body = Bytes::from_static(b"keep");
        publisher.send(keep).await.unwrap();

        let mut drop_frame = Frame::new(Method::Send);
        drop_frame.dest = Some(Bytes::from_static(b"/topic/t"));
        drop_frame.body = Bytes::from_static(b"drop");
        drop_frame
            .headers
            .push((Bytes::from_static(b"skip"), Bytes::from_static(b"true")));
        publisher.send(drop_frame).await.unwrap();

        expect_message(&mut subscriber, b"keep").await;
        let nothing_else = tokio::time::timeout(Duration::from_millis(100), subscriber.receive()).await;
        assert!(nothing_else.is_err(), "expected no further message");
    }

    #[tokio::test]
    async fn ack_redelivery_on_disconnect() {
        let router = std::sync::Arc::new(Router::new(RouterConfig::default()));
        let (mut publisher, pub_peer) = Peer::pipe();
        let (mut a, a_peer) = Peer::pipe();
        for peer in [pub_peer, a_peer] {
            let r = router.clone();
            tokio::spawn(async move { r.serve(peer).await });
        }
        connect(&mut publisher).await;
        connect(&mut a).await;

        let mut sub = Frame::new(Method::Subscribe);
        sub.id = Some(Bytes::from_static(b"1"));
        sub.dest = Some(Bytes::from_static(b"/queue/q"));
        sub.ack = Some(Bytes::from_static(b"client"));
        a.send(sub).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut send = Frame::new(Method::Send);
        send.dest = Some(Bytes::from_static(b"/queue/q"));
        send.body = Bytes::from_static(b"m");
        publisher.send(send).await.unwrap();

        let msg = expect_message(&mut a, b"m").await;
        assert!(msg.ack.is_some());

        a.close();
        drop(a);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (mut b, b_peer) = Peer::pipe();
        let r = router.clone();
        tokio::spawn(async move { r.serve(b_peer).await });
        connect(&mut b).await;

        let mut sub2 = Frame::new(Method::Subscribe);
        sub2.id = Some(Bytes::from_static(b"1"));
        sub2.dest = Some(Bytes::from_static(b"/queue/q"));
        b.send(sub2).await.unwrap();

        expect_message(&mut b, b"m").await;
    }

    #[tokio::test]
    async fn unknown_topic_publish_reports_no_destination() {
        let router = Router::new(RouterConfig::default());
        let mut frame = Frame::new(Method::Send);
        frame.dest = Some(Bytes::from_static(b"/topic/nobody-home"));
        frame.body = Bytes::from_static(b"x");
        let result = router.publish(frame).await;
        assert!(matches!(result, Err(RouterError::NoDestination)));
    }

    #[tokio::test]
    async fn receipt_is_echoed_after_send() {
        let router = std::sync::Arc::new(Router::new(RouterConfig::default()));
        let (mut client, server_peer) = Peer::pipe();
        let r = router.clone();
        tokio::spawn(async move { r.serve(server_peer).await });
        connect(&mut client).await;

        let mut send = Frame::new(Method::Send);
        send.dest = Some(Bytes::from_static(b"/queue/q"));
        send.body = Bytes::from_static(b"x");
        send.receipt = Some(Bytes::from_static(b"r1"));
        client.send(send).await.unwrap();

        let receipt = tokio::time::timeout(Duration::from_secs(1), client.receive())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(receipt.method, Method::Receipt);
        assert_eq!(receipt.receipt.as_deref(), Some(b"r1".as_ref()));
    }
}
