//! A topic's retained history should track exactly what spec.md §8
//! prescribes for the sequence `last, last, all, all, remove`: retained
//! sizes of 1, 1, 2, 3, 0, observed as how many frames a fresh subscriber
//! gets replayed immediately after each publish.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use stomp_broker_workspace::{Frame, Method, Peer, Router, RouterConfig};

async fn connect(peer: &mut Peer) {
    let mut stomp = Frame::new(Method::Stomp);
    stomp.proto = Some(Bytes::from_static(b"1.2"));
    peer.send(stomp).await.unwrap();
    let connected = peer.receive().await.unwrap();
    assert_eq!(connected.method, Method::Connected);
}

async fn publish_with_retain(router: &Arc<Router>, retain: &'static [u8], body: &'static [u8]) {
    let (mut publisher, pub_peer) = Peer::pipe();
    let r = router.clone();
    tokio::spawn(async move { r.serve(pub_peer).await });
    connect(&mut publisher).await;

    let mut send = Frame::new(Method::Send);
    send.dest = Some(Bytes::from_static(b"/topic/retained"));
    send.body = Bytes::from_static(body);
    send.retain = Some(Bytes::from_static(retain));
    publisher.send(send).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// Subscribes, counts how many MESSAGE frames are replayed within a short
/// window, then unsubscribes so the next probe starts clean.
async fn count_retained(router: &Arc<Router>) -> usize {
    let (mut subscriber, sub_peer) = Peer::pipe();
    let r = router.clone();
    tokio::spawn(async move { r.serve(sub_peer).await });
    connect(&mut subscriber).await;

    let mut sub = Frame::new(Method::Subscribe);
    sub.id = Some(Bytes::from_static(b"1"));
    sub.dest = Some(Bytes::from_static(b"/topic/retained"));
    subscriber.send(sub).await.unwrap();

    let mut count = 0;
    loop {
        match tokio::time::timeout(Duration::from_millis(100), subscriber.receive()).await {
            Ok(Some(frame)) if frame.method == Method::Message => count += 1,
            _ => break,
        }
    }
    count
}

#[tokio::test]
async fn retain_sequence_matches_expected_sizes() {
    let router = Arc::new(Router::new(RouterConfig::default()));

    publish_with_retain(&router, b"last", b"1").await;
    assert_eq!(count_retained(&router).await, 1);

    publish_with_retain(&router, b"last", b"2").await;
    assert_eq!(count_retained(&router).await, 1);

    publish_with_retain(&router, b"all", b"3").await;
    assert_eq!(count_retained(&router).await, 2);

    publish_with_retain(&router, b"all", b"4").await;
    assert_eq!(count_retained(&router).await, 3);

    publish_with_retain(&router, b"remove", b"5").await;
    assert_eq!(count_retained(&router).await, 0);
}
