//! End-to-end: two `stomp_client::Client`s talking to one `Router` over
//! `Peer::pipe()`, covering publish/subscribe and a synchronous receipt
//! without touching either crate's internals.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use stomp_broker_workspace::{Client, Frame, Peer, Router, RouterConfig};

#[tokio::test]
async fn publish_subscribe_and_receipt_over_the_client() {
    let router = Arc::new(Router::new(RouterConfig::default()));

    let (pub_client_peer, pub_server_peer) = Peer::pipe();
    let (sub_client_peer, sub_server_peer) = Peer::pipe();
    for peer in [pub_server_peer, sub_server_peer] {
        let r = router.clone();
        tokio::spawn(async move { r.serve(peer).await });
    }

    let (publisher, _pub_done) = Client::connect(pub_client_peer).await.unwrap();
    let (subscriber, _sub_done) = Client::connect(sub_client_peer).await.unwrap();

    let received = Arc::new(AtomicUsize::new(0));
    let counted = received.clone();
    subscriber
        .subscribe(
            "/topic/announcements",
            Arc::new(move |frame: Frame| {
                assert_eq!(frame.body.as_ref(), b"launching soon");
                counted.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let receipt_result = tokio::time::timeout(
        Duration::from_secs(1),
        publisher.send_with("/topic/announcements", "launching soon", |f| {
            f.receipt = Some(Bytes::from_static(b"r-announce"));
        }),
    )
    .await;
    assert!(receipt_result.unwrap().is_ok());

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(received.load(Ordering::SeqCst), 1);

    publisher.disconnect().await;
    subscriber.disconnect().await;
}
