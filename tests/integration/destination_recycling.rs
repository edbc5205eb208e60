//! A queue with no subscribers and no pending messages — or a topic with
//! no subscribers and no retained history — is removed from the
//! router's directory so it doesn't leak indefinitely.

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

#[tokio::test]
async fn empty_queue_is_collected_after_unsubscribe() {
    let router = Arc::new(Router::new(RouterConfig::default()));
    let (mut subscriber, sub_peer) = Peer::pipe();
    let r = router.clone();
    tokio::spawn(async move { r.serve(sub_peer).await });
    connect(&mut subscriber).await;

    let mut sub = Frame::new(Method::Subscribe);
    sub.id = Some(Bytes::from_static(b"1"));
    sub.dest = Some(Bytes::from_static(b"/queue/ephemeral"));
    subscriber.send(sub).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(
        router
            .list_destinations()
            .await
            .contains(&"/queue/ephemeral".to_owned())
    );

    let mut unsub = Frame::new(Method::Unsubscribe);
    unsub.id = Some(Bytes::from_static(b"1"));
    subscriber.send(unsub).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(
        !router
            .list_destinations()
            .await
            .contains(&"/queue/ephemeral".to_owned())
    );
}

#[tokio::test]
async fn disconnect_without_unsubscribe_also_collects_the_destination() {
    let router = Arc::new(Router::new(RouterConfig::default()));
    let (mut subscriber, sub_peer) = Peer::pipe();
    let r = router.clone();
    tokio::spawn(async move { r.serve(sub_peer).await });
    connect(&mut subscriber).await;

    let mut sub = Frame::new(Method::Subscribe);
    sub.id = Some(Bytes::from_static(b"1"));
    sub.dest = Some(Bytes::from_static(b"/topic/ephemeral"));
    subscriber.send(sub).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    drop(subscriber);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(
        !router
            .list_destinations()
            .await
            .contains(&"/topic/ephemeral".to_owned())
    );
}
