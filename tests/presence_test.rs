//! Presence integration tests
//!
//! Sessions are opened through the gateway session type over the in-memory
//! adapters; time is driven by the manual clock.

#[macro_use]
mod common;

use std::time::Duration;

use pulsechat::backend::realtime::Topic;
use pulsechat::shared::messaging::UserStatus;

#[tokio::test]
async fn test_many_sessions_one_offline_broadcast() {
    let h = common::harness();
    let alice = h.user("alice").await;
    let (_watcher, mut watched) = h.listen(Topic::Status(alice));

    let mut sessions = Vec::new();
    for _ in 0..3 {
        sessions.push(h.connect(alice).await);
    }
    assert_eq!(h.state.presence.session_count(alice).await.unwrap(), 3);

    for session in sessions {
        session.close().await;
    }
    assert_eq!(h.state.presence.session_count(alice).await.unwrap(), 0);

    h.advance(Duration::from_secs(31));
    assert_eq!(h.state.presence.sweep().await.unwrap().flipped, 1);
    assert_eq!(h.state.presence.sweep().await.unwrap().flipped, 0);

    let frames = common::drain(&mut watched);
    let statuses: Vec<&str> = frames
        .iter()
        .map(|f| f.data["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses.len(), 2, "got {:?}", statuses);
    assert_eq!(statuses[0], "online");
    assert!(statuses[1].starts_with("lastActive:"));

    let status = h.state.presence.get_status(alice).await.unwrap();
    assert!(matches!(status, UserStatus::LastActive(_)));
}

#[tokio::test]
async fn test_reconnect_within_grace_keeps_user_online() {
    let h = common::harness();
    let alice = h.user("alice").await;
    let (_watcher, mut watched) = h.listen(Topic::Status(alice));

    let first = h.connect(alice).await;
    first.close().await;

    h.advance(Duration::from_secs(10));
    let _second = h.connect(alice).await;

    h.advance(Duration::from_secs(60));
    let report = h.state.presence.sweep().await.unwrap();
    assert_eq!(report.flipped, 0);

    let frames = common::drain(&mut watched);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data["status"], "online");
    assert_eq!(
        h.state.presence.get_status(alice).await.unwrap(),
        UserStatus::Online
    );
}

#[tokio::test]
async fn test_disconnect_before_grace_expires_is_not_flipped() {
    let h = common::harness();
    let alice = h.user("alice").await;

    let session = h.connect(alice).await;
    session.close().await;

    h.advance(Duration::from_secs(29));
    assert_eq!(h.state.presence.sweep().await.unwrap().flipped, 0);
    assert!(h.state.presence.get_status(alice).await.unwrap().is_online());

    h.advance(Duration::from_secs(2));
    assert_eq!(h.state.presence.sweep().await.unwrap().flipped, 1);
    assert!(!h.state.presence.get_status(alice).await.unwrap().is_online());
}

#[tokio::test]
async fn test_status_subscription_over_session() {
    let h = common::harness();
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;

    let mut watcher = h.connect(bob).await;
    watcher.drain();
    watcher
        .send(serde_json::json!({"event": "get_status", "data": {"id": alice}}))
        .await;
    let reply = expect_event!(watcher.drain(), format!("status_{}", alice));
    assert_eq!(reply.data["status"], "offline");

    let alice_session = h.connect(alice).await;
    let update = expect_event!(watcher.drain(), format!("status_{}", alice));
    assert_eq!(update.data["status"], "online");

    watcher
        .send(serde_json::json!({"event": "get_status_off", "data": {"id": alice}}))
        .await;
    alice_session.close().await;
    h.advance(Duration::from_secs(31));
    assert_eq!(h.state.presence.sweep().await.unwrap().flipped, 1);
    assert!(watcher.drain().is_empty());
}
