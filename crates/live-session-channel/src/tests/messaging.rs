//! Inbound dispatch, echo suppression, send and ping.

use super::harness::{MockServer, TestChannel};
use crate::{ChannelConfig, ChannelError, ChannelMessage};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

#[tokio::test]
async fn own_echo_is_dropped_and_others_reach_typed_and_wildcard_handlers() {
    let mut server = MockServer::start().await;
    let test = TestChannel::new(&server.url).with_session();

    let (typed_tx, mut typed_rx) = mpsc::unbounded_channel::<ChannelMessage>();
    let (any_tx, mut any_rx) = mpsc::unbounded_channel::<ChannelMessage>();
    let _typed = test.channel.on_message("profile_updated", move |msg| {
        let _ = typed_tx.send(msg.clone());
    });
    let _any = test.channel.on_any_message(move |msg| {
        let _ = any_tx.send(msg.clone());
    });

    test.channel.connect().await.unwrap();
    let conn = server.next_connection().await.unwrap();

    conn.send_json(json!({ "type": "profile_updated", "deviceId": test.device_id(), "n": 1 }));
    conn.send_json(json!({ "type": "profile_updated", "deviceId": "device_other", "n": 2 }));
    conn.send_json(json!({ "type": "profile_updated", "n": 3 }));
    conn.send_json(json!({ "type": "match_started", "deviceId": "device_other", "n": 4 }));

    let mut typed = Vec::new();
    for _ in 0..2 {
        typed.push(timeout(Duration::from_secs(3), typed_rx.recv()).await.unwrap().unwrap());
    }
    let mut any = Vec::new();
    for _ in 0..3 {
        any.push(timeout(Duration::from_secs(3), any_rx.recv()).await.unwrap().unwrap());
    }

    assert_eq!(typed.iter().map(|m| m.data["n"].clone()).collect::<Vec<_>>(), vec![json!(2), json!(3)]);
    assert_eq!(any.iter().map(|m| m.data["n"].clone()).collect::<Vec<_>>(), vec![json!(2), json!(3), json!(4)]);
    assert_eq!(typed[0].device_id.as_deref(), Some("device_other"));
    assert_eq!(typed[1].device_id, None);
    assert!(!typed[1].timestamp.is_empty());

    // Nothing else is pending: the echo never arrived.
    assert!(typed_rx.try_recv().is_err());
    assert!(any_rx.try_recv().is_err());
    test.channel.disconnect();
}

#[tokio::test]
async fn panicking_handler_does_not_stop_delivery() {
    let mut server = MockServer::start().await;
    let test = TestChannel::new(&server.url).with_session();

    let (tx, mut rx) = mpsc::unbounded_channel::<i64>();
    let _bad = test.channel.on_message("score", |_| panic!("subscriber bug"));
    let _good = test.channel.on_message("score", move |msg| {
        let _ = tx.send(msg.data["value"].as_i64().unwrap_or_default());
    });

    test.channel.connect().await.unwrap();
    let conn = server.next_connection().await.unwrap();
    conn.send_json(json!({ "type": "score", "value": 1 }));
    conn.send_json(json!({ "type": "score", "value": 2 }));

    assert_eq!(timeout(Duration::from_secs(3), rx.recv()).await.unwrap(), Some(1));
    assert_eq!(timeout(Duration::from_secs(3), rx.recv()).await.unwrap(), Some(2));
    assert!(test.channel.is_connected());
    test.channel.disconnect();
}

#[tokio::test]
async fn unsubscribed_handler_is_not_called() {
    let mut server = MockServer::start().await;
    let test = TestChannel::new(&server.url).with_session();

    let (gone_tx, mut gone_rx) = mpsc::unbounded_channel::<()>();
    let (kept_tx, mut kept_rx) = mpsc::unbounded_channel::<()>();
    let gone = test.channel.on_message("score", move |_| {
        let _ = gone_tx.send(());
    });
    let _kept = test.channel.on_message("score", move |_| {
        let _ = kept_tx.send(());
    });
    gone.unsubscribe();
    gone.unsubscribe();

    test.channel.connect().await.unwrap();
    let conn = server.next_connection().await.unwrap();
    conn.send_json(json!({ "type": "score" }));

    assert!(timeout(Duration::from_secs(3), kept_rx.recv()).await.unwrap().is_some());
    assert!(gone_rx.try_recv().is_err());
    test.channel.disconnect();
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let mut server = MockServer::start().await;
    let test = TestChannel::new(&server.url).with_session();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let _any = test.channel.on_any_message(move |msg| {
        let _ = tx.send(msg.message_type.clone());
    });

    test.channel.connect().await.unwrap();
    let conn = server.next_connection().await.unwrap();
    conn.send_json(json!(["not", "an", "object"]));
    conn.send_json(json!({ "type": "after" }));

    assert_eq!(
        timeout(Duration::from_secs(3), rx.recv()).await.unwrap().as_deref(),
        Some("after")
    );
    assert!(test.channel.is_connected());
    test.channel.disconnect();
}

#[tokio::test]
async fn send_requires_connection() {
    let server = MockServer::start().await;
    let test = TestChannel::new(&server.url).with_session();

    let err = test.channel.send("chat", json!({ "text": "hi" })).await.unwrap_err();
    assert!(matches!(err, ChannelError::NotConnected));
    assert_eq!(err.to_string(), "WebSocket not connected");
}

#[tokio::test]
async fn send_stamps_device_id_and_timestamp() {
    let mut server = MockServer::start().await;
    let test = TestChannel::new(&server.url).with_session();

    test.channel.connect().await.unwrap();
    let mut conn = server.next_connection().await.unwrap();
    test.channel
        .send("chat", json!({ "text": "gg", "deviceId": "spoofed" }))
        .await
        .unwrap();

    let frame = conn.next_frame_of("chat").await.unwrap();
    assert_eq!(frame["text"], "gg");
    assert_eq!(frame["deviceId"], test.device_id());
    assert!(chrono::DateTime::parse_from_rfc3339(frame["timestamp"].as_str().unwrap()).is_ok());

    test.channel.disconnect();
    let err = test.channel.send("chat", json!({})).await.unwrap_err();
    assert!(matches!(err, ChannelError::NotConnected));
}

#[tokio::test]
async fn pings_carry_device_id_and_current_token() {
    let mut server = MockServer::start().await;
    let mut config = ChannelConfig::new(server.url.clone());
    config.ping_interval = Duration::from_millis(50);
    let test = TestChannel::with_config(config).with_session();

    test.channel.connect().await.unwrap();
    let mut conn = server.next_connection().await.unwrap();

    let ping = conn.next_frame_of("ping").await.unwrap();
    assert_eq!(ping["deviceId"], test.device_id());
    assert_eq!(ping["token"], "access-1");
    assert!(ping["timestamp"].is_string());

    test.channel.disconnect();
}
