//! Watchdog and reconnection behaviour of a live connection.

mod common;

use std::time::Duration;

use common::{MockServer, Push};
use pt_core::dispatch::VenueClient;
use pt_core::ws::{ConnectionConfig, ConnectionEvent, ConnectionState};
use pt_md::okx::protocol::{OkxChannel, OkxKey, OkxProtocol};
use tokio::sync::mpsc;

fn fast_config(url: &str) -> ConnectionConfig {
    ConnectionConfig::new(url)
        .with_heartbeat_enabled(false)
        .with_reconnect_wait(Duration::from_millis(400))
        .with_timer_interval(Duration::from_millis(50))
}

async fn wait_event(
    rx: &mut mpsc::Receiver<ConnectionEvent>,
    want: impl Fn(&ConnectionEvent) -> bool,
) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if want(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn silence_triggers_exactly_one_reconnect() {
    let server = MockServer::start().await;
    let client = VenueClient::new("silent", fast_config(&server.url), OkxProtocol::default());
    client.start().await.unwrap();
    assert_eq!(server.accepted(), 1);

    // Silence is noticed after ~450ms, then the reconnect waits another
    // 400ms before dialing; the next silence window ends well after 1150ms.
    tokio::time::sleep(Duration::from_millis(1150)).await;
    assert_eq!(server.accepted(), 2);
    assert_eq!(client.connection().state(), ConnectionState::Open);
    assert_eq!(client.connection().reconnect_attempts(), 0);

    client.stop().await;
}

#[tokio::test]
async fn reconnect_replays_subscriptions() {
    let mut server = MockServer::start().await;
    let client = VenueClient::new("replay", fast_config(&server.url), OkxProtocol::default());
    let mut events = client.take_event_receiver().unwrap();
    assert!(client.take_event_receiver().is_none());

    // Registered before start: sent by the connect replay.
    let key = OkxKey::new(OkxChannel::Tickers, "BTC-USDT");
    client.subscribe(key, None).await.unwrap();
    client.start().await.unwrap();
    wait_event(&mut events, |e| *e == ConnectionEvent::Connected).await;

    let first = server.next_conn().await;
    let (index, sub) = server.next_frame().await;
    assert_eq!(index, 0);
    assert!(sub.contains(r#""instId":"BTC-USDT""#));

    first.send(Push::Drop).unwrap();
    wait_event(&mut events, |e| *e == ConnectionEvent::Disconnected).await;
    wait_event(&mut events, |e| matches!(e, ConnectionEvent::Reconnecting { attempt: 1 })).await;
    wait_event(&mut events, |e| *e == ConnectionEvent::Reconnected).await;

    let (index, sub) = server.next_frame().await;
    assert_eq!(index, 1);
    assert!(sub.contains(r#""op":"subscribe""#));
    assert!(sub.contains(r#""instId":"BTC-USDT""#));

    client.stop().await;
    wait_event(&mut events, |e| *e == ConnectionEvent::Stopped).await;
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    let config = fast_config(&server.url)
        .with_reconnect_wait(Duration::from_millis(200))
        .with_max_reconnect_attempts(2);
    let client = VenueClient::new("doomed", config, OkxProtocol::default());
    let mut events = client.take_event_receiver().unwrap();
    client.start().await.unwrap();

    server.shutdown();

    let event = wait_event(&mut events, |e| matches!(e, ConnectionEvent::ReconnectExhausted { .. })).await;
    assert_eq!(event, ConnectionEvent::ReconnectExhausted { attempts: 2 });
    assert!(client.connection().is_exhausted());
    assert_eq!(client.connection().state(), ConnectionState::Stopped);
    assert!(!client.connection().is_running());

    client.stop().await;
}

#[tokio::test]
async fn no_auto_reconnect_stops_on_loss() {
    let mut server = MockServer::start().await;
    let config = fast_config(&server.url).with_auto_reconnect(false);
    let client = VenueClient::new("oneshot", config, OkxProtocol::default());
    let mut events = client.take_event_receiver().unwrap();
    client.start().await.unwrap();

    server.next_conn().await.send(Push::Drop).unwrap();
    wait_event(&mut events, |e| *e == ConnectionEvent::Stopped).await;
    assert_eq!(client.connection().state(), ConnectionState::Stopped);
    assert!(!client.connection().is_exhausted());
    assert_eq!(server.accepted(), 1);
}

#[tokio::test]
async fn stop_interrupts_pending_reconnect() {
    let mut server = MockServer::start().await;
    let config = fast_config(&server.url).with_reconnect_wait(Duration::from_secs(30));
    let client = VenueClient::new("interrupted", config, OkxProtocol::default());
    let mut events = client.take_event_receiver().unwrap();
    client.start().await.unwrap();

    server.next_conn().await.send(Push::Drop).unwrap();
    wait_event(&mut events, |e| matches!(e, ConnectionEvent::Reconnecting { attempt: 1 })).await;

    // The 30s backoff must not hold up the stop.
    tokio::time::timeout(Duration::from_secs(2), client.stop())
        .await
        .expect("stop returned while a reconnect was pending");
    wait_event(&mut events, |e| *e == ConnectionEvent::Stopped).await;
    assert_eq!(client.connection().state(), ConnectionState::Stopped);
    assert!(!client.connection().is_running());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.accepted(), 1);
}
