//! Failover behaviour of the connection manager
//!
//! Drives the full state machine against the in-memory server with paused
//! time: heartbeat failure, polling, recovery, bounded retries and the
//! consumed-after-disconnect rule.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use xmlblaster_client::codec::ConnectOptions;
use xmlblaster_client::testing::{MockTransport, RecordingListener};
use xmlblaster_client::{
    ConnectionManager, ConnectionSettings, ConnectionState, Key, MsgUnit,
};

fn news() -> MsgUnit {
    MsgUnit::new(
        Key::exact("news").expect("valid oid"),
        "breaking",
        Default::default(),
    )
}

fn setup(
    settings: ConnectionSettings,
) -> (
    Arc<MockTransport>,
    ConnectionManager<MockTransport>,
    Arc<RecordingListener>,
) {
    let transport = Arc::new(MockTransport::new());
    let manager = ConnectionManager::new(transport.clone(), settings);
    let listener = Arc::new(RecordingListener::new());
    manager.add_listener(listener.clone());
    (transport, manager, listener)
}

fn assert_loops_exclusive(manager: &ConnectionManager<MockTransport>) {
    assert!(
        !(manager.is_pinger_running() && manager.is_poller_running()),
        "pinger and poller must never run together"
    );
}

async fn sleep_ms(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

#[tokio::test(start_paused = true)]
async fn test_ping_failure_polls_and_recovers_with_new_session() {
    // Arrange
    let (transport, manager, listener) = setup(ConnectionSettings::new("joe", "secret"));
    manager.connect().await.expect("server is up");
    assert_eq!(
        manager.session_name().map(|n| n.public_session_id()),
        Some(1)
    );

    // Act: server disappears, first heartbeat at 5 s fails
    transport.set_server_down(true);
    sleep_ms(5_100).await;

    // Assert: polling, requests refused without touching the server
    assert_eq!(manager.state(), ConnectionState::Polling);
    assert!(manager.is_poller_running());
    assert!(!manager.is_pinger_running());
    assert_loops_exclusive(&manager);
    let err = manager.publish(&news()).await.unwrap_err();
    assert_eq!(err.error_code(), "communication.noConnection.polling");

    // First reconnect attempt at 10 s still fails
    sleep_ms(6_900).await;
    assert_eq!(manager.state(), ConnectionState::Polling);
    assert_eq!(transport.connect_count(), 1);

    // Server returns; attempt at 15 s succeeds
    transport.set_server_down(false);
    sleep_ms(3_500).await;

    assert_eq!(manager.state(), ConnectionState::Alive);
    assert!(manager.is_pinger_running());
    assert!(!manager.is_poller_running());
    assert_eq!(
        manager.session_name().map(|n| n.public_session_id()),
        Some(2)
    );
    assert_eq!(
        listener.events(),
        vec!["UNDEF->ALIVE", "ALIVE->POLLING", "POLLING->ALIVE"]
    );

    let reply = manager.publish(&news()).await.expect("alive again");
    assert!(reply.is_ok());
    assert_eq!(manager.metrics().snapshot().recovery.reconnects, 1);
}

#[tokio::test(start_paused = true)]
async fn test_bounded_retries_end_dead_and_consumed() {
    // Arrange
    let (transport, manager, listener) = setup(
        ConnectionSettings::new("joe", "secret")
            .with_retry_delay(4000)
            .with_max_retries(Some(2)),
    );
    manager.connect().await.expect("server is up");

    // Act: ping fails at 5 s, attempts at 9 s and 13 s fail
    transport.set_server_down(true);
    sleep_ms(14_000).await;

    // Assert
    assert_eq!(manager.state(), ConnectionState::Dead);
    assert!(manager.is_consumed());
    assert!(!manager.is_poller_running());
    assert!(!manager.is_pinger_running());
    assert_eq!(
        listener.events(),
        vec!["UNDEF->ALIVE", "ALIVE->POLLING", "POLLING->DEAD"]
    );
    assert_eq!(listener.consumed_on_dead(), vec![true]);

    // The instance is spent even after the server returns
    transport.set_server_down(false);
    let err = manager.publish(&news()).await.unwrap_err();
    assert_eq!(err.error_code(), "communication.noConnection.dead");
    assert!(manager.connect().await.is_err());
    assert!(manager.disconnect(None).await.is_err());
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_retries_keep_polling() {
    let (transport, manager, _listener) = setup(
        ConnectionSettings::new("joe", "secret").with_retry_delay(4000),
    );
    manager.connect().await.expect("server is up");

    transport.set_server_down(true);
    sleep_ms(5_000 + 4_000 * 100 + 500).await;

    assert_eq!(manager.state(), ConnectionState::Polling);
    assert!(!manager.is_consumed());
    assert_eq!(
        manager.metrics().snapshot().recovery.reconnect_attempts,
        100
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_alive_logs_out_and_consumes() {
    // Arrange
    let (transport, manager, listener) = setup(ConnectionSettings::new("joe", "secret"));
    manager.connect().await.expect("server is up");

    // Act
    let acknowledged = manager.disconnect(None).await.expect("first disconnect");

    // Assert
    assert!(acknowledged);
    assert_eq!(transport.disconnected_sessions(), vec!["session-1"]);
    assert!(manager.is_dead());
    assert!(manager.is_consumed());
    assert!(!manager.is_pinger_running());
    assert_eq!(listener.events(), vec!["UNDEF->ALIVE", "ALIVE->DEAD"]);
    assert_eq!(listener.consumed_on_dead(), vec![true]);

    // No heartbeat after disconnect
    sleep_ms(30_000).await;
    assert_eq!(transport.ping_count(), 0);

    let err = manager.disconnect(None).await.unwrap_err();
    assert_eq!(err.error_code(), "communication.noConnection.dead");
    assert_eq!(
        manager.ping().await.unwrap_err().error_code(),
        "communication.noConnection.dead"
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_polling_stops_reconnecting() {
    let (transport, manager, listener) = setup(ConnectionSettings::new("joe", "secret"));
    manager.connect().await.expect("server is up");
    transport.set_server_down(true);
    sleep_ms(5_100).await;
    assert!(manager.is_polling());

    let acknowledged = manager.disconnect(None).await.expect("disconnects");

    assert!(!acknowledged);
    assert!(transport.disconnected_sessions().is_empty());
    assert!(!manager.is_poller_running());

    transport.set_server_down(false);
    sleep_ms(60_000).await;
    assert_eq!(transport.connect_count(), 1);
    assert!(manager.is_dead());
    assert_eq!(
        listener.events(),
        vec!["UNDEF->ALIVE", "ALIVE->POLLING", "POLLING->DEAD"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_before_connect_still_reports_dead() {
    let (transport, manager, listener) = setup(ConnectionSettings::new("joe", "secret"));

    let acknowledged = manager.disconnect(None).await.expect("disconnects");

    assert!(!acknowledged);
    assert_eq!(listener.events(), vec!["UNDEF->DEAD"]);
    assert!(manager.connect().await.is_err());
    assert!(transport.connect_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_connect_does_not_start_polling() {
    let (transport, manager, listener) = setup(ConnectionSettings::new("joe", "secret"));
    transport.set_server_down(true);

    let err = manager.connect().await.unwrap_err();
    sleep_ms(30_000).await;

    assert!(err.is_communication_failure());
    assert!(manager.is_dead());
    assert!(!manager.is_poller_running());
    assert_eq!(transport.connect_requests().len(), 1);
    assert_eq!(listener.events(), vec!["UNDEF->DEAD"]);

    // Second failure from DEAD is not a state change
    assert!(manager.connect().await.is_err());
    assert_eq!(listener.events(), vec!["UNDEF->DEAD"]);

    transport.set_server_down(false);
    manager.connect().await.expect("retry from DEAD");
    assert_eq!(listener.events(), vec!["UNDEF->DEAD", "DEAD->ALIVE"]);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_pinger_never_detects_outage() {
    let (transport, manager, _listener) = setup(
        ConnectionSettings::new("joe", "secret")
            .with_connect_options(ConnectOptions::default().with_ping_interval(0)),
    );
    manager.connect().await.expect("server is up");
    assert!(!manager.is_pinger_running());

    transport.set_server_down(true);
    sleep_ms(60_000).await;

    assert!(manager.is_alive());
    assert_eq!(transport.ping_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_user_ping_failure_does_not_change_state() {
    let (transport, manager, listener) = setup(ConnectionSettings::new("joe", "secret"));
    manager.connect().await.expect("server is up");
    transport.set_ping_failing(true);

    let err = manager.ping().await.unwrap_err();

    assert!(err.is_communication_failure());
    assert!(manager.is_alive());
    assert_eq!(listener.events(), vec!["UNDEF->ALIVE"]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_share_one_session() {
    let (transport, manager, _listener) = setup(ConnectionSettings::new("joe", "secret"));
    manager.connect().await.expect("server is up");

    let publishes = (0..20).map(|i| {
        let manager = manager.clone();
        async move {
            let msg = MsgUnit::new(
                Key::exact(format!("topic-{i}")).expect("valid oid"),
                "payload",
                Default::default(),
            );
            manager.publish(&msg).await
        }
    });
    let results = futures::future::join_all(publishes).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(transport.published().len(), 20);
    assert_eq!(manager.metrics().snapshot().traffic.requests, 20);
}

#[derive(Debug, Clone)]
enum Step {
    ServerDown,
    ServerUp,
    Advance(u64),
    UserPing,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::ServerDown),
        Just(Step::ServerUp),
        (0u64..12_000).prop_map(Step::Advance),
        Just(Step::UserPing),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_loops_stay_exclusive_under_random_outages(
        steps in proptest::collection::vec(step_strategy(), 1..24)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async move {
            let (transport, manager, listener) = setup(ConnectionSettings::new("joe", "secret"));
            manager.connect().await.expect("server is up");

            for step in steps {
                match step {
                    Step::ServerDown => transport.set_server_down(true),
                    Step::ServerUp => transport.set_server_down(false),
                    Step::Advance(millis) => sleep_ms(millis).await,
                    Step::UserPing => {
                        let _ = manager.ping().await;
                    }
                }
                prop_assert!(
                    !(manager.is_pinger_running() && manager.is_poller_running()),
                    "pinger and poller running together after {:?}", listener.events()
                );
                prop_assert!(!manager.is_pinger_running() || manager.is_alive());
                prop_assert!(!manager.is_poller_running() || manager.is_polling());
            }

            let events = listener.events();
            let into_polling = events.iter().filter(|e| *e == "ALIVE->POLLING").count() as u64;
            let back_alive = events.iter().filter(|e| *e == "POLLING->ALIVE").count() as u64;
            let recovery = manager.metrics().snapshot().recovery;
            prop_assert_eq!(recovery.poller_starts, into_polling);
            prop_assert_eq!(recovery.pinger_starts, 1 + back_alive);
            Ok(())
        })?;
    }
}
