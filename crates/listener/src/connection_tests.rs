use lapin::protocol::AMQPError;

use super::*;

#[test]
fn backoff_doubles_up_to_the_cap() {
    let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10));

    let delays: Vec<_> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();

    assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
}

#[test]
fn backoff_reset_starts_over() {
    let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1));
    backoff.next_delay();
    backoff.next_delay();

    backoff.reset();

    assert_eq!(backoff.next_delay(), Duration::from_millis(100));
}

#[test]
fn precondition_failed_is_a_topology_error() {
    let err = lapin::Error::ProtocolError(AMQPError::new(
        AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED),
        "PRECONDITION_FAILED - inequivalent arg 'type' for exchange 'app.events'".into(),
    ));

    let classified = declaration_error(err);

    assert!(matches!(classified, ListenerError::Topology(_)));
    assert!(classified.is_fatal());
}

#[test]
fn other_protocol_errors_are_connection_errors() {
    let err = lapin::Error::ProtocolError(AMQPError::new(
        AMQPErrorKind::Soft(AMQPSoftError::ACCESSREFUSED),
        "ACCESS_REFUSED".into(),
    ));

    let classified = declaration_error(err);

    assert!(matches!(classified, ListenerError::Connection(_)));
    assert!(!classified.is_fatal());
}

fn config() -> crate::BrokerConfig {
    crate::BrokerConfig {
        url: "amqp://localhost".to_string(),
        connection_name: "test".to_string(),
        exchange: "app.events".to_string(),
        exchange_kind: crate::ExchangeKind::Topic,
        queue: "app.worker.q".to_string(),
        binding_key: String::new(),
        dead_letter_exchange: None,
        prefetch: 1,
        initial_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(1),
    }
}

fn assert_send<T: Send>(_: &T) {}

#[tokio::test]
async fn open_channel_requires_a_connection() {
    let manager = ConnectionManager::new(config());

    assert!(!manager.is_connected());
    assert!(matches!(manager.open_channel().await, Err(ListenerError::NotConnected)));
}

#[test]
fn reconnect_future_can_be_spawned() {
    let mut manager = ConnectionManager::new(config());
    let (_tx, mut shutdown) = watch::channel(false);

    let reconnect = manager.reconnect(&mut shutdown);

    assert_send(&reconnect);
}

#[tokio::test]
async fn reconnect_returns_immediately_once_shutdown_was_requested() {
    let mut manager = ConnectionManager::new(config());
    let (tx, mut shutdown) = watch::channel(false);
    tx.send(true).unwrap();

    let connected = manager.reconnect(&mut shutdown).await.unwrap();

    assert!(!connected);
}
