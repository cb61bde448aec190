//! Broker connection lifecycle.
//!
//! [`ConnectionManager`] owns the single AMQP connection of the process. It
//! declares the topology every time it connects (declarations are
//! idempotent), hands out consuming channels, and reconnects with exponential
//! backoff when the connection is lost.

use std::time::Duration;

use lapin::options::{
    BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::protocol::{AMQPErrorKind, AMQPSoftError};
use lapin::types::{AMQPValue, FieldTable, LongString};
use lapin::{Channel, Connection, ConnectionProperties};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{BrokerConfig, ListenerError};

/// AMQP reply code for a normal close.
const REPLY_SUCCESS: u16 = 200;

/// Exponential delay sequence: `initial`, doubling, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Creates a sequence starting at `initial`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Returns the next delay and advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Restarts the sequence at `initial`.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Owns the broker connection.
pub struct ConnectionManager {
    config: BrokerConfig,
    connection: Option<Connection>,
}

impl ConnectionManager {
    /// Creates a manager; nothing is opened until [`ConnectionManager::connect`].
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            connection: None,
        }
    }

    /// Returns the settings this manager connects with.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Returns `true` while the connection is open.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.status().connected())
    }

    /// Opens the connection and declares exchange, queue and binding.
    ///
    /// # Errors
    ///
    /// [`ListenerError::Connection`] if the broker cannot be reached, or
    /// [`ListenerError::Topology`] if a declaration conflicts with an existing
    /// exchange or queue.
    pub async fn connect(&mut self) -> Result<(), ListenerError> {
        let properties = ConnectionProperties::default()
            .with_connection_name(self.config.connection_name.clone().into());
        let connection = Connection::connect(&self.config.url, properties)
            .await
            .map_err(ListenerError::Connection)?;

        let channel = connection
            .create_channel()
            .await
            .map_err(ListenerError::Connection)?;
        self.declare(&channel).await?;
        if let Err(err) = channel.close(REPLY_SUCCESS, "topology declared").await {
            debug!(error = %err, "failed to close declaration channel");
        }

        info!(
            broker = %self.config.redacted_url(),
            exchange = %self.config.exchange,
            exchange_kind = %self.config.exchange_kind,
            queue = %self.config.queue,
            binding_key = self.config.binding_key(),
            "connected to broker"
        );
        self.connection = Some(connection);
        Ok(())
    }

    async fn declare(&self, channel: &Channel) -> Result<(), ListenerError> {
        let durable = ExchangeDeclareOptions {
            durable: true,
            ..ExchangeDeclareOptions::default()
        };
        channel
            .exchange_declare(
                &self.config.exchange,
                self.config.exchange_kind.to_lapin(),
                durable,
                FieldTable::default(),
            )
            .await
            .map_err(declaration_error)?;

        let mut arguments = FieldTable::default();
        if let Some(dlx) = &self.config.dead_letter_exchange {
            arguments.insert(
                "x-dead-letter-exchange".into(),
                AMQPValue::LongString(LongString::from(dlx.as_str())),
            );
        }
        let durable = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };
        channel
            .queue_declare(&self.config.queue, durable, arguments)
            .await
            .map_err(declaration_error)?;

        channel
            .queue_bind(
                &self.config.queue,
                &self.config.exchange,
                self.config.binding_key(),
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(declaration_error)
    }

    /// Connects, retrying with exponential backoff until it succeeds.
    ///
    /// Returns `Ok(false)` if shutdown was requested before a connection was
    /// made.
    ///
    /// # Errors
    ///
    /// [`ListenerError::Topology`] immediately; topology conflicts are never
    /// retried.
    pub async fn reconnect(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<bool, ListenerError> {
        let mut backoff = Backoff::new(self.config.initial_backoff, self.config.max_backoff);
        self.close().await;

        loop {
            if *shutdown.borrow() {
                return Ok(false);
            }
            match self.connect().await {
                Ok(()) => return Ok(true),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    let delay = backoff.next_delay();
                    warn!(error = %err, retry_in = ?delay, "broker unavailable");
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = stop_requested(shutdown) => return Ok(false),
                    }
                }
            }
        }
    }

    /// Opens a consuming channel with the configured prefetch.
    ///
    /// # Errors
    ///
    /// [`ListenerError::NotConnected`] before a successful connect, or
    /// [`ListenerError::Connection`] if the channel cannot be opened.
    pub async fn open_channel(&self) -> Result<Channel, ListenerError> {
        let connection = self.connection.as_ref().ok_or(ListenerError::NotConnected)?;
        let channel = connection
            .create_channel()
            .await
            .map_err(ListenerError::Connection)?;
        channel
            .basic_qos(self.config.prefetch, BasicQosOptions::default())
            .await
            .map_err(ListenerError::Connection)?;
        Ok(channel)
    }

    /// Closes the connection if one is open. Errors are logged, not returned.
    pub async fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            if !connection.status().connected() {
                return;
            }
            match connection.close(REPLY_SUCCESS, "shutting down").await {
                Ok(()) => info!("broker connection closed"),
                Err(err) => debug!(error = %err, "broker connection close failed"),
            }
        }
    }
}

/// Resolves once `shutdown` is `true` or its sender is gone.
///
/// The `watch::Ref` from `wait_for` is a read-lock guard (`!Send`) and must
/// not outlive this call.
pub(crate) async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Classifies a failed declaration: `PRECONDITION_FAILED` means the entity
/// exists with different settings.
fn declaration_error(err: lapin::Error) -> ListenerError {
    if is_precondition_failed(&err) {
        ListenerError::Topology(err)
    } else {
        ListenerError::Connection(err)
    }
}

fn is_precondition_failed(err: &lapin::Error) -> bool {
    matches!(
        err,
        lapin::Error::ProtocolError(amqp)
            if matches!(amqp.kind(), AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED))
    )
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
