//! Delivery consumption and the fixed worker pool.
//!
//! One feeder reads deliveries from the broker and pushes them into a bounded
//! queue; `workers` tasks take deliveries from that queue one at a time, run
//! the handler, and settle the delivery through a shared [`Acker`].
//!
//! ```text
//!   broker ──► feeder ──► mpsc(prefetch) ──► worker 0..N ──► Acker ──► broker
//! ```
//!
//! ## Shutdown
//!
//! The consumer is cancelled first so the broker stops pushing. The queue is
//! then closed and the workers drain whatever was already received, settling
//! every delivery before the channel is closed.
//!
//! ## Connection loss
//!
//! Deliveries from a dead channel can no longer be settled and the broker
//! redelivers them. Workers finish the handler calls already in progress but
//! discard queued deliveries they have not started, so no backend call runs
//! for a delivery that is certain to be redelivered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicRejectOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::Channel;
use provisioning::{Dispatcher, HandlerOutcome};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use crate::connection::stop_requested;
use crate::{
    BrokerConfig, ConnectionManager, ConsumerConfig, Decision, ListenerError, RedeliveryPolicy,
};

/// Broker header carrying the number of previous deliveries.
const DELIVERY_COUNT_HEADER: &str = "x-delivery-count";

// ---------------------------------------------------------------------------
// DeliveryTicket
// ---------------------------------------------------------------------------

/// Everything a worker needs to handle and settle one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTicket {
    /// Raw message body.
    pub body: Vec<u8>,
    /// Broker delivery tag, valid on the channel the delivery arrived on.
    pub delivery_tag: u64,
    /// Whether the broker delivered this message before.
    pub redelivered: bool,
    /// `x-delivery-count` header, when the broker supplies it.
    pub delivery_count: Option<u32>,
    /// AMQP `message-id` property, when the producer set it.
    pub message_id: Option<String>,
}

impl From<Delivery> for DeliveryTicket {
    fn from(delivery: Delivery) -> Self {
        Self {
            delivery_count: delivery_count(delivery.properties.headers().as_ref()),
            message_id: delivery
                .properties
                .message_id()
                .as_ref()
                .map(|id| id.as_str().to_string())
                .filter(|id| !id.trim().is_empty()),
            delivery_tag: delivery.delivery_tag,
            redelivered: delivery.redelivered,
            body: delivery.data,
        }
    }
}

/// Reads the `x-delivery-count` header from a header table.
pub(crate) fn delivery_count(headers: Option<&FieldTable>) -> Option<u32> {
    let (_, value) = headers?
        .inner()
        .iter()
        .find(|(key, _)| key.as_str() == DELIVERY_COUNT_HEADER)?;
    let count: i64 = match value {
        AMQPValue::ShortShortInt(v) => (*v).into(),
        AMQPValue::ShortShortUInt(v) => (*v).into(),
        AMQPValue::ShortInt(v) => (*v).into(),
        AMQPValue::ShortUInt(v) => (*v).into(),
        AMQPValue::LongInt(v) => (*v).into(),
        AMQPValue::LongUInt(v) => (*v).into(),
        AMQPValue::LongLongInt(v) => *v,
        _ => return None,
    };
    u32::try_from(count).ok()
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Handles one message body. Must not fail: every error becomes an outcome.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Processes `body` and classifies the result.
    async fn handle(&self, body: &[u8]) -> HandlerOutcome;
}

#[async_trait]
impl DeliveryHandler for Dispatcher {
    async fn handle(&self, body: &[u8]) -> HandlerOutcome {
        self.dispatch(body).await
    }
}

/// Settles deliveries with the broker.
#[async_trait]
pub trait Acker: Send + Sync {
    /// Acknowledges a delivery.
    async fn ack(&self, delivery_tag: u64) -> Result<(), lapin::Error>;

    /// Rejects a delivery, optionally returning it to the queue.
    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), lapin::Error>;
}

/// [`Acker`] over the consuming channel.
///
/// Every worker settles through the same channel; the mutex serialises the
/// calls so that only one ack or reject is written at a time.
pub struct ChannelAcker {
    channel: Arc<Mutex<Channel>>,
}

impl ChannelAcker {
    /// Wraps the channel the deliveries arrived on.
    pub fn new(channel: Channel) -> Self {
        Self {
            channel: Arc::new(Mutex::new(channel)),
        }
    }
}

#[async_trait]
impl Acker for ChannelAcker {
    async fn ack(&self, delivery_tag: u64) -> Result<(), lapin::Error> {
        let channel = self.channel.lock().await;
        channel.basic_ack(delivery_tag, BasicAckOptions::default()).await
    }

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), lapin::Error> {
        let channel = self.channel.lock().await;
        channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue })
            .await
    }
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

/// Shared state of the worker tasks.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub(crate) handler: Arc<dyn DeliveryHandler>,
    pub(crate) acker: Arc<dyn Acker>,
    pub(crate) policy: Arc<RedeliveryPolicy>,
    /// Set when the channel is lost; queued deliveries are then dropped
    /// unhandled.
    pub(crate) discard: Arc<AtomicBool>,
}

/// Spawns `count` workers pulling from `queue` until it is closed and empty.
pub(crate) fn spawn_workers(
    count: usize,
    queue: mpsc::Receiver<DeliveryTicket>,
    context: WorkerContext,
) -> Vec<JoinHandle<()>> {
    let queue = Arc::new(Mutex::new(queue));
    (0..count)
        .map(|worker| {
            let queue = Arc::clone(&queue);
            let context = context.clone();
            tokio::spawn(
                async move {
                    loop {
                        let next = queue.lock().await.recv().await;
                        match next {
                            Some(ticket) if context.discard.load(Ordering::Acquire) => debug!(
                                delivery_tag = ticket.delivery_tag,
                                "discarding delivery from a lost channel"
                            ),
                            Some(ticket) => {
                                settle(&context, ticket).await;
                            }
                            None => break,
                        }
                    }
                    debug!("worker stopped");
                }
                .instrument(tracing::info_span!("worker", worker)),
            )
        })
        .collect()
}

/// Handles one delivery and settles it according to the redelivery policy.
pub(crate) async fn settle(context: &WorkerContext, ticket: DeliveryTicket) -> Decision {
    let outcome = context.handler.handle(&ticket.body).await;
    let decision = context.policy.decide(&ticket, &outcome);

    let result = match decision {
        Decision::Ack => context.acker.ack(ticket.delivery_tag).await,
        Decision::Reject => context.acker.reject(ticket.delivery_tag, false).await,
        Decision::Requeue => context.acker.reject(ticket.delivery_tag, true).await,
    };

    match result {
        Ok(()) => debug!(
            delivery_tag = ticket.delivery_tag,
            outcome = outcome.label(),
            decision = decision.label(),
            "delivery settled"
        ),
        // The broker requeues unsettled deliveries when the channel closes.
        Err(err) => warn!(
            delivery_tag = ticket.delivery_tag,
            decision = decision.label(),
            error = %err,
            "failed to settle delivery"
        ),
    }
    decision
}

/// Waits for workers to finish, giving up after `grace`.
pub(crate) async fn drain(workers: Vec<JoinHandle<()>>, grace: Duration) {
    let pending = workers.len();
    match tokio::time::timeout(grace, futures::future::join_all(workers)).await {
        Ok(results) => {
            for result in results {
                if let Err(err) = result {
                    error!(error = %err, "worker task failed");
                }
            }
        }
        Err(_) => warn!(
            workers = pending,
            ?grace,
            "workers did not drain within the grace period"
        ),
    }
}

// ---------------------------------------------------------------------------
// ConsumerPool
// ---------------------------------------------------------------------------

/// How a broker session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    ConnectionLost,
}

/// Consumes the queue with a fixed number of workers until shutdown.
pub struct ConsumerPool {
    broker: BrokerConfig,
    config: ConsumerConfig,
    handler: Arc<dyn DeliveryHandler>,
    policy: Arc<RedeliveryPolicy>,
}

impl ConsumerPool {
    /// Creates a pool; nothing connects until [`ConsumerPool::run`].
    ///
    /// # Errors
    ///
    /// [`ListenerError::InvalidConfig`] for unusable settings.
    pub fn new(
        broker: BrokerConfig,
        config: ConsumerConfig,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Result<Self, ListenerError> {
        broker.validate()?;
        config.validate()?;
        let policy = Arc::new(RedeliveryPolicy::new(config.max_redeliveries));
        Ok(Self {
            broker,
            config,
            handler,
            policy,
        })
    }

    /// Runs sessions until `shutdown` turns `true` (or its sender is dropped).
    ///
    /// A lost connection ends the session and the pool reconnects.
    ///
    /// # Errors
    ///
    /// Fatal errors only: a topology conflict or invalid configuration.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), ListenerError> {
        let mut manager = ConnectionManager::new(self.broker.clone());

        loop {
            if !manager.reconnect(&mut shutdown).await? {
                return Ok(());
            }

            match self.session(&manager, &mut shutdown).await {
                Ok(SessionEnd::Shutdown) => {
                    manager.close().await;
                    info!("consumer pool stopped");
                    return Ok(());
                }
                Ok(SessionEnd::ConnectionLost) => warn!("broker session ended; reconnecting"),
                Err(err) if err.is_fatal() => {
                    manager.close().await;
                    return Err(err);
                }
                Err(err) => warn!(error = %err, "broker session failed; reconnecting"),
            }
        }
    }

    async fn session(
        &self,
        manager: &ConnectionManager,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, ListenerError> {
        let channel = manager.open_channel().await?;
        let mut consumer = channel
            .basic_consume(
                &self.broker.queue,
                &self.config.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(ListenerError::Connection)?;

        let (tx, rx) = mpsc::channel(usize::from(self.broker.prefetch));
        let discard = Arc::new(AtomicBool::new(false));
        let workers = spawn_workers(
            self.config.workers,
            rx,
            WorkerContext {
                handler: Arc::clone(&self.handler),
                acker: Arc::new(ChannelAcker::new(channel.clone())),
                policy: Arc::clone(&self.policy),
                discard: Arc::clone(&discard),
            },
        );
        info!(
            workers = self.config.workers,
            prefetch = self.broker.prefetch,
            queue = %self.broker.queue,
            "consuming"
        );

        let end = loop {
            tokio::select! {
                () = stop_requested(shutdown) => break SessionEnd::Shutdown,
                next = consumer.next() => match next {
                    Some(Ok(delivery)) => {
                        if tx.send(DeliveryTicket::from(delivery)).await.is_err() {
                            break SessionEnd::ConnectionLost;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "consumer stream failed");
                        break SessionEnd::ConnectionLost;
                    }
                    None => break SessionEnd::ConnectionLost,
                },
            }
        };

        match end {
            SessionEnd::Shutdown => {
                info!("shutdown requested; draining in-flight deliveries");
                if let Err(err) = channel
                    .basic_cancel(&self.config.consumer_tag, BasicCancelOptions::default())
                    .await
                {
                    debug!(error = %err, "consumer cancel failed");
                }
            }
            SessionEnd::ConnectionLost => {
                discard.store(true, Ordering::Release);
                info!("waiting for in-flight deliveries; queued deliveries will be redelivered");
            }
        }

        drop(tx);
        drain(workers, self.config.shutdown_grace).await;

        if channel.status().connected() {
            if let Err(err) = channel.close(200, "consumer stopped").await {
                debug!(error = %err, "channel close failed");
            }
        }
        Ok(end)
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
