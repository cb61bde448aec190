//! AMQP event source for provisioning messages.
//!
//! Consumes deliveries from one RabbitMQ queue, hands each to a
//! [`DeliveryHandler`] (in production the [`provisioning::Dispatcher`]) and
//! turns the resulting [`provisioning::HandlerOutcome`] into an ack, a reject,
//! or a reject with requeue.
//!
//! ## Components
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | Broker topology and pool settings |
//! | [`connection`] | `ConnectionManager`: connect, declare topology, reconnect with backoff |
//! | [`consumer`] | `ConsumerPool`: feeder task, fixed worker pool, graceful drain |
//! | [`redelivery`] | Attempt counting and the redelivery ceiling |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Broker details live here; the `provisioning` crate sees
//! only raw payload bytes and returns an outcome.
//!
//! ## Delivery guarantees
//!
//! Deliveries are acknowledged manually and only after their handler has
//! finished, so a crash or a lost connection returns every in-flight message
//! to the queue. No ordering is guaranteed across deliveries.

pub mod config;
pub mod connection;
pub mod consumer;
pub mod redelivery;

mod error;

pub use config::{BrokerConfig, ConsumerConfig, ExchangeKind};
pub use connection::{Backoff, ConnectionManager};
pub use consumer::{Acker, ChannelAcker, ConsumerPool, DeliveryHandler, DeliveryTicket};
pub use error::ListenerError;
pub use redelivery::{AttemptTracker, Decision, RedeliveryPolicy};
