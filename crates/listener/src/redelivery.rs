//! Redelivery ceiling for transiently failing messages.
//!
//! A transient failure is rejected with requeue so the broker delivers the
//! message again. To stop a message that never succeeds from cycling forever,
//! every delivery gets an attempt number and a message whose attempt number
//! exceeds the configured ceiling is rejected without requeue instead.
//!
//! ## Attempt number
//!
//! The larger of:
//!
//! - `x-delivery-count + 1`, when the broker supplies the header (quorum
//!   queues do);
//! - the number of transient failures this process has recorded for the
//!   message, plus one. A delivery flagged as redelivered with no record
//!   counts as having failed once already.
//!
//! Records are keyed by the AMQP `message-id` property, or by a hash of the
//! body when that property is absent. They are dropped when a final decision
//! is made and the table is bounded, evicting the oldest record first.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};

use provisioning::HandlerOutcome;

use crate::DeliveryTicket;

/// Records kept before the oldest is evicted.
pub const DEFAULT_TRACKER_CAPACITY: usize = 10_000;

/// What to tell the broker about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// `basic_ack`.
    Ack,
    /// `basic_reject` without requeue; dead-lettered when configured.
    Reject,
    /// `basic_reject` with requeue.
    Requeue,
}

impl Decision {
    /// Short label used as a structured log field.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Reject => "reject",
            Self::Requeue => "requeue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DeliveryKey {
    MessageId(String),
    BodyHash(u64),
}

impl DeliveryKey {
    fn of(ticket: &DeliveryTicket) -> Self {
        match &ticket.message_id {
            Some(id) => Self::MessageId(id.clone()),
            None => {
                let mut hasher = DefaultHasher::new();
                ticket.body.hash(&mut hasher);
                Self::BodyHash(hasher.finish())
            }
        }
    }
}

/// Bounded table of transient failures seen per message.
#[derive(Debug)]
pub struct AttemptTracker {
    failures: HashMap<DeliveryKey, u32>,
    order: VecDeque<DeliveryKey>,
    capacity: usize,
}

impl AttemptTracker {
    /// Creates a tracker holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            failures: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Number of messages with a recorded failure.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Returns `true` if no failures are recorded.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    fn attempt(&self, key: &DeliveryKey, ticket: &DeliveryTicket) -> u32 {
        let seen = match self.failures.get(key) {
            Some(&failures) => failures,
            None if ticket.redelivered => 1,
            None => 0,
        };
        let local = seen.saturating_add(1);
        let broker = ticket
            .delivery_count
            .map(|count| count.saturating_add(1))
            .unwrap_or(0);
        local.max(broker)
    }

    fn record_failure(&mut self, key: DeliveryKey, attempt: u32) {
        if self.failures.insert(key.clone(), attempt).is_none() {
            self.order.push_back(key);
            while self.failures.len() > self.capacity {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.failures.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
    }

    fn forget(&mut self, key: &DeliveryKey) {
        if self.failures.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

/// Maps handler outcomes to broker decisions, enforcing the ceiling.
#[derive(Debug)]
pub struct RedeliveryPolicy {
    max_redeliveries: u32,
    tracker: Mutex<AttemptTracker>,
}

impl RedeliveryPolicy {
    /// Creates a policy allowing `max_redeliveries` redeliveries per message.
    pub fn new(max_redeliveries: u32) -> Self {
        Self::with_capacity(max_redeliveries, DEFAULT_TRACKER_CAPACITY)
    }

    /// Like [`RedeliveryPolicy::new`] with an explicit tracker bound.
    pub fn with_capacity(max_redeliveries: u32, capacity: usize) -> Self {
        Self {
            max_redeliveries,
            tracker: Mutex::new(AttemptTracker::new(capacity)),
        }
    }

    /// Returns the attempt number of `ticket` without recording anything.
    pub fn attempt(&self, ticket: &DeliveryTicket) -> u32 {
        let tracker = self.tracker.lock().unwrap_or_else(PoisonError::into_inner);
        tracker.attempt(&DeliveryKey::of(ticket), ticket)
    }

    /// Decides how to settle `ticket` given its handler `outcome`.
    pub fn decide(&self, ticket: &DeliveryTicket, outcome: &HandlerOutcome) -> Decision {
        let key = DeliveryKey::of(ticket);
        let mut tracker = self.tracker.lock().unwrap_or_else(PoisonError::into_inner);

        let decision = match outcome {
            HandlerOutcome::Success => Decision::Ack,
            HandlerOutcome::PermanentFailure { .. } => Decision::Reject,
            HandlerOutcome::TransientFailure { .. } => {
                let attempt = tracker.attempt(&key, ticket);
                if attempt > self.max_redeliveries {
                    Decision::Reject
                } else {
                    tracker.record_failure(key.clone(), attempt);
                    Decision::Requeue
                }
            }
        };

        if decision != Decision::Requeue {
            tracker.forget(&key);
        }
        decision
    }

    /// Number of messages currently awaiting redelivery.
    pub fn tracked(&self) -> usize {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
#[path = "redelivery_tests.rs"]
mod tests;
