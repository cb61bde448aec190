//! Envelope parsing and routing to handlers.
//!
//! [`Dispatcher::dispatch`] is the single entry point the consumer calls for
//! every delivery. It never fails: every error is folded into a
//! [`HandlerOutcome`] so that the consumer only has to pick an ack mode.

use std::sync::Arc;

use tracing::{info, warn, Instrument};

use crate::commands::{Command, MessageType};
use crate::registry::BackendRegistry;
use crate::{handlers, DispatchError, Envelope, HandlerOutcome};

/// Routes messages to their handlers.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<BackendRegistry>,
}

impl Dispatcher {
    /// Creates a dispatcher over a fully built registry.
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the registry handlers resolve backends from.
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Handles one raw message and classifies the result.
    pub async fn dispatch(&self, bytes: &[u8]) -> HandlerOutcome {
        let envelope = match Envelope::from_slice(bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "rejecting malformed message");
                return HandlerOutcome::from(&DispatchError::from(err));
            }
        };

        let header = &envelope.header;
        let span = tracing::info_span!(
            "message",
            message_id = %header.message_id,
            message_type = %header.message_type,
            correlation_id = header.correlation_id.as_ref().map(|c| c.as_str()).unwrap_or_default(),
        );

        async {
            let outcome = HandlerOutcome::from(self.route(&envelope).await);
            match &outcome {
                HandlerOutcome::Success => info!(outcome = outcome.label(), "message handled"),
                HandlerOutcome::PermanentFailure { reason }
                | HandlerOutcome::TransientFailure { reason } => {
                    warn!(outcome = outcome.label(), %reason, "message failed")
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn route(&self, envelope: &Envelope) -> Result<(), DispatchError> {
        let raw_type = &envelope.header.message_type;
        let message_type = MessageType::parse(raw_type)
            .ok_or_else(|| DispatchError::UnknownMessageType(raw_type.clone()))?;
        let command = Command::decode(message_type, &envelope.body.payload)?;

        match &command {
            Command::ForkProject(fork) => handlers::fork_project(&self.registry, fork).await,
            Command::AddMembers(members) => handlers::add_members(&self.registry, members).await,
            Command::CopyJob(request) => handlers::copy_job(&self.registry, request).await,
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
