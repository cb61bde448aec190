//! Provisioning domain: message envelopes, typed commands, backend ports and
//! dispatch.
//!
//! This crate decides *what* a message asks for and *how its failure is
//! classified*. It performs no I/O of its own; the `gitlab` and `jenkins`
//! crates implement the [`ports`] traits over HTTP and the `listener` crate
//! feeds deliveries into the [`Dispatcher`].
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** Infrastructure crates implement the
//! traits defined here; they never add domain rules.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ProjectId`, `InstanceName`, etc.) |
//! | [`types`] | Shared value types (`AccessLevel`, `Namespace`, `Timestamp`) |
//! | [`errors`] | Error and retry-policy types |
//! | [`outcome`] | `HandlerOutcome`, the ack decision input |
//! | [`envelope`] | Header + body wire wrapper and its validation |
//! | [`commands`] | Message types and typed payloads |
//! | [`jobs`] | Jenkins job path normalisation and addressing |
//! | [`ports`] | `GitLabApi` / `JenkinsApi` traits |
//! | [`registry`] | Instance-name → client resolution |
//! | [`handlers`] | One handler per message type |
//! | [`dispatcher`] | Envelope → handler routing |

pub mod commands;
pub mod dispatcher;
pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod identifiers;
pub mod jobs;
pub mod outcome;
pub mod ports;
pub mod registry;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use commands::{AddMembers, Command, ForkProject, MessageType};
pub use dispatcher::Dispatcher;
pub use envelope::{Envelope, MessageBody, MessageHeader};
pub use errors::{Backend, BackendError, DispatchError, RetryPolicy, ValidationError};
pub use identifiers::{
    BranchName, CorrelationId, InstanceName, MessageId, NamespaceId, ProjectId, ProjectName,
    UserId,
};
pub use jobs::{CopyJobRequest, FolderPath, JobName, JobPath};
pub use outcome::HandlerOutcome;
pub use ports::{ForkRequest, ForkedProject, GitLabApi, JenkinsApi, JobInfo, ProjectMember};
pub use registry::{
    BackendInstanceConfig, BackendRegistry, InstanceSettings, JenkinsConfig, RegisteredInstance,
    RegistryError, RegistrySettings, Secret,
};
pub use types::{AccessLevel, Namespace, Timestamp};

#[cfg(test)]
#[path = "test_support.rs"]
pub(crate) mod test_support;
