//! Jenkins infrastructure adapter.
//!
//! Implements the [`provisioning::JenkinsApi`] port over the Jenkins remote
//! access API using `reqwest`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Folder addressing is decided by
//! [`provisioning::CopyJobRequest`]; this crate only turns those addresses
//! into URLs, authenticates, and maps HTTP failures to
//! [`provisioning::BackendError`].
//!
//! ## Authentication
//!
//! Basic authentication with a user name and API token. Requests that carry an
//! API token are exempt from Jenkins' CSRF crumb check, so no crumb is fetched.

mod client;

pub use client::{JenkinsClient, JenkinsClientError};
