//! GitLab infrastructure adapter.
//!
//! Implements the [`provisioning::GitLabApi`] port against the GitLab REST API
//! (`/api/v4`) using `reqwest`. One [`GitLabClient`] is built per configured
//! instance; the registry in the `provisioning` crate selects between them.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. Endpoint
//! paths, authentication and the mapping from HTTP failures to
//! [`provisioning::BackendError`] live here; the domain never sees `reqwest`.
//!
//! ## Retries
//!
//! The client never retries. A failed call is reported once and the message
//! is redelivered by the broker if the failure is transient, so non-idempotent
//! calls such as a fork are never repeated behind the caller's back.

mod client;

pub use client::GitLabClient;
