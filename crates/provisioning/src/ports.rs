//! Port traits implemented by the backend adapter crates.
//!
//! The domain describes *what* it needs from GitLab and Jenkins; the `gitlab`
//! and `jenkins` crates provide *how* over HTTP. Handlers hold these traits as
//! `Arc<dyn …>` so that tests substitute recording fakes.
//!
//! Implementations apply their configured per-call timeout and report every
//! failure as a [`BackendError`]; they must not retry on their own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::jobs::{CopyJobRequest, JobPath};
use crate::{AccessLevel, BackendError, BranchName, Namespace, ProjectId, ProjectName, UserId};

// ---------------------------------------------------------------------------
// GitLab
// ---------------------------------------------------------------------------

/// Parameters of a project fork.
#[derive(Debug, Clone, PartialEq)]
pub struct ForkRequest {
    /// Project to fork.
    pub project_id: ProjectId,
    /// Name of the new project.
    pub name: ProjectName,
    /// Target namespace, forwarded unchanged.
    pub namespace: Option<Namespace>,
    /// Path of the new project, forwarded unchanged.
    pub path: Option<String>,
}

/// The project created by a fork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkedProject {
    /// Id of the new project.
    pub id: ProjectId,
    /// Namespaced path of the new project, when GitLab reports it.
    #[serde(default)]
    pub path_with_namespace: Option<String>,
    /// Browser URL of the new project, when GitLab reports it.
    #[serde(default)]
    pub web_url: Option<String>,
}

/// A membership created by an add-member call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMember {
    /// Id of the member user.
    pub id: UserId,
    /// Username, when GitLab reports it.
    #[serde(default)]
    pub username: Option<String>,
}

/// Operations against one GitLab instance.
#[async_trait]
pub trait GitLabApi: Send + Sync {
    /// Forks a project and returns the new project.
    async fn fork_project(&self, request: &ForkRequest) -> Result<ForkedProject, BackendError>;

    /// Removes the fork relationship so the new project stands alone.
    async fn remove_fork_relationship(&self, project_id: ProjectId) -> Result<(), BackendError>;

    /// Protects `branch`, granting push and merge rights at `level`.
    async fn protect_branch(
        &self,
        project_id: ProjectId,
        branch: &BranchName,
        level: AccessLevel,
    ) -> Result<(), BackendError>;

    /// Adds `user_id` to the project at `access_level`.
    async fn add_project_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        access_level: AccessLevel,
    ) -> Result<ProjectMember, BackendError>;
}

// ---------------------------------------------------------------------------
// Jenkins
// ---------------------------------------------------------------------------

/// Summary of a Jenkins job as returned by its `api/json` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    /// Full slash-separated name of the job.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Browser URL of the job.
    #[serde(default)]
    pub url: Option<String>,
}

/// Operations against the Jenkins instance.
#[async_trait]
pub trait JenkinsApi: Send + Sync {
    /// Creates a job by copying an existing one.
    async fn copy_job(&self, request: &CopyJobRequest) -> Result<(), BackendError>;

    /// Fetches details of an existing job.
    async fn job_info(&self, job: &JobPath) -> Result<JobInfo, BackendError>;
}
