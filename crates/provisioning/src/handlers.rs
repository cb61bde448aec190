//! One handler per message type.
//!
//! Handlers receive an already-decoded command and the backend registry. They
//! perform the backend calls the command asks for and return a
//! [`DispatchError`] on failure; classification into an outcome happens in
//! the dispatcher.

use tracing::{debug, info, warn};

use crate::commands::{AddMembers, ForkProject};
use crate::jobs::CopyJobRequest;
use crate::ports::{ForkRequest, GitLabApi};
use crate::registry::BackendRegistry;
use crate::{AccessLevel, BranchName, DispatchError, ProjectId};

/// Branches protected on every fresh fork, in the order they are protected.
pub const PROTECTED_BRANCHES: [&str; 2] = ["test", "main"];

/// Forks a project on the instance named by `gitType`.
///
/// After the fork succeeds the new project is detached from its source and
/// its [`PROTECTED_BRANCHES`] are protected at Maintainer level. Those
/// follow-ups do not affect the outcome: the fork already exists and a
/// redelivery would create a second one.
///
/// # Errors
///
/// [`DispatchError::UnknownInstance`] or [`DispatchError::Backend`] from the
/// fork call itself.
pub async fn fork_project(
    registry: &BackendRegistry,
    command: &ForkProject,
) -> Result<(), DispatchError> {
    let instance = registry.resolve(&command.git_type)?;
    let request = ForkRequest {
        project_id: command.project_id,
        name: command.name.clone(),
        namespace: command.namespace.clone(),
        path: command.path.clone(),
    };

    let forked = instance.client.fork_project(&request).await?;
    info!(
        instance = %instance.config.name,
        source_project_id = %command.project_id,
        project_id = %forked.id,
        path = forked.path_with_namespace.as_deref().unwrap_or_default(),
        "project forked"
    );

    finish_fork(instance.client.as_ref(), forked.id).await;
    Ok(())
}

async fn finish_fork(client: &dyn GitLabApi, project_id: ProjectId) {
    if let Err(err) = client.remove_fork_relationship(project_id).await {
        warn!(%project_id, error = %err, "failed to remove fork relationship");
    }

    for branch in PROTECTED_BRANCHES.iter().filter_map(|b| BranchName::new(*b)) {
        match client
            .protect_branch(project_id, &branch, AccessLevel::MAINTAINER)
            .await
        {
            Ok(()) => debug!(%project_id, %branch, "branch protected"),
            Err(err) => warn!(%project_id, %branch, error = %err, "failed to protect branch"),
        }
    }
}

/// Adds every listed user to the project, one call per user in input order.
///
/// A failure for one user does not stop the remaining calls. A conflict
/// response means the user is already a member and counts as success.
///
/// # Errors
///
/// [`DispatchError::UnknownInstance`] before any call is made, or
/// [`DispatchError::MemberFailures`] listing every user that could not be
/// added.
pub async fn add_members(
    registry: &BackendRegistry,
    command: &AddMembers,
) -> Result<(), DispatchError> {
    let instance = registry.resolve(&command.git_type)?;
    let mut failures = Vec::new();

    for &user_id in &command.user_ids {
        match instance
            .client
            .add_project_member(command.project_id, user_id, command.access_level)
            .await
        {
            Ok(_) => info!(
                project_id = %command.project_id,
                %user_id,
                access_level = %command.access_level,
                "member added"
            ),
            Err(err) if err.is_conflict() => info!(
                project_id = %command.project_id,
                %user_id,
                "user is already a member"
            ),
            Err(err) => {
                warn!(
                    project_id = %command.project_id,
                    %user_id,
                    error = %err,
                    retryable = err.retry_policy().is_retryable(),
                    "failed to add member"
                );
                failures.push((user_id, err));
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(DispatchError::MemberFailures {
            attempted: command.user_ids.len(),
            failures,
        })
    }
}

/// Creates a job as a copy of an existing one.
///
/// The new job's details are fetched afterwards purely for the log line.
///
/// # Errors
///
/// [`DispatchError::BackendNotConfigured`] when Jenkins is not configured, or
/// [`DispatchError::Backend`] from the create call.
pub async fn copy_job(
    registry: &BackendRegistry,
    request: &CopyJobRequest,
) -> Result<(), DispatchError> {
    let jenkins = registry.jenkins()?;
    jenkins.copy_job(request).await?;

    let target = request.target();
    match jenkins.job_info(&target).await {
        Ok(job) => info!(
            source = %request.from,
            job = %target,
            url = job.url.as_deref().unwrap_or_default(),
            "job copied"
        ),
        Err(err) => {
            info!(source = %request.from, job = %target, "job copied");
            debug!(job = %target, error = %err, "could not fetch details of the new job");
        }
    }
    Ok(())
}
