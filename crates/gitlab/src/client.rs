//! HTTP client for one GitLab instance.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use provisioning::{
    AccessLevel, Backend, BackendError, BackendInstanceConfig, BranchName, ForkRequest,
    ForkedProject, GitLabApi, InstanceName, Namespace, NamespaceId, ProjectId, ProjectMember,
    Secret, UserId,
};

/// Longest error body excerpt carried into a [`BackendError`].
const MAX_ERROR_BODY: usize = 512;

/// A client bound to one GitLab instance.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    /// Logical instance name, for logs.
    name: InstanceName,
    /// Instance base URL without a trailing slash.
    base_url: String,
    http: HttpClient,
    token: Secret,
    timeout: Duration,
}

#[derive(Serialize)]
struct ForkBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace_id: Option<NamespaceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace_path: Option<&'a str>,
}

#[derive(Serialize)]
struct AddMemberBody {
    user_id: UserId,
    access_level: AccessLevel,
}

#[derive(Serialize)]
struct ProtectBranchBody<'a> {
    name: &'a str,
    push_access_level: AccessLevel,
    merge_access_level: AccessLevel,
}

impl GitLabClient {
    /// Creates a client for `config`, applying its per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created (e.g. the TLS
    /// backend fails to initialise).
    pub fn new(config: &BackendInstanceConfig) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder().timeout(config.timeout).build()?;
        Ok(Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            token: config.credential.clone(),
            timeout: config.timeout,
        })
    }

    /// Build a full API URL from a path relative to `/api/v4`.
    fn url(&self, path: &str) -> String {
        let path = path.strip_prefix('/').unwrap_or(path);
        format!("{}/api/v4/{}", self.base_url, path)
    }

    /// Sends an authenticated request and fails on a non-success status.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, BackendError> {
        let response = builder
            .bearer_auth(self.token.expose())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            backend: Backend::GitLab,
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn json<T: DeserializeOwned>(&self, response: Response) -> Result<T, BackendError> {
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::InvalidResponse {
            backend: Backend::GitLab,
            message: e.to_string(),
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                backend: Backend::GitLab,
                after: self.timeout,
            }
        } else {
            BackendError::Unreachable {
                backend: Backend::GitLab,
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl GitLabApi for GitLabClient {
    async fn fork_project(&self, request: &ForkRequest) -> Result<ForkedProject, BackendError> {
        let (namespace_id, namespace_path) = match &request.namespace {
            Some(Namespace::Id(id)) => (Some(*id), None),
            Some(Namespace::Path(path)) => (None, Some(path.as_str())),
            None => (None, None),
        };
        let body = ForkBody {
            name: request.name.as_str(),
            path: request.path.as_deref(),
            namespace_id,
            namespace_path,
        };

        debug!(instance = %self.name, project_id = %request.project_id, "forking project");
        let url = self.url(&format!("projects/{}/fork", request.project_id));
        let response = self.send(self.http.post(url).json(&body)).await?;
        self.json(response).await
    }

    async fn remove_fork_relationship(&self, project_id: ProjectId) -> Result<(), BackendError> {
        debug!(instance = %self.name, %project_id, "removing fork relationship");
        let url = self.url(&format!("projects/{project_id}/fork"));
        self.send(self.http.delete(url)).await.map(|_| ())
    }

    async fn protect_branch(
        &self,
        project_id: ProjectId,
        branch: &BranchName,
        level: AccessLevel,
    ) -> Result<(), BackendError> {
        let body = ProtectBranchBody {
            name: branch.as_str(),
            push_access_level: level,
            merge_access_level: level,
        };

        debug!(instance = %self.name, %project_id, %branch, "protecting branch");
        let url = self.url(&format!("projects/{project_id}/protected_branches"));
        self.send(self.http.post(url).json(&body)).await.map(|_| ())
    }

    async fn add_project_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        access_level: AccessLevel,
    ) -> Result<ProjectMember, BackendError> {
        let body = AddMemberBody {
            user_id,
            access_level,
        };

        debug!(instance = %self.name, %project_id, %user_id, "adding project member");
        let url = self.url(&format!("projects/{project_id}/members"));
        let response = self.send(self.http.post(url).json(&body)).await?;
        self.json(response).await
    }
}

/// Extracts GitLab's error message from a response body.
///
/// GitLab reports errors as `{"message": ...}` (a string or a per-field
/// object) or `{"error": "..."}`; anything else is passed through truncated.
fn error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = json["message"].as_str().or_else(|| json["error"].as_str()) {
            return message.to_string();
        }
        if !json["message"].is_null() {
            return json["message"].to_string();
        }
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
