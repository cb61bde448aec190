//! HTTP client for the Jenkins instance.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client as HttpClient, RequestBuilder, Response, StatusCode, Url};
use thiserror::Error;
use tracing::debug;

use provisioning::{
    Backend, BackendError, CopyJobRequest, JenkinsApi, JenkinsConfig, JobInfo, JobPath, Secret,
};

/// Longest error body excerpt carried into a [`BackendError`].
const MAX_ERROR_BODY: usize = 512;

/// Errors raised while constructing a [`JenkinsClient`].
#[derive(Debug, Error)]
pub enum JenkinsClientError {
    /// The configured base URL does not parse or cannot carry a path.
    #[error("invalid Jenkins URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be created.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// A client bound to the Jenkins instance.
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    base_url: Url,
    http: HttpClient,
    username: String,
    api_token: Secret,
    timeout: Duration,
}

impl JenkinsClient {
    /// Creates a client for `config`.
    ///
    /// Redirects are not followed: `createItem` answers a successful copy
    /// with a redirect to the new job, which is treated as success as is.
    ///
    /// # Errors
    ///
    /// [`JenkinsClientError::InvalidUrl`] if the base URL cannot be used, or
    /// [`JenkinsClientError::Http`] if the HTTP client cannot be created.
    pub fn new(config: &JenkinsConfig) -> Result<Self, JenkinsClientError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| JenkinsClientError::InvalidUrl(config.base_url.clone()))?;
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            base_url,
            http,
            username: config.username.clone(),
            api_token: config.api_token.clone(),
            timeout: config.timeout,
        })
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn url<I>(&self, segments: I) -> Url
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn job_url(&self, job: &JobPath, tail: &[&str]) -> Url {
        let segments = job
            .segments()
            .iter()
            .flat_map(|s| ["job", s.as_str()])
            .chain(tail.iter().copied());
        self.url(segments)
    }

    /// Sends an authenticated request; 2xx and 302 count as success.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, BackendError> {
        let response = builder
            .basic_auth(&self.username, Some(self.api_token.expose()))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::FOUND {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            backend: Backend::Jenkins,
            status: status.as_u16(),
            message: body.trim().chars().take(MAX_ERROR_BODY).collect(),
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                backend: Backend::Jenkins,
                after: self.timeout,
            }
        } else {
            BackendError::Unreachable {
                backend: Backend::Jenkins,
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl JenkinsApi for JenkinsClient {
    async fn copy_job(&self, request: &CopyJobRequest) -> Result<(), BackendError> {
        let url = self.url(request.create_item_segments());
        debug!(
            source = %request.from,
            folder = %request.folder,
            name = %request.name,
            "copying job"
        );
        self.send(self.http.post(url).query(&request.query()[..])).await.map(|_| ())
    }

    async fn job_info(&self, job: &JobPath) -> Result<JobInfo, BackendError> {
        let url = self.job_url(job, &["api", "json"]);
        let response = self.send(self.http.get(url)).await?;
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::InvalidResponse {
            backend: Backend::Jenkins,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
