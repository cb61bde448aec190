//! Backend client registry.
//!
//! Maps the logical GitLab instance named in a payload (`gitType`) to a
//! pre-built client, and holds the single Jenkins client. The registry is
//! assembled once at startup from [`RegistrySettings`] and is immutable
//! afterwards; workers share it behind an `Arc` without locking.
//!
//! ## Configuration sources
//!
//! GitLab instances come from one of two sources:
//!
//! - an **explicit** list of named instances, each with its own URL and
//!   token. Every listed instance must be complete; an incomplete entry is a
//!   startup error.
//! - a fixed **legacy** set of implicitly named instances (`GitlabAi`,
//!   `GitlabOnprem`, `Gitlab`, `GitlabTest`). A legacy entry exists only when
//!   both its URL and token are set.
//!
//! When the explicit list is present the legacy set is ignored entirely.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::ports::{GitLabApi, JenkinsApi};
use crate::{Backend, DispatchError, InstanceName};

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A credential that never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a credential value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the credential for use in an authentication header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// One GitLab instance as found in configuration, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSettings {
    /// Logical name matched against `gitType`.
    pub name: InstanceName,
    /// Base URL, e.g. `https://gitlab.example.com`.
    pub base_url: Option<String>,
    /// Access token.
    pub token: Option<Secret>,
}

/// Jenkins connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct JenkinsConfig {
    /// Base URL, e.g. `https://jenkins.example.com`.
    pub base_url: String,
    /// User the API token belongs to.
    pub username: String,
    /// API token.
    pub api_token: Secret,
    /// Per-call timeout.
    pub timeout: Duration,
}

/// Everything needed to build a [`BackendRegistry`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySettings {
    /// Per-call timeout applied to every GitLab instance.
    pub gitlab_timeout: Duration,
    /// Explicitly listed instances; `None` when no list was configured.
    pub explicit: Option<Vec<InstanceSettings>>,
    /// Legacy implicitly named instances.
    pub legacy: Vec<InstanceSettings>,
    /// Jenkins settings; `None` when Jenkins is not configured.
    pub jenkins: Option<JenkinsConfig>,
}

/// A validated, usable GitLab instance.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendInstanceConfig {
    /// Logical name.
    pub name: InstanceName,
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// Access token.
    pub credential: Secret,
    /// Per-call timeout.
    pub timeout: Duration,
}

/// Errors raised while assembling the registry. All are fatal at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An explicitly listed instance lacks its URL or token.
    #[error("GitLab instance '{instance}' is listed but has no {setting} configured")]
    IncompleteInstance {
        /// Instance name.
        instance: InstanceName,
        /// `"URL"` or `"token"`.
        setting: &'static str,
    },

    /// Two instances share a name when compared case-insensitively.
    #[error("GitLab instance '{0}' is configured more than once")]
    DuplicateInstance(InstanceName),

    /// A base URL is not an http(s) URL.
    #[error("{backend} base URL for '{name}' must start with http:// or https://, got: {url}")]
    InvalidUrl {
        /// Backend the URL belongs to.
        backend: Backend,
        /// Instance name (`"jenkins"` for Jenkins).
        name: String,
        /// The rejected URL.
        url: String,
    },

    /// The client for an instance could not be constructed.
    #[error("failed to build {backend} client for '{name}': {message}")]
    Client {
        /// Backend the client is for.
        backend: Backend,
        /// Instance name (`"jenkins"` for Jenkins).
        name: String,
        /// Construction error.
        message: String,
    },
}

impl RegistrySettings {
    /// Reconciles the two configuration sources into the final instance list.
    ///
    /// # Errors
    ///
    /// [`RegistryError::IncompleteInstance`] for an explicit entry missing a
    /// URL or token, [`RegistryError::DuplicateInstance`] for names that
    /// collide ignoring case, [`RegistryError::InvalidUrl`] for a non-http(s)
    /// base URL.
    pub fn gitlab_instances(&self) -> Result<Vec<BackendInstanceConfig>, RegistryError> {
        let mut instances = Vec::new();
        match &self.explicit {
            Some(explicit) => {
                for entry in explicit {
                    let base_url = entry
                        .base_url
                        .as_deref()
                        .filter(|u| !u.trim().is_empty())
                        .ok_or_else(|| RegistryError::IncompleteInstance {
                            instance: entry.name.clone(),
                            setting: "URL",
                        })?;
                    let token = entry.token.as_ref().filter(|t| !t.is_blank()).ok_or_else(|| {
                        RegistryError::IncompleteInstance {
                            instance: entry.name.clone(),
                            setting: "token",
                        }
                    })?;
                    instances.push(self.instance(&entry.name, base_url, token)?);
                }
            }
            None => {
                for entry in &self.legacy {
                    let base_url = entry.base_url.as_deref().filter(|u| !u.trim().is_empty());
                    let token = entry.token.as_ref().filter(|t| !t.is_blank());
                    if let (Some(base_url), Some(token)) = (base_url, token) {
                        instances.push(self.instance(&entry.name, base_url, token)?);
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        for instance in &instances {
            if !seen.insert(instance.name.lookup_key()) {
                return Err(RegistryError::DuplicateInstance(instance.name.clone()));
            }
        }
        Ok(instances)
    }

    fn instance(
        &self,
        name: &InstanceName,
        base_url: &str,
        token: &Secret,
    ) -> Result<BackendInstanceConfig, RegistryError> {
        Ok(BackendInstanceConfig {
            name: name.clone(),
            base_url: validate_url(Backend::GitLab, name.as_str(), base_url)?,
            credential: token.clone(),
            timeout: self.gitlab_timeout,
        })
    }
}

fn validate_url(backend: Backend, name: &str, url: &str) -> Result<String, RegistryError> {
    let url = url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(RegistryError::InvalidUrl {
            backend,
            name: name.to_string(),
            url: url.to_string(),
        });
    }
    Ok(url.trim_end_matches('/').to_string())
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A GitLab instance together with its client.
#[derive(Clone)]
pub struct RegisteredInstance {
    /// Validated configuration the client was built from.
    pub config: BackendInstanceConfig,
    /// Client bound to that configuration.
    pub client: Arc<dyn GitLabApi>,
}

impl std::fmt::Debug for RegisteredInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredInstance")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Immutable lookup table from instance name to client.
pub struct BackendRegistry {
    gitlab: HashMap<String, RegisteredInstance>,
    jenkins: Option<Arc<dyn JenkinsApi>>,
}

impl BackendRegistry {
    /// Builds the registry, constructing one client per configured instance.
    ///
    /// `connect_gitlab` and `connect_jenkins` build the concrete clients; the
    /// registry itself performs no I/O.
    ///
    /// # Errors
    ///
    /// Any [`RegistryError`] from [`RegistrySettings::gitlab_instances`], an
    /// invalid Jenkins URL, or a client construction failure.
    pub fn build<G, J, E>(
        settings: &RegistrySettings,
        mut connect_gitlab: G,
        connect_jenkins: J,
    ) -> Result<Self, RegistryError>
    where
        G: FnMut(&BackendInstanceConfig) -> Result<Arc<dyn GitLabApi>, E>,
        J: FnOnce(&JenkinsConfig) -> Result<Arc<dyn JenkinsApi>, E>,
        E: std::fmt::Display,
    {
        let mut gitlab = HashMap::new();
        for config in settings.gitlab_instances()? {
            let client = connect_gitlab(&config).map_err(|e| RegistryError::Client {
                backend: Backend::GitLab,
                name: config.name.to_string(),
                message: e.to_string(),
            })?;
            gitlab.insert(config.name.lookup_key(), RegisteredInstance { config, client });
        }

        let jenkins = match &settings.jenkins {
            Some(jenkins) => {
                let config = JenkinsConfig {
                    base_url: validate_url(Backend::Jenkins, "jenkins", &jenkins.base_url)?,
                    ..jenkins.clone()
                };
                let client = connect_jenkins(&config).map_err(|e| RegistryError::Client {
                    backend: Backend::Jenkins,
                    name: "jenkins".to_string(),
                    message: e.to_string(),
                })?;
                Some(client)
            }
            None => None,
        };

        Ok(Self { gitlab, jenkins })
    }

    /// Resolves a GitLab instance by name, ignoring letter case.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownInstance`] if no such instance is configured.
    pub fn resolve(&self, name: &InstanceName) -> Result<&RegisteredInstance, DispatchError> {
        self.gitlab
            .get(&name.lookup_key())
            .ok_or_else(|| DispatchError::UnknownInstance(name.clone()))
    }

    /// Returns the Jenkins client.
    ///
    /// # Errors
    ///
    /// [`DispatchError::BackendNotConfigured`] if Jenkins is not configured.
    pub fn jenkins(&self) -> Result<&Arc<dyn JenkinsApi>, DispatchError> {
        self.jenkins
            .as_ref()
            .ok_or(DispatchError::BackendNotConfigured(Backend::Jenkins))
    }

    /// Names of the configured GitLab instances, sorted for stable logging.
    pub fn instance_names(&self) -> Vec<&InstanceName> {
        let mut names: Vec<_> = self.gitlab.values().map(|i| &i.config.name).collect();
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        names
    }

    /// Returns `true` if a Jenkins client is configured.
    pub fn has_jenkins(&self) -> bool {
        self.jenkins.is_some()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
