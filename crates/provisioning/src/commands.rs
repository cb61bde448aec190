//! Message types and their typed payloads.
//!
//! [`MessageType`] is the closed set of message types this service handles.
//! [`Command::decode`] turns an envelope payload into the typed command for
//! that type, checking required fields before anything else looks at the
//! payload. Handlers only ever see decoded commands, so scalar-or-list fields
//! are already normalised and defaults already applied.

use serde::de::DeserializeOwned;
use serde::{de, Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::jobs::{CopyJobRequest, FolderPath, JobName, JobPath};
use crate::{AccessLevel, InstanceName, Namespace, ProjectId, ProjectName, UserId, ValidationError};

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// The message types this service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `GL_PROJECT_FORK`: fork a GitLab project.
    ProjectFork,
    /// `GL_PROJECT_ADD_MEMBER`: add one or more members to a GitLab project.
    ProjectAddMember,
    /// `JENKINS_PROJECT_COPY`: copy a Jenkins job into a folder.
    JenkinsProjectCopy,
}

impl MessageType {
    /// Every supported message type.
    pub const ALL: [Self; 3] = [
        Self::ProjectFork,
        Self::ProjectAddMember,
        Self::JenkinsProjectCopy,
    ];

    /// Returns the wire discriminator (`header.messageType`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProjectFork => "GL_PROJECT_FORK",
            Self::ProjectAddMember => "GL_PROJECT_ADD_MEMBER",
            Self::JenkinsProjectCopy => "JENKINS_PROJECT_COPY",
        }
    }

    /// Looks up a wire discriminator. Matching is exact.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    /// Payload fields that must be present and non-blank.
    fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::ProjectFork => &["gitType", "project_id", "name"],
            Self::ProjectAddMember => &["gitType", "project_id", "user_id"],
            Self::JenkinsProjectCopy => &["source_job_name", "target_folder_path", "new_job_name"],
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// `GL_PROJECT_FORK` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForkProject {
    /// GitLab instance to run against.
    #[serde(rename = "gitType")]
    pub git_type: InstanceName,
    /// Project to fork.
    pub project_id: ProjectId,
    /// Name of the new project.
    pub name: ProjectName,
    /// Target namespace; the caller's personal namespace when absent.
    #[serde(default)]
    pub namespace: Option<Namespace>,
    /// Path of the new project; derived from `name` by GitLab when absent.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub path: Option<String>,
}

/// `GL_PROJECT_ADD_MEMBER` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddMembers {
    /// GitLab instance to run against.
    #[serde(rename = "gitType")]
    pub git_type: InstanceName,
    /// Project receiving the members.
    pub project_id: ProjectId,
    /// Users to add, in the order the producer listed them.
    ///
    /// The wire field `user_id` may be a single id or a list.
    #[serde(rename = "user_id", deserialize_with = "one_or_many")]
    pub user_ids: Vec<UserId>,
    /// Role granted to every user; Developer when absent.
    #[serde(default, deserialize_with = "default_on_null")]
    pub access_level: AccessLevel,
}

#[derive(Deserialize)]
struct CopyJobPayload {
    source_job_name: JobPath,
    target_folder_path: FolderPath,
    new_job_name: JobName,
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A decoded, validated message ready for its handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Fork a GitLab project.
    ForkProject(ForkProject),
    /// Add members to a GitLab project.
    AddMembers(AddMembers),
    /// Copy a Jenkins job.
    CopyJob(CopyJobRequest),
}

impl Command {
    /// Decodes `payload` as the payload of `message_type`.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingField`] for an absent, null or blank required
    /// field; [`ValidationError::InvalidField`] for a field of the wrong type
    /// or with an invalid value.
    pub fn decode(
        message_type: MessageType,
        payload: &Map<String, Value>,
    ) -> Result<Self, ValidationError> {
        for &field in message_type.required_fields() {
            if is_absent(payload.get(field)) {
                return Err(ValidationError::MissingField { field });
            }
        }

        match message_type {
            MessageType::ProjectFork => decode_payload(payload).map(Self::ForkProject),
            MessageType::ProjectAddMember => decode_payload(payload).map(Self::AddMembers),
            MessageType::JenkinsProjectCopy => {
                decode_payload::<CopyJobPayload>(payload).map(|p| {
                    Self::CopyJob(CopyJobRequest {
                        from: p.source_job_name,
                        folder: p.target_folder_path,
                        name: p.new_job_name,
                    })
                })
            }
        }
    }

    /// Returns the message type this command was decoded from.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::ForkProject(_) => MessageType::ProjectFork,
            Self::AddMembers(_) => MessageType::ProjectAddMember,
            Self::CopyJob(_) => MessageType::JenkinsProjectCopy,
        }
    }
}

fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn decode_payload<T: DeserializeOwned>(payload: &Map<String, Value>) -> Result<T, ValidationError> {
    serde_json::from_value(Value::Object(payload.clone())).map_err(|e| {
        ValidationError::InvalidField {
            field: "payload".to_string(),
            message: e.to_string(),
        }
    })
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<UserId>, D::Error>
where
    D: Deserializer<'de>,
{
    let ids = match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .map(UserId::deserialize)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| de::Error::custom(format!("user_id: {e}")))?,
        scalar => vec![UserId::deserialize(scalar)
            .map_err(|e| de::Error::custom(format!("user_id: {e}")))?],
    };
    if ids.is_empty() {
        return Err(de::Error::custom("user_id: list must not be empty"));
    }
    Ok(ids)
}

fn default_on_null<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
