//! Hierarchical Jenkins job addressing.
//!
//! Jenkins nests jobs inside folders and addresses a folder as a chain of
//! `job/<segment>` path components: the folder `new/era` lives at
//! `job/new/job/era`. Producers send plain slash-delimited paths with or
//! without leading and trailing slashes; this module normalises them into
//! segment lists and composes the API addresses from those lists.

use serde::{de, Deserialize, Deserializer};

/// Splits a slash-delimited path into its non-empty segments.
///
/// Leading, trailing and repeated slashes are ignored, so `"/a//b/"` and
/// `"a/b"` yield the same segments.
fn split_segments(raw: &str) -> Vec<String> {
    raw.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Renders segments as a nested-folder address: `job/a/job/b`.
fn nested_address(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| format!("job/{s}"))
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// JobPath
// ---------------------------------------------------------------------------

/// Full path of an existing job, e.g. `a/b/template`.
///
/// Always has at least one segment; the last segment is the job name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobPath {
    segments: Vec<String>,
}

impl JobPath {
    /// Parses a slash-delimited job path, returning `None` when no segment
    /// remains after normalisation.
    pub fn parse(raw: &str) -> Option<Self> {
        let segments = split_segments(raw);
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// Returns the normalised segments, outermost folder first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the API address of the job itself: `job/a/job/b/job/template`.
    pub fn address(&self) -> String {
        nested_address(&self.segments)
    }
}

impl std::fmt::Display for JobPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl<'de> Deserialize<'de> for JobPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| de::Error::custom("must name at least one path segment"))
    }
}

// ---------------------------------------------------------------------------
// FolderPath
// ---------------------------------------------------------------------------

/// A folder that new jobs are created in.
///
/// `"/"` denotes the Jenkins root and has no segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FolderPath {
    segments: Vec<String>,
}

impl FolderPath {
    /// Parses a slash-delimited folder path.
    pub fn parse(raw: &str) -> Self {
        Self {
            segments: split_segments(raw),
        }
    }

    /// Returns the normalised segments, outermost folder first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns `true` for the Jenkins root folder.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the path of a job named `name` inside this folder.
    pub fn child(&self, name: &JobName) -> JobPath {
        let mut segments = self.segments.clone();
        segments.push(name.as_str().to_string());
        JobPath { segments }
    }
}

impl std::fmt::Display for FolderPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

impl<'de> Deserialize<'de> for FolderPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.trim().is_empty() {
            return Err(de::Error::custom("must not be blank (use \"/\" for the root)"));
        }
        Ok(Self::parse(&raw))
    }
}

// ---------------------------------------------------------------------------
// JobName
// ---------------------------------------------------------------------------

/// Name of a single job: non-blank and free of `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobName(String);

impl JobName {
    /// Creates a job name, returning `None` if it is blank or contains `/`.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into().trim().to_string();
        if v.is_empty() || v.contains('/') {
            None
        } else {
            Some(Self(v))
        }
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for JobName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw)
            .ok_or_else(|| de::Error::custom("must be non-blank and must not contain '/'"))
    }
}

// ---------------------------------------------------------------------------
// CopyJobRequest
// ---------------------------------------------------------------------------

/// A request to create `name` inside `folder` as a copy of `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyJobRequest {
    /// Existing job to copy.
    pub from: JobPath,
    /// Folder the copy is created in.
    pub folder: FolderPath,
    /// Name of the new job.
    pub name: JobName,
}

impl CopyJobRequest {
    /// Address of the item-creation endpoint, relative to the Jenkins base URL.
    ///
    /// `job/new/job/era/createItem` for folder `new/era`; `createItem` for the
    /// root folder.
    pub fn create_item_address(&self) -> String {
        if self.folder.is_root() {
            "createItem".to_string()
        } else {
            format!("{}/createItem", nested_address(self.folder.segments()))
        }
    }

    /// Path segments of the item-creation endpoint, for URL builders that
    /// percent-encode each segment.
    pub fn create_item_segments(&self) -> Vec<String> {
        let mut segments = Vec::with_capacity(self.folder.segments().len() * 2 + 1);
        for folder in self.folder.segments() {
            segments.push("job".to_string());
            segments.push(folder.clone());
        }
        segments.push("createItem".to_string());
        segments
    }

    /// Query parameters of the item-creation call, in wire order.
    pub fn query(&self) -> [(&'static str, String); 3] {
        [
            ("name", self.name.as_str().to_string()),
            ("mode", "copy".to_string()),
            ("from", self.from.to_string()),
        ]
    }

    /// Full path of the job this request creates.
    pub fn target(&self) -> JobPath {
        self.folder.child(&self.name)
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
