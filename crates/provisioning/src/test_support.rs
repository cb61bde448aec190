//! Recording fakes for the port traits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::jobs::{CopyJobRequest, JobPath};
use crate::ports::{ForkRequest, ForkedProject, GitLabApi, JenkinsApi, JobInfo, ProjectMember};
use crate::registry::{BackendRegistry, InstanceSettings, JenkinsConfig, RegistrySettings, Secret};
use crate::{AccessLevel, Backend, BackendError, BranchName, InstanceName, ProjectId, UserId};

#[derive(Debug, Clone, PartialEq)]
pub enum GitLabCall {
    Fork(ForkRequest),
    RemoveForkRelationship(ProjectId),
    ProtectBranch(ProjectId, String, AccessLevel),
    AddMember(ProjectId, UserId, AccessLevel),
}

#[derive(Default)]
pub struct FakeGitLab {
    pub calls: Mutex<Vec<GitLabCall>>,
    pub fork_error: Mutex<Option<BackendError>>,
    pub follow_up_error: Mutex<Option<BackendError>>,
    pub member_errors: Mutex<HashMap<u64, BackendError>>,
}

impl FakeGitLab {
    pub fn calls(&self) -> Vec<GitLabCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_member(&self, user: u64, err: BackendError) {
        self.member_errors.lock().unwrap().insert(user, err);
    }
}

#[async_trait]
impl GitLabApi for FakeGitLab {
    async fn fork_project(&self, request: &ForkRequest) -> Result<ForkedProject, BackendError> {
        self.calls.lock().unwrap().push(GitLabCall::Fork(request.clone()));
        if let Some(err) = self.fork_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(ForkedProject {
            id: ProjectId::new(9000),
            path_with_namespace: Some(format!("team/{}", request.name)),
            web_url: None,
        })
    }

    async fn remove_fork_relationship(&self, project_id: ProjectId) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(GitLabCall::RemoveForkRelationship(project_id));
        match self.follow_up_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn protect_branch(
        &self,
        project_id: ProjectId,
        branch: &BranchName,
        level: AccessLevel,
    ) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(GitLabCall::ProtectBranch(
            project_id,
            branch.to_string(),
            level,
        ));
        match self.follow_up_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn add_project_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        access_level: AccessLevel,
    ) -> Result<ProjectMember, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(GitLabCall::AddMember(project_id, user_id, access_level));
        match self.member_errors.lock().unwrap().get(&user_id.as_u64()) {
            Some(err) => Err(err.clone()),
            None => Ok(ProjectMember {
                id: user_id,
                username: None,
            }),
        }
    }
}

#[derive(Default)]
pub struct FakeJenkins {
    pub copies: Mutex<Vec<CopyJobRequest>>,
    pub lookups: Mutex<Vec<JobPath>>,
    pub copy_error: Mutex<Option<BackendError>>,
}

#[async_trait]
impl JenkinsApi for FakeJenkins {
    async fn copy_job(&self, request: &CopyJobRequest) -> Result<(), BackendError> {
        self.copies.lock().unwrap().push(request.clone());
        match self.copy_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn job_info(&self, job: &JobPath) -> Result<JobInfo, BackendError> {
        self.lookups.lock().unwrap().push(job.clone());
        Ok(JobInfo {
            full_name: Some(job.to_string()),
            url: Some(format!("https://jenkins.example.com/{}/", job.address())),
        })
    }
}

pub fn instance(name: &str, url: Option<&str>, token: Option<&str>) -> InstanceSettings {
    InstanceSettings {
        name: InstanceName::new(name).unwrap(),
        base_url: url.map(str::to_string),
        token: token.map(Secret::new),
    }
}

pub fn jenkins_config() -> JenkinsConfig {
    JenkinsConfig {
        base_url: "https://jenkins.example.com/".to_string(),
        username: "robot".to_string(),
        api_token: Secret::new("jenkins-token"),
        timeout: Duration::from_secs(30),
    }
}

pub fn settings(
    explicit: Option<Vec<InstanceSettings>>,
    legacy: Vec<InstanceSettings>,
) -> RegistrySettings {
    RegistrySettings {
        gitlab_timeout: Duration::from_secs(30),
        explicit,
        legacy,
        jenkins: None,
    }
}

pub fn timeout() -> BackendError {
    BackendError::Timeout {
        backend: Backend::GitLab,
        after: Duration::from_secs(30),
    }
}

pub fn status(status: u16) -> BackendError {
    BackendError::Status {
        backend: Backend::GitLab,
        status,
        message: format!("status {status}"),
    }
}

/// A registry whose instances all share one fake per configured name.
pub struct Harness {
    pub registry: Arc<BackendRegistry>,
    pub gitlab: HashMap<String, Arc<FakeGitLab>>,
    pub jenkins: Arc<FakeJenkins>,
}

impl Harness {
    pub fn new(settings: RegistrySettings) -> Self {
        let jenkins = Arc::new(FakeJenkins::default());
        let mut gitlab = HashMap::new();
        let jenkins_client = jenkins.clone();
        let registry = BackendRegistry::build(
            &settings,
            |config| {
                let fake = Arc::new(FakeGitLab::default());
                gitlab.insert(config.name.to_string(), fake.clone());
                Ok::<Arc<dyn GitLabApi>, String>(fake)
            },
            move |_| Ok::<Arc<dyn JenkinsApi>, String>(jenkins_client),
        )
        .unwrap();
        Self {
            registry: Arc::new(registry),
            gitlab,
            jenkins,
        }
    }

    /// Two GitLab instances (`Gitlab`, `GitlabTest`) plus Jenkins.
    pub fn standard() -> Self {
        let mut settings = settings(
            Some(vec![
                instance("Gitlab", Some("https://gitlab.com"), Some("tok-main")),
                instance("GitlabTest", Some("https://gitlab-test.example.com"), Some("tok-test")),
            ]),
            Vec::new(),
        );
        settings.jenkins = Some(jenkins_config());
        Self::new(settings)
    }

    pub fn gitlab(&self, name: &str) -> &FakeGitLab {
        self.gitlab.get(name).unwrap()
    }

    pub fn total_gitlab_calls(&self) -> usize {
        self.gitlab.values().map(|f| f.calls().len()).sum()
    }
}
