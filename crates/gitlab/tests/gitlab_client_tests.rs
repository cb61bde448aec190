//! Integration tests for the GitLab client.
//!
//! These tests use wiremock to stand in for a GitLab instance and verify
//! request shapes and the classification of failures.

use std::time::Duration;

use gitlab::GitLabClient;
use provisioning::{
    AccessLevel, BackendError, BackendInstanceConfig, BranchName, ForkRequest, GitLabApi,
    InstanceName, Namespace, ProjectId, ProjectName, Secret, UserId,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, timeout: Duration) -> GitLabClient {
    GitLabClient::new(&BackendInstanceConfig {
        name: InstanceName::new("GitlabTest").unwrap(),
        base_url: server.uri(),
        credential: Secret::new("glpat-test"),
        timeout,
    })
    .unwrap()
}

fn fork_request(namespace: Option<Namespace>) -> ForkRequest {
    ForkRequest {
        project_id: ProjectId::new(123),
        name: ProjectName::new("sandbox").unwrap(),
        namespace,
        path: Some("sandbox-path".to_string()),
    }
}

#[tokio::test]
async fn fork_posts_to_the_project_and_decodes_the_new_project() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/123/fork"))
        .and(header("authorization", "Bearer glpat-test"))
        .and(body_json(json!({
            "name": "sandbox",
            "path": "sandbox-path",
            "namespace_path": "team/sub"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 456,
            "path_with_namespace": "team/sub/sandbox-path",
            "web_url": "https://gitlab.example.com/team/sub/sandbox-path",
            "forked_from_project": {"id": 123}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let forked = client(&server, Duration::from_secs(5))
        .fork_project(&fork_request(Some(Namespace::Path("team/sub".to_string()))))
        .await
        .unwrap();

    assert_eq!(forked.id, ProjectId::new(456));
    assert_eq!(forked.path_with_namespace.as_deref(), Some("team/sub/sandbox-path"));
}

#[tokio::test]
async fn fork_with_undecodable_body_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/123/fork"))
        .respond_with(ResponseTemplate::new(201).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(5))
        .fork_project(&fork_request(None))
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::InvalidResponse { .. }));
    assert!(!err.retry_policy().is_retryable());
}

#[tokio::test]
async fn remove_fork_relationship_deletes_the_fork_link() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v4/projects/456/fork"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, Duration::from_secs(5))
        .remove_fork_relationship(ProjectId::new(456))
        .await
        .unwrap();
}

#[tokio::test]
async fn protect_branch_grants_push_and_merge_at_the_given_level() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/456/protected_branches"))
        .and(body_json(json!({
            "name": "main",
            "push_access_level": 40,
            "merge_access_level": 40
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "main"})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, Duration::from_secs(5))
        .protect_branch(
            ProjectId::new(456),
            &BranchName::new("main").unwrap(),
            AccessLevel::MAINTAINER,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn add_member_sends_user_and_level() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/55/members"))
        .and(body_json(json!({"user_id": 789, "access_level": 30})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 789,
            "username": "jdoe",
            "access_level": 30
        })))
        .expect(1)
        .mount(&server)
        .await;

    let member = client(&server, Duration::from_secs(5))
        .add_project_member(ProjectId::new(55), UserId::new(789), AccessLevel::DEVELOPER)
        .await
        .unwrap();

    assert_eq!(member.id, UserId::new(789));
    assert_eq!(member.username.as_deref(), Some("jdoe"));
}

#[tokio::test]
async fn existing_member_is_reported_as_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/55/members"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"message": "Member already exists"})),
        )
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(5))
        .add_project_member(ProjectId::new(55), UserId::new(789), AccessLevel::DEVELOPER)
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    match err {
        BackendError::Status { status, message, .. } => {
            assert_eq!(status, 409);
            assert_eq!(message, "Member already exists");
        }
        other => panic!("expected a status error, got {other:?}"),
    }
}

#[tokio::test]
async fn not_found_is_permanent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/999/members"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "404 Project Not Found"})),
        )
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(5))
        .add_project_member(ProjectId::new(999), UserId::new(1), AccessLevel::DEVELOPER)
        .await
        .unwrap_err();

    assert!(!err.retry_policy().is_retryable());
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/123/fork"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(5))
        .fork_project(&fork_request(None))
        .await
        .unwrap_err();

    assert!(err.retry_policy().is_retryable());
}

#[tokio::test]
async fn slow_response_times_out_as_transient() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/123/fork"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": 1}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_millis(50))
        .fork_project(&fork_request(None))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BackendError::Timeout {
            backend: provisioning::Backend::GitLab,
            after: Duration::from_millis(50),
        }
    );
    assert!(err.retry_policy().is_retryable());
}

#[tokio::test]
async fn unreachable_instance_is_transient() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = GitLabClient::new(&BackendInstanceConfig {
        name: InstanceName::new("Gone").unwrap(),
        base_url: uri,
        credential: Secret::new("t"),
        timeout: Duration::from_secs(2),
    })
    .unwrap();

    let err = client.remove_fork_relationship(ProjectId::new(1)).await.unwrap_err();

    assert!(matches!(err, BackendError::Unreachable { .. }));
    assert!(err.retry_policy().is_retryable());
}
