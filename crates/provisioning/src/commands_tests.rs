use serde_json::{json, Value};

use super::*;

fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

#[test]
fn message_types_match_exactly() {
    assert_eq!(MessageType::parse("GL_PROJECT_FORK"), Some(MessageType::ProjectFork));
    assert_eq!(MessageType::parse("GL_PROJECT_ADD_MEMBER"), Some(MessageType::ProjectAddMember));
    assert_eq!(MessageType::parse("JENKINS_PROJECT_COPY"), Some(MessageType::JenkinsProjectCopy));
    assert_eq!(MessageType::parse("gl_project_fork"), None);
    assert_eq!(MessageType::parse("GL_PROJECT_DELETE"), None);
}

#[test]
fn fork_decodes_with_optional_fields() {
    let command = Command::decode(
        MessageType::ProjectFork,
        &payload(json!({
            "gitType": "GitlabTest",
            "project_id": "123",
            "name": "my-fork",
            "namespace": 77,
            "path": "my-fork-path"
        })),
    )
    .unwrap();

    let Command::ForkProject(fork) = command else {
        panic!("expected a fork command");
    };
    assert_eq!(fork.git_type.as_str(), "GitlabTest");
    assert_eq!(fork.project_id, ProjectId::new(123));
    assert_eq!(fork.name.as_str(), "my-fork");
    assert_eq!(fork.namespace, Some(Namespace::Id(crate::NamespaceId::new(77))));
    assert_eq!(fork.path.as_deref(), Some("my-fork-path"));
}

#[test]
fn fork_namespace_may_be_a_path() {
    let command = Command::decode(
        MessageType::ProjectFork,
        &payload(json!({
            "gitType": "Gitlab",
            "project_id": 1,
            "name": "x",
            "namespace": "team/sub",
            "path": ""
        })),
    )
    .unwrap();

    let Command::ForkProject(fork) = command else {
        panic!("expected a fork command");
    };
    assert_eq!(fork.namespace, Some(Namespace::Path("team/sub".to_string())));
    assert_eq!(fork.path, None);
}

#[test]
fn missing_required_field_is_named() {
    let err = Command::decode(
        MessageType::ProjectFork,
        &payload(json!({"gitType": "Gitlab", "project_id": 1})),
    )
    .unwrap_err();
    assert_eq!(err, ValidationError::MissingField { field: "name" });

    let err = Command::decode(
        MessageType::ProjectAddMember,
        &payload(json!({"gitType": " ", "project_id": 1, "user_id": 5})),
    )
    .unwrap_err();
    assert_eq!(err, ValidationError::MissingField { field: "gitType" });

    let err = Command::decode(
        MessageType::ProjectAddMember,
        &payload(json!({"gitType": "Gitlab", "project_id": 1, "user_id": []})),
    )
    .unwrap_err();
    assert_eq!(err, ValidationError::MissingField { field: "user_id" });
}

#[test]
fn add_members_accepts_a_scalar_user() {
    let command = Command::decode(
        MessageType::ProjectAddMember,
        &payload(json!({"gitType": "Gitlab", "project_id": 1, "user_id": 456})),
    )
    .unwrap();

    let Command::AddMembers(members) = command else {
        panic!("expected an add-members command");
    };
    assert_eq!(members.user_ids, vec![UserId::new(456)]);
    assert_eq!(members.access_level, AccessLevel::DEVELOPER);
}

#[test]
fn add_members_keeps_list_order() {
    let command = Command::decode(
        MessageType::ProjectAddMember,
        &payload(json!({
            "gitType": "Gitlab",
            "project_id": 1,
            "user_id": [456, "789", 101],
            "access_level": 40
        })),
    )
    .unwrap();

    let Command::AddMembers(members) = command else {
        panic!("expected an add-members command");
    };
    assert_eq!(
        members.user_ids,
        vec![UserId::new(456), UserId::new(789), UserId::new(101)]
    );
    assert_eq!(members.access_level, AccessLevel::MAINTAINER);
}

#[test]
fn null_access_level_defaults_to_developer() {
    let command = Command::decode(
        MessageType::ProjectAddMember,
        &payload(json!({"gitType": "Gitlab", "project_id": 1, "user_id": 2, "access_level": null})),
    )
    .unwrap();

    let Command::AddMembers(members) = command else {
        panic!("expected an add-members command");
    };
    assert_eq!(members.access_level.as_u8(), 30);
}

#[test]
fn unsupported_access_level_is_invalid() {
    let err = Command::decode(
        MessageType::ProjectAddMember,
        &payload(json!({"gitType": "Gitlab", "project_id": 1, "user_id": 2, "access_level": 35})),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        ValidationError::InvalidField { ref message, .. }
            if message.contains("unsupported access level 35")
    ));
}

#[test]
fn non_numeric_user_is_invalid() {
    let err = Command::decode(
        MessageType::ProjectAddMember,
        &payload(json!({"gitType": "Gitlab", "project_id": 1, "user_id": [1, "bob"]})),
    )
    .unwrap_err();

    assert!(matches!(err, ValidationError::InvalidField { .. }));
}

#[test]
fn copy_job_normalises_paths() {
    let command = Command::decode(
        MessageType::JenkinsProjectCopy,
        &payload(json!({
            "source_job_name": "/a/b/template",
            "target_folder_path": "/new/era/",
            "new_job_name": "new-era-project"
        })),
    )
    .unwrap();

    assert_eq!(command.message_type(), MessageType::JenkinsProjectCopy);
    let Command::CopyJob(request) = command else {
        panic!("expected a copy command");
    };
    assert_eq!(request.from.to_string(), "a/b/template");
    assert_eq!(request.folder.segments(), ["new", "era"]);
    assert_eq!(request.name.as_str(), "new-era-project");
}

#[test]
fn copy_job_rejects_a_source_without_segments() {
    let err = Command::decode(
        MessageType::JenkinsProjectCopy,
        &payload(json!({"source_job_name": "//", "target_folder_path": "/", "new_job_name": "x"})),
    )
    .unwrap_err();

    assert!(matches!(err, ValidationError::InvalidField { .. }));
}
