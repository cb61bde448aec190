use super::*;
use crate::test_support::{instance, jenkins_config, settings, Harness};

fn legacy_set() -> Vec<InstanceSettings> {
    vec![
        instance("GitlabAi", Some("https://gitlab-ai.example.com"), Some("tok-ai")),
        instance("GitlabOnprem", Some("https://gitlab.internal"), None),
        instance("Gitlab", Some("https://gitlab.com"), Some("tok-main")),
        instance("GitlabTest", Some("https://gitlab-test.example.com/"), Some("tok-test")),
    ]
}

fn names(instances: &[BackendInstanceConfig]) -> Vec<&str> {
    instances.iter().map(|i| i.name.as_str()).collect()
}

#[test]
fn legacy_instances_need_both_url_and_token() {
    let instances = settings(None, legacy_set()).gitlab_instances().unwrap();

    assert_eq!(names(&instances), vec!["GitlabAi", "Gitlab", "GitlabTest"]);
}

#[test]
fn explicit_list_replaces_the_legacy_set() {
    let explicit = vec![instance("Corp", Some("https://git.corp.example.com"), Some("tok-corp"))];

    let instances = settings(Some(explicit), legacy_set()).gitlab_instances().unwrap();

    assert_eq!(names(&instances), vec!["Corp"]);
}

#[test]
fn incomplete_explicit_entry_fails_fast() {
    let explicit = vec![
        instance("Corp", Some("https://git.corp.example.com"), Some("tok-corp")),
        instance("Lab", Some("https://lab.example.com"), None),
    ];

    let err = settings(Some(explicit), Vec::new()).gitlab_instances().unwrap_err();

    assert!(matches!(
        err,
        RegistryError::IncompleteInstance { ref instance, setting: "token" }
            if instance.as_str() == "Lab"
    ));
}

#[test]
fn explicit_entry_with_blank_url_fails_fast() {
    let explicit = vec![instance("Lab", Some("  "), Some("tok"))];

    let err = settings(Some(explicit), Vec::new()).gitlab_instances().unwrap_err();

    assert!(matches!(err, RegistryError::IncompleteInstance { setting: "URL", .. }));
}

#[test]
fn names_differing_only_by_case_collide() {
    let explicit = vec![
        instance("Corp", Some("https://a.example.com"), Some("a")),
        instance("CORP", Some("https://b.example.com"), Some("b")),
    ];

    let err = settings(Some(explicit), Vec::new()).gitlab_instances().unwrap_err();

    assert!(matches!(err, RegistryError::DuplicateInstance(ref name) if name.as_str() == "CORP"));
}

#[test]
fn non_http_url_is_rejected() {
    let explicit = vec![instance("Corp", Some("gitlab.example.com"), Some("a"))];

    let err = settings(Some(explicit), Vec::new()).gitlab_instances().unwrap_err();

    assert!(matches!(err, RegistryError::InvalidUrl { backend: Backend::GitLab, .. }));
}

#[test]
fn trailing_slash_is_trimmed_and_timeout_applied() {
    let instances = settings(None, legacy_set()).gitlab_instances().unwrap();
    let test = instances.iter().find(|i| i.name.as_str() == "GitlabTest").unwrap();

    assert_eq!(test.base_url, "https://gitlab-test.example.com");
    assert_eq!(test.credential.expose(), "tok-test");
    assert_eq!(test.timeout, Duration::from_secs(30));
}

#[test]
fn resolve_ignores_case_and_returns_that_instance() {
    let harness = Harness::new(settings(None, legacy_set()));

    let resolved = harness
        .registry
        .resolve(&InstanceName::new("gitlabtest").unwrap())
        .unwrap();

    assert_eq!(resolved.config.name.as_str(), "GitlabTest");
    assert_eq!(resolved.config.base_url, "https://gitlab-test.example.com");
    assert_eq!(resolved.config.credential.expose(), "tok-test");
}

#[test]
fn unknown_instance_is_reported() {
    let harness = Harness::new(settings(None, legacy_set()));

    let err = harness
        .registry
        .resolve(&InstanceName::new("GitlabOnprem").unwrap())
        .unwrap_err();

    assert!(matches!(err, DispatchError::UnknownInstance(_)));
}

#[test]
fn jenkins_is_optional() {
    let harness = Harness::new(settings(None, Vec::new()));
    assert!(!harness.registry.has_jenkins());
    assert!(matches!(
        harness.registry.jenkins(),
        Err(DispatchError::BackendNotConfigured(Backend::Jenkins))
    ));

    let mut with_jenkins = settings(None, Vec::new());
    with_jenkins.jenkins = Some(jenkins_config());
    assert!(Harness::new(with_jenkins).registry.has_jenkins());
}

#[test]
fn instance_names_are_sorted() {
    let harness = Harness::new(settings(None, legacy_set()));

    let names: Vec<_> = harness.registry.instance_names().iter().map(|n| n.as_str()).collect();

    assert_eq!(names, vec!["Gitlab", "GitlabAi", "GitlabTest"]);
}

#[test]
fn client_construction_failure_is_reported() {
    let result = BackendRegistry::build(
        &settings(None, legacy_set()),
        |_| Err::<Arc<dyn GitLabApi>, _>("tls backend unavailable"),
        |_| Err::<Arc<dyn JenkinsApi>, _>("unused"),
    );

    let err = result.err().unwrap();
    assert!(err.to_string().contains("tls backend unavailable"), "{err}");
}

#[test]
fn secrets_are_redacted_in_debug_output() {
    let secret = Secret::new("super-secret");
    assert_eq!(format!("{secret:?}"), "Secret(***)");
}
