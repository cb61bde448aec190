use super::*;

fn request(from: &str, folder: &str, name: &str) -> CopyJobRequest {
    CopyJobRequest {
        from: JobPath::parse(from).unwrap(),
        folder: FolderPath::parse(folder),
        name: JobName::new(name).unwrap(),
    }
}

#[test]
fn create_item_address_nests_folder_segments() {
    let req = request("/a/b/template", "/new/era/", "new-era-project");

    assert_eq!(req.create_item_address(), "job/new/job/era/createItem");
    assert_eq!(
        req.create_item_segments(),
        vec!["job", "new", "job", "era", "createItem"]
    );
}

#[test]
fn query_copies_from_the_normalised_source_path() {
    let req = request("/a/b/template", "/new/era/", "new-era-project");

    assert_eq!(
        req.query(),
        [
            ("name", "new-era-project".to_string()),
            ("mode", "copy".to_string()),
            ("from", "a/b/template".to_string()),
        ]
    );
}

#[test]
fn root_folder_creates_at_the_top_level() {
    let req = request("template", "/", "standalone");

    assert!(req.folder.is_root());
    assert_eq!(req.create_item_address(), "createItem");
    assert_eq!(req.create_item_segments(), vec!["createItem"]);
    assert_eq!(req.target().to_string(), "standalone");
}

#[test]
fn slashes_are_normalised() {
    assert_eq!(JobPath::parse("a/b").unwrap(), JobPath::parse("//a//b/").unwrap());
    assert_eq!(FolderPath::parse("new/era"), FolderPath::parse("/new/era/"));
    assert_eq!(FolderPath::parse("/new//era/").to_string(), "/new/era");
}

#[test]
fn job_path_needs_a_segment() {
    assert!(JobPath::parse("").is_none());
    assert!(JobPath::parse("///").is_none());
}

#[test]
fn job_address_nests_every_segment() {
    let path = JobPath::parse("/a/b/template").unwrap();
    assert_eq!(path.address(), "job/a/job/b/job/template");
    assert_eq!(path.segments(), ["a", "b", "template"]);
}

#[test]
fn target_appends_the_new_name_to_the_folder() {
    let req = request("/a/b/template", "/new/era/", "new-era-project");
    assert_eq!(req.target().to_string(), "new/era/new-era-project");
}

#[test]
fn job_names_reject_blank_and_slashes() {
    assert!(JobName::new("").is_none());
    assert!(JobName::new("  ").is_none());
    assert!(JobName::new("a/b").is_none());
    assert_eq!(JobName::new(" build ").unwrap().as_str(), "build");
}

#[test]
fn blank_folder_is_rejected_on_decode() {
    let err = serde_json::from_value::<FolderPath>(serde_json::json!("  ")).unwrap_err();
    assert!(err.to_string().contains("must not be blank"));

    let root = serde_json::from_value::<FolderPath>(serde_json::json!("/")).unwrap();
    assert!(root.is_root());
}
