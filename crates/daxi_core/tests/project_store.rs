use daxi_core::{FsProjectRepository, Project, ProjectRepository, RepoError, SchemaDocument};
use serde_json::json;
use std::fs;

fn setup() -> (tempfile::TempDir, FsProjectRepository) {
    let dir = tempfile::tempdir().unwrap();
    let repo = FsProjectRepository::new(dir.path().join("projects"));
    (dir, repo)
}

fn shop_document() -> SchemaDocument {
    SchemaDocument::from_value(json!({
        "entities": [
            { "name": "customer", "attributes": [{ "name": "id", "type": "integer", "primary_key": true }] },
            { "name": "order", "attributes": [{ "name": "customer_id", "type": "integer" }] }
        ],
        "relationships": [{ "from": "order", "to": "customer", "type": "many-to-one" }]
    }))
}

#[test]
fn save_then_load_returns_same_document_with_fresh_id() {
    let (_dir, mut repo) = setup();
    let project = Project::new("Web Shop", shop_document());
    repo.save(&project).unwrap();

    let loaded = repo.load("Web Shop").unwrap();
    assert_eq!(loaded.document, project.document);
    assert_eq!(loaded.name, "Web Shop");
    assert_ne!(loaded.id, project.id);
}

#[test]
fn load_trims_surrounding_whitespace_from_name() {
    let (_dir, mut repo) = setup();
    repo.save(&Project::new("Shop", shop_document())).unwrap();

    let loaded = repo.load("  Shop \t").unwrap();
    assert_eq!(loaded.name, "Shop");
    assert_eq!(loaded.slug(), "shop");
}

#[test]
fn saved_file_holds_pretty_document_only() {
    let (_dir, mut repo) = setup();
    let project = Project::new("Web Shop", shop_document());
    repo.save(&project).unwrap();

    let path = repo.path_for("Web Shop").unwrap();
    assert!(path.ends_with("web_shop.json"));
    let text = fs::read_to_string(path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(&value, project.document.as_value());
    assert!(value.get("id").is_none());
    assert!(text.lines().count() > 1);
}

#[test]
fn save_fully_replaces_previous_content() {
    let (_dir, mut repo) = setup();
    let mut project = Project::new("shop", shop_document());
    repo.save(&project).unwrap();

    project.document = SchemaDocument::empty();
    repo.save(&project).unwrap();

    assert_eq!(repo.load("shop").unwrap().document, SchemaDocument::empty());
}

#[test]
fn list_returns_sorted_slugs() {
    let (_dir, mut repo) = setup();
    for name in ["Zoo Keeper", "alpha", "Mid Point"] {
        repo.save(&Project::blank(name)).unwrap();
    }
    assert_eq!(repo.list().unwrap(), vec!["alpha", "mid_point", "zoo_keeper"]);
}

#[test]
fn list_on_missing_directory_is_empty() {
    let (_dir, repo) = setup();
    assert!(repo.list().unwrap().is_empty());
}

#[test]
fn load_missing_project_returns_not_found() {
    let (_dir, repo) = setup();
    let err = repo.load("missing").unwrap_err();
    assert!(matches!(err, RepoError::NotFound(slug) if slug == "missing"));
}

#[test]
fn load_malformed_file_returns_format_error() {
    let (_dir, repo) = setup();
    fs::create_dir_all(repo.root()).unwrap();
    fs::write(repo.root().join("broken.json"), "{ \"entities\": [").unwrap();

    let err = repo.load("broken").unwrap_err();
    assert!(matches!(err, RepoError::Format { ref slug, .. } if slug == "broken"));
}

#[test]
fn rename_moves_file_to_new_slug() {
    let (_dir, mut repo) = setup();
    let mut project = Project::new("Old Name", shop_document());
    repo.save(&project).unwrap();
    assert_eq!(repo.list().unwrap(), vec!["old_name"]);

    repo.rename(&mut project, "New Name").unwrap();

    assert_eq!(project.name, "New Name");
    assert!(!repo.path_for("Old Name").unwrap().exists());
    assert_eq!(repo.load("New Name").unwrap().document, shop_document());
    assert_eq!(repo.list().unwrap(), vec!["new_name"]);
}

#[test]
fn rename_of_unsaved_project_only_changes_name() {
    let (_dir, mut repo) = setup();
    let mut project = Project::blank("draft");

    repo.rename(&mut project, "final").unwrap();

    assert_eq!(project.name, "final");
    assert!(repo.list().unwrap().is_empty());
}

#[test]
fn rename_to_empty_or_same_name_is_no_change() {
    let (_dir, mut repo) = setup();
    let mut project = Project::blank("keep");

    assert!(matches!(repo.rename(&mut project, ""), Err(RepoError::NoChange)));
    assert!(matches!(repo.rename(&mut project, "   "), Err(RepoError::NoChange)));
    assert!(matches!(repo.rename(&mut project, "keep"), Err(RepoError::NoChange)));
    assert_eq!(project.name, "keep");
}

#[test]
fn rename_onto_existing_project_is_rejected_and_keeps_both_files() {
    let (_dir, mut repo) = setup();
    let mut first = Project::new("first", shop_document());
    let second = Project::blank("second");
    repo.save(&first).unwrap();
    repo.save(&second).unwrap();

    let err = repo.rename(&mut first, "Second").unwrap_err();

    assert!(matches!(err, RepoError::AlreadyExists(slug) if slug == "second"));
    assert_eq!(first.name, "first");
    assert_eq!(repo.load("first").unwrap().document, shop_document());
    assert_eq!(repo.load("second").unwrap().document, SchemaDocument::empty());
}

#[test]
fn delete_removes_file_and_reports_missing() {
    let (_dir, mut repo) = setup();
    repo.save(&Project::blank("gone")).unwrap();

    repo.delete("gone").unwrap();

    assert!(!repo.exists("gone").unwrap());
    assert!(matches!(repo.delete("gone"), Err(RepoError::NotFound(_))));
}
