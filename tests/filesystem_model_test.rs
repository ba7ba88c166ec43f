//! Tests for viewing directories and documents through the service container

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use treeview::application::{ApplicationError, TreeDescription};
use treeview::config::Settings;
use treeview::domain::{DomainError, DomainNode, ExpansionSet};
use treeview::infrastructure::di::ServiceContainer;
use treeview::infrastructure::model::filesystem::{DIRECTORY_KIND, FILE_KIND};
use treeview::infrastructure::traits::DomainModel;
use treeview::infrastructure::InfraError;

/// Helper to create a file with parent directories
fn create_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sample_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    create_file(temp.path(), "README.md", "# demo");
    create_file(temp.path(), "src/main.rs", "fn main() {}");
    create_file(temp.path(), "src/model/mod.rs", "");
    fs::create_dir_all(temp.path().join("empty")).unwrap();
    temp
}

// ============================================================
// Directories
// ============================================================

#[test]
fn given_directory_when_materialized_then_entries_sorted_by_name() {
    // Arrange
    let temp = sample_dir();
    let container = ServiceContainer::new(Settings::default());
    let loaded = container.load_source(temp.path()).unwrap();
    let service = &container.tree_service;
    let representation = service.representation_id(
        &loaded.description_id,
        &loaded.editing_context_id,
        ExpansionSet::new(),
    );

    // Act
    let tree = service
        .materialize(&loaded.editing_context_id, &representation)
        .unwrap();

    // Assert
    let roots: Vec<_> = tree.children.iter().map(|i| i.object_id.as_str()).collect();
    assert_eq!(roots, vec!["README.md", "empty", "src"]);
    let src = &tree.children[2];
    assert_eq!(src.kind, DIRECTORY_KIND);
    assert!(src.has_children);
    assert!(!tree.children[1].has_children, "empty directory has no children");
    assert!(!src.editable && !src.deletable);
    assert_eq!(tree.children[0].icon_urls, vec!["/icons/File.svg"]);
}

#[test]
fn given_nested_file_when_expand_all_path_then_reveals_directories() {
    // Arrange
    let temp = sample_dir();
    let container = ServiceContainer::new(Settings::default());
    let loaded = container.load_source(temp.path()).unwrap();
    let ctx = loaded.editing_context_id.as_str();
    let service = &container.tree_service;
    let representation = service.representation_id(&loaded.description_id, ctx, ExpansionSet::new());
    let file = container
        .fs_model
        .tree_item_id(ctx, &DomainNode::new("src/model/mod.rs", FILE_KIND))
        .unwrap();

    // Act
    let path = service.expand_all_path(ctx, &representation, &file).unwrap();
    let revealed = service.representation_id(
        &loaded.description_id,
        ctx,
        path.iter().cloned().collect(),
    );
    let tree = service.materialize(ctx, &revealed).unwrap();

    // Assert
    assert_eq!(path.len(), 2);
    let item = tree.find(&file).expect("file revealed");
    assert_eq!(item.label.to_string(), "mod.rs");
}

#[test]
fn given_id_from_earlier_run_when_expand_all_path_then_resolves_without_render() {
    // Arrange
    let temp = sample_dir();
    let earlier = ServiceContainer::new(Settings::default());
    let loaded = earlier.load_source(temp.path()).unwrap();
    let ctx = loaded.editing_context_id.as_str();
    let file = earlier
        .fs_model
        .tree_item_id(ctx, &DomainNode::new("src/model/mod.rs", FILE_KIND))
        .unwrap();
    let src = earlier
        .fs_model
        .tree_item_id(ctx, &DomainNode::new("src", DIRECTORY_KIND))
        .unwrap();
    let model = earlier
        .fs_model
        .tree_item_id(ctx, &DomainNode::new("src/model", DIRECTORY_KIND))
        .unwrap();

    let fresh = ServiceContainer::new(Settings::default());
    let reloaded = fresh.load_source(temp.path()).unwrap();
    let service = &fresh.tree_service;
    let representation = service.representation_id(
        &reloaded.description_id,
        &reloaded.editing_context_id,
        ExpansionSet::new(),
    );

    // Act
    let path = service
        .expand_all_path(&reloaded.editing_context_id, &representation, &file)
        .unwrap();

    // Assert
    assert_eq!(path, vec![src, model]);
}

#[test]
fn given_deleted_file_when_expand_all_path_then_empty_result() {
    let temp = sample_dir();
    let container = ServiceContainer::new(Settings::default());
    let loaded = container.load_source(temp.path()).unwrap();
    let ctx = loaded.editing_context_id.as_str();
    let service = &container.tree_service;
    let representation = service.representation_id(&loaded.description_id, ctx, ExpansionSet::new());
    let file = container
        .fs_model
        .tree_item_id(ctx, &DomainNode::new("src/main.rs", FILE_KIND))
        .unwrap();
    fs::remove_file(temp.path().join("src/main.rs")).unwrap();

    let path = service.expand_all_path(ctx, &representation, &file).unwrap();

    assert!(path.is_empty());
}

#[test]
fn given_directory_when_expand_subtree_then_includes_nested_directories() {
    let temp = sample_dir();
    let container = ServiceContainer::new(Settings::default());
    let loaded = container.load_source(temp.path()).unwrap();
    let ctx = loaded.editing_context_id.as_str();
    let service = &container.tree_service;
    let representation = service.representation_id(&loaded.description_id, ctx, ExpansionSet::new());
    let src = container
        .fs_model
        .tree_item_id(ctx, &DomainNode::new("src", DIRECTORY_KIND))
        .unwrap();
    let model = container
        .fs_model
        .tree_item_id(ctx, &DomainNode::new("src/model", DIRECTORY_KIND))
        .unwrap();

    let ids = service.expand_subtree(ctx, &representation, &src).unwrap();

    assert_eq!(ids, vec![src, model]);
}

#[test]
fn given_directory_only_description_when_described_on_file_then_unsupported_target() {
    // Arrange
    let temp = sample_dir();
    let container = ServiceContainer::new(Settings::default());
    let loaded = container.load_source(temp.path()).unwrap();
    let ctx = loaded.editing_context_id.as_str();
    let description_id = container.registry.register(
        TreeDescription::builder("Folders", container.fs_model.clone())
            .domain_type(DIRECTORY_KIND)
            .build(),
    );
    let service = &container.tree_service;
    let representation = service.representation_id(&description_id, ctx, ExpansionSet::new());

    // Act
    let on_directory = service.get_description(ctx, &representation, Some("src"));
    let on_file = service.get_description(ctx, &representation, Some("README.md"));
    let on_missing = service.get_description(ctx, &representation, Some("nope"));

    // Assert
    assert_eq!(on_directory.unwrap().tree_description_id, description_id);
    assert!(matches!(
        on_file,
        Err(ApplicationError::Domain(DomainError::UnsupportedTarget { .. }))
    ));
    assert!(matches!(
        on_missing,
        Err(ApplicationError::Domain(DomainError::UnknownObject(_)))
    ));
}

#[test]
fn given_path_escaping_root_when_materialized_then_error() {
    let temp = sample_dir();
    let container = ServiceContainer::new(Settings::default());
    let loaded = container.load_source(temp.path()).unwrap();
    let ctx = loaded.editing_context_id.as_str();
    let representation =
        container
            .tree_service
            .representation_id(&loaded.description_id, "../etc", ExpansionSet::new());

    let result = container.tree_service.materialize(ctx, &representation);

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::UnresolvableIdentity(_)))
    ));
}

// ============================================================
// Documents
// ============================================================

#[test]
fn given_toml_document_when_loaded_then_explorer_description_used() {
    // Arrange
    let temp = TempDir::new().unwrap();
    create_file(
        temp.path(),
        "model.toml",
        r#"
editing_context = "library"

[[objects]]
name = "Project"
kind = "Project"
"#,
    );
    let container = ServiceContainer::new(Settings::default());

    // Act
    let loaded = container.load_source(&temp.path().join("model.toml")).unwrap();

    // Assert
    assert_eq!(loaded.editing_context_id, "library");
    let description = container.registry.get(&loaded.description_id).unwrap();
    assert_eq!(description.name(), "Explorer");
    let info = container
        .tree_service
        .get_description(
            "library",
            &container.tree_service.representation_id(&loaded.description_id, "library", ExpansionSet::new()),
            None,
        )
        .unwrap();
    assert_eq!(info.tree_description_id, loaded.description_id);
}

#[test]
fn given_invalid_document_when_loaded_then_document_error() {
    let temp = TempDir::new().unwrap();
    create_file(temp.path(), "bad.toml", "editing_context = \"x\"\nunknown_field = 1\n");
    let container = ServiceContainer::new(Settings::default());

    let result = container.load_source(&temp.path().join("bad.toml"));

    assert!(matches!(result, Err(InfraError::Document { .. })));
}

#[test]
fn given_missing_source_when_loaded_then_not_found() {
    let temp = TempDir::new().unwrap();
    let container = ServiceContainer::new(Settings::default());

    let result = container.load_source(&temp.path().join("missing.toml"));

    match result {
        Err(InfraError::Io { source, .. }) => {
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
        }
        other => panic!("expected not found, got {other:?}"),
    }
}
