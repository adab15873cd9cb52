use crate::config::{ModuleDescriptor, TargetConfig, TargetStyle, WorkspaceConfig};
use crate::coordinator::{Coordinator, Operation};
use crate::error::Error;
use crate::manifest::{Manifest, ManifestFormat};
use crate::version::Level;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_package(root: &Path, name: &str, version: &str, deps: &[(&str, &str)]) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();

    let mut content = format!(
        "{{\n  \"name\": \"{}\",\n  \"version\": \"{}\"",
        name, version
    );
    if !deps.is_empty() {
        let entries: Vec<String> = deps
            .iter()
            .map(|(n, c)| format!("    \"{}\": \"{}\"", n, c))
            .collect();
        content.push_str(&format!(
            ",\n  \"dependencies\": {{\n{}\n  }}",
            entries.join(",\n")
        ));
    }
    content.push_str("\n}\n");
    fs::write(dir.join("package.json"), content).unwrap();
}

fn read_package(root: &Path, name: &str) -> Manifest {
    let path = root.join(name).join("package.json");
    let content = fs::read_to_string(&path).unwrap();
    Manifest::parse(&content, &path, ManifestFormat::Json, None).unwrap()
}

fn dependency(manifest: &Manifest, name: &str) -> String {
    manifest
        .dependencies
        .iter()
        .find(|d| d.name == name)
        .and_then(|d| d.constraint.clone())
        .unwrap()
}

fn coordinator(root: &Path, modules: &[&str]) -> Coordinator {
    let descriptors = modules
        .iter()
        .map(|name| ModuleDescriptor {
            name: name.to_string(),
            folder: PathBuf::from(name),
            repository: Some(format!("https://example.com/{}.git", name)),
            branch: None,
        })
        .collect();
    Coordinator::new(root, WorkspaceConfig::new(descriptors))
}

#[test]
fn test_increment_patch_propagates() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.0.0", &[]);
    write_package(root, "b", "1.0.0", &[("a", "1.0.0")]);

    let report = coordinator(root, &["a", "b"])
        .increment_all(Level::Patch, false)
        .unwrap();

    let a = read_package(root, "a");
    let b = read_package(root, "b");
    assert_eq!(a.version.to_string(), "1.0.1");
    assert_eq!(b.version.to_string(), "1.0.1");
    assert_eq!(dependency(&b, "a"), "1.0.1");
    assert_eq!(report.changes.len(), 2);
    assert_eq!(report.written.len(), 2);
}

#[test]
fn test_increment_major_propagates() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.2.3", &[]);
    write_package(root, "b", "0.9.0", &[("a", "1.2.3")]);

    coordinator(root, &["a", "b"])
        .run(&Operation::IncrementAll(Level::Major))
        .unwrap();

    let a = read_package(root, "a");
    let b = read_package(root, "b");
    assert_eq!(a.version.to_string(), "2.0.0");
    assert_eq!(b.version.to_string(), "1.0.0");
    assert_eq!(dependency(&b, "a"), "2.0.0");
}

#[test]
fn test_increment_propagates_to_modules_processed_earlier() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "app", "0.1.0", &[("core", "1.0.0"), ("util", "1.0.0")]);
    write_package(root, "core", "1.0.0", &[("util", "1.0.0")]);
    write_package(root, "util", "1.0.0", &[]);

    coordinator(root, &["app", "core", "util"])
        .increment_all(Level::Minor, false)
        .unwrap();

    let app = read_package(root, "app");
    let core = read_package(root, "core");
    assert_eq!(app.version.to_string(), "0.2.0");
    assert_eq!(dependency(&app, "core"), "1.1.0");
    assert_eq!(dependency(&app, "util"), "1.1.0");
    assert_eq!(dependency(&core, "util"), "1.1.0");
}

#[test]
fn test_increment_leaves_external_dependencies_alone() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.0.0", &[("lodash", "^4.17.21")]);

    coordinator(root, &["a"])
        .increment_all(Level::Patch, false)
        .unwrap();

    assert_eq!(dependency(&read_package(root, "a"), "lodash"), "^4.17.21");
}

#[test]
fn test_increment_tolerates_cycles() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.0.0", &[("b", "1.0.0")]);
    write_package(root, "b", "1.0.0", &[("a", "1.0.0")]);

    coordinator(root, &["a", "b"])
        .increment_all(Level::Patch, false)
        .unwrap();

    assert_eq!(dependency(&read_package(root, "a"), "b"), "1.0.1");
    assert_eq!(dependency(&read_package(root, "b"), "a"), "1.0.1");
}

#[test]
fn test_failure_isolation() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.0.0", &[]);
    write_package(root, "b", "1.0.0", &[("a", "1.0.0")]);
    fs::create_dir_all(root.join("c")).unwrap();
    let broken = "{ \"name\": \"c\", \"version\": ";
    fs::write(root.join("c/package.json"), broken).unwrap();
    write_package(root, "d", "1.0.0", &[("a", "1.0.0")]);
    let d_before = fs::read_to_string(root.join("d/package.json")).unwrap();

    let err = coordinator(root, &["a", "b", "c", "d"])
        .increment_all(Level::Patch, false)
        .unwrap_err();

    assert!(matches!(err, Error::Config { .. }));
    assert_eq!(err.module(), Some("c"));

    assert_eq!(read_package(root, "a").version.to_string(), "1.0.1");
    let b = read_package(root, "b");
    assert_eq!(b.version.to_string(), "1.0.1");
    assert_eq!(dependency(&b, "a"), "1.0.1");

    assert_eq!(fs::read_to_string(root.join("c/package.json")).unwrap(), broken);
    assert_eq!(fs::read_to_string(root.join("d/package.json")).unwrap(), d_before);
}

#[test]
fn test_dry_run_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.0.0", &[]);
    let before = fs::read_to_string(root.join("a/package.json")).unwrap();

    let report = coordinator(root, &["a"])
        .increment_all(Level::Major, true)
        .unwrap();

    assert!(report.dry_run);
    assert!(report.written.is_empty());
    assert_eq!(report.changes[0].new_version.to_string(), "2.0.0");
    assert_eq!(fs::read_to_string(root.join("a/package.json")).unwrap(), before);
}

#[test]
fn test_invalid_level_rejected_before_any_write() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.0.0", &[]);
    let before = fs::read_to_string(root.join("a/package.json")).unwrap();

    let err = Operation::increment("huge").unwrap_err();

    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(fs::read_to_string(root.join("a/package.json")).unwrap(), before);
    assert_eq!(
        Operation::increment("minor").unwrap(),
        Operation::IncrementAll(Level::Minor)
    );
}

#[test]
fn test_missing_modules_are_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.0.0", &[]);

    let report = coordinator(root, &["a", "not-cloned"])
        .increment_all(Level::Patch, false)
        .unwrap();

    assert_eq!(report.skipped, vec!["not-cloned".to_string()]);
    assert_eq!(report.changes.len(), 1);
}

#[test]
fn test_tag_is_idempotent_and_keeps_versions() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.2.0", &[]);
    write_package(root, "b", "3.0.0", &[("a", "1.1.0"), ("lodash", "^4.0.0")]);

    let mut config = coordinator(root, &["a", "b"]).config().clone();
    config.target = TargetConfig {
        style: TargetStyle::Git,
        field: Some("releaseTag".to_string()),
    };
    let coordinator = Coordinator::new(root, config);

    let first = coordinator.tag(Some("v7")).unwrap();
    let a_first = fs::read_to_string(root.join("a/package.json")).unwrap();
    let b_first = fs::read_to_string(root.join("b/package.json")).unwrap();

    coordinator.tag(Some("v7")).unwrap();
    let a_second = fs::read_to_string(root.join("a/package.json")).unwrap();
    let b_second = fs::read_to_string(root.join("b/package.json")).unwrap();

    assert_eq!(a_first, a_second);
    assert_eq!(b_first, b_second);

    let b = read_package(root, "b");
    assert_eq!(b.version.to_string(), "3.0.0");
    assert_eq!(dependency(&b, "a"), "https://example.com/a.git#v7");
    assert_eq!(dependency(&b, "lodash"), "^4.0.0");
    assert_eq!(b.field("releaseTag"), Some("v7"));
    assert_eq!(read_package(root, "a").version.to_string(), "1.2.0");

    assert_eq!(first.label.as_deref(), Some("v7"));
    assert!(first
        .written
        .iter()
        .all(|w| w.label.as_deref() == Some("v7")));
}

#[test]
fn test_tag_without_label_uses_module_versions() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.2.0", &[]);
    write_package(root, "b", "3.0.0", &[("a", "1.1.0")]);

    let report = coordinator(root, &["a", "b"]).tag(None).unwrap();

    let labels: Vec<Option<&str>> = report.written.iter().map(|w| w.label.as_deref()).collect();
    assert_eq!(labels, vec![Some("1.2.0"), Some("3.0.0")]);
    assert_eq!(dependency(&read_package(root, "b"), "a"), "1.2.0");
}

#[test]
fn test_bump_reconciles_manual_edits() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.5.0", &[]);
    write_package(root, "b", "2.0.0", &[("a", "1.0.0")]);
    let coordinator = coordinator(root, &["a", "b"]);

    let before = coordinator.check().unwrap();
    assert!(before.has_issues());
    assert_eq!(before.inconsistencies[0].module, "b");
    assert_eq!(before.inconsistencies[0].found, "1.0.0");

    let report = coordinator.bump().unwrap();
    assert!(report.changes.is_empty());
    assert_eq!(report.written.len(), 2);
    assert!(report.written.iter().all(|w| w.label.is_none()));

    let b = read_package(root, "b");
    assert_eq!(b.version.to_string(), "2.0.0");
    assert_eq!(dependency(&b, "a"), "1.5.0");
    assert!(!coordinator.check().unwrap().has_issues());
}

#[test]
fn test_check_after_increment_is_consistent() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "0.1.0", &[]);
    write_package(root, "b", "0.1.0", &[("a", "^0.1.0")]);
    let coordinator = coordinator(root, &["a", "b"]);

    assert!(coordinator.check().unwrap().has_issues());
    coordinator.increment_all(Level::Patch, false).unwrap();
    assert!(!coordinator.check().unwrap().has_issues());
}

#[test]
fn test_preview_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.5.0", &[]);
    write_package(root, "b", "2.0.0", &[("a", "1.0.0")]);
    let before = fs::read_to_string(root.join("b/package.json")).unwrap();

    let rendered = coordinator(root, &["a", "b"]).preview(Some("v1")).unwrap();

    assert_eq!(rendered.len(), 2);
    assert!(rendered[1].contents.contains("\"a\": \"1.5.0\""));
    assert_eq!(fs::read_to_string(root.join("b/package.json")).unwrap(), before);
}

fn write_crate(root: &Path, name: &str, version: &str, deps: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    let content = format!(
        "[package]\nname = \"{}\"\nversion = \"{}\"\nedition = \"2021\"\n\n[dependencies]\n{}",
        name, version, deps
    );
    fs::write(dir.join("Cargo.toml"), content).unwrap();
}

fn read_crate(root: &Path, name: &str) -> Manifest {
    let path = root.join(name).join("Cargo.toml");
    let content = fs::read_to_string(&path).unwrap();
    Manifest::parse(&content, &path, ManifestFormat::Toml, None).unwrap()
}

fn toml_coordinator(root: &Path, modules: &[&str], style: TargetStyle) -> Coordinator {
    let mut config = coordinator(root, modules).config().clone();
    config.manifest = "Cargo.toml".to_string();
    config.target.style = style;
    Coordinator::new(root, config)
}

#[test]
fn test_increment_toml_workspace() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_crate(root, "core", "0.4.2", "");
    let core_dep = "core = { version = \"0.4.2\", path = \"../core\" }\n";
    write_crate(root, "cli", "0.4.2", core_dep);

    toml_coordinator(root, &["core", "cli"], TargetStyle::Version)
        .increment_all(Level::Minor, false)
        .unwrap();

    let cli = read_crate(root, "cli");
    assert_eq!(cli.version.to_string(), "0.5.0");
    assert_eq!(dependency(&cli, "core"), "0.5.0");
    assert!(fs::read_to_string(root.join("cli/Cargo.toml"))
        .unwrap()
        .contains("path = \"../core\""));
}

#[test]
fn test_toml_retag_moves_git_references() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_crate(root, "a", "1.0.0", "");
    write_crate(root, "b", "1.0.0", "a = \"1.0.0\"\n");
    let coordinator = toml_coordinator(root, &["a", "b"], TargetStyle::Git);

    coordinator.tag(Some("v1")).unwrap();
    assert_eq!(dependency(&read_crate(root, "b"), "a"), "https://example.com/a.git#v1");

    coordinator.tag(Some("v2")).unwrap();
    let b = read_crate(root, "b");
    assert_eq!(dependency(&b, "a"), "https://example.com/a.git#v2");
    assert!(!fs::read_to_string(root.join("b/Cargo.toml"))
        .unwrap()
        .contains("\"v1\""));

    // Pinning again turns the reference back into a version.
    coordinator.bump().unwrap();
    assert_eq!(dependency(&read_crate(root, "b"), "a"), "1.0.0");
}

#[test]
fn test_invalid_label_rejected_before_any_write() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.0.0", &[]);
    write_package(root, "b", "1.0.0", &[("a", "1.0.0")]);
    let mut config = coordinator(root, &["a", "b"]).config().clone();
    config.target = TargetConfig {
        style: TargetStyle::Git,
        field: Some("releaseTag".to_string()),
    };
    let coordinator = Coordinator::new(root, config);
    let before = fs::read_to_string(root.join("b/package.json")).unwrap();

    for label in ["", "  ", "bad label..~", "v1#x", "-v1", "v1.lock", "feature/"] {
        let err = coordinator.tag(Some(label)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "label {:?}", label);
        assert!(coordinator.preview(Some(label)).is_err());
    }

    assert_eq!(fs::read_to_string(root.join("b/package.json")).unwrap(), before);
    assert!(coordinator.tag(Some("release/1.2")).is_ok());
}

#[test]
fn test_overflowing_increment_fails_before_writing() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_package(root, "a", "1.0.0", &[]);
    write_package(root, "b", "18446744073709551615.0.0", &[("a", "1.0.0")]);
    let before = fs::read_to_string(root.join("b/package.json")).unwrap();

    let err = coordinator(root, &["a", "b"])
        .increment_all(Level::Major, false)
        .unwrap_err();

    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(read_package(root, "a").version.to_string(), "2.0.0");
    assert_eq!(fs::read_to_string(root.join("b/package.json")).unwrap(), before);
}
