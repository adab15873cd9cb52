use crate::config::{TargetStyle, WorkspaceConfig, CONFIG_FILE};
use crate::error::Error;
use crate::manifest::ManifestFormat;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn parse(content: &str) -> Result<WorkspaceConfig, Error> {
    WorkspaceConfig::parse(content, Path::new(CONFIG_FILE))
}

#[test]
fn test_parse_minimal_config_uses_defaults() {
    let config = parse(
        r#"{
  "modules": [
    { "name": "util", "folder": "util" },
    { "name": "app", "folder": "apps/app" }
  ]
}"#,
    )
    .unwrap();

    assert_eq!(config.manifest, "package.json");
    assert_eq!(config.manifest_format(), ManifestFormat::Json);
    assert_eq!(config.modules.len(), 2);
    assert_eq!(config.modules[1].folder, PathBuf::from("apps/app"));
    assert_eq!(config.target.style, TargetStyle::Version);
    assert!(config.target.field.is_none());
    assert_eq!(config.commands.publish, vec!["npm", "publish"]);
}

#[test]
fn test_parse_full_config() {
    let config = parse(
        r#"{
  "manifest": "Cargo.toml",
  "modules": [
    {
      "name": "core",
      "folder": "core",
      "repository": "https://example.com/core.git",
      "branch": "main"
    }
  ],
  "target": { "style": "git", "field": "releaseTag" },
  "commands": { "build": ["cargo", "build"], "publish": ["cargo", "publish"] }
}"#,
    )
    .unwrap();

    assert_eq!(config.manifest_format(), ManifestFormat::Toml);
    assert_eq!(config.target.style, TargetStyle::Git);
    assert_eq!(config.target.field.as_deref(), Some("releaseTag"));
    assert_eq!(
        config.modules[0].repository.as_deref(),
        Some("https://example.com/core.git")
    );
    assert_eq!(config.commands.build, vec!["cargo", "build"]);
}

#[test]
fn test_duplicate_module_names_rejected() {
    let err = parse(
        r#"{ "modules": [
    { "name": "a", "folder": "a" },
    { "name": "a", "folder": "b" }
  ] }"#,
    )
    .unwrap_err();

    assert!(matches!(err, Error::Config { .. }));
    assert_eq!(err.module(), Some("a"));
}

#[test]
fn test_invalid_configs_rejected() {
    let cases = [
        r#"{ "modules": [] }"#,
        r#"{ "modules": [ { "name": "", "folder": "a" } ] }"#,
        r#"{ "modules": [ { "name": "a", "folder": "" } ] }"#,
        r#"{ "modules": [ { "name": "a", "folder": "/abs/a" } ] }"#,
        r#"{ "modules": [ { "name": "a" } ] }"#,
        r#"{ "modules": [ { "name": "a", "folder": "a" } ], "target": { "style": "svn" } }"#,
        r#"{ "modules": [ { "name": "a", "folder": "a" } ], "commands": { "build": [] } }"#,
        "not json",
    ];

    for case in cases {
        let result = parse(case);
        assert!(
            matches!(result, Err(Error::Config { .. })),
            "expected config error for {}",
            case
        );
    }
}

#[test]
fn test_load_missing_config_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = WorkspaceConfig::load(temp_dir.path()).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

#[test]
fn test_save_and_load_roundtrip_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join(CONFIG_FILE),
        r#"{ "modules": [ { "name": "a", "folder": "a" } ] }"#,
    )
    .unwrap();

    let config = WorkspaceConfig::load(temp_dir.path()).unwrap();
    config.save(temp_dir.path()).unwrap();
    let reloaded = WorkspaceConfig::load(temp_dir.path()).unwrap();

    assert_eq!(config, reloaded);
}
