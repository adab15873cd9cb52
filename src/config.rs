//! Workspace configuration: the ordered list of modules and how to treat them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Phase, Result};
use crate::manifest::ManifestFormat;

/// Name of the configuration file at the workspace root.
pub const CONFIG_FILE: &str = ".modules.config";

/// A module declared in the workspace configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    /// Folder relative to the workspace root.
    pub folder: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// How `tag` renders dependencies on other workspace modules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStyle {
    /// Pin the exact version of the dependency.
    #[default]
    Version,
    /// Reference the dependency's repository at the tag label.
    Git,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub style: TargetStyle,
    /// Top-level manifest field that receives the tag label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// External commands run inside every module folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_build_command")]
    pub build: Vec<String>,
    #[serde(default = "default_publish_command")]
    pub publish: Vec<String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            build: default_build_command(),
            publish: default_publish_command(),
        }
    }
}

fn default_build_command() -> Vec<String> {
    vec!["npm".into(), "run".into(), "build".into()]
}

fn default_publish_command() -> Vec<String> {
    vec!["npm".into(), "publish".into()]
}

fn default_manifest() -> String {
    "package.json".to_string()
}

/// Typed contents of `.modules.config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Manifest filename joined onto every module folder.
    #[serde(default = "default_manifest")]
    pub manifest: String,
    pub modules: Vec<ModuleDescriptor>,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
}

impl WorkspaceConfig {
    /// Create a configuration for the given modules with default settings.
    pub fn new(modules: Vec<ModuleDescriptor>) -> Self {
        Self {
            manifest: default_manifest(),
            modules,
            target: TargetConfig::default(),
            commands: CommandsConfig::default(),
        }
    }

    /// Load and validate `<root>/.modules.config`.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let path = root.as_ref().join(CONFIG_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config(None, &path, "workspace configuration not found")
            } else {
                Error::io(None, &path, Phase::Load, e)
            }
        })?;
        Self::parse(&content, &path)
    }

    /// Parse configuration text; `path` is only used for error context.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| Error::config(None, path, format!("invalid configuration: {e}")))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.modules.is_empty() {
            return Err(Error::config(None, path, "no modules configured"));
        }
        if self.manifest.trim().is_empty() {
            return Err(Error::config(None, path, "manifest filename is empty"));
        }

        let mut seen = HashSet::new();
        for module in &self.modules {
            if module.name.trim().is_empty() {
                return Err(Error::config(None, path, "module with empty name"));
            }
            if module.folder.as_os_str().is_empty() || module.folder.is_absolute() {
                return Err(Error::config(
                    Some(&module.name),
                    path,
                    format!(
                        "folder '{}' must be a non-empty relative path",
                        module.folder.display()
                    ),
                ));
            }
            if !seen.insert(module.name.as_str()) {
                return Err(Error::config(
                    Some(&module.name),
                    path,
                    "module declared more than once",
                ));
            }
        }

        if self.commands.build.is_empty() || self.commands.publish.is_empty() {
            return Err(Error::config(None, path, "external commands must not be empty"));
        }

        Ok(())
    }

    /// Write the configuration to `<root>/.modules.config`.
    pub fn save(&self, root: impl AsRef<Path>) -> Result<PathBuf> {
        let path = root.as_ref().join(CONFIG_FILE);
        let mut content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::config(None, &path, e.to_string()))?;
        content.push('\n');
        crate::store::persist(None, &path, &content)?;
        Ok(path)
    }

    pub fn manifest_format(&self) -> ManifestFormat {
        ManifestFormat::from_filename(&self.manifest)
    }

    /// Absolute folder of a module.
    pub fn module_folder(&self, root: &Path, module: &ModuleDescriptor) -> PathBuf {
        root.join(&module.folder)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
