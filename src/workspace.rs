//! The workspace table and module discovery.

use semver::Version;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{ModuleDescriptor, WorkspaceConfig};
use crate::error::{Error, Phase, Result};
use crate::manifest::Manifest;
use crate::store::ManifestStore;

/// One loaded module: where it lives and its current manifest.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub descriptor: ModuleDescriptor,
    pub folder: PathBuf,
    pub manifest: Manifest,
}

impl TableEntry {
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn version(&self) -> &Version {
        &self.manifest.version
    }
}

/// In-memory map from module name to manifest, in configuration order.
///
/// This is the single source of truth for one operation; manifests are never
/// re-read from disk once they are in the table.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceTable {
    entries: Vec<TableEntry>,
    index: HashMap<String, usize>,
    skipped: Vec<String>,
}

impl WorkspaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every configured module that has a manifest on disk.
    ///
    /// Modules without a manifest file are skipped; a manifest that exists but
    /// cannot be parsed fails the build.
    pub fn build(root: &Path, config: &WorkspaceConfig, store: &ManifestStore) -> Result<Self> {
        let mut table = Self::new();

        for descriptor in &config.modules {
            let folder = config.module_folder(root, descriptor);
            match store.load(&descriptor.name, &folder)? {
                Some(manifest) => {
                    table.insert(descriptor.clone(), folder, manifest)?;
                }
                None => table.skip(descriptor, &store.manifest_path(&folder)),
            }
        }

        Ok(table)
    }

    pub(crate) fn skip(&mut self, descriptor: &ModuleDescriptor, manifest_path: &Path) {
        tracing::info!(
            module = %descriptor.name,
            path = %manifest_path.display(),
            "no manifest, skipping module"
        );
        self.skipped.push(descriptor.name.clone());
    }

    /// Add a loaded module. Manifest names must be unique within the table.
    pub fn insert(
        &mut self,
        descriptor: ModuleDescriptor,
        folder: PathBuf,
        manifest: Manifest,
    ) -> Result<&mut TableEntry> {
        if let Some(&existing) = self.index.get(&manifest.name) {
            return Err(Error::config(
                Some(&descriptor.name),
                &manifest.path,
                format!(
                    "manifest name '{}' is already used by module '{}'",
                    manifest.name, self.entries[existing].descriptor.name
                ),
            ));
        }

        let position = self.entries.len();
        self.index.insert(manifest.name.clone(), position);
        self.entries.push(TableEntry {
            descriptor,
            folder,
            manifest,
        });
        Ok(&mut self.entries[position])
    }

    pub fn get(&self, name: &str) -> Option<&TableEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TableEntry> {
        self.index.get(name).map(|&i| &mut self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn version_of(&self, name: &str) -> Option<&Version> {
        self.get(name).map(TableEntry::version)
    }

    /// Entries in configuration order.
    pub fn entries(&self) -> impl Iterator<Item = &TableEntry> {
        self.entries.iter()
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut TableEntry> {
        self.entries.iter_mut()
    }

    /// Configured modules that had no manifest.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find module folders under `root` that contain `manifest_filename`.
///
/// Looks one and two levels deep, skipping build and VCS directories, and does
/// not report folders nested inside an already discovered module.
pub fn discover_modules(root: &Path, manifest_filename: &str) -> Result<Vec<ModuleDescriptor>> {
    let store = ManifestStore::new(manifest_filename);
    let mut modules: Vec<ModuleDescriptor> = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(2)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !matches!(name.as_ref(), "target" | ".git" | "node_modules" | ".cargo")
        })
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::io(None, path, Phase::Load, e.into())
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let folder = match entry.path().strip_prefix(root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => continue,
        };
        if modules.iter().any(|m| folder.starts_with(&m.folder)) {
            continue;
        }

        let fallback = folder.to_string_lossy().to_string();
        match store.load(&fallback, entry.path()) {
            Ok(Some(manifest)) => modules.push(ModuleDescriptor {
                name: manifest.name,
                folder,
                repository: None,
                branch: None,
            }),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("ignoring {}: {}", entry.path().display(), e);
            }
        }
    }

    Ok(modules)
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
