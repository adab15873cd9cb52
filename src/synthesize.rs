//! Producing the final manifest content of a module for a target label.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::{TargetConfig, TargetStyle};
use crate::manifest::{Constraint, Manifest};
use crate::workspace::{TableEntry, WorkspaceTable};

/// Decides how a target label shapes a synthesized manifest.
pub trait TargetStrategy: Send + Sync {
    /// Constraint written for a dependency on the workspace module `dependency`.
    fn dependency_constraint(&self, dependency: &TableEntry, label: Option<&str>) -> Constraint;

    /// Hook for target-specific fields on the synthesized manifest.
    fn annotate(&self, _manifest: &mut Manifest, _label: &str) {}
}

/// Dependencies are pinned to the exact current version.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinnedVersions;

impl TargetStrategy for PinnedVersions {
    fn dependency_constraint(&self, dependency: &TableEntry, _label: Option<&str>) -> Constraint {
        Constraint::Version(dependency.version().clone())
    }
}

/// Dependencies on modules with a repository point at `<repository>#<label>`.
///
/// Without a label each dependency is referenced at its own version.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitRefs;

impl TargetStrategy for GitRefs {
    fn dependency_constraint(&self, dependency: &TableEntry, label: Option<&str>) -> Constraint {
        match &dependency.descriptor.repository {
            Some(url) => Constraint::GitRef {
                url: url.clone(),
                reference: label
                    .map(String::from)
                    .unwrap_or_else(|| dependency.version().to_string()),
            },
            None => Constraint::Version(dependency.version().clone()),
        }
    }
}

/// Writes the label into a named top-level field, then defers to `inner`.
pub struct LabelField {
    field: String,
    inner: Box<dyn TargetStrategy>,
}

impl LabelField {
    pub fn new(field: impl Into<String>, inner: Box<dyn TargetStrategy>) -> Self {
        Self {
            field: field.into(),
            inner,
        }
    }
}

impl TargetStrategy for LabelField {
    fn dependency_constraint(&self, dependency: &TableEntry, label: Option<&str>) -> Constraint {
        self.inner.dependency_constraint(dependency, label)
    }

    fn annotate(&self, manifest: &mut Manifest, label: &str) {
        self.inner.annotate(manifest, label);
        manifest.set_field(&self.field, label);
    }
}

/// Manifest content ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedManifest {
    pub module: String,
    pub path: PathBuf,
    pub label: String,
    pub contents: String,
}

/// Renders module manifests against the workspace table.
pub struct PackageSynthesizer {
    strategy: Box<dyn TargetStrategy>,
}

impl PackageSynthesizer {
    pub fn new(strategy: Box<dyn TargetStrategy>) -> Self {
        Self { strategy }
    }

    /// Exact version pins, no annotations.
    pub fn pinned() -> Self {
        Self::new(Box::new(PinnedVersions))
    }

    /// Strategy described by the workspace `target` configuration.
    pub fn from_config(target: &TargetConfig) -> Self {
        let base: Box<dyn TargetStrategy> = match target.style {
            TargetStyle::Version => Box::new(PinnedVersions),
            TargetStyle::Git => Box::new(GitRefs),
        };
        match &target.field {
            Some(field) => Self::new(Box::new(LabelField::new(field.clone(), base))),
            None => Self::new(base),
        }
    }

    /// Produce the manifest of `entry` for `label`.
    ///
    /// Name and version are kept verbatim. Dependencies on workspace modules
    /// are re-resolved from `table`; anything else keeps its stored constraint.
    /// Without a label, the module's own version is used.
    pub fn synthesize(
        &self,
        entry: &TableEntry,
        table: &WorkspaceTable,
        label: Option<&str>,
    ) -> RenderedManifest {
        let mut manifest = entry.manifest.clone();
        let own_label = label
            .map(String::from)
            .unwrap_or_else(|| manifest.version.to_string());

        let mut seen = HashSet::new();
        let dep_names: Vec<String> = manifest
            .dependencies
            .iter()
            .filter(|d| seen.insert(d.name.clone()))
            .map(|d| d.name.clone())
            .collect();

        for dep_name in dep_names {
            if dep_name == manifest.name {
                continue;
            }
            if let Some(dependency) = table.get(&dep_name) {
                let constraint = self.strategy.dependency_constraint(dependency, label);
                manifest.set_dependency(&dep_name, &constraint);
            }
        }

        self.strategy.annotate(&mut manifest, &own_label);

        RenderedManifest {
            module: manifest.name.clone(),
            path: manifest.path.clone(),
            label: own_label,
            contents: manifest.render(),
        }
    }
}

#[cfg(test)]
#[path = "synthesize_tests.rs"]
mod tests;
