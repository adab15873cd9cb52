//! Rewriting dependency constraints after a module's version changes.

use semver::Version;

use crate::manifest::Constraint;
use crate::workspace::WorkspaceTable;

/// Pin every other module's dependency on `changed` to exactly `new_version`.
///
/// Returns the names of the modules whose stored constraint actually changed.
/// Dependency cycles are harmless: only scalar entries are overwritten.
pub fn propagate(table: &mut WorkspaceTable, changed: &str, new_version: &Version) -> Vec<String> {
    let constraint = Constraint::Version(new_version.clone());
    let mut touched = Vec::new();

    for entry in table.entries_mut() {
        if entry.manifest.name == changed || !entry.manifest.depends_on(changed) {
            continue;
        }
        if entry.manifest.set_dependency(changed, &constraint) {
            tracing::debug!(
                module = %entry.manifest.name,
                dependency = changed,
                version = %new_version,
                "pinned dependency"
            );
            touched.push(entry.manifest.name.clone());
        }
    }

    touched
}

/// Pin the workspace dependencies of module `name` to the versions currently
/// in the table. Returns `true` if any constraint changed.
pub fn reconcile(table: &mut WorkspaceTable, name: &str) -> bool {
    let Some(entry) = table.get(name) else {
        return false;
    };

    let pins: Vec<(String, Version)> = entry
        .manifest
        .dependencies
        .iter()
        .filter(|d| d.name != name)
        .filter_map(|d| {
            table
                .version_of(&d.name)
                .map(|v| (d.name.clone(), v.clone()))
        })
        .collect();

    let mut changed = false;
    if let Some(entry) = table.get_mut(name) {
        for (dep_name, version) in pins {
            changed |= entry
                .manifest
                .set_dependency(&dep_name, &Constraint::Version(version));
        }
    }
    changed
}
