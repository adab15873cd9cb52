//! Workspace operations: increment-all, tag, bump and check.

use colored::Colorize;
use semver::Version;
use std::path::{Path, PathBuf};

use crate::config::WorkspaceConfig;
use crate::error::{Error, Result};
use crate::propagate::{propagate, reconcile};
use crate::store::{persist, ManifestStore};
use crate::synthesize::{PackageSynthesizer, RenderedManifest};
use crate::version::{increment, Level, VersionChange};
use crate::workspace::WorkspaceTable;

/// The closed set of operations the coordinator runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Increment every module's version and propagate the new versions.
    IncrementAll(Level),
    /// Synthesize a consistent snapshot of all manifests under a label.
    Tag(Option<String>),
    /// Rewrite every manifest from the current table without changing versions.
    Bump,
    /// Report dependency constraints that disagree with the table.
    Check,
}

impl Operation {
    /// Build an increment operation from a level token.
    pub fn increment(level: &str) -> Result<Self> {
        Ok(Self::IncrementAll(level.parse()?))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::IncrementAll(_) => "increment-version",
            Self::Tag(_) => "tag",
            Self::Bump => "bump",
            Self::Check => "check",
        }
    }
}

/// A manifest file written by an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenManifest {
    pub module: String,
    pub folder: PathBuf,
    pub path: PathBuf,
    /// Label the manifest was synthesized for, if any.
    pub label: Option<String>,
}

/// A workspace dependency whose constraint differs from the module's version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inconsistency {
    pub module: String,
    pub dependency: String,
    pub expected: Version,
    pub found: String,
}

/// Outcome of one operation.
#[derive(Debug, Clone, Default)]
pub struct OperationReport {
    pub operation: &'static str,
    pub label: Option<String>,
    pub dry_run: bool,
    pub changes: Vec<VersionChange>,
    pub written: Vec<WrittenManifest>,
    pub skipped: Vec<String>,
    pub inconsistencies: Vec<Inconsistency>,
}

impl OperationReport {
    fn new(operation: &Operation) -> Self {
        Self {
            operation: operation.name(),
            ..Self::default()
        }
    }

    fn record_write(&mut self, module: &str, folder: &Path, path: &Path, label: Option<&str>) {
        if self.written.iter().any(|w| w.path == path) {
            return;
        }
        self.written.push(WrittenManifest {
            module: module.to_string(),
            folder: folder.to_path_buf(),
            path: path.to_path_buf(),
            label: label.map(String::from),
        });
    }

    pub fn has_issues(&self) -> bool {
        !self.inconsistencies.is_empty()
    }

    pub fn print(&self) {
        println!(
            "\n{} {}",
            "Operation:".cyan().bold(),
            self.operation.bright_white()
        );
        if let Some(label) = &self.label {
            println!("{} {}", "Label:".cyan(), label);
        }
        if self.dry_run {
            println!("{}", "Dry run mode: no files were written".yellow());
        }

        for change in &self.changes {
            println!(
                "  {} {} → {}",
                change.module.bright_white(),
                change.old_version.to_string().dimmed(),
                change.new_version.to_string().green()
            );
        }

        for module in &self.skipped {
            println!("  {} {} (no manifest)", "skipped".dimmed(), module);
        }

        if !self.written.is_empty() {
            println!(
                "\n{} {} manifest(s) written",
                "✓".green().bold(),
                self.written.len()
            );
            for written in &self.written {
                println!("  {}", written.path.display().to_string().dimmed());
            }
        }

        if self.operation == "check" {
            if self.inconsistencies.is_empty() {
                println!("\n{} All versions are consistent", "✓".green().bold());
            } else {
                println!("\n{}", "Dependency Inconsistencies:".red().bold());
                for inc in &self.inconsistencies {
                    println!(
                        "  {} depends on {} {} (expected: {})",
                        inc.module.bright_white(),
                        inc.dependency,
                        inc.found.red(),
                        inc.expected.to_string().green()
                    );
                }
            }
        }
    }
}

/// Runs workspace operations against the modules of one configuration.
#[derive(Debug, Clone)]
pub struct Coordinator {
    root: PathBuf,
    config: WorkspaceConfig,
    store: ManifestStore,
}

impl Coordinator {
    pub fn new(root: impl AsRef<Path>, config: WorkspaceConfig) -> Self {
        let store = ManifestStore::new(config.manifest.clone());
        Self {
            root: root.as_ref().to_path_buf(),
            config,
            store,
        }
    }

    /// Load `.modules.config` from `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let config = WorkspaceConfig::load(root.as_ref())?;
        Ok(Self::new(root, config))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Build a fresh table of every module with a manifest.
    pub fn table(&self) -> Result<WorkspaceTable> {
        WorkspaceTable::build(&self.root, &self.config, &self.store)
    }

    pub fn run(&self, operation: &Operation) -> Result<OperationReport> {
        match operation {
            Operation::IncrementAll(level) => self.increment_all(*level, false),
            Operation::Tag(label) => self.tag(label.as_deref()),
            Operation::Bump => self.bump(),
            Operation::Check => self.check(),
        }
    }

    /// Increment every module at `level`, in configuration order.
    ///
    /// Each module is loaded, caught up with the versions of modules already
    /// processed, incremented, and its new version propagated into every loaded
    /// manifest. All manifests touched by that step are persisted before the
    /// next module is loaded, so a failure leaves earlier modules written and
    /// the failing module's file untouched.
    pub fn increment_all(&self, level: Level, dry_run: bool) -> Result<OperationReport> {
        let mut report = OperationReport::new(&Operation::IncrementAll(level));
        report.dry_run = dry_run;
        let mut table = WorkspaceTable::new();

        for descriptor in &self.config.modules {
            let folder = self.config.module_folder(&self.root, descriptor);
            let Some(manifest) = self.store.load(&descriptor.name, &folder)? else {
                table.skip(descriptor, &self.store.manifest_path(&folder));
                continue;
            };

            let name = manifest.name.clone();
            let path = manifest.path.clone();
            let old_version = manifest.version.clone();
            let new_version = increment(&old_version, level)?;
            table.insert(descriptor.clone(), folder, manifest)?;

            reconcile(&mut table, &name);
            if let Some(entry) = table.get_mut(&name) {
                entry.manifest.set_version(&new_version);
            }

            let mut dirty = vec![name.clone()];
            for touched in propagate(&mut table, &name, &new_version) {
                if !dirty.contains(&touched) {
                    dirty.push(touched);
                }
            }

            tracing::info!(
                module = %name,
                from = %old_version,
                to = %new_version,
                "incremented version"
            );
            report.changes.push(VersionChange {
                module: name,
                path,
                old_version,
                new_version,
            });

            if !dry_run {
                for module in &dirty {
                    if let Some(entry) = table.get(module) {
                        self.store.save(&entry.manifest)?;
                        report.record_write(module, &entry.folder, &entry.manifest.path, None);
                    }
                }
            }
        }

        report.skipped = table.skipped().to_vec();
        Ok(report)
    }

    /// Write a consistent snapshot of every manifest for `label`.
    ///
    /// Versions are not changed; running this twice without intervening
    /// changes produces identical files.
    pub fn tag(&self, label: Option<&str>) -> Result<OperationReport> {
        if let Some(label) = label {
            validate_label(label)?;
        }
        let mut report = OperationReport::new(&Operation::Tag(label.map(String::from)));
        report.label = label.map(String::from);

        let table = self.table()?;
        let synthesizer = PackageSynthesizer::from_config(&self.config.target);
        self.write_synthesized(&table, &synthesizer, label, true, &mut report)?;

        report.skipped = table.skipped().to_vec();
        Ok(report)
    }

    /// Re-resolve every manifest against the current table and rewrite it.
    pub fn bump(&self) -> Result<OperationReport> {
        let mut report = OperationReport::new(&Operation::Bump);

        let table = self.table()?;
        self.write_synthesized(&table, &PackageSynthesizer::pinned(), None, false, &mut report)?;

        report.skipped = table.skipped().to_vec();
        Ok(report)
    }

    /// Synthesize every manifest in the table without writing anything.
    pub fn preview(&self, label: Option<&str>) -> Result<Vec<RenderedManifest>> {
        if let Some(label) = label {
            validate_label(label)?;
        }
        let table = self.table()?;
        let synthesizer = PackageSynthesizer::from_config(&self.config.target);
        Ok(table
            .entries()
            .map(|entry| synthesizer.synthesize(entry, &table, label))
            .collect())
    }

    fn write_synthesized(
        &self,
        table: &WorkspaceTable,
        synthesizer: &PackageSynthesizer,
        label: Option<&str>,
        labelled: bool,
        report: &mut OperationReport,
    ) -> Result<()> {
        for entry in table.entries() {
            let rendered = synthesizer.synthesize(entry, table, label);
            persist(Some(&rendered.module), &rendered.path, &rendered.contents)?;
            tracing::info!(module = %rendered.module, label = %rendered.label, "wrote manifest");
            report.record_write(
                &rendered.module,
                &entry.folder,
                &rendered.path,
                labelled.then_some(rendered.label.as_str()),
            );
        }
        Ok(())
    }

    /// Compare every workspace dependency constraint with the table.
    pub fn check(&self) -> Result<OperationReport> {
        let mut report = OperationReport::new(&Operation::Check);
        let table = self.table()?;

        for entry in table.entries() {
            for dep in &entry.manifest.dependencies {
                if dep.name == entry.manifest.name {
                    continue;
                }
                let (Some(target), Some(found)) = (table.get(&dep.name), &dep.constraint) else {
                    continue;
                };
                if is_reference(found) {
                    continue;
                }
                if dep.pinned_version().as_ref() != Some(target.version()) {
                    report.inconsistencies.push(Inconsistency {
                        module: entry.manifest.name.clone(),
                        dependency: dep.name.clone(),
                        expected: target.version().clone(),
                        found: found.clone(),
                    });
                }
            }
        }

        report.skipped = table.skipped().to_vec();
        Ok(report)
    }
}

/// A label names release branches and git references, so it must be a valid
/// branch name and must not contain the `#` separating url from reference.
pub fn validate_label(label: &str) -> Result<()> {
    let valid = !label.trim().is_empty()
        && !label.contains('#')
        && git2::Branch::name_is_valid(label).unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "'{}' is not a valid release label",
            label
        )))
    }
}

/// Git references produced by `tag` are not version constraints.
fn is_reference(constraint: &str) -> bool {
    constraint.contains('#') || constraint.contains("://")
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
