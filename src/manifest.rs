//! Module manifest parsing and manipulation.
//!
//! Two on-disk formats are understood: `package.json`-style JSON documents and
//! `Cargo.toml`-style TOML documents. Both are edited in place so that unknown
//! fields, key order and (for TOML) comments survive a rewrite.

use semver::Version;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use toml_edit::{value, DocumentMut, InlineTable, Item, TableLike};

use crate::error::{Error, Result};

/// On-disk manifest format, chosen from the configured manifest filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Toml,
}

impl ManifestFormat {
    pub fn from_filename(filename: &str) -> Self {
        if filename.ends_with(".toml") {
            Self::Toml
        } else {
            Self::Json
        }
    }

    /// Dependency sections in the order they are read and rewritten.
    pub fn sections(self) -> &'static [(&'static str, DependencyKind)] {
        match self {
            Self::Json => &[
                ("dependencies", DependencyKind::Normal),
                ("devDependencies", DependencyKind::Dev),
                ("peerDependencies", DependencyKind::Peer),
            ],
            Self::Toml => &[
                ("dependencies", DependencyKind::Normal),
                ("dev-dependencies", DependencyKind::Dev),
                ("build-dependencies", DependencyKind::Build),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Normal,
    Dev,
    Build,
    Peer,
}

/// A dependency entry as stored in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    /// Stored constraint; `None` for entries without a version or reference
    /// (for example path-only TOML tables).
    pub constraint: Option<String>,
    pub kind: DependencyKind,
}

impl Dependency {
    /// The constraint as an exact version, if it is one.
    pub fn pinned_version(&self) -> Option<Version> {
        self.constraint
            .as_deref()
            .and_then(|c| Version::parse(c.trim()).ok())
    }
}

/// Constraint written for a dependency on a workspace module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Version(Version),
    GitRef { url: String, reference: String },
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(v) => write!(f, "{}", v),
            Self::GitRef { url, reference } => write!(f, "{}#{}", url, reference),
        }
    }
}

#[derive(Debug, Clone)]
enum Document {
    Json(Map<String, Value>),
    Toml(DocumentMut),
}

/// A parsed module manifest together with its editable document.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub path: PathBuf,
    pub name: String,
    pub version: Version,
    pub dependencies: Vec<Dependency>,
    document: Document,
}

impl Manifest {
    /// Parse manifest text. `module` names the configured module for error context.
    pub fn parse(
        content: &str,
        path: impl AsRef<Path>,
        format: ManifestFormat,
        module: Option<&str>,
    ) -> Result<Self> {
        let path = path.as_ref();
        match format {
            ManifestFormat::Json => Self::parse_json(content, path, module),
            ManifestFormat::Toml => Self::parse_toml(content, path, module),
        }
    }

    fn parse_json(content: &str, path: &Path, module: Option<&str>) -> Result<Self> {
        let parsed: Value = serde_json::from_str(content)
            .map_err(|e| Error::config(module, path, format!("invalid JSON: {e}")))?;
        let Value::Object(map) = parsed else {
            return Err(Error::config(module, path, "manifest must be a JSON object"));
        };

        let name = map
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::config(module, path, "missing string field 'name'"))?
            .to_string();
        let version_str = map
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::config(module, path, "missing string field 'version'"))?;
        let version = parse_version(version_str, path, module)?;

        let mut dependencies = Vec::new();
        for (section, kind) in ManifestFormat::Json.sections() {
            match map.get(*section) {
                None => {}
                Some(Value::Object(deps)) => {
                    for (dep_name, constraint) in deps {
                        dependencies.push(Dependency {
                            name: dep_name.clone(),
                            constraint: constraint.as_str().map(String::from),
                            kind: *kind,
                        });
                    }
                }
                Some(_) => {
                    return Err(Error::config(
                        module,
                        path,
                        format!("'{}' must be an object", section),
                    ))
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            name,
            version,
            dependencies,
            document: Document::Json(map),
        })
    }

    fn parse_toml(content: &str, path: &Path, module: Option<&str>) -> Result<Self> {
        let document: DocumentMut = content
            .parse()
            .map_err(|e| Error::config(module, path, format!("invalid TOML: {e}")))?;

        let name = document
            .get("package")
            .and_then(|p| p.get("name"))
            .and_then(Item::as_str)
            .ok_or_else(|| Error::config(module, path, "missing package.name"))?
            .to_string();
        let version_str = document
            .get("package")
            .and_then(|p| p.get("version"))
            .and_then(Item::as_str)
            .ok_or_else(|| Error::config(module, path, "missing package.version"))?;
        let version = parse_version(version_str, path, module)?;

        let mut dependencies = Vec::new();
        for (section, kind) in ManifestFormat::Toml.sections() {
            if let Some(deps) = document.get(section).and_then(Item::as_table_like) {
                for (dep_name, item) in deps.iter() {
                    dependencies.push(Dependency {
                        name: dep_name.to_string(),
                        constraint: toml_constraint(item),
                        kind: *kind,
                    });
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            name,
            version,
            dependencies,
            document: Document::Toml(document),
        })
    }

    pub fn format(&self) -> ManifestFormat {
        match self.document {
            Document::Json(_) => ManifestFormat::Json,
            Document::Toml(_) => ManifestFormat::Toml,
        }
    }

    /// Update the module's own version.
    pub fn set_version(&mut self, new_version: &Version) {
        self.version = new_version.clone();

        match &mut self.document {
            Document::Json(map) => {
                map.insert("version".into(), Value::String(new_version.to_string()));
            }
            Document::Toml(doc) => {
                if let Some(pkg_table) = doc.get_mut("package").and_then(Item::as_table_like_mut)
                {
                    set_toml_key(pkg_table, "version", &new_version.to_string());
                }
            }
        }
    }

    /// Rewrite every entry for `dep_name` that carries a constraint.
    ///
    /// Returns `true` when the stored constraint actually changed.
    pub fn set_dependency(&mut self, dep_name: &str, constraint: &Constraint) -> bool {
        let format = self.format();
        let rendered = constraint.to_string();
        let mut changed = false;

        for (section, kind) in format.sections() {
            let rewritten = match &mut self.document {
                Document::Json(map) => match map.get_mut(*section) {
                    Some(Value::Object(deps)) => match deps.get_mut(dep_name) {
                        Some(entry) if entry.is_string() => {
                            *entry = Value::String(rendered.clone());
                            true
                        }
                        _ => false,
                    },
                    _ => false,
                },
                Document::Toml(doc) => doc
                    .get_mut(section)
                    .and_then(Item::as_table_like_mut)
                    .and_then(|deps| deps.get_mut(dep_name))
                    .map(|item| rewrite_toml_entry(item, constraint))
                    .unwrap_or(false),
            };

            if rewritten {
                if let Some(dep) = self
                    .dependencies
                    .iter_mut()
                    .find(|d| d.name == dep_name && d.kind == *kind)
                {
                    if dep.constraint.as_deref() != Some(rendered.as_str()) {
                        dep.constraint = Some(rendered.clone());
                        changed = true;
                    }
                }
            }
        }

        changed
    }

    /// Set a top-level string field (`[package]` for TOML manifests).
    pub fn set_field(&mut self, key: &str, field_value: &str) {
        match &mut self.document {
            Document::Json(map) => {
                map.insert(key.to_string(), Value::String(field_value.to_string()));
            }
            Document::Toml(doc) => {
                if let Some(pkg_table) = doc.get_mut("package").and_then(Item::as_table_like_mut)
                {
                    set_toml_key(pkg_table, key, field_value);
                }
            }
        }
    }

    /// Read back a top-level string field.
    pub fn field(&self, key: &str) -> Option<&str> {
        match &self.document {
            Document::Json(map) => map.get(key).and_then(Value::as_str),
            Document::Toml(doc) => doc
                .get("package")
                .and_then(|p| p.get(key))
                .and_then(Item::as_str),
        }
    }

    pub fn depends_on(&self, dep_name: &str) -> bool {
        self.dependencies.iter().any(|d| d.name == dep_name)
    }

    /// Render the document as it should be written to disk.
    pub fn render(&self) -> String {
        match &self.document {
            Document::Json(map) => {
                // A map of JSON values always serializes.
                let mut out = serde_json::to_string_pretty(map).unwrap_or_default();
                out.push('\n');
                out
            }
            Document::Toml(doc) => doc.to_string(),
        }
    }
}

fn parse_version(raw: &str, path: &Path, module: Option<&str>) -> Result<Version> {
    Version::parse(raw.trim())
        .map_err(|e| Error::config(module, path, format!("invalid version '{}': {}", raw, e)))
}

fn toml_constraint(item: &Item) -> Option<String> {
    if let Some(s) = item.as_str() {
        // Simple version string: "0.20.0"
        return Some(s.to_string());
    }

    // Table format: { version = "0.20.0", ... } or { git = "...", tag = "..." }
    let table = item.as_table_like()?;
    if let Some(v) = table.get("version").and_then(Item::as_str) {
        return Some(v.to_string());
    }
    let git = table.get("git").and_then(Item::as_str)?;
    match table.get("tag").and_then(Item::as_str) {
        Some(tag) => Some(format!("{}#{}", git, tag)),
        None => Some(git.to_string()),
    }
}

/// Replace a value in place so the key keeps its position and decoration.
fn set_toml_key(table: &mut dyn TableLike, key: &str, new_value: &str) {
    match table.get_mut(key) {
        Some(item) => *item = value(new_value),
        None => {
            table.insert(key, value(new_value));
        }
    }
}

fn rewrite_toml_entry(item: &mut Item, constraint: &Constraint) -> bool {
    if item.is_str() {
        *item = match constraint {
            Constraint::Version(v) => value(v.to_string()),
            Constraint::GitRef { url, reference } => {
                let mut table = InlineTable::new();
                table.insert("git", url.as_str().into());
                table.insert("tag", reference.as_str().into());
                value(table)
            }
        };
        return true;
    }

    let Some(table) = item.as_table_like_mut() else {
        return false;
    };
    if !table.contains_key("version") && !table.contains_key("git") {
        return false;
    }

    match constraint {
        Constraint::Version(v) => {
            for key in ["git", "tag", "branch", "rev"] {
                table.remove(key);
            }
            set_toml_key(table, "version", &v.to_string());
        }
        Constraint::GitRef { url, reference } => {
            for key in ["version", "branch", "rev"] {
                table.remove(key);
            }
            set_toml_key(table, "git", url);
            set_toml_key(table, "tag", reference);
        }
    }
    true
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
