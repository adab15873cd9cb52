//! Loading manifests from module folders and persisting them atomically.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Error, Phase, Result};
use crate::manifest::{Manifest, ManifestFormat};

/// Reads and writes the manifest file of each module folder.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    filename: String,
    format: ManifestFormat,
}

impl ManifestStore {
    pub fn new(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let format = ManifestFormat::from_filename(&filename);
        Self { filename, format }
    }

    pub fn format(&self) -> ManifestFormat {
        self.format
    }

    /// Path of the manifest inside a module folder.
    pub fn manifest_path(&self, folder: &Path) -> PathBuf {
        folder.join(&self.filename)
    }

    /// Load the manifest of `folder`.
    ///
    /// Returns `Ok(None)` when the folder has no manifest file.
    pub fn load(&self, module: &str, folder: &Path) -> Result<Option<Manifest>> {
        let path = self.manifest_path(folder);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(Some(module), &path, Phase::Load, e)),
        };

        Manifest::parse(&content, &path, self.format, Some(module)).map(Some)
    }

    /// Write a manifest back to the path it was loaded from.
    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        persist(Some(&manifest.name), &manifest.path, &manifest.render())
    }
}

/// Replace `path` with `contents` via a temporary file in the same directory.
///
/// The original file is left untouched if anything fails before the rename;
/// the temporary file is removed when dropped.
pub fn persist(module: Option<&str>, path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let io_err = |e: std::io::Error| Error::io(module, path, Phase::Persist, e);

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    // The temporary file is created 0600; keep the mode of the file it replaces.
    match std::fs::metadata(path) {
        Ok(existing) => tmp
            .as_file()
            .set_permissions(existing.permissions())
            .map_err(io_err)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(e)),
    }
    tmp.write_all(contents.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    tracing::debug!(path = %path.display(), "persisted manifest");
    Ok(())
}
