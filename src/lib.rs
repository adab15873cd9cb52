//! Version coordination for workspaces of interdependent repositories.
//!
//! Each module of the workspace lives in its own folder with its own manifest.
//! This crate builds a table of all module manifests, increments versions,
//! propagates new versions into dependent manifests and synthesizes consistent
//! release snapshots.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod external;
pub mod git;
pub mod manifest;
pub mod propagate;
pub mod store;
pub mod synthesize;
pub mod version;
pub mod workspace;

pub use config::{ModuleDescriptor, TargetConfig, TargetStyle, WorkspaceConfig};
pub use coordinator::{Coordinator, Operation, OperationReport};
pub use error::{Error, Result};
pub use manifest::{Constraint, Dependency, Manifest, ManifestFormat};
pub use store::ManifestStore;
pub use synthesize::{PackageSynthesizer, RenderedManifest, TargetStrategy};
pub use version::{increment, Level, VersionChange};
pub use workspace::{TableEntry, WorkspaceTable};
