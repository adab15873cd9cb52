//! Error types for workspace version coordination.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Step of an operation during which an I/O failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Load,
    Persist,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => f.write_str("load"),
            Self::Persist => f.write_str("persist"),
        }
    }
}

/// Errors surfaced by workspace operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed workspace configuration or manifest.
    #[error("{}: {message}", describe(.module, .path))]
    Config {
        module: Option<String>,
        path: PathBuf,
        message: String,
    },

    /// Unrecognized increment level or target, rejected before any write.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Reading or writing a manifest failed.
    #[error("failed to {phase} {}: {source}", describe(.module, .path))]
    Io {
        module: Option<String>,
        path: PathBuf,
        phase: Phase,
        #[source]
        source: std::io::Error,
    },
}

fn describe(module: &Option<String>, path: &std::path::Path) -> String {
    match module {
        Some(name) => format!("module `{}` ({})", name, path.display()),
        None => path.display().to_string(),
    }
}

impl Error {
    pub(crate) fn config(
        module: Option<&str>,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self::Config {
            module: module.map(String::from),
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(
        module: Option<&str>,
        path: impl Into<PathBuf>,
        phase: Phase,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            module: module.map(String::from),
            path: path.into(),
            phase,
            source,
        }
    }

    /// Name of the module the error concerns, when known.
    pub fn module(&self) -> Option<&str> {
        match self {
            Self::Config { module, .. } | Self::Io { module, .. } => module.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
