//! Semantic version increments.

use semver::{BuildMetadata, Prerelease, Version};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Level at which a version is incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Level {
    Major,
    Minor,
    #[default]
    Patch,
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            _ => Err(Error::InvalidArgument(format!(
                "unknown increment level '{}' (expected major, minor or patch)",
                s
            ))),
        }
    }
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the version following `current` at `level`.
///
/// Prerelease and build metadata are cleared, so the result is always
/// strictly greater than `current`. A component that cannot be incremented
/// without overflowing is an `InvalidArgument`.
pub fn increment(current: &Version, level: Level) -> Result<Version> {
    let overflow = || {
        Error::InvalidArgument(format!(
            "cannot increment {} version of {}: component overflows",
            level, current
        ))
    };
    let mut new_version = current.clone();

    match level {
        Level::Major => {
            new_version.major = current.major.checked_add(1).ok_or_else(overflow)?;
            new_version.minor = 0;
            new_version.patch = 0;
        }
        Level::Minor => {
            new_version.minor = current.minor.checked_add(1).ok_or_else(overflow)?;
            new_version.patch = 0;
        }
        Level::Patch => {
            new_version.patch = current.patch.checked_add(1).ok_or_else(overflow)?;
        }
    }
    new_version.pre = Prerelease::EMPTY;
    new_version.build = BuildMetadata::EMPTY;

    Ok(new_version)
}

/// A version change applied to one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionChange {
    pub module: String,
    pub path: std::path::PathBuf,
    pub old_version: Version,
    pub new_version: Version,
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod tests;
