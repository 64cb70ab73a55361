//! Loading of versioned JSON snapshot documents.
//!
//! Every backend input (topology walk, GPU inventory, site descriptor) is a
//! JSON document carrying a top-level `format_version`. A version other than
//! the one a module was written against is reported as
//! [`SnapshotError::VersionMismatch`], which disables that module.

use std::fs;
use std::path::{Path, PathBuf};

use hwgraph_engine::ModuleError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Errors reading a snapshot document.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cannot read {path}: {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot {path}: {source}", path = path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot format version {found} does not match supported version {expected}")]
    VersionMismatch { expected: u32, found: u32 },
}

impl SnapshotError {
    /// The module error this load failure means for `module`.
    pub fn into_module_error(self, module: &'static str) -> ModuleError {
        match self {
            SnapshotError::VersionMismatch { expected, found } => ModuleError::AbiVersionMismatch {
                module,
                expected,
                found,
            },
            other => ModuleError::BackendCallFailure {
                module,
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    format_version: u32,
}

/// Reads `path` as a `T`, checking `format_version` first so a future
/// layout is reported as a version mismatch rather than a parse error.
pub fn load<T: DeserializeOwned>(path: &Path, expected: u32) -> Result<T, SnapshotError> {
    let text = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text, expected).map_err(|err| match err {
        SnapshotError::Parse { source, .. } => SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Parses an in-memory document. See [`load`].
pub fn parse<T: DeserializeOwned>(text: &str, expected: u32) -> Result<T, SnapshotError> {
    let parse_err = |source| SnapshotError::Parse {
        path: PathBuf::from("<memory>"),
        source,
    };
    let probe: VersionProbe = serde_json::from_str(text).map_err(parse_err)?;
    if probe.format_version != expected {
        return Err(SnapshotError::VersionMismatch {
            expected,
            found: probe.format_version,
        });
    }
    serde_json::from_str(text).map_err(parse_err)
}
