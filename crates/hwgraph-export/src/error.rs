//! Error types for hwgraph-export.

use thiserror::Error;

/// Errors produced while selecting or writing an export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A component filter names no taxonomy category.
    #[error("unknown component type '{name}' (see --list-component-types)")]
    UnknownComponent { name: String },

    /// A property filter names a property no registered module declares.
    #[error("unknown vertex property '{name}' (see --list-properties-per-component)")]
    UnknownProperty { name: String },

    /// An output format or file extension is not supported.
    #[error("unsupported output format '{name}' (see --list-output-formats)")]
    UnknownFormat { name: String },

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    /// Returns `true` for errors caused by caller input rather than I/O.
    pub fn is_usage(&self) -> bool {
        !matches!(self, ExportError::Io(_))
    }
}
