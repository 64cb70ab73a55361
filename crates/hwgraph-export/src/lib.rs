//! Export boundary for finished topology graphs.
//!
//! Exporters only read the graph. Vertex data is reached through the
//! property query surface, so no exporter code is specific to a category or
//! a module.
//!
//! # Modules
//!
//! - [`view`]: ExportView with component and property filters
//! - [`dot`]: Graphviz writer
//! - [`csv`]: one-row-per-vertex table writer
//! - [`format`]: OutputFormat and format selection
//! - [`listing`]: category and property enumerations
//! - [`error`]: ExportError

pub mod csv;
pub mod dot;
pub mod error;
pub mod format;
pub mod listing;
pub mod view;

pub use error::ExportError;
pub use format::OutputFormat;
pub use listing::properties_per_component;
pub use view::{parse_components, ExportView};
