//! Output formats and their selection.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use crate::csv::write_csv;
use crate::dot::write_dot;
use crate::error::ExportError;
use crate::view::ExportView;

/// A supported serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Graphviz graph description language.
    #[default]
    Dot,
    /// Comma separated values, one row per vertex.
    Csv,
}

impl OutputFormat {
    pub const ALL: &'static [OutputFormat] = &[OutputFormat::Dot, OutputFormat::Csv];

    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Dot => "dot",
            OutputFormat::Csv => "csv",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OutputFormat::Dot => "graph description language of the Graphviz project, for visualisation",
            OutputFormat::Csv => "comma separated values, for spreadsheets and data analysis",
        }
    }

    /// The format named by a file's extension. `Ok(None)` if the file has
    /// no extension.
    pub fn from_path(path: &Path) -> Result<Option<OutputFormat>, ExportError> {
        match path.extension() {
            None => Ok(None),
            Some(ext) => ext.to_string_lossy().parse().map(Some),
        }
    }

    /// An explicit format wins; otherwise the output file's extension
    /// decides; otherwise dot.
    pub fn resolve(
        explicit: Option<OutputFormat>,
        output: Option<&Path>,
    ) -> Result<OutputFormat, ExportError> {
        if let Some(format) = explicit {
            return Ok(format);
        }
        match output {
            Some(path) => Ok(OutputFormat::from_path(path)?.unwrap_or_default()),
            None => Ok(OutputFormat::default()),
        }
    }

    /// Serializes `view` in this format.
    pub fn write(self, view: &ExportView<'_, '_>, out: &mut dyn Write) -> Result<(), ExportError> {
        match self {
            OutputFormat::Dot => write_dot(view, out),
            OutputFormat::Csv => write_csv(view, out),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ExportError::UnknownFormat {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_format_beats_extension() {
        let path = Path::new("topology.dot");
        assert_eq!(
            OutputFormat::resolve(Some(OutputFormat::Csv), Some(path)).unwrap(),
            OutputFormat::Csv
        );
        assert_eq!(OutputFormat::resolve(None, Some(path)).unwrap(), OutputFormat::Dot);
        assert_eq!(
            OutputFormat::resolve(None, Some(Path::new("out/table.CSV"))).unwrap(),
            OutputFormat::Csv
        );
    }

    #[test]
    fn missing_extension_defaults_to_dot() {
        assert_eq!(OutputFormat::resolve(None, Some(Path::new("graph"))).unwrap(), OutputFormat::Dot);
        assert_eq!(OutputFormat::resolve(None, None).unwrap(), OutputFormat::Dot);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = OutputFormat::resolve(None, Some(Path::new("graph.json"))).unwrap_err();
        assert!(matches!(err, ExportError::UnknownFormat { name } if name == "json"));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
