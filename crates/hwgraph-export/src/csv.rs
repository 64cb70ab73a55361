//! Tabular writer: one row per vertex.
//!
//! Columns are `id,label,component` followed by the view's property columns.
//! Absent values are empty fields. Fields are quoted per RFC 4180 when they
//! contain a comma, a quote or a line break.

use std::borrow::Cow;
use std::io::Write;

use crate::error::ExportError;
use crate::view::{display_label, ExportView};

fn field(raw: &str) -> Cow<'_, str> {
    if raw.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", raw.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(raw)
    }
}

fn write_record<'a>(
    out: &mut dyn Write,
    fields: impl IntoIterator<Item = &'a str>,
) -> Result<(), ExportError> {
    let line: Vec<Cow<'_, str>> = fields.into_iter().map(field).collect();
    writeln!(out, "{}", line.join(","))?;
    Ok(())
}

/// Writes the view as csv with a header row.
pub fn write_csv(view: &ExportView<'_, '_>, out: &mut dyn Write) -> Result<(), ExportError> {
    let columns = view.columns();

    let header = ["id", "label", "component"]
        .into_iter()
        .chain(columns.iter().map(String::as_str));
    write_record(out, header)?;

    let mut rows = 0usize;
    for (id, vertex) in view.vertices() {
        let id_text = id.to_string();
        let label = display_label(id, vertex);
        let values = view.row(id, &columns);
        let fields = [id_text.as_str(), label.as_str(), vertex.component().name()]
            .into_iter()
            .chain(values.iter().map(|v| v.as_deref().unwrap_or("")));
        write_record(out, fields)?;
        rows += 1;
    }

    tracing::debug!(rows, columns = columns.len(), "csv export written");
    Ok(())
}
