//! Graphviz dot writer.
//!
//! Vertices are numbered by their graph id and carry `label`, `component`
//! and one attribute per present property column. Edges carry their `type`;
//! interconnects add their link attributes.

use std::io::Write;

use hwgraph_core::{LinkInfo, TopologyEdge};

use crate::error::ExportError;
use crate::view::{display_label, ExportView};

/// Quotes a dot ID, escaping embedded quotes and backslashes.
fn quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for ch in raw.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

fn link_attributes(link: &LinkInfo) -> Vec<(&'static str, String)> {
    let mut attrs = vec![("link", link.kind.name().to_string())];
    let optional = [
        ("hops", link.hops),
        ("weight", link.weight),
        ("min_bandwidth", link.min_bandwidth),
        ("max_bandwidth", link.max_bandwidth),
    ];
    attrs.extend(
        optional
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v.to_string()))),
    );
    attrs
}

fn write_attributes<'a>(
    out: &mut dyn Write,
    attrs: impl IntoIterator<Item = (&'a str, String)>,
) -> Result<(), ExportError> {
    let rendered: Vec<String> = attrs
        .into_iter()
        .map(|(name, value)| format!("{}={}", quote(name), quote(&value)))
        .collect();
    write!(out, "[{}]", rendered.join(", "))?;
    Ok(())
}

/// Writes the view as a directed dot graph.
pub fn write_dot(view: &ExportView<'_, '_>, out: &mut dyn Write) -> Result<(), ExportError> {
    let graph = view.graph();
    let columns = view.columns();

    writeln!(out, "digraph topology {{")?;
    for (id, vertex) in view.vertices() {
        let mut attrs: Vec<(&str, String)> = vec![
            ("label", display_label(id, vertex)),
            ("component", vertex.component().name().to_string()),
        ];
        for (name, value) in columns.iter().zip(view.row(id, &columns)) {
            if let Some(value) = value {
                attrs.push((name.as_str(), value));
            }
        }
        write!(out, "  {id} ")?;
        write_attributes(out, attrs)?;
        writeln!(out, ";")?;
    }

    for record in view.edges() {
        let mut attrs = vec![("type", record.edge.name().to_string())];
        if let TopologyEdge::Interconnect(link) = record.edge {
            attrs.extend(link_attributes(link));
        }
        write!(out, "  {} -> {} ", record.source, record.target)?;
        write_attributes(out, attrs)?;
        writeln!(out, ";")?;
    }
    writeln!(out, "}}")?;

    tracing::debug!(vertices = graph.vertex_count(), columns = columns.len(), "dot export written");
    Ok(())
}
