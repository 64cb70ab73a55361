//! Enumerations behind the CLI's list options.

use std::collections::BTreeMap;
use std::io::Write;

use hwgraph_core::{ComponentType, PropertyType, TopologyGraph};

use crate::error::ExportError;

/// Property names declared for the vertices of each category present in
/// `graph`, in taxonomy order. Names keep first-occurrence order.
pub fn properties_per_component(graph: &TopologyGraph) -> BTreeMap<ComponentType, Vec<&'static str>> {
    let mut listing: BTreeMap<ComponentType, Vec<&'static str>> = BTreeMap::new();
    for (id, vertex) in graph.vertices() {
        let names = listing.entry(vertex.component()).or_default();
        for name in graph.property_names(id) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    listing
}

/// Declared type of a property name across the registered tables.
pub fn property_type(graph: &TopologyGraph, name: &str) -> Option<PropertyType> {
    graph
        .properties()
        .tables()
        .find_map(|table| table.get(name).map(|d| d.value_type()))
}

/// Every category with its depth in the taxonomy, parents first.
pub fn component_types() -> impl Iterator<Item = (usize, ComponentType)> {
    ComponentType::ALL
        .iter()
        .map(|&c| (c.ancestors().count(), c))
}

/// Writes the taxonomy as an indented tree.
pub fn write_component_types(out: &mut dyn Write) -> Result<(), ExportError> {
    for (depth, component) in component_types() {
        let name = format!("{}{}", "  ".repeat(depth), component.name());
        writeln!(out, "{name:<28}{}", component.description())?;
    }
    Ok(())
}

/// Writes [`properties_per_component`] as one block per category.
pub fn write_properties_per_component(
    graph: &TopologyGraph,
    out: &mut dyn Write,
) -> Result<(), ExportError> {
    for (component, names) in properties_per_component(graph) {
        writeln!(out, "{component}:")?;
        if names.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for name in names {
            let kind = property_type(graph, name).map_or("", PropertyType::name);
            writeln!(out, "  {name:<24}{kind}")?;
        }
    }
    Ok(())
}
