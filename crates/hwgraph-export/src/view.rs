//! The export view: a read-only selection of vertices and property columns.
//!
//! A component filter keeps every vertex whose category is-a one of the
//! listed categories, so `core` keeps physical and logical cores alike. An
//! empty filter keeps everything. Edges are kept when both endpoints are.
//!
//! Without a property filter the columns are every property declared for
//! the kept vertices, in first-occurrence order.

use hwgraph_core::{ComponentType, EdgeRecord, TopologyGraph, Vertex, VertexId};

use crate::error::ExportError;

/// Parses a list of category names.
pub fn parse_components<I, S>(names: I) -> Result<Vec<ComponentType>, ExportError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter(|n| !n.as_ref().trim().is_empty())
        .map(|n| {
            n.as_ref()
                .parse::<ComponentType>()
                .map_err(|_| ExportError::UnknownComponent {
                    name: n.as_ref().trim().to_string(),
                })
        })
        .collect()
}

/// A filtered, read-only view of a finished graph.
#[derive(Debug, Clone, Copy)]
pub struct ExportView<'g, 'f> {
    graph: &'g TopologyGraph,
    components: &'f [ComponentType],
    properties: Option<&'f [String]>,
}

impl<'g, 'f> ExportView<'g, 'f> {
    /// A view over the whole graph with every property column.
    pub fn new(graph: &'g TopologyGraph) -> Self {
        ExportView {
            graph,
            components: &[],
            properties: None,
        }
    }

    pub fn graph(&self) -> &'g TopologyGraph {
        self.graph
    }

    /// Keeps only vertices whose category is-a one of `components`.
    pub fn with_components(mut self, components: &'f [ComponentType]) -> Self {
        self.components = components;
        self
    }

    /// Restricts the property columns to `names`, in the given order.
    ///
    /// Every name must be declared by at least one registered property
    /// table; a property that is merely absent on the kept vertices is fine.
    pub fn with_properties(mut self, names: &'f [String]) -> Result<Self, ExportError> {
        let registry = self.graph.properties();
        if let Some(unknown) = names
            .iter()
            .find(|name| !registry.tables().any(|t| t.get(name).is_some()))
        {
            return Err(ExportError::UnknownProperty {
                name: unknown.clone(),
            });
        }
        self.properties = Some(names);
        Ok(self)
    }

    pub fn includes(&self, vertex: &Vertex) -> bool {
        self.components.is_empty() || self.components.iter().any(|c| vertex.is_a(*c))
    }

    /// Kept vertices in id order.
    pub fn vertices(&self) -> Vec<(VertexId, &'g Vertex)> {
        self.graph
            .filtered_view(|v: &Vertex| self.includes(v))
            .vertices()
            .collect()
    }

    /// Edges between kept vertices, in id order.
    pub fn edges(&self) -> Vec<EdgeRecord<'g>> {
        self.graph
            .filtered_view(|v: &Vertex| self.includes(v))
            .edges()
            .collect()
    }

    /// Property column names.
    pub fn columns(&self) -> Vec<String> {
        if let Some(names) = self.properties {
            return names.to_vec();
        }
        let mut columns: Vec<String> = Vec::new();
        for (id, _) in self.vertices() {
            for name in self.graph.property_names(id) {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                }
            }
        }
        columns
    }

    /// The value of each column for one vertex; absent values are `None`.
    pub fn row(&self, id: VertexId, columns: &[String]) -> Vec<Option<String>> {
        columns
            .iter()
            .map(|name| self.graph.property(id, name))
            .collect()
    }
}

/// Label shown for a vertex: its own label, or `<category>:<id>`.
pub fn display_label(id: VertexId, vertex: &Vertex) -> String {
    match vertex.label() {
        Some(label) => label.to_string(),
        None => format!("{}:{}", vertex.component(), id),
    }
}
