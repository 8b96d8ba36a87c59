//! JSON layout documents for import and export

use std::collections::HashMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use flowpad_core::{ConnectorOrientation, Endpoint, Graph, NodeKey, NodeKind, Orientation};

/// A diagram as exchanged on disk: named nodes and the wires between them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutDocument {
    pub nodes: Vec<LayoutNode>,
    #[serde(default)]
    pub connections: Vec<LayoutConnection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConnection {
    pub source: String,
    pub source_side: Orientation,
    pub sink: String,
    pub sink_side: Orientation,
}

impl LayoutDocument {
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        serde_json::from_str(content).context("Invalid layout document")
    }

    /// Describe a graph, naming nodes by their item id (or handle if unsaved)
    pub fn from_graph(graph: &Graph) -> Self {
        let name_of = |key: NodeKey| match graph.node(key).and_then(|n| n.id()) {
            Some(id) => id.to_string(),
            None => key.to_string(),
        };

        let nodes = graph
            .nodes()
            .map(|node| LayoutNode {
                name: name_of(node.key()),
                kind: node.kind().to_string(),
            })
            .collect();
        let connections = graph
            .connections()
            .map(|c| LayoutConnection {
                source: name_of(c.source().node),
                source_side: c.source().orientation.into(),
                sink: name_of(c.sink().node),
                sink_side: c.sink().orientation.into(),
            })
            .collect();

        Self { nodes, connections }
    }

    /// Add the document's nodes and connections to `graph`
    pub fn apply(&self, graph: &mut Graph) -> anyhow::Result<()> {
        let mut keys: HashMap<&str, NodeKey> = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let kind: NodeKind = node
                .kind
                .parse()
                .with_context(|| format!("Node '{}'", node.name))?;
            if keys.contains_key(node.name.as_str()) {
                anyhow::bail!("Duplicate node name: {}", node.name);
            }
            keys.insert(node.name.as_str(), graph.add_node(kind));
        }

        for connection in &self.connections {
            let lookup = |name: &str| {
                keys.get(name)
                    .copied()
                    .with_context(|| format!("Connection references unknown node '{}'", name))
            };
            let source = Endpoint::new(
                lookup(&connection.source)?,
                ConnectorOrientation::from(connection.source_side),
            );
            let sink = Endpoint::new(
                lookup(&connection.sink)?,
                ConnectorOrientation::from(connection.sink_side),
            );
            graph.connect(source, sink).with_context(|| {
                format!(
                    "Cannot connect '{}' to '{}'",
                    connection.source, connection.sink
                )
            })?;
        }
        Ok(())
    }
}
