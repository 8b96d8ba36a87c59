//! Persisted records -> live graph

use crate::error::SessionResult;
use flowpad_core::{
    ConnectionId, DiagramId, Endpoint, Error, Graph, ItemId, NodeKey, NodeKind, Orientation,
};
use flowpad_storage::DiagramStore;
use std::collections::HashMap;

/// Rebuilds a live graph from a saved diagram.
///
/// All items are materialized before any connection is resolved, so a
/// connection may name items in any order. Any resolution failure aborts the
/// rebuild and the partial graph is dropped.
pub struct Reconstructor<'a> {
    store: &'a dyn DiagramStore,
}

impl<'a> Reconstructor<'a> {
    pub fn new(store: &'a dyn DiagramStore) -> Self {
        Self { store }
    }

    pub fn rebuild(&self, id: DiagramId) -> SessionResult<Graph> {
        let diagram = self.store.fetch_diagram(id)?;
        let mut graph = Graph::new();

        let mut nodes: HashMap<ItemId, NodeKey> = HashMap::with_capacity(diagram.items.len());
        for entry in &diagram.items {
            let item = self.store.fetch_diagram_item(entry.item_id)?;
            let key = graph.add_persisted_node(item.kind, item.item_id)?;
            nodes.insert(item.item_id, key);
        }

        for connection_id in &diagram.connection_ids {
            let record = self.store.fetch_connection(*connection_id)?;
            let source = resolve_endpoint(
                &graph,
                &nodes,
                record.connection_id,
                record.source_item_id,
                record.source_side,
                record.source_kind,
            )?;
            let sink = resolve_endpoint(
                &graph,
                &nodes,
                record.connection_id,
                record.sink_item_id,
                record.sink_side,
                record.sink_kind,
            )?;
            graph.connect_persisted(record.connection_id, source, sink)?;
        }

        tracing::info!(
            "Loaded diagram {} ({} items, {} connections)",
            id,
            graph.node_count(),
            graph.connection_count()
        );
        Ok(graph)
    }
}

fn resolve_endpoint(
    graph: &Graph,
    nodes: &HashMap<ItemId, NodeKey>,
    connection_id: ConnectionId,
    item_id: ItemId,
    side: Orientation,
    kind: NodeKind,
) -> SessionResult<Endpoint> {
    let node = *nodes
        .get(&item_id)
        .ok_or(Error::DanglingEndpointReference {
            connection_id,
            item_id,
        })?;

    if let Some(existing) = graph.node(node) {
        if existing.kind() != kind {
            tracing::warn!(
                "Connection {} records item {} as {} but it was saved as {}",
                connection_id,
                item_id,
                kind,
                existing.kind()
            );
        }
    }

    Ok(Endpoint::new(node, side.attach(connection_id)?))
}
