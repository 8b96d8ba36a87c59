//! Live graph -> persisted records

use crate::cascade::{CascadeResolver, Removal};
use crate::error::SessionResult;
use crate::identity::IdentityRegistry;
use chrono::Utc;
use flowpad_core::{
    Connection, ConnectionId, ConnectionKey, DiagramId, Endpoint, Error, Graph, ItemId, NodeKey,
    NodeKind, Orientation, PersistedConnection, PersistedDiagram, PersistedItem,
};
use flowpad_storage::DiagramStore;
use std::collections::HashMap;

/// Result of a completed snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub diagram_id: DiagramId,
    /// Identity used for every node, in graph order
    pub node_ids: Vec<(NodeKey, ItemId)>,
    /// Identity used for every connection, in graph order
    pub connection_ids: Vec<(ConnectionKey, ConnectionId)>,
}

/// Writes the live graph as a saved diagram.
///
/// The aggregate's item and connection lists are replaced wholesale with
/// the graph's current content. If the build fails part way, records already
/// written stay in the store but the save as a whole has failed.
pub struct SnapshotBuilder<'a> {
    store: &'a dyn DiagramStore,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(store: &'a dyn DiagramStore) -> Self {
        Self { store }
    }

    /// Snapshot `graph`, replaying `removals` against the `prior` aggregate first
    pub fn build(
        &self,
        graph: &Graph,
        prior: Option<DiagramId>,
        removals: &[Removal],
    ) -> SessionResult<Snapshot> {
        check_endpoints(graph)?;
        let registry = IdentityRegistry::new(self.store);

        let mut diagram = match prior {
            Some(id) => {
                let mut diagram = self.store.fetch_diagram(id)?;
                let resolver = CascadeResolver::new(self.store);
                for removal in removals {
                    resolver.apply(&mut diagram, *removal)?;
                }
                diagram.clear_contents();
                diagram
            }
            None => PersistedDiagram::new(),
        };

        let mut item_ids = HashMap::with_capacity(graph.node_count());
        let mut node_ids = Vec::with_capacity(graph.node_count());
        for node in graph.nodes() {
            let item_id = registry.resolve_item(node.id())?;
            let item = PersistedItem::new(item_id, node.kind());
            self.store.save_diagram_item(&item)?;
            diagram.items.push(item);
            item_ids.insert(node.key(), item_id);
            node_ids.push((node.key(), item_id));
        }

        let mut connection_ids = Vec::with_capacity(graph.connection_count());
        for connection in graph.connections() {
            let (source_item_id, source_side, source_kind) =
                resolve_endpoint(graph, &item_ids, connection, connection.source())?;
            let (sink_item_id, sink_side, sink_kind) =
                resolve_endpoint(graph, &item_ids, connection, connection.sink())?;

            let record = PersistedConnection {
                connection_id: registry.resolve_connection(connection.id())?,
                source_item_id,
                source_side,
                source_kind,
                sink_item_id,
                sink_side,
                sink_kind,
            };
            let connection_id = self.store.save_connection(&record)?;
            diagram.connection_ids.push(connection_id);
            connection_ids.push((connection.key(), connection_id));
        }

        diagram.id = Some(registry.resolve_diagram(diagram.id)?);
        diagram.saved_at = Utc::now();
        let diagram_id = self.store.save_diagram(&diagram)?;

        tracing::info!(
            "Saved diagram {} ({} items, {} connections)",
            diagram_id,
            node_ids.len(),
            connection_ids.len()
        );

        Ok(Snapshot {
            diagram_id,
            node_ids,
            connection_ids,
        })
    }
}

/// Reject unsaveable connections before anything is written
fn check_endpoints(graph: &Graph) -> SessionResult<()> {
    for connection in graph.connections() {
        for endpoint in [connection.source(), connection.sink()] {
            if graph.node(endpoint.node).is_none() {
                return Err(Error::EndpointNotInGraph {
                    connection: connection.key(),
                    node: endpoint.node,
                }
                .into());
            }
            if Orientation::from(endpoint.orientation) == Orientation::None {
                return Err(Error::UnencodableSide {
                    node: endpoint.node,
                }
                .into());
            }
        }
    }
    Ok(())
}

fn resolve_endpoint(
    graph: &Graph,
    item_ids: &HashMap<NodeKey, ItemId>,
    connection: &Connection,
    endpoint: Endpoint,
) -> SessionResult<(ItemId, Orientation, NodeKind)> {
    let missing = || Error::EndpointNotInGraph {
        connection: connection.key(),
        node: endpoint.node,
    };
    let node = graph.node(endpoint.node).ok_or_else(missing)?;
    let item_id = item_ids.get(&endpoint.node).copied().ok_or_else(missing)?;

    match Orientation::from(endpoint.orientation) {
        Orientation::None => Err(Error::UnencodableSide {
            node: endpoint.node,
        }
        .into()),
        side => Ok((item_id, side, node.kind())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use flowpad_core::{ConnectorOrientation, Element};
    use flowpad_storage::MemoryStore;

    #[test]
    fn test_source_to_sink_snapshot() {
        let store = MemoryStore::new();
        let mut graph = Graph::new();
        let a = graph.add_node(NodeKind::Source);
        let b = graph.add_node(NodeKind::Sink);
        graph.connect(Endpoint::right(a), Endpoint::left(b)).unwrap();

        let snapshot = SnapshotBuilder::new(&store).build(&graph, None, &[]).unwrap();
        let diagram = store.fetch_diagram(snapshot.diagram_id).unwrap();

        let a_id = snapshot.node_ids[0].1;
        let b_id = snapshot.node_ids[1].1;
        assert_eq!(
            diagram.items,
            vec![
                PersistedItem::new(a_id, NodeKind::Source),
                PersistedItem::new(b_id, NodeKind::Sink)
            ]
        );
        assert_eq!(diagram.connection_ids.len(), 1);

        let connection = store.fetch_connection(diagram.connection_ids[0]).unwrap();
        assert_eq!(connection.source_item_id, a_id);
        assert_eq!(connection.source_side, Orientation::Right);
        assert_eq!(connection.source_kind, NodeKind::Source);
        assert_eq!(connection.sink_item_id, b_id);
        assert_eq!(connection.sink_side, Orientation::Left);
        assert_eq!(connection.sink_kind, NodeKind::Sink);
    }

    #[test]
    fn test_reuses_identities() {
        let store = MemoryStore::new();
        let mut graph = Graph::new();
        let a = graph.add_persisted_node(NodeKind::Settings, ItemId(70)).unwrap();
        let b = graph.add_node(NodeKind::Persist);
        graph
            .connect_persisted(ConnectionId(80), Endpoint::right(a), Endpoint::left(b))
            .unwrap();

        let snapshot = SnapshotBuilder::new(&store).build(&graph, None, &[]).unwrap();
        assert_eq!(snapshot.node_ids[0], (a, ItemId(70)));
        assert_eq!(snapshot.connection_ids[0].1, ConnectionId(80));
        assert!(store.fetch_connection(ConnectionId(80)).is_ok());
    }

    #[test]
    fn test_prior_aggregate_is_replaced() {
        let store = MemoryStore::new();
        let builder = SnapshotBuilder::new(&store);

        let mut graph = Graph::new();
        let a = graph.add_node(NodeKind::Source);
        let b = graph.add_node(NodeKind::Sink);
        graph.connect(Endpoint::right(a), Endpoint::left(b)).unwrap();
        let first = builder.build(&graph, None, &[]).unwrap();

        // stamp identities, then delete A like the session would
        for (key, id) in &first.node_ids {
            graph.assign_node_id(*key, *id).unwrap();
        }
        for (key, id) in &first.connection_ids {
            graph.assign_connection_id(*key, *id).unwrap();
        }
        let removals: Vec<Removal> = graph
            .remove(Element::Node(a))
            .unwrap()
            .iter()
            .filter_map(Removal::from_removed)
            .collect();

        let second = builder
            .build(&graph, Some(first.diagram_id), &removals)
            .unwrap();
        assert_eq!(second.diagram_id, first.diagram_id);

        let diagram = store.fetch_diagram(second.diagram_id).unwrap();
        assert_eq!(diagram.items, vec![PersistedItem::new(first.node_ids[1].1, NodeKind::Sink)]);
        assert!(diagram.connection_ids.is_empty());
        assert_eq!(store.connection_count().unwrap(), 0);
    }

    #[test]
    fn test_unencodable_side_writes_nothing() {
        let store = MemoryStore::new();
        let mut graph = Graph::new();
        let a = graph.add_node(NodeKind::Source);
        let b = graph.add_node(NodeKind::Sink);
        graph
            .connect(Endpoint::right(a), Endpoint::new(b, ConnectorOrientation::None))
            .unwrap();

        let err = SnapshotBuilder::new(&store).build(&graph, None, &[]).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Graph(Error::UnencodableSide { node }) if node == b
        ));
        assert_eq!(store.operation_count(), 0);
    }

    #[test]
    fn test_missing_prior_diagram() {
        let store = MemoryStore::new();
        let mut graph = Graph::new();
        graph.add_node(NodeKind::Source);

        let err = SnapshotBuilder::new(&store)
            .build(&graph, Some(DiagramId(12)), &[])
            .unwrap_err();
        assert!(matches!(err, SessionError::Storage(e) if e.is_not_found()));
    }
}
