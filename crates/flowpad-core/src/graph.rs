//! In-memory diagram graph
//!
//! Nodes and connections live in insertion-ordered arenas keyed by
//! session-local handles. Connectors and endpoints hold handles, never
//! references, so the node <-> connector <-> connection back-links carry no
//! ownership cycles.

use crate::error::{Error, Result};
use crate::identity::{ConnectionId, ItemId, Persistable};
use crate::kind::NodeKind;
use crate::orientation::ConnectorOrientation;
use indexmap::IndexMap;

/// Session-local handle of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey(u32);

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Session-local handle of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionKey(u32);

impl std::fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// An attachment point on one side of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connector {
    owner: NodeKey,
    orientation: ConnectorOrientation,
    connection: Option<ConnectionKey>,
}

impl Connector {
    fn new(owner: NodeKey, orientation: ConnectorOrientation) -> Self {
        Self {
            owner,
            orientation,
            connection: None,
        }
    }

    /// The node this connector belongs to
    pub fn owner(&self) -> NodeKey {
        self.owner
    }

    pub fn orientation(&self) -> ConnectorOrientation {
        self.orientation
    }

    /// The connection using this connector, once wired
    pub fn connection(&self) -> Option<ConnectionKey> {
        self.connection
    }

    pub fn is_wired(&self) -> bool {
        self.connection.is_some()
    }
}

/// A diagram element with a left and a right connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    key: NodeKey,
    id: Option<ItemId>,
    kind: NodeKind,
    left: Connector,
    right: Connector,
}

impl Node {
    fn new(key: NodeKey, kind: NodeKind) -> Self {
        Self {
            key,
            id: None,
            kind,
            left: Connector::new(key, ConnectorOrientation::Left),
            right: Connector::new(key, ConnectorOrientation::Right),
        }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// Persisted identity, `None` until the first save completes
    pub fn id(&self) -> Option<ItemId> {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn left(&self) -> &Connector {
        &self.left
    }

    pub fn right(&self) -> &Connector {
        &self.right
    }

    /// The connector on the given side; `None` orientation has no connector
    pub fn connector(&self, orientation: ConnectorOrientation) -> Option<&Connector> {
        match orientation {
            ConnectorOrientation::Left => Some(&self.left),
            ConnectorOrientation::Right => Some(&self.right),
            ConnectorOrientation::None => None,
        }
    }

    fn connector_mut(&mut self, orientation: ConnectorOrientation) -> Option<&mut Connector> {
        match orientation {
            ConnectorOrientation::Left => Some(&mut self.left),
            ConnectorOrientation::Right => Some(&mut self.right),
            ConnectorOrientation::None => None,
        }
    }
}

impl Persistable for Node {
    fn identity(&self) -> Option<u64> {
        self.id.map(ItemId::get)
    }
}

/// One end of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub node: NodeKey,
    pub orientation: ConnectorOrientation,
}

impl Endpoint {
    pub fn new(node: NodeKey, orientation: ConnectorOrientation) -> Self {
        Self { node, orientation }
    }

    pub fn left(node: NodeKey) -> Self {
        Self::new(node, ConnectorOrientation::Left)
    }

    pub fn right(node: NodeKey) -> Self {
        Self::new(node, ConnectorOrientation::Right)
    }
}

/// A directed link from a source connector to a sink connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    key: ConnectionKey,
    id: Option<ConnectionId>,
    source: Endpoint,
    sink: Endpoint,
}

impl Connection {
    pub fn key(&self) -> ConnectionKey {
        self.key
    }

    /// Persisted identity, `None` until the first save completes
    pub fn id(&self) -> Option<ConnectionId> {
        self.id
    }

    pub fn source(&self) -> Endpoint {
        self.source
    }

    pub fn sink(&self) -> Endpoint {
        self.sink
    }

    /// True if either endpoint belongs to the given node
    pub fn touches(&self, node: NodeKey) -> bool {
        self.source.node == node || self.sink.node == node
    }
}

impl Persistable for Connection {
    fn identity(&self) -> Option<u64> {
        self.id.map(ConnectionId::get)
    }
}

/// A selectable, deletable graph element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    Node(NodeKey),
    Connection(ConnectionKey),
}

/// An entity taken out of the graph by a removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removed {
    Node(Node),
    Connection(Connection),
}

/// The live diagram graph
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: IndexMap<NodeKey, Node>,
    connections: IndexMap<ConnectionKey, Connection>,
    next_node: u32,
    next_connection: u32,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Nodes
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a new, unpersisted node
    pub fn add_node(&mut self, kind: NodeKind) -> NodeKey {
        let key = NodeKey(self.next_node);
        self.next_node += 1;
        self.nodes.insert(key, Node::new(key, kind));
        key
    }

    /// Add a node that already carries a persisted identity
    pub fn add_persisted_node(&mut self, kind: NodeKind, id: ItemId) -> Result<NodeKey> {
        if let Some(holder) = self.find_node_by_id(id) {
            return Err(Error::DuplicateItemId { id, holder });
        }
        let key = self.add_node(kind);
        self.assign_node_id(key, id)?;
        Ok(key)
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(&key)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn find_node_by_id(&self, id: ItemId) -> Option<NodeKey> {
        self.nodes
            .values()
            .find(|node| node.id == Some(id))
            .map(|node| node.key)
    }

    /// Stamp a persisted identity onto a node. Identities never change once
    /// set, and no two nodes hold the same one.
    pub fn assign_node_id(&mut self, key: NodeKey, id: ItemId) -> Result<()> {
        if let Some(holder) = self.find_node_by_id(id).filter(|holder| *holder != key) {
            return Err(Error::DuplicateItemId { id, holder });
        }
        let node = self.nodes.get_mut(&key).ok_or(Error::NodeNotFound(key))?;
        match node.id {
            Some(existing) if existing != id => Err(Error::Validation(format!(
                "node {} already has identity {} (got {})",
                key, existing, id
            ))),
            _ => {
                node.id = Some(id);
                Ok(())
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Connections
    // ─────────────────────────────────────────────────────────────────────────

    /// Wire a new, unpersisted connection between two distinct nodes.
    ///
    /// An endpoint with [`ConnectorOrientation::None`] is accepted but left
    /// unwired; such a connection cannot be saved until it is resolved.
    pub fn connect(&mut self, source: Endpoint, sink: Endpoint) -> Result<ConnectionKey> {
        if source.node == sink.node {
            return Err(Error::SelfConnection(source.node));
        }
        for endpoint in [source, sink] {
            let node = self
                .nodes
                .get(&endpoint.node)
                .ok_or(Error::NodeNotFound(endpoint.node))?;
            if let Some(connector) = node.connector(endpoint.orientation) {
                if connector.is_wired() {
                    return Err(Error::ConnectorOccupied {
                        node: endpoint.node,
                        orientation: endpoint.orientation,
                    });
                }
            }
        }

        let key = ConnectionKey(self.next_connection);
        self.next_connection += 1;

        for endpoint in [source, sink] {
            if let Some(connector) = self
                .nodes
                .get_mut(&endpoint.node)
                .and_then(|node| node.connector_mut(endpoint.orientation))
            {
                connector.connection = Some(key);
            }
        }

        self.connections.insert(
            key,
            Connection {
                key,
                id: None,
                source,
                sink,
            },
        );
        Ok(key)
    }

    /// Wire a connection that already carries a persisted identity
    pub fn connect_persisted(
        &mut self,
        id: ConnectionId,
        source: Endpoint,
        sink: Endpoint,
    ) -> Result<ConnectionKey> {
        if let Some(holder) = self.find_connection_by_id(id) {
            return Err(Error::DuplicateConnectionId { id, holder });
        }
        let key = self.connect(source, sink)?;
        self.assign_connection_id(key, id)?;
        Ok(key)
    }

    pub fn connection(&self, key: ConnectionKey) -> Option<&Connection> {
        self.connections.get(&key)
    }

    /// Connections in insertion order
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Connections with an endpoint on the given node
    pub fn connections_of(&self, node: NodeKey) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.touches(node))
    }

    pub fn find_connection_by_id(&self, id: ConnectionId) -> Option<ConnectionKey> {
        self.connections
            .values()
            .find(|connection| connection.id == Some(id))
            .map(|connection| connection.key)
    }

    /// Stamp a persisted identity onto a connection. Identities never change
    /// once set, and no two connections hold the same one.
    pub fn assign_connection_id(&mut self, key: ConnectionKey, id: ConnectionId) -> Result<()> {
        if let Some(holder) = self
            .find_connection_by_id(id)
            .filter(|holder| *holder != key)
        {
            return Err(Error::DuplicateConnectionId { id, holder });
        }
        let connection = self
            .connections
            .get_mut(&key)
            .ok_or(Error::ConnectionNotFound(key))?;
        match connection.id {
            Some(existing) if existing != id => Err(Error::Validation(format!(
                "connection {} already has identity {} (got {})",
                key, existing, id
            ))),
            _ => {
                connection.id = Some(id);
                Ok(())
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Removal
    // ─────────────────────────────────────────────────────────────────────────

    /// Every node and connection, nodes first
    pub fn elements(&self) -> Vec<Element> {
        self.nodes
            .keys()
            .map(|key| Element::Node(*key))
            .chain(self.connections.keys().map(|key| Element::Connection(*key)))
            .collect()
    }

    pub fn contains(&self, element: Element) -> bool {
        match element {
            Element::Node(key) => self.nodes.contains_key(&key),
            Element::Connection(key) => self.connections.contains_key(&key),
        }
    }

    /// Remove an element. Removing a node also removes every connection
    /// touching it; all removed entities are returned, the node first.
    pub fn remove(&mut self, element: Element) -> Result<Vec<Removed>> {
        match element {
            Element::Connection(key) => {
                let connection = self.remove_connection(key)?;
                Ok(vec![Removed::Connection(connection)])
            }
            Element::Node(key) => {
                if !self.nodes.contains_key(&key) {
                    return Err(Error::NodeNotFound(key));
                }
                let attached: Vec<ConnectionKey> =
                    self.connections_of(key).map(|c| c.key).collect();

                let mut removed = Vec::with_capacity(attached.len() + 1);
                for connection_key in attached {
                    removed.push(Removed::Connection(self.remove_connection(connection_key)?));
                }
                let node = self
                    .nodes
                    .shift_remove(&key)
                    .ok_or(Error::NodeNotFound(key))?;
                removed.insert(0, Removed::Node(node));
                Ok(removed)
            }
        }
    }

    /// Remove a selection. Elements already taken out by an earlier cascade
    /// in the same selection are skipped.
    pub fn remove_all(&mut self, elements: &[Element]) -> Result<Vec<Removed>> {
        let mut removed = Vec::new();
        for element in elements {
            if self.contains(*element) {
                removed.extend(self.remove(*element)?);
            }
        }
        Ok(removed)
    }

    fn remove_connection(&mut self, key: ConnectionKey) -> Result<Connection> {
        let connection = self
            .connections
            .shift_remove(&key)
            .ok_or(Error::ConnectionNotFound(key))?;

        for endpoint in [connection.source, connection.sink] {
            if let Some(connector) = self
                .nodes
                .get_mut(&endpoint.node)
                .and_then(|node| node.connector_mut(endpoint.orientation))
            {
                if connector.connection == Some(key) {
                    connector.connection = None;
                }
            }
        }
        Ok(connection)
    }
}
