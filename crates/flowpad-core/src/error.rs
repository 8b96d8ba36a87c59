//! Error types for Flowpad Core

use crate::graph::{ConnectionKey, NodeKey};
use crate::identity::{ConnectionId, ItemId};
use crate::orientation::ConnectorOrientation;
use thiserror::Error;

/// Result type alias using Flowpad's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Flowpad error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Found invalid persisted connector orientation for connection {connection_id}")]
    CorruptConnectorOrientation { connection_id: ConnectionId },

    #[error("Connection {connection_id} references item {item_id} which is not part of the diagram")]
    DanglingEndpointReference {
        connection_id: ConnectionId,
        item_id: ItemId,
    },

    #[error("Connection endpoint on node {node} has no left/right side")]
    UnencodableSide { node: NodeKey },

    #[error("Connection {connection} references node {node} which is not in the graph")]
    EndpointNotInGraph {
        connection: ConnectionKey,
        node: NodeKey,
    },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeKey),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionKey),

    #[error("Cannot connect node {0} to itself")]
    SelfConnection(NodeKey),

    #[error("Connector {orientation} of node {node} is already wired")]
    ConnectorOccupied {
        node: NodeKey,
        orientation: ConnectorOrientation,
    },

    #[error("Item {id} is already held by node {holder}")]
    DuplicateItemId { id: ItemId, holder: NodeKey },

    #[error("Connection {id} is already held by connection {holder}")]
    DuplicateConnectionId {
        id: ConnectionId,
        holder: ConnectionKey,
    },

    #[error("Unknown node kind: {0} (expected one of source, sink, settings, persist)")]
    UnknownNodeKind(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
