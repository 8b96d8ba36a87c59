//! Flowpad Core - Diagram graph model
//!
//! This crate provides the in-memory diagram graph, the flat record types
//! it is persisted as, and the codec between connector orientations.

pub mod error;
pub mod graph;
pub mod identity;
pub mod kind;
pub mod orientation;
pub mod record;

pub use error::{Error, Result};
pub use graph::{Connection, ConnectionKey, Connector, Element, Endpoint, Graph, Node, NodeKey, Removed};
pub use identity::{ConnectionId, DiagramId, IdKind, ItemId, Persistable};
pub use kind::NodeKind;
pub use orientation::{ConnectorOrientation, Orientation};
pub use record::{DiagramSummary, PersistedConnection, PersistedDiagram, PersistedItem};
