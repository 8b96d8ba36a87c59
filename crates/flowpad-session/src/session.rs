//! Session coordinator
//!
//! A [`Session`] owns the live graph and runs saves and loads as two-phase
//! units of work: `submit_*` validates the request, marks the session busy and
//! hands the persistence work to tokio's blocking pool; `complete_*` awaits
//! the result back on the caller's side. Session state (graph, busy flag,
//! saved diagram list) is only mutated by the session itself, never by the
//! worker.
//!
//! The busy flag is held by the [`Pending`] handle and cleared when that
//! handle is completed, whether the work succeeded or failed, or dropped.

use crate::cascade::Removal;
use crate::error::{SessionError, SessionResult};
use crate::notify::Notifier;
use crate::reconstruct::Reconstructor;
use crate::snapshot::{Snapshot, SnapshotBuilder};
use flowpad_core::{DiagramId, Element, Graph, Removed};
use flowpad_storage::DiagramStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

const EMPTY_DIAGRAM_MESSAGE: &str = "There must be at least one item in order to save a diagram";
const NO_SELECTION_MESSAGE: &str = "You need to select a diagram to load";

/// Keeps the session busy until dropped
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Handle to a save or load running off the session.
///
/// Dropping it without completing frees the session but does not stop the
/// worker; a dropped save may still write its records, and its result is
/// never applied to the live graph.
#[must_use = "a submitted unit of work must be completed to apply its result"]
pub struct Pending<T> {
    handle: JoinHandle<SessionResult<T>>,
    removals: usize,
    _busy: BusyGuard,
}

impl<T> Pending<T> {
    /// True once the worker has finished; completing it will not wait
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    async fn wait(self) -> SessionResult<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(SessionError::Worker(e.to_string())),
        }
    }
}

/// An editing session over one live diagram graph
pub struct Session {
    store: Arc<dyn DiagramStore>,
    notifier: Arc<dyn Notifier>,
    graph: Graph,
    busy: Arc<AtomicBool>,
    saved_diagrams: Vec<DiagramId>,
    selected: Option<DiagramId>,
    current: Option<DiagramId>,
    removals: Vec<Removal>,
}

impl Session {
    /// Create a session and read the list of saved diagrams
    pub fn new(store: Arc<dyn DiagramStore>, notifier: Arc<dyn Notifier>) -> SessionResult<Self> {
        let saved_diagrams = store
            .fetch_all_diagram_summaries()?
            .into_iter()
            .map(|summary| summary.id)
            .collect();

        Ok(Self {
            store,
            notifier,
            graph: Graph::new(),
            busy: Arc::new(AtomicBool::new(false)),
            saved_diagrams,
            selected: None,
            current: None,
            removals: Vec::new(),
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access for adding nodes and connections. Deletions must go
    /// through [`Session::delete`] so the next save can replay them.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// True while a submitted save or load has been neither completed nor
    /// dropped
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn mark_busy(&self) -> BusyGuard {
        self.busy.store(true, Ordering::SeqCst);
        BusyGuard(Arc::clone(&self.busy))
    }

    pub fn saved_diagrams(&self) -> &[DiagramId] {
        &self.saved_diagrams
    }

    /// Re-read the saved diagram list from the store
    pub fn refresh_saved_diagrams(&mut self) -> SessionResult<()> {
        self.saved_diagrams = self
            .store
            .fetch_all_diagram_summaries()?
            .into_iter()
            .map(|summary| summary.id)
            .collect();
        Ok(())
    }

    /// Choose the diagram the next load reads
    pub fn select_diagram(&mut self, id: Option<DiagramId>) {
        self.selected = id;
    }

    pub fn selected_diagram(&self) -> Option<DiagramId> {
        self.selected
    }

    /// The saved diagram the live graph was loaded from or last saved to
    pub fn current_diagram(&self) -> Option<DiagramId> {
        self.current
    }

    /// Persisted entities deleted since the last save or load
    pub fn pending_removals(&self) -> &[Removal] {
        &self.removals
    }

    /// Start over with an empty, unsaved diagram
    pub fn new_diagram(&mut self) -> SessionResult<()> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }
        self.graph = Graph::new();
        self.removals.clear();
        self.selected = None;
        self.current = None;
        Ok(())
    }

    /// Delete a selection from the live graph. Deleting a node also deletes
    /// its connections; persisted entities are remembered for the next save.
    pub fn delete(&mut self, elements: &[Element]) -> SessionResult<Vec<Removed>> {
        let removed = self.graph.remove_all(elements)?;
        self.removals
            .extend(removed.iter().filter_map(Removal::from_removed));
        tracing::debug!(
            "Deleted {} elements ({} pending removals)",
            removed.len(),
            self.removals.len()
        );
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Save
    // ─────────────────────────────────────────────────────────────────────────

    /// Start saving the live graph. Must be called within a tokio runtime.
    pub fn submit_save(&mut self) -> SessionResult<Pending<Snapshot>> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }
        if self.graph.is_empty() {
            self.notifier.show_error(EMPTY_DIAGRAM_MESSAGE);
            return Err(SessionError::Validation(EMPTY_DIAGRAM_MESSAGE.to_string()));
        }

        let busy = self.mark_busy();
        let store = Arc::clone(&self.store);
        let graph = self.graph.clone();
        let prior = self.current;
        let removals = self.removals.clone();
        tracing::debug!(
            "Submitting save of {} nodes over {:?}",
            graph.node_count(),
            prior
        );

        let handle = tokio::task::spawn_blocking(move || {
            SnapshotBuilder::new(store.as_ref()).build(&graph, prior, &removals)
        });
        Ok(Pending {
            handle,
            removals: self.removals.len(),
            _busy: busy,
        })
    }

    /// Finish a save: stamp assigned identities onto the live graph and
    /// record the diagram as saved
    pub async fn complete_save(&mut self, pending: Pending<Snapshot>) -> SessionResult<DiagramId> {
        let replayed = pending.removals;
        let result = pending.wait().await;

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("Saving diagram failed: {}", e);
                return Err(e);
            }
        };

        for (key, id) in &snapshot.node_ids {
            if self.graph.node(*key).is_some() {
                self.graph.assign_node_id(*key, *id)?;
            }
        }
        for (key, id) in &snapshot.connection_ids {
            if self.graph.connection(*key).is_some() {
                self.graph.assign_connection_id(*key, *id)?;
            }
        }

        self.removals.drain(..replayed.min(self.removals.len()));
        let id = snapshot.diagram_id;
        if !self.saved_diagrams.contains(&id) {
            self.saved_diagrams.push(id);
        }
        self.current = Some(id);
        self.selected = Some(id);

        self.notifier
            .show_information(&format!("Finished saving diagram {}", id));
        Ok(id)
    }

    /// Save the live graph and wait for the result
    pub async fn save(&mut self) -> SessionResult<DiagramId> {
        let pending = self.submit_save()?;
        self.complete_save(pending).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Load
    // ─────────────────────────────────────────────────────────────────────────

    /// Start loading the selected diagram. Must be called within a tokio runtime.
    pub fn submit_load(&mut self) -> SessionResult<Pending<(DiagramId, Graph)>> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }
        let Some(id) = self.selected else {
            self.notifier.show_error(NO_SELECTION_MESSAGE);
            return Err(SessionError::Validation(NO_SELECTION_MESSAGE.to_string()));
        };

        let busy = self.mark_busy();
        let store = Arc::clone(&self.store);
        tracing::debug!("Submitting load of diagram {}", id);

        let handle = tokio::task::spawn_blocking(move || {
            Reconstructor::new(store.as_ref())
                .rebuild(id)
                .map(|graph| (id, graph))
        });
        Ok(Pending {
            handle,
            removals: 0,
            _busy: busy,
        })
    }

    /// Finish a load: replace the live graph with the rebuilt one
    pub async fn complete_load(
        &mut self,
        pending: Pending<(DiagramId, Graph)>,
    ) -> SessionResult<DiagramId> {
        let result = pending.wait().await;

        let (id, graph) = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!("Loading diagram failed: {}", e);
                return Err(e);
            }
        };

        self.graph = graph;
        self.current = Some(id);
        self.removals.clear();

        self.notifier
            .show_information(&format!("Finished loading diagram {}", id));
        Ok(id)
    }

    /// Load the selected diagram and wait for the result
    pub async fn load(&mut self) -> SessionResult<DiagramId> {
        let pending = self.submit_load()?;
        self.complete_load(pending).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowpad_core::{
        ConnectionId, ConnectorOrientation, Endpoint, IdKind, ItemId, NodeKey, NodeKind,
        Orientation, PersistedConnection, PersistedDiagram, PersistedItem,
    };
    use flowpad_storage::{MemoryStore, RedbStore, StorageError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        errors: Mutex<Vec<String>>,
        information: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn show_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }

        fn show_information(&self, message: &str) {
            self.information.lock().unwrap().push(message.to_string());
        }
    }

    fn session_with(store: Arc<MemoryStore>) -> (Session, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let session = Session::new(store, notifier.clone()).unwrap();
        (session, notifier)
    }

    /// A (source) right -> B (sink) left
    fn draw_source_to_sink(session: &mut Session) -> (NodeKey, NodeKey) {
        let graph = session.graph_mut();
        let a = graph.add_node(NodeKind::Source);
        let b = graph.add_node(NodeKind::Sink);
        graph.connect(Endpoint::right(a), Endpoint::left(b)).unwrap();
        (a, b)
    }

    /// (kind, wiring by position) view of a graph, independent of identities
    type Wiring = Vec<(usize, ConnectorOrientation, usize, ConnectorOrientation)>;

    fn topology(graph: &Graph) -> (Vec<NodeKind>, Wiring) {
        let keys: Vec<NodeKey> = graph.nodes().map(|n| n.key()).collect();
        let position = |key: NodeKey| keys.iter().position(|k| *k == key).unwrap();
        let kinds = graph.nodes().map(|n| n.kind()).collect();
        let wires = graph
            .connections()
            .map(|c| {
                (
                    position(c.source().node),
                    c.source().orientation,
                    position(c.sink().node),
                    c.sink().orientation,
                )
            })
            .collect();
        (kinds, wires)
    }

    #[tokio::test]
    async fn test_save_empty_graph_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, notifier) = session_with(store.clone());
        let before = store.operation_count();

        let err = session.save().await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
        assert_eq!(store.operation_count(), before);
        assert!(!session.is_busy());
        assert_eq!(notifier.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_without_selection_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, notifier) = session_with(store.clone());
        let before = store.operation_count();

        let err = session.load().await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
        assert_eq!(store.operation_count(), before);
        assert!(!session.is_busy());
        assert_eq!(
            notifier.errors.lock().unwrap().as_slice(),
            [NO_SELECTION_MESSAGE.to_string()]
        );
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, notifier) = session_with(store.clone());
        draw_source_to_sink(&mut session);
        let original = topology(session.graph());

        let id = session.save().await.unwrap();
        assert_eq!(session.saved_diagrams(), &[id]);
        assert_eq!(session.current_diagram(), Some(id));
        assert!(session.graph().nodes().all(|n| n.id().is_some()));
        assert_eq!(
            notifier.information.lock().unwrap().as_slice(),
            [format!("Finished saving diagram {}", id)]
        );

        // a fresh session sees the saved diagram and rebuilds the same wiring
        let (mut other, _) = session_with(store.clone());
        assert_eq!(other.saved_diagrams(), &[id]);
        other.select_diagram(Some(id));
        other.load().await.unwrap();
        assert_eq!(topology(other.graph()), original);

        let a = other.graph().nodes().next().unwrap();
        assert_eq!(a.kind(), NodeKind::Source);
        assert!(a.right().is_wired());
        assert!(!a.left().is_wired());
    }

    #[tokio::test]
    async fn test_resave_keeps_identities() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _) = session_with(store.clone());
        draw_source_to_sink(&mut session);

        let first = session.save().await.unwrap();
        let nodes_first: Vec<_> = session.graph().nodes().map(|n| n.id()).collect();
        let connections_first: Vec<_> = session.graph().connections().map(|c| c.id()).collect();

        let second = session.save().await.unwrap();
        let nodes_second: Vec<_> = session.graph().nodes().map(|n| n.id()).collect();
        let connections_second: Vec<_> = session.graph().connections().map(|c| c.id()).collect();

        assert_eq!(first, second);
        assert_eq!(nodes_first, nodes_second);
        assert_eq!(connections_first, connections_second);
        assert_eq!(session.saved_diagrams().len(), 1);
        assert_eq!(store.item_count().unwrap(), 2);
        assert_eq!(store.connection_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_loaded_graph_resaves_in_place() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _) = session_with(store.clone());
        draw_source_to_sink(&mut session);
        let id = session.save().await.unwrap();

        let (mut other, _) = session_with(store.clone());
        other.select_diagram(Some(id));
        other.load().await.unwrap();
        let before: Vec<_> = other.graph().nodes().map(|n| n.id()).collect();

        assert_eq!(other.save().await.unwrap(), id);
        let after: Vec<_> = other.graph().nodes().map(|n| n.id()).collect();
        assert_eq!(before, after);
        assert_eq!(store.item_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_node_cascades_on_resave() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _) = session_with(store.clone());
        let (a, _) = draw_source_to_sink(&mut session);
        let id = session.save().await.unwrap();
        let a_id = session.graph().node(a).unwrap().id().unwrap();

        session.delete(&[Element::Node(a)]).unwrap();
        assert_eq!(session.pending_removals().len(), 2);
        session.save().await.unwrap();
        assert!(session.pending_removals().is_empty());

        let diagram = store.fetch_diagram(id).unwrap();
        assert_eq!(diagram.items.len(), 1);
        assert_eq!(diagram.items[0].kind, NodeKind::Sink);
        assert!(diagram.connection_ids.is_empty());
        assert_eq!(store.connection_count().unwrap(), 0);
        assert!(matches!(
            store.fetch_diagram_item(a_id),
            Err(StorageError::ItemNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_no_saved_connection_names_deleted_nodes() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _) = session_with(store.clone());
        let graph = session.graph_mut();
        let hub = graph.add_node(NodeKind::Settings);
        let left = graph.add_node(NodeKind::Source);
        let right = graph.add_node(NodeKind::Sink);
        let spare = graph.add_node(NodeKind::Persist);
        graph.connect(Endpoint::right(left), Endpoint::left(hub)).unwrap();
        graph.connect(Endpoint::right(hub), Endpoint::left(right)).unwrap();
        graph.connect(Endpoint::right(right), Endpoint::left(spare)).unwrap();
        let id = session.save().await.unwrap();
        let hub_id = session.graph().node(hub).unwrap().id().unwrap();

        session.delete(&[Element::Node(hub)]).unwrap();
        session.save().await.unwrap();

        let diagram = store.fetch_diagram(id).unwrap();
        assert_eq!(diagram.items.len(), 3);
        assert_eq!(diagram.connection_ids.len(), 1);
        for connection_id in &diagram.connection_ids {
            let connection = store.fetch_connection(*connection_id).unwrap();
            assert!(!connection.touches(hub_id));
        }
    }

    #[tokio::test]
    async fn test_storage_failure_clears_busy() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, notifier) = session_with(store.clone());
        let (a, _) = draw_source_to_sink(&mut session);
        session.save().await.unwrap();
        session.delete(&[Element::Node(a)]).unwrap();

        store.set_fail_writes(true);
        let err = session.save().await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
        assert!(!session.is_busy());
        // the deletions are kept for the next attempt
        assert_eq!(session.pending_removals().len(), 2);
        assert_eq!(notifier.information.lock().unwrap().len(), 1);

        store.set_fail_writes(false);
        session.save().await.unwrap();
        assert!(session.pending_removals().is_empty());
    }

    #[tokio::test]
    async fn test_busy_session_rejects_overlapping_work() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _) = session_with(store.clone());
        draw_source_to_sink(&mut session);

        let pending = session.submit_save().unwrap();
        assert!(session.is_busy());
        session.select_diagram(Some(DiagramId(1)));
        assert!(matches!(session.submit_load(), Err(SessionError::Busy)));
        assert!(matches!(session.submit_save(), Err(SessionError::Busy)));

        session.complete_save(pending).await.unwrap();
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_dropped_pending_frees_session() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, notifier) = session_with(store.clone());
        draw_source_to_sink(&mut session);

        let pending = session.submit_save().unwrap();
        assert!(session.is_busy());
        drop(pending);
        assert!(!session.is_busy());

        // the abandoned result is never stamped onto the graph
        assert!(session.graph().nodes().all(|n| n.id().is_none()));
        assert!(notifier.information.lock().unwrap().is_empty());

        session.new_diagram().unwrap();
        session.graph_mut().add_node(NodeKind::Settings);
        session.save().await.unwrap();
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_live_graph() {
        let store = Arc::new(MemoryStore::new());

        // a saved diagram whose connection lost its sink side
        let mut diagram = PersistedDiagram::new();
        for (id, kind) in [(1, NodeKind::Source), (2, NodeKind::Sink)] {
            let item = PersistedItem::new(ItemId(id), kind);
            store.save_diagram_item(&item).unwrap();
            diagram.items.push(item);
        }
        store
            .save_connection(&PersistedConnection {
                connection_id: ConnectionId(3),
                source_item_id: ItemId(1),
                source_side: Orientation::Right,
                source_kind: NodeKind::Source,
                sink_item_id: ItemId(2),
                sink_side: Orientation::None,
                sink_kind: NodeKind::Sink,
            })
            .unwrap();
        diagram.connection_ids.push(ConnectionId(3));
        let id = store.save_diagram(&diagram).unwrap();

        let (mut session, _) = session_with(store.clone());
        session.graph_mut().add_node(NodeKind::Persist);
        session.select_diagram(Some(id));

        let err = session.load().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Graph(flowpad_core::Error::CorruptConnectorOrientation { .. })
        ));
        assert!(!session.is_busy());
        assert_eq!(session.graph().node_count(), 1);
        assert_eq!(session.current_diagram(), None);
    }

    #[tokio::test]
    async fn test_new_diagram_saves_separately() {
        let store = Arc::new(MemoryStore::new());
        let (mut session, _) = session_with(store.clone());
        draw_source_to_sink(&mut session);
        let first = session.save().await.unwrap();

        session.new_diagram().unwrap();
        session.graph_mut().add_node(NodeKind::Settings);
        let second = session.save().await.unwrap();

        assert_ne!(first, second);
        assert_eq!(session.saved_diagrams(), &[first, second]);
        assert_eq!(store.fetch_diagram(first).unwrap().items.len(), 2);
        assert_eq!(store.allocate_id(IdKind::Diagram).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_roundtrip_through_redb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flowpad.redb");
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::default());

        let id = {
            let store: Arc<dyn DiagramStore> = Arc::new(RedbStore::open(&path).unwrap());
            let mut session = Session::new(store, notifier.clone()).unwrap();
            let graph = session.graph_mut();
            let a = graph.add_node(NodeKind::Source);
            let b = graph.add_node(NodeKind::Settings);
            let c = graph.add_node(NodeKind::Sink);
            graph.connect(Endpoint::right(a), Endpoint::left(b)).unwrap();
            graph.connect(Endpoint::right(b), Endpoint::left(c)).unwrap();
            session.save().await.unwrap()
        };

        let store: Arc<dyn DiagramStore> = Arc::new(RedbStore::open(&path).unwrap());
        let mut session = Session::new(store, notifier).unwrap();
        assert_eq!(session.saved_diagrams(), &[id]);
        session.select_diagram(Some(id));
        session.load().await.unwrap();

        let (kinds, wires) = topology(session.graph());
        assert_eq!(kinds, vec![NodeKind::Source, NodeKind::Settings, NodeKind::Sink]);
        assert_eq!(
            wires,
            vec![
                (0, ConnectorOrientation::Right, 1, ConnectorOrientation::Left),
                (1, ConnectorOrientation::Right, 2, ConnectorOrientation::Left),
            ]
        );
    }
}
