//! Flowpad Session - Diagram save/load engine
//!
//! Converts the live diagram graph into flat persisted records and back,
//! keeping node and connection identities stable across repeated saves and
//! cascading deletions into the saved aggregate.

pub mod cascade;
pub mod error;
pub mod identity;
pub mod notify;
pub mod reconstruct;
pub mod session;
pub mod snapshot;

pub use cascade::{CascadeResolver, Removal};
pub use error::{SessionError, SessionResult};
pub use identity::IdentityRegistry;
pub use notify::{Notifier, TracingNotifier};
pub use reconstruct::Reconstructor;
pub use session::{Pending, Session};
pub use snapshot::{Snapshot, SnapshotBuilder};
