//! Stable identities assigned by the persisted store

use serde::{Deserialize, Serialize};

macro_rules! identity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

identity!(
    /// Identity of a saved diagram aggregate
    DiagramId
);
identity!(
    /// Identity of a persisted diagram item (node)
    ItemId
);
identity!(
    /// Identity of a persisted connection
    ConnectionId
);

/// Which identity sequence an allocation draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    Diagram,
    Item,
    Connection,
}

impl IdKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diagram => "diagram",
            Self::Item => "item",
            Self::Connection => "connection",
        }
    }
}

impl std::fmt::Display for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that is either new (no identity) or persisted
pub trait Persistable {
    /// The raw identity, if the store has assigned one
    fn identity(&self) -> Option<u64>;

    fn is_persisted(&self) -> bool {
        self.identity().is_some()
    }
}
