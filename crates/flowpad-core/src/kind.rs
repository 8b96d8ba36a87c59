//! Closed set of diagram item variants

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The concrete kind of a diagram node, stored as a tag on persisted records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Produces data on its right connector
    Source,
    /// Consumes data on its left connector
    Sink,
    /// Configuration step
    Settings,
    /// Persistence step
    Persist,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [Self::Source, Self::Sink, Self::Settings, Self::Persist];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Sink => "sink",
            Self::Settings => "settings",
            Self::Persist => "persist",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| Error::UnknownNodeKind(s.to_string()))
    }
}
