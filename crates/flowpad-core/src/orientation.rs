//! Connector orientation codec
//!
//! The graph speaks [`ConnectorOrientation`], persisted records speak
//! [`Orientation`]. The two `From` impls are the codec; both are total.

use crate::error::{Error, Result};
use crate::identity::ConnectionId;
use serde::{Deserialize, Serialize};

/// Side of a node a connector sits on, as the in-memory graph sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectorOrientation {
    /// Not yet attached to a side
    #[default]
    None,
    Left,
    Right,
}

impl ConnectorOrientation {
    pub fn is_attached(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl std::fmt::Display for ConnectorOrientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of a node a connection endpoint attaches to, as stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    None,
    Left,
    Right,
}

impl Orientation {
    /// Decode for attachment to a node. `None` is never a valid side on a
    /// reconstructed connector.
    pub fn attach(self, connection_id: ConnectionId) -> Result<ConnectorOrientation> {
        match ConnectorOrientation::from(self) {
            ConnectorOrientation::None => Err(Error::CorruptConnectorOrientation { connection_id }),
            side => Ok(side),
        }
    }
}

impl From<ConnectorOrientation> for Orientation {
    fn from(value: ConnectorOrientation) -> Self {
        match value {
            ConnectorOrientation::None => Self::None,
            ConnectorOrientation::Left => Self::Left,
            ConnectorOrientation::Right => Self::Right,
        }
    }
}

impl From<Orientation> for ConnectorOrientation {
    fn from(value: Orientation) -> Self {
        match value {
            Orientation::None => Self::None,
            Orientation::Left => Self::Left,
            Orientation::Right => Self::Right,
        }
    }
}
