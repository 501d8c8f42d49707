use serde::{Deserialize, Serialize};

/// Opaque ID type for a live connection (ULID string)
pub type ConnectionId = String;

/// Role a connection plays in the relay.
///
/// Every connection starts as `Display`. The first valid message it sends
/// turns it into `Control`, and it stays that way until it disconnects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Display,
    Control,
}

/// Aggregate liveness flags derived from a full registry scan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Liveness {
    pub control_connected: bool,
    pub display_connected: bool,
}

/// Number of open connections per role
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct RoleCounts {
    pub controls: usize,
    pub displays: usize,
}

impl RoleCounts {
    pub fn liveness(&self) -> Liveness {
        Liveness {
            control_connected: self.controls > 0,
            display_connected: self.displays > 0,
        }
    }
}

/// Outcome of a `set_role` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTransition {
    /// The connection moved from Display to Control
    Promoted,
    /// The connection already had the requested role, or the change would demote it
    Unchanged,
    /// No connection with that id is registered
    Unknown,
}
