//! Connection registry.
//!
//! Holds every live connection together with its role and outbound queue.
//! Liveness flags are always derived by rescanning members, never tracked as
//! counters, so they cannot drift from the actual queue state.

use std::collections::HashMap;

use axum::extract::ws::{Message, Utf8Bytes};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, RwLock};

use crate::error::RelayError;
use crate::types::{ConnectionId, Liveness, Role, RoleCounts, RoleTransition};

/// Frames a connection may have queued before further sends to it fail
pub const OUTBOUND_CAPACITY: usize = 256;

/// Sender half of a connection's outbound queue, drained by its writer task
pub type Outbound = mpsc::Sender<Message>;

/// A registered connection as seen at snapshot time
#[derive(Debug, Clone)]
pub struct Member {
    id: ConnectionId,
    role: Role,
    outbound: Outbound,
}

impl Member {
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Open until the writer task drops the receiving end
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Queue a text frame. Never blocks: a full queue (slow consumer) or a
    /// gone transport both fail this send only.
    pub fn send_text(&self, text: Utf8Bytes) -> Result<(), RelayError> {
        self.outbound
            .try_send(Message::Text(text))
            .map_err(|e| RelayError::SendFailure {
                connection: self.id.clone(),
                reason: match e {
                    TrySendError::Full(_) => "queue full",
                    TrySendError::Closed(_) => "transport closed",
                },
            })
    }
}

pub struct Registry {
    members: RwLock<HashMap<ConnectionId, Member>>,
    liveness: watch::Sender<Liveness>,
}

impl Registry {
    pub fn new() -> Self {
        let (liveness, _rx) = watch::channel(Liveness::default());
        Self {
            members: RwLock::new(HashMap::new()),
            liveness,
        }
    }

    /// Add a connection with the default Display role
    pub async fn register(&self, id: ConnectionId, outbound: Outbound) {
        let mut members = self.members.write().await;
        members.insert(
            id.clone(),
            Member {
                id,
                role: Role::Display,
                outbound,
            },
        );
        self.recompute(&members);
    }

    /// Change a connection's role. Only Display -> Control is ever applied.
    pub async fn set_role(&self, id: &str, role: Role) -> RoleTransition {
        let mut members = self.members.write().await;
        let transition = match members.get_mut(id) {
            None => RoleTransition::Unknown,
            Some(member) if member.role == Role::Display && role == Role::Control => {
                member.role = Role::Control;
                RoleTransition::Promoted
            }
            Some(_) => RoleTransition::Unchanged,
        };
        self.recompute(&members);
        transition
    }

    /// Remove a connection. Returns its last role, or None if it was already gone.
    pub async fn remove(&self, id: &str) -> Option<Role> {
        let mut members = self.members.write().await;
        let removed = members.remove(id).map(|m| m.role);
        self.recompute(&members);
        removed
    }

    /// Point-in-time copy of all members, taken under a single read lock
    pub async fn snapshot(&self) -> Vec<Member> {
        self.members.read().await.values().cloned().collect()
    }

    pub async fn role_of(&self, id: &str) -> Option<Role> {
        self.members.read().await.get(id).map(|m| m.role)
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    /// Open connections per role, counted by a fresh scan
    pub async fn counts(&self) -> RoleCounts {
        let members = self.members.read().await;
        count_open(&members)
    }

    /// Liveness rescanned at query time
    pub async fn liveness(&self) -> Liveness {
        self.counts().await.liveness()
    }

    /// Receiver that observes the flags recomputed after every mutation
    pub fn subscribe(&self) -> watch::Receiver<Liveness> {
        self.liveness.subscribe()
    }

    fn recompute(&self, members: &HashMap<ConnectionId, Member>) {
        let next = count_open(members).liveness();
        self.liveness.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                tracing::debug!(
                    control = next.control_connected,
                    display = next.display_connected,
                    "Liveness changed"
                );
                *current = next;
                true
            }
        });
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn count_open(members: &HashMap<ConnectionId, Member>) -> RoleCounts {
    members
        .values()
        .filter(|m| m.is_open())
        .fold(RoleCounts::default(), |mut counts, m| {
            match m.role {
                Role::Control => counts.controls += 1,
                Role::Display => counts.displays += 1,
            }
            counts
        })
}
