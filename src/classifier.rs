//! Role classification.
//!
//! Roles are inferred, not declared: whichever connection sends a message
//! becomes a control for the rest of its life. A display that echoes or acks
//! anything is promoted too.

use crate::state::Registry;
use crate::types::{Role, RoleTransition};

/// Classify the sender of an inbound message. Returns its role afterwards,
/// or None if the connection is no longer registered.
pub async fn classify(registry: &Registry, id: &str) -> Option<Role> {
    match registry.set_role(id, Role::Control).await {
        RoleTransition::Promoted => {
            tracing::info!(connection = %id, "Connection promoted to control");
            Some(Role::Control)
        }
        RoleTransition::Unchanged => registry.role_of(id).await,
        RoleTransition::Unknown => {
            tracing::warn!(connection = %id, "Message from unregistered connection");
            None
        }
    }
}
