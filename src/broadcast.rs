//! Broadcast dispatch from control connections to display connections.

use axum::extract::ws::Utf8Bytes;
use serde_json::value::RawValue;
use serde_json::Value;

use crate::classifier::classify;
use crate::error::RelayResult;
use crate::state::Registry;
use crate::types::Role;

/// What happened to one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Sent to every open display in the snapshot
    Broadcast { delivered: usize, failed: usize },
    /// Sender was not a control (or no longer registered); nothing was sent
    Suppressed,
}

/// Handle one inbound payload from `from`.
///
/// Malformed JSON is returned as an error before classification, so the
/// sender's role and the registry are left untouched.
pub async fn dispatch(registry: &Registry, from: &str, payload: &[u8]) -> RelayResult<Dispatch> {
    let frame = encode_frame(payload)?;

    if classify(registry, from).await != Some(Role::Control) {
        return Ok(Dispatch::Suppressed);
    }

    let mut delivered = 0;
    let mut failed = 0;

    for member in registry.snapshot().await {
        if member.id() == from || member.role() != Role::Display || !member.is_open() {
            continue;
        }
        match member.send_text(frame.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::debug!("{}", e);
                failed += 1;
            }
        }
    }

    tracing::debug!(from = %from, delivered, failed, "Broadcast dispatched");
    Ok(Dispatch::Broadcast { delivered, failed })
}

/// Compact re-serialization of an inbound payload.
///
/// `RawValue` accepts anything the JSON grammar allows. Numbers keep their
/// original text (`arbitrary_precision`) and object keys their order
/// (`preserve_order`). Strings `Value` cannot hold, such as lone surrogate
/// escapes, are forwarded exactly as received.
fn encode_frame(payload: &[u8]) -> RelayResult<Utf8Bytes> {
    let raw: &RawValue = serde_json::from_slice(payload)?;
    let text = match serde_json::from_str::<Value>(raw.get()) {
        Ok(value) => serde_json::to_string(&value)?,
        Err(_) => raw.get().to_string(),
    };
    Ok(text.into())
}
