//! Resolution of incoming messages to local objects.
//!
//! Both instances allocate ids independently, so the cross-instance key is
//! the pair (name, kind). An object with the right name but another kind
//! does not match; a second object is created next to it.

#[cfg(test)]
#[path = "resolve_test.rs"]
mod tests;

use scene::{ObjectId, ObjectKind, Provenance, Scene};
use tracing::debug;

/// Name used for messages whose sender left the name empty.
pub const DEFAULT_DEVICE_NAME: &str = "OpenIGTLink";

/// Description stamped on objects created from incoming messages.
pub const RECEIVED_DESCRIPTION: &str = "Received from collaboration peer";

/// Effective object name for a wire device name.
#[must_use]
pub fn resolve_name(device_name: &str) -> &str {
    if device_name.is_empty() { DEFAULT_DEVICE_NAME } else { device_name }
}

/// Outcome of a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub id: ObjectId,
    pub created: bool,
}

/// Find the object keyed by (`name`, `kind`) or create it.
///
/// New objects carry remote provenance. Free-text objects start hidden until
/// their content shows they are meant to be seen.
pub fn resolve_or_create(scene: &mut Scene, name: &str, kind: ObjectKind) -> Resolved {
    if let Some(id) = scene.find_by_name_and_kind(name, kind) {
        return Resolved { id, created: false };
    }
    if let Some(existing) = scene.get_by_name(name) {
        debug!(name, existing = ?existing.kind, incoming = ?kind, "resolve: name taken by another kind");
    }
    let id = scene.create_object(kind, name, Provenance::Remote);
    scene.set_description(id, RECEIVED_DESCRIPTION, Provenance::Remote);
    if kind == ObjectKind::FreeText {
        scene.set_hidden(id, true, Provenance::Remote);
    }
    debug!(name, ?kind, %id, "resolve: created object");
    Resolved { id, created: true }
}
