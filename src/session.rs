//! Collaboration session: one connector and the objects it mirrors.
//!
//! DESIGN
//! ======
//! The session owns the synchronization set, an ordered list of object ids
//! that are pushed on every relevant change and on connect. Membership is
//! also recorded on each object as an attribute keyed by the session id, so
//! a host can filter its own listings without asking the session.
//!
//! Objects whose kind needs non-native attributes get hidden free-text
//! shadows while they are members. The session creates them on entry,
//! keeps their record text current, and destroys them on exit. A shadow
//! belongs to exactly one session.
//!
//! Change handling skips every event with remote provenance. Without that,
//! an update applied from the wire would be pushed straight back and the
//! two instances would volley it forever.
//!
//! LIFECYCLE
//! =========
//! 1. `set_connector` (or `connector_or_insert_with`) attaches the endpoint
//! 2. `add_to_sync` / `remove_from_sync` manage membership
//! 3. `check_connection` fires `on_connect` when the link comes up
//! 4. `receive` applies inbound frames; `handle_event` routes local edits
//! 5. `teardown` unsynchronizes everything and stops the connector

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::collections::HashMap;

use scene::{ChangeKind, ObjectId, ObjectKind, Provenance, Scene, SceneEvent};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec;
use crate::connector::{ConnectionStatus, Connector, Lifecycle};
use crate::error::ErrorCode;
use crate::references;
use crate::shadow::{ShadowRole, encode_shadow, shadow_name, shadow_roles};

/// Attribute flagging members and shadows to push when the link comes up.
pub const PUSH_ON_CONNECT_ATTR: &str = "pushOnConnect";

/// Value of the membership marker and the push-on-connect flag.
const TRUE: &str = "true";

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("session {0} has no connector")]
    NoConnector(String),
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),
    #[error("object {0} is a shadow and is synchronized with its owner")]
    ShadowObject(ObjectId),
}

impl ErrorCode for SyncError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoConnector(_) => "E_NO_CONNECTOR",
            Self::ObjectNotFound(_) => "E_OBJECT_NOT_FOUND",
            Self::ShadowObject(_) => "E_SHADOW_OBJECT",
        }
    }
}

pub struct Session {
    id: Uuid,
    name: String,
    connector: Option<Box<dyn Connector>>,
    synchronized: Vec<ObjectId>,
    /// Shadow id to owner id, for every shadow this session created.
    shadows: HashMap<ObjectId, ObjectId>,
    was_connected: bool,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            connector: None,
            synchronized: Vec::new(),
            shadows: HashMap::new(),
            was_connected: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute key of the per-object membership marker.
    #[must_use]
    pub fn marker_key(&self) -> String {
        self.id.to_string()
    }

    /// Members in the order they were added.
    #[must_use]
    pub fn synchronized(&self) -> &[ObjectId] {
        &self.synchronized
    }

    #[must_use]
    pub fn is_synchronized(&self, id: ObjectId) -> bool {
        self.synchronized.contains(&id)
    }

    #[must_use]
    pub fn is_shadow(&self, id: ObjectId) -> bool {
        self.shadows.contains_key(&id)
    }

    #[must_use]
    pub fn shadow_count(&self) -> usize {
        self.shadows.len()
    }

    // =========================================================================
    // CONNECTOR
    // =========================================================================

    #[must_use]
    pub fn connector(&self) -> Option<&dyn Connector> {
        self.connector.as_deref()
    }

    pub fn connector_mut(&mut self) -> Option<&mut (dyn Connector + 'static)> {
        self.connector.as_deref_mut()
    }

    /// Attach `connector`, stopping and returning the previous one. Current
    /// members and shadows are registered as outgoing on the new connector.
    pub fn set_connector(&mut self, mut connector: Box<dyn Connector>) -> Option<Box<dyn Connector>> {
        for id in self.synchronized.iter().chain(self.shadows.keys()) {
            connector.register_outgoing(*id);
        }
        let previous = self.connector.replace(connector).map(|mut old| {
            old.stop();
            old
        });
        self.was_connected = false;
        previous
    }

    /// The session's connector, created by `make` on first use.
    pub fn connector_or_insert_with(&mut self, make: impl FnOnce() -> Box<dyn Connector>) -> &mut dyn Connector {
        let members = &self.synchronized;
        let shadows = &self.shadows;
        let connector = self.connector.get_or_insert_with(|| {
            let mut connector = make();
            for id in members.iter().chain(shadows.keys()) {
                connector.register_outgoing(*id);
            }
            connector
        });
        &mut **connector
    }

    fn is_started(&self) -> bool {
        self.connector.as_ref().is_some_and(|c| c.lifecycle() == Lifecycle::Started)
    }

    fn is_connected(&self) -> bool {
        self.connector.as_ref().is_some_and(|c| c.status() == ConnectionStatus::On)
    }

    // =========================================================================
    // MEMBERSHIP
    // =========================================================================

    /// Add `id` to the synchronization set.
    ///
    /// Marks the object, creates its shadows, registers everything as
    /// outgoing, and pushes immediately when the connector is started.
    /// Adding a member again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NoConnector`] before a connector is attached,
    /// [`SyncError::ObjectNotFound`] for an unknown id, and
    /// [`SyncError::ShadowObject`] for a shadow of this session. Nothing is
    /// changed in those cases.
    pub fn add_to_sync(&mut self, scene: &mut Scene, id: ObjectId) -> Result<(), SyncError> {
        if self.connector.is_none() {
            let err = SyncError::NoConnector(self.name.clone());
            warn!(session = %self.name, %id, code = err.error_code(), "sync: no connector, object not added");
            return Err(err);
        }
        if self.is_shadow(id) {
            return Err(SyncError::ShadowObject(id));
        }
        let Some(obj) = scene.get(id) else {
            return Err(SyncError::ObjectNotFound(id));
        };
        if self.is_synchronized(id) {
            return Ok(());
        }
        let (kind, name) = (obj.kind, obj.name.clone());

        scene.set_attribute(id, self.marker_key(), TRUE, Provenance::Local);
        scene.set_attribute(id, PUSH_ON_CONNECT_ATTR, TRUE, Provenance::Local);
        self.synchronized.push(id);

        let mut outgoing = vec![id];
        for role in shadow_roles(kind) {
            outgoing.push(self.ensure_shadow(scene, id, *role));
        }
        if let Some(connector) = self.connector.as_mut() {
            for member in &outgoing {
                connector.register_outgoing(*member);
            }
        }
        info!(session = %self.name, object = %name, ?kind, shadows = outgoing.len() - 1, "sync: object added");

        if self.is_started() {
            self.push_member(scene, id);
        }
        self.refresh_transform_mappings(scene);
        Ok(())
    }

    /// Remove `id` from the synchronization set and destroy its shadows.
    /// Returns `false` when it was not a member.
    pub fn remove_from_sync(&mut self, scene: &mut Scene, id: ObjectId) -> bool {
        let Some(pos) = self.synchronized.iter().position(|member| *member == id) else {
            return false;
        };
        self.synchronized.remove(pos);
        scene.remove_attribute(id, &self.marker_key(), Provenance::Local);
        scene.remove_attribute(id, PUSH_ON_CONNECT_ATTR, Provenance::Local);
        if let Some(connector) = self.connector.as_mut() {
            connector.unregister_outgoing(id);
        }
        let removed = self.destroy_shadows(scene, id);
        info!(session = %self.name, %id, shadows = removed, "sync: object removed");

        self.refresh_transform_mappings(scene);
        true
    }

    /// Destroy every shadow this session created for `owner`.
    fn destroy_shadows(&mut self, scene: &mut Scene, owner: ObjectId) -> usize {
        let owned: Vec<ObjectId> = self
            .shadows
            .iter()
            .filter(|(_, o)| **o == owner)
            .map(|(shadow, _)| *shadow)
            .collect();
        for shadow in &owned {
            self.shadows.remove(shadow);
            let flagged = scene.remove_attribute(*shadow, PUSH_ON_CONNECT_ATTR, Provenance::Local);
            debug!(%shadow, push_on_connect = flagged.is_some(), "sync: destroying shadow");
            if let Some(connector) = self.connector.as_mut() {
                connector.unregister_outgoing(*shadow);
            }
            scene.remove_object(*shadow, Provenance::Local);
        }
        owned.len()
    }

    /// Linked `role` shadow of `owner`, created when missing. The record
    /// text is brought up to date either way.
    fn ensure_shadow(&mut self, scene: &mut Scene, owner: ObjectId, role: ShadowRole) -> ObjectId {
        let shadow = match references::shadow_of(scene, owner, role) {
            Some(shadow) => shadow,
            None => {
                let owner_name = scene.get(owner).map(|o| o.name.clone()).unwrap_or_default();
                let shadow = scene.create_object(ObjectKind::FreeText, shadow_name(&owner_name, role), Provenance::Local);
                scene.set_hidden(shadow, true, Provenance::Local);
                references::link_shadow(scene, owner, shadow, role, Provenance::Local);
                shadow
            }
        };
        scene.set_attribute(shadow, PUSH_ON_CONNECT_ATTR, TRUE, Provenance::Local);
        self.shadows.insert(shadow, owner);
        self.reencode_shadow(scene, owner, role);
        shadow
    }

    /// Recreate every missing shadow of member `owner`, register it, and
    /// push it. Returns the frames pushed.
    fn restore_shadows(&mut self, scene: &mut Scene, owner: ObjectId) -> usize {
        let Some(kind) = scene.get(owner).map(|o| o.kind) else {
            return 0;
        };
        let mut pushed = 0;
        for role in shadow_roles(kind) {
            if references::shadow_of(scene, owner, *role).is_some() {
                continue;
            }
            let shadow = self.ensure_shadow(scene, owner, *role);
            info!(session = %self.name, %owner, %shadow, ?role, "sync: shadow recreated");
            if let Some(connector) = self.connector.as_mut() {
                connector.register_outgoing(shadow);
                pushed += push_shadow(&mut **connector, scene, shadow);
            }
        }
        pushed
    }

    /// Give the shadows of `owner` the names derived from its current name.
    fn rename_shadows(&self, scene: &mut Scene, owner: ObjectId) {
        let Some((kind, owner_name)) = scene.get(owner).map(|o| (o.kind, o.name.clone())) else {
            return;
        };
        for role in shadow_roles(kind) {
            let Some(shadow) = references::shadow_of(scene, owner, *role) else {
                continue;
            };
            let expected = shadow_name(&owner_name, *role);
            if scene.get(shadow).is_some_and(|s| s.name != expected) {
                debug!(session = %self.name, %shadow, name = %expected, "sync: shadow renamed with owner");
                scene.set_name(shadow, expected, Provenance::Local);
            }
        }
    }

    /// Rewrite the `role` shadow text of `owner`. Returns the shadow and
    /// whether its text changed.
    fn reencode_shadow(&self, scene: &mut Scene, owner: ObjectId, role: ShadowRole) -> Option<(ObjectId, bool)> {
        let shadow = references::shadow_of(scene, owner, role)?;
        let record = encode_shadow(scene, scene.get(owner)?, role, &self.synchronized)?;
        let text = record.to_text();
        let changed = scene.get(shadow).and_then(|s| s.text()) != Some(text.as_str());
        if changed {
            scene.set_text(shadow, text, Provenance::Local);
        }
        Some((shadow, changed))
    }

    // =========================================================================
    // PUSHING
    // =========================================================================

    /// Push the native frame of `id` and its flagged shadows.
    fn push_member(&mut self, scene: &Scene, id: ObjectId) -> usize {
        let Some(connector) = self.connector.as_mut() else {
            return 0;
        };
        let Some(obj) = scene.get(id) else {
            return 0;
        };
        let mut pushed = 0;
        if let Some(frame) = codec::encode(obj)
            && connector.push(id, frame)
        {
            pushed += 1;
        }
        for shadow in references::shadows_of(scene, id) {
            pushed += push_shadow(&mut **connector, scene, shadow);
        }
        pushed
    }

    /// Re-push every member flagged for push-on-connect. Returns the number
    /// of frames handed to the connector.
    pub fn on_connect(&mut self, scene: &Scene) -> usize {
        let members: Vec<ObjectId> = self
            .synchronized
            .iter()
            .copied()
            .filter(|id| scene.get(*id).and_then(|o| o.attribute(PUSH_ON_CONNECT_ATTR)) == Some(TRUE))
            .collect();
        let pushed: usize = members.iter().map(|id| self.push_member(scene, *id)).sum();
        info!(session = %self.name, members = members.len(), frames = pushed, "sync: connected, members pushed");
        pushed
    }

    /// Re-encode the shadows of a changed member and push it.
    ///
    /// Changes with remote provenance are ignored. Transform mappings are
    /// rebuilt as well, since the change may have attached or detached a
    /// driving transform.
    pub fn on_object_or_style_changed(&mut self, scene: &mut Scene, id: ObjectId, provenance: Provenance) -> usize {
        if provenance == Provenance::Remote {
            return 0;
        }
        if !self.is_synchronized(id) {
            return 0;
        }
        let Some(kind) = scene.get(id).map(|o| o.kind) else {
            return 0;
        };
        self.rename_shadows(scene, id);
        for role in shadow_roles(kind) {
            self.reencode_shadow(scene, id, *role);
        }
        let mut pushed = self.push_member(scene, id);
        pushed += self.refresh_transform_mappings(scene);
        debug!(session = %self.name, %id, frames = pushed, "sync: change pushed");
        pushed
    }

    /// Rebuild the mapping record of every synchronized transform from
    /// scratch and push the ones whose text changed.
    pub fn refresh_transform_mappings(&mut self, scene: &mut Scene) -> usize {
        let transforms: Vec<ObjectId> = self
            .synchronized
            .iter()
            .copied()
            .filter(|id| scene.get(*id).is_some_and(|o| o.kind == ObjectKind::RigidTransform))
            .collect();
        let mut pushed = 0;
        for transform in transforms {
            if let Some((shadow, true)) = self.reencode_shadow(scene, transform, ShadowRole::Metadata)
                && let Some(connector) = self.connector.as_mut()
            {
                pushed += push_shadow(&mut **connector, scene, shadow);
            }
        }
        pushed
    }

    // =========================================================================
    // EVENT LOOP
    // =========================================================================

    /// Fire [`Session::on_connect`] when the link has come up since the last
    /// check. Returns the frames pushed on a transition.
    pub fn check_connection(&mut self, scene: &Scene) -> Option<usize> {
        let connected = self.is_connected();
        let fired = connected && !self.was_connected;
        if self.was_connected && !connected {
            info!(session = %self.name, "sync: link down");
        }
        self.was_connected = connected;
        fired.then(|| self.on_connect(scene))
    }

    /// Apply every inbound frame. Returns the number of frames polled.
    pub fn receive(&mut self, scene: &mut Scene) -> usize {
        let Some(connector) = self.connector.as_mut() else {
            return 0;
        };
        let frames = connector.poll();
        for frame in &frames {
            codec::decode(scene, frame);
        }
        frames.len()
    }

    /// Route one scene event. Returns the number of frames pushed.
    pub fn handle_event(&mut self, scene: &mut Scene, event: &SceneEvent) -> usize {
        if event.provenance == Provenance::Remote {
            return 0;
        }
        match event.change {
            ChangeKind::Removed => self.forget(scene, event.id),
            ChangeKind::Modified
            | ChangeKind::TextModified
            | ChangeKind::StyleModified
            | ChangeKind::TransformChanged => {
                self.on_object_or_style_changed(scene, event.id, event.provenance)
            }
            _ => 0,
        }
    }

    /// Drop bookkeeping for an object that left the scene. A shadow whose
    /// owner is still a member is recreated. Returns the frames pushed.
    fn forget(&mut self, scene: &mut Scene, id: ObjectId) -> usize {
        if let Some(owner) = self.shadows.remove(&id) {
            debug!(session = %self.name, shadow = %id, %owner, "sync: shadow removed from scene");
            if let Some(connector) = self.connector.as_mut() {
                connector.unregister_outgoing(id);
            }
            if !self.is_synchronized(owner) {
                return 0;
            }
            return self.restore_shadows(scene, owner);
        }
        if let Some(pos) = self.synchronized.iter().position(|member| *member == id) {
            self.synchronized.remove(pos);
            if let Some(connector) = self.connector.as_mut() {
                connector.unregister_outgoing(id);
            }
            self.destroy_shadows(scene, id);
            let pushed = self.refresh_transform_mappings(scene);
            info!(session = %self.name, %id, "sync: member removed from scene");
            return pushed;
        }
        0
    }

    /// Unsynchronize every member, destroy every shadow, and stop the
    /// connector.
    pub fn teardown(&mut self, scene: &mut Scene) {
        for id in self.synchronized.clone() {
            self.remove_from_sync(scene, id);
        }
        let orphans: Vec<ObjectId> = self.shadows.keys().copied().collect();
        for shadow in orphans {
            self.shadows.remove(&shadow);
            scene.remove_object(shadow, Provenance::Local);
        }
        if let Some(mut connector) = self.connector.take() {
            connector.stop();
        }
        self.was_connected = false;
        info!(session = %self.name, "sync: session torn down");
    }
}

fn push_shadow(connector: &mut dyn Connector, scene: &Scene, shadow: ObjectId) -> usize {
    let Some(obj) = scene.get(shadow) else {
        return 0;
    };
    if obj.attribute(PUSH_ON_CONNECT_ATTR) != Some(TRUE) {
        return 0;
    }
    let Some(text) = obj.text() else {
        return 0;
    };
    usize::from(connector.push(shadow, codec::encode_text(&obj.name, text)))
}
