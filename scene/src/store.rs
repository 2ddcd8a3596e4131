//! Scene store: owns every live object and records change events.
//!
//! DESIGN
//! ======
//! Objects live in a `HashMap` keyed by id, with a separate insertion-order
//! list so that name lookups are deterministic (first created wins, as in a
//! host scene that searches its node list front to back).
//!
//! Every mutating method takes the [`Provenance`] of the edit. The store
//! stamps it on the object (`last_edit`) and appends a [`SceneEvent`] to an
//! internal queue. Observers drain the queue on the scene thread, so there
//! is no callback re-entrancy while a mutation is in progress.

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use std::collections::HashMap;

use serde::Serialize;

use crate::object::{DisplayStyle, Geometry, Matrix4, ObjectData, ObjectId, ObjectKind, Provenance, SceneObject};

/// What a mutation changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    /// Content changed: geometry, points, matrix, name, description.
    Modified,
    /// The text of a free-text object was written. Recorded on every write,
    /// even when the text is unchanged.
    TextModified,
    StyleModified,
    /// The driving transform of the object changed.
    TransformChanged,
    ReferenceChanged,
    AttributeChanged,
    VisibilityChanged,
}

/// A recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneEvent {
    pub change: ChangeKind,
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub provenance: Provenance,
}

/// In-memory scene graph.
#[derive(Debug, Default)]
pub struct Scene {
    objects: HashMap<ObjectId, SceneObject>,
    order: Vec<ObjectId>,
    events: Vec<SceneEvent>,
}

impl Scene {
    /// Create an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// First object with `name`, in creation order.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&SceneObject> {
        self.iter().find(|obj| obj.name == name)
    }

    /// First object with both `name` and `kind`, in creation order.
    #[must_use]
    pub fn find_by_name_and_kind(&self, name: &str, kind: ObjectKind) -> Option<ObjectId> {
        self.iter()
            .find(|obj| obj.kind == kind && obj.name == name)
            .map(|obj| obj.id)
    }

    /// All objects in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &SceneObject> {
        self.order.iter().filter_map(|id| self.objects.get(id))
    }

    /// Objects not hidden from ordinary listings.
    pub fn visible_objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.iter().filter(|obj| !obj.hidden)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Create an object of `kind` with default data and return its id.
    pub fn create_object(&mut self, kind: ObjectKind, name: impl Into<String>, provenance: Provenance) -> ObjectId {
        let obj = SceneObject::new(kind, name.into(), provenance);
        let id = obj.id;
        self.objects.insert(id, obj);
        self.order.push(id);
        self.record(ChangeKind::Added, id, kind, provenance);
        id
    }

    /// Remove an object. References to it from other objects are dropped and
    /// objects it was driving lose their transform.
    pub fn remove_object(&mut self, id: ObjectId, provenance: Provenance) -> Option<SceneObject> {
        let removed = self.objects.remove(&id)?;
        self.order.retain(|other| *other != id);

        let mut detached = Vec::new();
        for obj in self.objects.values_mut() {
            for targets in obj.references.values_mut() {
                targets.retain(|target| *target != id);
            }
            obj.references.retain(|_, targets| !targets.is_empty());
            if obj.transform_id == Some(id) {
                obj.transform_id = None;
                obj.last_edit = provenance;
                obj.version += 1;
                detached.push((obj.id, obj.kind));
            }
        }
        for (other, kind) in detached {
            self.record(ChangeKind::TransformChanged, other, kind, provenance);
        }

        self.record(ChangeKind::Removed, id, removed.kind, provenance);
        Some(removed)
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    pub fn set_name(&mut self, id: ObjectId, name: impl Into<String>, provenance: Provenance) -> bool {
        let name = name.into();
        self.update(id, provenance, ChangeKind::Modified, |obj| {
            obj.name = name;
            true
        })
    }

    pub fn set_description(&mut self, id: ObjectId, description: impl Into<String>, provenance: Provenance) -> bool {
        let description = description.into();
        self.update(id, provenance, ChangeKind::Modified, |obj| {
            obj.description = description;
            true
        })
    }

    /// Replace the text of a free-text object.
    pub fn set_text(&mut self, id: ObjectId, value: impl Into<String>, provenance: Provenance) -> bool {
        let value = value.into();
        self.update(id, provenance, ChangeKind::TextModified, |obj| match &mut obj.data {
            ObjectData::Text { text, .. } => {
                *text = value;
                true
            }
            _ => false,
        })
    }

    pub fn set_encoding(&mut self, id: ObjectId, value: u32, provenance: Provenance) -> bool {
        self.update(id, provenance, ChangeKind::Modified, |obj| match &mut obj.data {
            ObjectData::Text { encoding, .. } => {
                *encoding = value;
                true
            }
            _ => false,
        })
    }

    /// Replace the surface of a mesh.
    pub fn set_geometry(&mut self, id: ObjectId, value: Geometry, provenance: Provenance) -> bool {
        self.update(id, provenance, ChangeKind::Modified, |obj| match &mut obj.data {
            ObjectData::Mesh { geometry, .. } => {
                *geometry = value;
                true
            }
            _ => false,
        })
    }

    /// Replace the matrix of a rigid transform.
    pub fn set_matrix(&mut self, id: ObjectId, value: Matrix4, provenance: Provenance) -> bool {
        self.update(id, provenance, ChangeKind::Modified, |obj| match &mut obj.data {
            ObjectData::Transform { matrix } => {
                *matrix = value;
                true
            }
            _ => false,
        })
    }

    /// Replace the control points of an annotation.
    pub fn set_control_points(&mut self, id: ObjectId, points: Vec<[f64; 3]>, provenance: Provenance) -> bool {
        self.update(id, provenance, ChangeKind::Modified, |obj| match &mut obj.data {
            ObjectData::Annotation(annotation) => {
                annotation.control_points = points;
                true
            }
            _ => false,
        })
    }

    /// Set the per-axis radius of a box region.
    pub fn set_radius(&mut self, id: ObjectId, radius: [f64; 3], provenance: Provenance) -> bool {
        self.update(id, provenance, ChangeKind::Modified, |obj| {
            if obj.kind != ObjectKind::BoxRegion {
                return false;
            }
            match &mut obj.data {
                ObjectData::Annotation(annotation) => {
                    annotation.radius = radius;
                    true
                }
                _ => false,
            }
        })
    }

    /// Replace the display style of a mesh or annotation.
    pub fn set_style(&mut self, id: ObjectId, style: DisplayStyle, provenance: Provenance) -> bool {
        self.update(id, provenance, ChangeKind::StyleModified, |obj| match obj.style_mut() {
            Some(current) => {
                *current = style;
                true
            }
            None => false,
        })
    }

    /// Set or clear the transform driving `id`. Fails when the object cannot
    /// be transformed or `transform` is not a rigid transform in this scene.
    pub fn set_transform(&mut self, id: ObjectId, transform: Option<ObjectId>, provenance: Provenance) -> bool {
        if let Some(transform_id) = transform
            && self.get(transform_id).is_none_or(|t| t.kind != ObjectKind::RigidTransform)
        {
            return false;
        }
        if transform == Some(id) {
            return false;
        }
        self.update(id, provenance, ChangeKind::TransformChanged, |obj| {
            if !obj.kind.is_transformable() {
                return false;
            }
            obj.transform_id = transform;
            true
        })
    }

    pub fn set_hidden(&mut self, id: ObjectId, hidden: bool, provenance: Provenance) -> bool {
        self.update(id, provenance, ChangeKind::VisibilityChanged, |obj| {
            obj.hidden = hidden;
            true
        })
    }

    pub fn set_attribute(
        &mut self,
        id: ObjectId,
        key: impl Into<String>,
        value: impl Into<String>,
        provenance: Provenance,
    ) -> bool {
        let (key, value) = (key.into(), value.into());
        self.update(id, provenance, ChangeKind::AttributeChanged, |obj| {
            obj.attributes.insert(key, value);
            true
        })
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, id: ObjectId, key: &str, provenance: Provenance) -> Option<String> {
        let mut previous = None;
        self.update(id, provenance, ChangeKind::AttributeChanged, |obj| {
            previous = obj.attributes.remove(key);
            previous.is_some()
        });
        previous
    }

    /// Add `target` under `role`. Adding an existing reference is a no-op.
    pub fn add_reference(&mut self, id: ObjectId, role: &str, target: ObjectId, provenance: Provenance) -> bool {
        if !self.contains(target) {
            return false;
        }
        self.update(id, provenance, ChangeKind::ReferenceChanged, |obj| {
            let targets = obj.references.entry(role.to_owned()).or_default();
            if targets.contains(&target) {
                return false;
            }
            targets.push(target);
            true
        })
    }

    pub fn remove_reference(&mut self, id: ObjectId, role: &str, target: ObjectId, provenance: Provenance) -> bool {
        self.update(id, provenance, ChangeKind::ReferenceChanged, |obj| {
            let Some(targets) = obj.references.get_mut(role) else {
                return false;
            };
            let before = targets.len();
            targets.retain(|t| *t != target);
            let removed = targets.len() != before;
            if targets.is_empty() {
                obj.references.remove(role);
            }
            removed
        })
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Take every event recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    /// Apply `apply` to an object. When it reports a change, stamp the edit
    /// and record an event.
    fn update(
        &mut self,
        id: ObjectId,
        provenance: Provenance,
        change: ChangeKind,
        apply: impl FnOnce(&mut SceneObject) -> bool,
    ) -> bool {
        let Some(obj) = self.objects.get_mut(&id) else {
            return false;
        };
        if !apply(obj) {
            return false;
        }
        obj.last_edit = provenance;
        obj.version += 1;
        let kind = obj.kind;
        self.record(change, id, kind, provenance);
        true
    }

    fn record(&mut self, change: ChangeKind, id: ObjectId, kind: ObjectKind, provenance: Provenance) {
        self.events.push(SceneEvent { change, id, kind, provenance });
    }
}
