//! Relationships that must survive arbitrary message arrival order.
//!
//! DESIGN
//! ======
//! Three relationships are kept:
//!
//! - object to driving transform: set when a transform mapping record
//!   names the object. Names that are not present yet are skipped; the
//!   sender re-pushes the full mapping on every membership change, which
//!   heals the gap.
//! - owner to style shadow, and owner to metadata shadow: a reference from
//!   the owner under the role's reference name plus a `shadowOwner`
//!   back-reference on the shadow. Once linked, lookups go through the
//!   references. Before that (a shadow that arrived ahead of its owner) the
//!   shadow is found by its conventional name.
//!
//! All updates happen eagerly, while the message that carries them is
//! applied.

#[cfg(test)]
#[path = "references_test.rs"]
mod tests;

use scene::{ObjectId, ObjectKind, Provenance, Scene};
use tracing::debug;

use crate::record::{Record, RecordError, parse_list};
use crate::shadow::{self, Incoming, ShadowRole, Superclass, TRANSFORM_NAME_ATTR, TRANSFORMED_NODES_ATTR};

/// Back-reference from a shadow to its owner.
pub const SHADOW_OWNER_ROLE: &str = "shadowOwner";

/// Link `shadow` to `owner` in both directions.
pub fn link_shadow(scene: &mut Scene, owner: ObjectId, shadow: ObjectId, role: ShadowRole, provenance: Provenance) {
    scene.add_reference(owner, role.reference_role(), shadow, provenance);
    scene.add_reference(shadow, SHADOW_OWNER_ROLE, owner, provenance);
}

/// Linked `role` shadow of `owner`.
#[must_use]
pub fn shadow_of(scene: &Scene, owner: ObjectId, role: ShadowRole) -> Option<ObjectId> {
    scene.get(owner)?.referenced(role.reference_role()).first().copied()
}

/// Every linked shadow of `owner`.
#[must_use]
pub fn shadows_of(scene: &Scene, owner: ObjectId) -> Vec<ObjectId> {
    [ShadowRole::Metadata, ShadowRole::Style]
        .into_iter()
        .filter_map(|role| shadow_of(scene, owner, role))
        .collect()
}

/// Owner a shadow is linked to.
#[must_use]
pub fn owner_of(scene: &Scene, shadow: ObjectId) -> Option<ObjectId> {
    scene.get(shadow)?.referenced(SHADOW_OWNER_ROLE).first().copied()
}

/// Linked shadow, or else the free-text object with the conventional name.
#[must_use]
pub fn find_shadow(scene: &Scene, owner: ObjectId, role: ShadowRole) -> Option<ObjectId> {
    if let Some(linked) = shadow_of(scene, owner, role) {
        return Some(linked);
    }
    let owner = scene.get(owner)?;
    scene.find_by_name_and_kind(&shadow::shadow_name(&owner.name, role), ObjectKind::FreeText)
}

// =============================================================================
// TRANSFORMS
// =============================================================================

/// Names of the synchronized objects driven by `transform`, in sync order.
///
/// Always computed from scratch: the mapping record replaces the receiver's
/// list wholesale.
#[must_use]
pub fn transformed_nodes(scene: &Scene, transform: ObjectId, synchronized: &[ObjectId]) -> Vec<String> {
    synchronized
        .iter()
        .filter_map(|id| scene.get(*id))
        .filter(|obj| obj.transform_id == Some(transform))
        .map(|obj| obj.name.clone())
        .collect()
}

/// Apply a transform mapping record: every listed object that is present
/// gets the transform as its driving transform. The transform is `linked`
/// when the mapping shadow is already linked to one, and is otherwise found
/// by `TransformName`.
///
/// Objects not listed keep whatever transform they have.
///
/// # Errors
///
/// Returns [`RecordError::MissingAttribute`] without a `TransformName`.
pub fn apply_transform_mapping(
    scene: &mut Scene,
    record: &Record,
    linked: Option<ObjectId>,
) -> Result<Option<ObjectId>, RecordError> {
    let transform_name = record.require(TRANSFORM_NAME_ATTR)?;
    let targets = parse_list(record.get(TRANSFORMED_NODES_ATTR).unwrap_or_default());
    let linked = linked.filter(|id| scene.get(*id).is_some_and(|obj| obj.kind == ObjectKind::RigidTransform));
    let Some(transform) = linked.or_else(|| scene.find_by_name_and_kind(transform_name, ObjectKind::RigidTransform))
    else {
        debug!(transform = transform_name, "refs: transform not present yet");
        return Ok(None);
    };

    for name in &targets {
        let target = scene
            .iter()
            .find(|obj| obj.name == *name && obj.kind.is_transformable() && obj.id != transform)
            .map(|obj| (obj.id, obj.transform_id));
        match target {
            Some((_, Some(current))) if current == transform => {}
            Some((id, _)) => {
                scene.set_transform(id, Some(transform), Provenance::Remote);
            }
            None => debug!(transform = transform_name, target = %name, "refs: mapping target not present, skipped"),
        }
    }
    Ok(Some(transform))
}

// =============================================================================
// DEFERRED SHADOWS
// =============================================================================

/// Apply a style shadow that arrived before its owner. Returns whether a
/// shadow was found and applied.
pub fn attach_style_shadow(scene: &mut Scene, owner: ObjectId) -> bool {
    attach_shadow(scene, owner, ShadowRole::Style, Superclass::DisplayStyle)
}

/// Re-apply the mapping shadow of a transform that arrived after it.
pub fn attach_transform_shadow(scene: &mut Scene, transform: ObjectId) -> bool {
    attach_shadow(scene, transform, ShadowRole::Metadata, Superclass::TransformMapping)
}

fn attach_shadow(scene: &mut Scene, owner: ObjectId, role: ShadowRole, superclass: Superclass) -> bool {
    let Some(shadow) = find_shadow(scene, owner, role) else {
        return false;
    };
    let Some(text) = scene.get(shadow).and_then(|obj| obj.text()) else {
        return false;
    };
    let Incoming::Known { codec, record } = shadow::classify(text) else {
        return false;
    };
    if codec.superclass != superclass {
        return false;
    }
    let linked = owner_of(scene, shadow);
    match codec.decode(scene, &record, linked) {
        Ok(Some(applied)) if applied == owner => {
            link_shadow(scene, owner, shadow, role, Provenance::Remote);
            true
        }
        Ok(_) => false,
        Err(e) => {
            debug!(error = %e, "refs: pending shadow did not apply");
            false
        }
    }
}
