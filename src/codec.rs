//! Mapping between scene objects and wire frames.
//!
//! | Object kind     | Payload kind       |
//! |-----------------|--------------------|
//! | Mesh            | geometry buffer    |
//! | RigidTransform  | rigid transform    |
//! | FreeText        | opaque text        |
//! | annotations     | none (shadow only) |
//!
//! Decoding always applies changes with remote provenance. An unknown
//! payload kind, a body that does not decode, or a record of an unknown
//! class is dropped before any object is created.

#[cfg(test)]
#[path = "codec_test.rs"]
mod tests;

use frames::{Frame, GeometryBody, PayloadKind, TextBody, TransformBody};
use scene::{Geometry, ObjectData, ObjectId, ObjectKind, Provenance, Scene, SceneObject};
use tracing::{debug, warn};

use crate::references;
use crate::resolve::{resolve_name, resolve_or_create};
use crate::shadow::{self, Incoming};

/// Native payload kind for objects of `kind`.
#[must_use]
pub fn payload_kind_for(kind: ObjectKind) -> Option<PayloadKind> {
    match kind {
        ObjectKind::Mesh => Some(PayloadKind::GeometryBuffer),
        ObjectKind::RigidTransform => Some(PayloadKind::RigidTransform),
        ObjectKind::FreeText => Some(PayloadKind::OpaqueText),
        _ => None,
    }
}

/// Native frame for `obj`, named after it.
#[must_use]
pub fn encode(obj: &SceneObject) -> Option<Frame> {
    match payload_kind_for(obj.kind)? {
        PayloadKind::GeometryBuffer => {
            let geometry = obj.geometry()?;
            let body = GeometryBody { points: geometry.points.clone(), polygons: geometry.polygons.clone() };
            Some(Frame::geometry(obj.name.as_str(), &body))
        }
        PayloadKind::RigidTransform => {
            let body = TransformBody { matrix: *obj.matrix()? };
            Some(Frame::transform(obj.name.as_str(), &body))
        }
        PayloadKind::OpaqueText => {
            let ObjectData::Text { text, encoding } = &obj.data else {
                return None;
            };
            let body = TextBody { encoding: *encoding, text: text.clone() };
            Some(Frame::text(obj.name.as_str(), &body))
        }
    }
}

/// Frame carrying a shadow's record text, named after the shadow.
#[must_use]
pub fn encode_text(name: &str, text: &str) -> Frame {
    Frame::text(name, &TextBody::utf8(text))
}

/// Apply an incoming frame. Returns the object the frame landed on.
pub fn decode(scene: &mut Scene, frame: &Frame) -> Option<ObjectId> {
    let Some(kind) = frame.payload_kind() else {
        debug!(device_type = %frame.device_type, name = %frame.device_name, "codec: unknown payload kind dropped");
        return None;
    };
    let name = resolve_name(&frame.device_name);
    match kind {
        PayloadKind::OpaqueText => decode_text(scene, name, &frame.body),
        PayloadKind::GeometryBuffer => decode_geometry(scene, name, &frame.body),
        PayloadKind::RigidTransform => decode_transform(scene, name, &frame.body),
    }
}

fn decode_text(scene: &mut Scene, name: &str, bytes: &[u8]) -> Option<ObjectId> {
    let body = match TextBody::decode_body(bytes) {
        Ok(body) => body,
        Err(e) => {
            warn!(name, error = %e, "codec: malformed text body dropped");
            return None;
        }
    };

    let structured = match shadow::classify(&body.text) {
        Incoming::Unknown { superclass, class } => {
            debug!(name, %superclass, %class, "codec: unknown record class dropped");
            return None;
        }
        Incoming::Literal => None,
        Incoming::Known { codec, record } => Some((codec, record)),
    };

    let resolved = resolve_or_create(scene, name, ObjectKind::FreeText);
    let id = resolved.id;
    let current = scene.get(id).and_then(|obj| match &obj.data {
        ObjectData::Text { text, encoding } => Some((text.clone(), *encoding)),
        _ => None,
    });
    if current.as_ref().is_none_or(|(_, encoding)| *encoding != body.encoding) {
        scene.set_encoding(id, body.encoding, Provenance::Remote);
    }
    // Plain messages always land so that repeating a message is observable.
    if structured.is_none() || current.as_ref().is_none_or(|(text, _)| *text != body.text) {
        scene.set_text(id, body.text.as_str(), Provenance::Remote);
    }

    let Some((codec, record)) = structured else {
        if scene.get(id).is_some_and(|obj| obj.hidden) {
            scene.set_hidden(id, false, Provenance::Remote);
        }
        return Some(id);
    };

    let linked = references::owner_of(scene, id);
    match codec.decode(scene, &record, linked) {
        Ok(Some(owner)) => references::link_shadow(scene, owner, id, codec.role, Provenance::Remote),
        Ok(None) => debug!(name, class = codec.class_name, "codec: record kept until its owner arrives"),
        Err(e) => warn!(name, class = codec.class_name, error = %e, "codec: record did not apply"),
    }
    Some(id)
}

fn decode_geometry(scene: &mut Scene, name: &str, bytes: &[u8]) -> Option<ObjectId> {
    let body = match GeometryBody::decode_body(bytes) {
        Ok(body) => body,
        Err(e) => {
            warn!(name, error = %e, "codec: malformed geometry body dropped");
            return None;
        }
    };
    let resolved = resolve_or_create(scene, name, ObjectKind::Mesh);
    let geometry = Geometry { points: body.points, polygons: body.polygons };
    scene.set_geometry(resolved.id, geometry, Provenance::Remote);
    references::attach_style_shadow(scene, resolved.id);
    Some(resolved.id)
}

fn decode_transform(scene: &mut Scene, name: &str, bytes: &[u8]) -> Option<ObjectId> {
    let body = match TransformBody::decode_body(bytes) {
        Ok(body) => body,
        Err(e) => {
            warn!(name, error = %e, "codec: malformed transform body dropped");
            return None;
        }
    };
    let resolved = resolve_or_create(scene, name, ObjectKind::RigidTransform);
    scene.set_matrix(resolved.id, body.matrix, Provenance::Remote);
    references::attach_transform_shadow(scene, resolved.id);
    Some(resolved.id)
}
