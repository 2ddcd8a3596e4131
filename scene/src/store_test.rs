#![allow(clippy::float_cmp)]

use super::*;

use crate::object::IDENTITY;

fn changes(scene: &mut Scene) -> Vec<ChangeKind> {
    scene.drain_events().into_iter().map(|e| e.change).collect()
}

// =============================================================
// Lookups
// =============================================================

#[test]
fn create_object_records_added_event() {
    let mut scene = Scene::new();
    let id = scene.create_object(ObjectKind::Mesh, "Tumor", Provenance::Local);
    let events = scene.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].change, ChangeKind::Added);
    assert_eq!(events[0].id, id);
    assert_eq!(events[0].provenance, Provenance::Local);
    assert!(scene.drain_events().is_empty());
}

#[test]
fn get_by_name_returns_first_created() {
    let mut scene = Scene::new();
    let first = scene.create_object(ObjectKind::Mesh, "Foo", Provenance::Local);
    scene.create_object(ObjectKind::PointSet, "Foo", Provenance::Local);
    assert_eq!(scene.get_by_name("Foo").map(|o| o.id), Some(first));
}

#[test]
fn find_by_name_and_kind_requires_both() {
    let mut scene = Scene::new();
    scene.create_object(ObjectKind::Mesh, "Foo", Provenance::Local);
    let points = scene.create_object(ObjectKind::PointSet, "Foo", Provenance::Local);
    assert_eq!(scene.find_by_name_and_kind("Foo", ObjectKind::PointSet), Some(points));
    assert_eq!(scene.find_by_name_and_kind("Foo", ObjectKind::LineSet), None);
    assert_eq!(scene.find_by_name_and_kind("Bar", ObjectKind::Mesh), None);
}

#[test]
fn visible_objects_skips_hidden() {
    let mut scene = Scene::new();
    let shown = scene.create_object(ObjectKind::Mesh, "a", Provenance::Local);
    let hidden = scene.create_object(ObjectKind::FreeText, "b", Provenance::Local);
    scene.set_hidden(hidden, true, Provenance::Local);
    let ids: Vec<_> = scene.visible_objects().map(|o| o.id).collect();
    assert_eq!(ids, vec![shown]);
}

// =============================================================
// Mutations
// =============================================================

#[test]
fn setters_reject_data_for_other_kinds() {
    let mut scene = Scene::new();
    let text = scene.create_object(ObjectKind::FreeText, "t", Provenance::Local);
    let mesh = scene.create_object(ObjectKind::Mesh, "m", Provenance::Local);
    scene.drain_events();

    assert!(!scene.set_matrix(text, IDENTITY, Provenance::Local));
    assert!(!scene.set_text(mesh, "nope", Provenance::Local));
    assert!(!scene.set_style(text, DisplayStyle::default(), Provenance::Local));
    assert!(!scene.set_radius(mesh, [1.0, 1.0, 1.0], Provenance::Local));
    assert!(scene.drain_events().is_empty());
}

#[test]
fn mutation_stamps_provenance_and_version() {
    let mut scene = Scene::new();
    let id = scene.create_object(ObjectKind::FreeText, "t", Provenance::Local);
    assert!(scene.set_text(id, "hello", Provenance::Remote));
    let obj = scene.get(id).expect("object");
    assert_eq!(obj.text(), Some("hello"));
    assert_eq!(obj.last_edit, Provenance::Remote);
    assert_eq!(obj.origin, Provenance::Local);
    assert_eq!(obj.version, 2);
}

#[test]
fn style_change_emits_style_event() {
    let mut scene = Scene::new();
    let id = scene.create_object(ObjectKind::ClosedCurve, "c", Provenance::Local);
    scene.drain_events();
    let style = DisplayStyle { opacity: 0.25, ..DisplayStyle::default() };
    assert!(scene.set_style(id, style, Provenance::Local));
    assert_eq!(changes(&mut scene), vec![ChangeKind::StyleModified]);
    assert_eq!(scene.get(id).and_then(|o| o.style()).map(|s| s.opacity), Some(0.25));
}

#[test]
fn set_transform_requires_rigid_transform_target() {
    let mut scene = Scene::new();
    let mesh = scene.create_object(ObjectKind::Mesh, "m", Provenance::Local);
    let other = scene.create_object(ObjectKind::Mesh, "n", Provenance::Local);
    let transform = scene.create_object(ObjectKind::RigidTransform, "T", Provenance::Local);
    let text = scene.create_object(ObjectKind::FreeText, "x", Provenance::Local);

    assert!(!scene.set_transform(mesh, Some(other), Provenance::Local));
    assert!(!scene.set_transform(text, Some(transform), Provenance::Local));
    assert!(!scene.set_transform(transform, Some(transform), Provenance::Local));
    assert!(scene.set_transform(mesh, Some(transform), Provenance::Local));
    assert_eq!(scene.get(mesh).and_then(|o| o.transform_id), Some(transform));
}

#[test]
fn text_writes_are_told_apart_from_other_edits() {
    let mut scene = Scene::new();
    let note = scene.create_object(ObjectKind::FreeText, "Note", Provenance::Remote);
    scene.set_description(note, "from peer", Provenance::Remote);
    scene.set_encoding(note, 3, Provenance::Remote);
    scene.set_text(note, "hi", Provenance::Remote);
    scene.set_text(note, "hi", Provenance::Remote);
    assert_eq!(
        changes(&mut scene),
        vec![
            ChangeKind::Added,
            ChangeKind::Modified,
            ChangeKind::Modified,
            ChangeKind::TextModified,
            ChangeKind::TextModified,
        ]
    );
}

#[test]
fn references_are_multi_valued_and_deduplicated() {
    let mut scene = Scene::new();
    let owner = scene.create_object(ObjectKind::Mesh, "m", Provenance::Local);
    let a = scene.create_object(ObjectKind::FreeText, "a", Provenance::Local);
    let b = scene.create_object(ObjectKind::FreeText, "b", Provenance::Local);

    assert!(scene.add_reference(owner, "shadow", a, Provenance::Local));
    assert!(scene.add_reference(owner, "shadow", b, Provenance::Local));
    assert!(!scene.add_reference(owner, "shadow", a, Provenance::Local));
    assert_eq!(scene.get(owner).map(|o| o.referenced("shadow").to_vec()), Some(vec![a, b]));

    assert!(scene.remove_reference(owner, "shadow", a, Provenance::Local));
    assert!(!scene.remove_reference(owner, "shadow", a, Provenance::Local));
    assert_eq!(scene.get(owner).map(|o| o.referenced("shadow").to_vec()), Some(vec![b]));
}

#[test]
fn remove_attribute_returns_previous_value() {
    let mut scene = Scene::new();
    let id = scene.create_object(ObjectKind::Mesh, "m", Provenance::Local);
    scene.set_attribute(id, "session", "true", Provenance::Local);
    assert_eq!(scene.remove_attribute(id, "session", Provenance::Local), Some("true".to_owned()));
    assert_eq!(scene.remove_attribute(id, "session", Provenance::Local), None);
}

// =============================================================
// Removal
// =============================================================

#[test]
fn remove_object_clears_dangling_references_and_transforms() {
    let mut scene = Scene::new();
    let transform = scene.create_object(ObjectKind::RigidTransform, "T", Provenance::Local);
    let mesh = scene.create_object(ObjectKind::Mesh, "m", Provenance::Local);
    scene.set_transform(mesh, Some(transform), Provenance::Local);
    scene.add_reference(mesh, "shadow", transform, Provenance::Local);
    scene.drain_events();

    let removed = scene.remove_object(transform, Provenance::Local).expect("removed");
    assert_eq!(removed.name, "T");
    let obj = scene.get(mesh).expect("mesh");
    assert_eq!(obj.transform_id, None);
    assert!(obj.referenced("shadow").is_empty());
    assert_eq!(changes(&mut scene), vec![ChangeKind::TransformChanged, ChangeKind::Removed]);
    assert_eq!(scene.len(), 1);
}

#[test]
fn remove_missing_object_is_none() {
    let mut scene = Scene::new();
    assert!(scene.remove_object(uuid::Uuid::new_v4(), Provenance::Local).is_none());
    assert!(scene.drain_events().is_empty());
}
