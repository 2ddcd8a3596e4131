#![allow(clippy::float_cmp)]

use scene::Annotation;

use super::*;

fn styled() -> DisplayStyle {
    DisplayStyle {
        visible: false,
        color: [0.1, 0.2, 0.30000000000000004],
        selected_color: [1.0, 0.0, 0.5],
        opacity: 0.37,
        line_width: 2.5,
        point_size: 7.0,
        representation: Representation::Wireframe,
        slice_intersection_visible: true,
    }
}

fn known(text: &str) -> (&'static RecordCodec, Record) {
    match classify(text) {
        Incoming::Known { codec, record } => (codec, record),
        other => panic!("expected known record, got {other:?}"),
    }
}

// =============================================================
// Roles and table
// =============================================================

#[test]
fn shadow_roles_follow_owner_kind() {
    assert_eq!(shadow_roles(ObjectKind::Mesh), &[ShadowRole::Style]);
    assert_eq!(shadow_roles(ObjectKind::RigidTransform), &[ShadowRole::Metadata]);
    assert!(shadow_roles(ObjectKind::FreeText).is_empty());
    assert_eq!(shadow_roles(ObjectKind::OpenCurve), &[ShadowRole::Metadata, ShadowRole::Style]);
}

#[test]
fn shadow_names_use_role_suffix() {
    assert_eq!(shadow_name("Tumor", ShadowRole::Style), "TumorDisplayText");
    assert_eq!(shadow_name("T1", ShadowRole::Metadata), "T1Text");
}

#[test]
fn every_shadowed_kind_has_a_codec() {
    for kind in ObjectKind::ALL {
        for role in shadow_roles(kind) {
            let codec = codec_for(kind, *role).expect("codec");
            assert_eq!(codec.role, *role);
        }
    }
    assert_eq!(codec_for(ObjectKind::Mesh, ShadowRole::Style).map(|c| c.class_name), Some("MeshDisplay"));
    assert_eq!(codec_for(ObjectKind::PointSet, ShadowRole::Style).map(|c| c.class_name), Some("MarkupDisplay"));
    assert!(codec_for(ObjectKind::Mesh, ShadowRole::Metadata).is_none());
    assert!(codec_for(ObjectKind::FreeText, ShadowRole::Style).is_none());
}

// =============================================================
// Classification
// =============================================================

#[test]
fn plain_text_is_literal() {
    assert!(matches!(classify("see you at 3pm"), Incoming::Literal));
    assert!(matches!(classify("<b>bold</b>"), Incoming::Literal));
}

#[test]
fn tag_without_discriminators_is_literal() {
    assert!(matches!(classify(r#"<MRMLNode name="x" />"#), Incoming::Literal));
}

#[test]
fn unknown_class_is_reported() {
    let text = r#"<MRMLNode SuperclassName="DisplayStyle" ClassName="VolumeDisplay" />"#;
    assert!(matches!(classify(text), Incoming::Unknown { ref class, .. } if class == "VolumeDisplay"));
}

#[test]
fn superclass_must_match_table_entry() {
    let text = r#"<MRMLNode SuperclassName="Annotation" ClassName="MeshDisplay" />"#;
    assert!(matches!(classify(text), Incoming::Unknown { .. }));
}

// =============================================================
// Display style
// =============================================================

#[test]
fn style_record_reproduces_every_attribute() {
    let mut sender = Scene::new();
    let mesh = sender.create_object(ObjectKind::Mesh, "Tumor", Provenance::Local);
    sender.set_style(mesh, styled(), Provenance::Local);
    let owner = sender.get(mesh).expect("mesh");
    let text = encode_shadow(&sender, owner, ShadowRole::Style, &[]).expect("record").to_text();
    assert!(text.contains(r#"ClassName="MeshDisplay""#));
    assert!(text.contains(r#"NodeName="Tumor""#));

    let mut receiver = Scene::new();
    let fresh = receiver.create_object(ObjectKind::Mesh, "Tumor", Provenance::Local);
    let (codec, record) = known(&text);
    assert_eq!(codec.decode(&mut receiver, &record, None).expect("decode"), Some(fresh));
    assert_eq!(receiver.get(fresh).and_then(|o| o.style()), Some(&styled()));
    assert_eq!(receiver.get(fresh).map(|o| o.last_edit), Some(Provenance::Remote));
}

#[test]
fn style_record_without_owner_is_pending() {
    let mut scene = Scene::new();
    let text = r#"<MRMLNode SuperclassName="DisplayStyle" ClassName="MeshDisplay" NodeName="Ghost" opacity="0.5" />"#;
    let (codec, record) = known(text);
    assert_eq!(codec.decode(&mut scene, &record, None).expect("decode"), None);
    assert!(scene.is_empty());
}

#[test]
fn markup_style_skips_meshes_with_same_name() {
    let mut scene = Scene::new();
    let mesh = scene.create_object(ObjectKind::Mesh, "F", Provenance::Local);
    let points = scene.create_object(ObjectKind::PointSet, "F", Provenance::Local);
    let text = r#"<MRMLNode SuperclassName="DisplayStyle" ClassName="MarkupDisplay" NodeName="F" opacity="0.5" />"#;
    let (codec, record) = known(text);
    assert_eq!(codec.decode(&mut scene, &record, None).expect("decode"), Some(points));
    assert_eq!(scene.get(mesh).and_then(|o| o.style()).map(|s| s.opacity), Some(1.0));
    assert_eq!(scene.get(points).and_then(|o| o.style()).map(|s| s.opacity), Some(0.5));
}

#[test]
fn bad_style_value_is_an_error() {
    let mut scene = Scene::new();
    scene.create_object(ObjectKind::Mesh, "M", Provenance::Local);
    let text = r#"<MRMLNode SuperclassName="DisplayStyle" ClassName="MeshDisplay" NodeName="M" opacity="lots" />"#;
    let (codec, record) = known(text);
    assert!(matches!(codec.decode(&mut scene, &record, None), Err(RecordError::InvalidValue { attr: "opacity", .. })));
}

// =============================================================
// Annotations
// =============================================================

#[test]
fn box_region_record_carries_points_and_radius() {
    let mut sender = Scene::new();
    let region = sender.create_object(ObjectKind::BoxRegion, "Box", Provenance::Local);
    sender.set_control_points(region, vec![[1.0, 2.0, 3.0]], Provenance::Local);
    sender.set_radius(region, [4.0, 5.5, 6.0], Provenance::Local);
    let owner = sender.get(region).expect("region");
    let text = encode_shadow(&sender, owner, ShadowRole::Metadata, &[]).expect("record").to_text();
    assert!(text.contains(r#"ControlPoints="[1,2,3]""#));
    assert!(text.contains(r#"ROIRadius="[4,5.5,6]""#));

    let mut receiver = Scene::new();
    let (codec, record) = known(&text);
    let id = codec.decode(&mut receiver, &record, None).expect("decode").expect("created");
    let obj = receiver.get(id).expect("object");
    assert_eq!(obj.kind, ObjectKind::BoxRegion);
    assert_eq!(obj.origin, Provenance::Remote);
    assert_eq!(
        obj.annotation().map(|a| (a.control_points.clone(), a.radius)),
        Some((vec![[1.0, 2.0, 3.0]], [4.0, 5.5, 6.0]))
    );
}

#[test]
fn annotation_record_updates_existing_object() {
    let mut scene = Scene::new();
    let existing = scene.create_object(ObjectKind::OpenCurve, "Path", Provenance::Local);
    let text = r#"<MRMLNode SuperclassName="Annotation" ClassName="OpenCurve" name="Path" ControlPoints="[0,0,0];[1,1,1]" />"#;
    let (codec, record) = known(text);
    assert_eq!(codec.decode(&mut scene, &record, None).expect("decode"), Some(existing));
    assert_eq!(scene.len(), 1);
    assert_eq!(
        scene.get(existing).and_then(|o| o.annotation()).map(|a| a.control_points.len()),
        Some(2)
    );
}

#[test]
fn linked_owner_is_used_instead_of_record_names() {
    let mut scene = Scene::new();
    let curve = scene.create_object(ObjectKind::OpenCurve, "Route", Provenance::Local);
    let text = r#"<MRMLNode SuperclassName="Annotation" ClassName="OpenCurve" name="Path" ControlPoints="[0,0,0];[1,1,1]" />"#;
    let (codec, record) = known(text);
    assert_eq!(codec.decode(&mut scene, &record, Some(curve)).expect("decode"), Some(curve));
    assert_eq!(scene.len(), 1);
    assert_eq!(scene.get(curve).and_then(|o| o.annotation()).map(|a| a.control_points.len()), Some(2));

    let style = r#"<MRMLNode SuperclassName="DisplayStyle" ClassName="MarkupDisplay" NodeName="Path" opacity="0.5" />"#;
    let (codec, record) = known(style);
    assert_eq!(codec.decode(&mut scene, &record, Some(curve)).expect("decode"), Some(curve));
    assert_eq!(scene.get(curve).and_then(|o| o.style()).map(|s| s.opacity), Some(0.5));
}

#[test]
fn linked_owner_of_another_kind_falls_back_to_names() {
    let mut scene = Scene::new();
    let mesh = scene.create_object(ObjectKind::Mesh, "Path", Provenance::Local);
    let curve = scene.create_object(ObjectKind::OpenCurve, "Path", Provenance::Local);
    let style = r#"<MRMLNode SuperclassName="DisplayStyle" ClassName="MarkupDisplay" NodeName="Path" opacity="0.5" />"#;
    let (codec, record) = known(style);
    assert_eq!(codec.decode(&mut scene, &record, Some(mesh)).expect("decode"), Some(curve));
}

#[test]
fn annotation_record_applies_style_that_arrived_first() {
    let mut scene = Scene::new();
    let shadow = scene.create_object(ObjectKind::FreeText, "PinsDisplayText", Provenance::Remote);
    scene.set_text(
        shadow,
        r#"<MRMLNode SuperclassName="DisplayStyle" ClassName="MarkupDisplay" NodeName="Pins" pointSize="9" />"#,
        Provenance::Remote,
    );
    let text = r#"<MRMLNode SuperclassName="Annotation" ClassName="PointSet" name="Pins" ControlPoints="[1,2,3]" />"#;
    let (codec, record) = known(text);
    let id = codec.decode(&mut scene, &record, None).expect("decode").expect("created");
    let obj = scene.get(id).expect("pins");
    assert_eq!(obj.style().map(|s| s.point_size), Some(9.0));
    assert_eq!(obj.referenced(ShadowRole::Style.reference_role()), &[shadow]);
}

#[test]
fn annotation_default_has_no_points() {
    assert!(Annotation::default().control_points.is_empty());
}

// =============================================================
// Transform mapping
// =============================================================

#[test]
fn mapping_record_lists_synchronized_driven_objects() {
    let mut scene = Scene::new();
    let transform = scene.create_object(ObjectKind::RigidTransform, "T1", Provenance::Local);
    let probe = scene.create_object(ObjectKind::Mesh, "Probe", Provenance::Local);
    let needle = scene.create_object(ObjectKind::Mesh, "Needle", Provenance::Local);
    let loose = scene.create_object(ObjectKind::Mesh, "Loose", Provenance::Local);
    for id in [probe, needle, loose] {
        scene.set_transform(id, Some(transform), Provenance::Local);
    }
    let owner = scene.get(transform).expect("transform");
    let record = encode_shadow(&scene, owner, ShadowRole::Metadata, &[needle, probe, transform]).expect("record");
    assert_eq!(record.superclass(), Some("TransformMapping"));
    assert_eq!(record.get(TRANSFORM_NAME_ATTR), Some("T1"));
    assert_eq!(record.get(TRANSFORMED_NODES_ATTR), Some("Needle,Probe"));
}
