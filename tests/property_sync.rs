//! PROPERTY-BASED TESTS: what one peer synchronizes, the other reproduces.
//!
//! 1. Every display style survives the trip through its shadow record
//! 2. The receiver's transform mapping equals the sender's, whatever subset
//!    of objects the transform drives

use std::collections::BTreeSet;

use proptest::prelude::*;
use scene::{DisplayStyle, ObjectKind, Provenance, Representation, Scene};
use scenesync::codec;
use scenesync::connector::{Connector, LoopbackConnector};
use scenesync::Session;

fn unit() -> impl Strategy<Value = f64> {
    0.0f64..=1.0
}

fn color() -> impl Strategy<Value = [f64; 3]> {
    (unit(), unit(), unit()).prop_map(|(r, g, b)| [r, g, b])
}

fn style_strategy() -> impl Strategy<Value = DisplayStyle> {
    (
        any::<bool>(),
        color(),
        color(),
        unit(),
        0.5f64..10.0,
        0.5f64..10.0,
        prop_oneof![Just(Representation::Points), Just(Representation::Wireframe), Just(Representation::Surface)],
        any::<bool>(),
    )
        .prop_map(
            |(visible, color, selected_color, opacity, line_width, point_size, representation, slice)| DisplayStyle {
                visible,
                color,
                selected_color,
                opacity,
                line_width,
                point_size,
                representation,
                slice_intersection_visible: slice,
            },
        )
}

fn linked_sessions() -> (Session, Session) {
    let (mut server, mut client) = LoopbackConnector::pair();
    server.start().expect("start");
    client.start().expect("start");
    let mut sender = Session::new("sender");
    sender.set_connector(Box::new(server));
    let mut receiver = Session::new("receiver");
    receiver.set_connector(Box::new(client));
    (sender, receiver)
}

fn deliver(receiver: &mut Session, scene: &mut Scene) {
    let frames = receiver.connector_mut().expect("connector").poll();
    for frame in &frames {
        codec::decode(scene, frame);
    }
}

proptest! {
    #[test]
    fn prop_mesh_style_is_reproduced(style in style_strategy()) {
        let (mut sender, mut receiver) = linked_sessions();
        let mut local = Scene::new();
        let mut remote = Scene::new();

        let id = local.create_object(ObjectKind::Mesh, "Tumor", Provenance::Local);
        local.set_style(id, style.clone(), Provenance::Local);
        sender.add_to_sync(&mut local, id).expect("add");
        deliver(&mut receiver, &mut remote);

        let mirrored = remote.find_by_name_and_kind("Tumor", ObjectKind::Mesh);
        prop_assert!(mirrored.is_some());
        let mirrored_style = mirrored.and_then(|m| remote.get(m)).and_then(|o| o.style()).cloned();
        prop_assert_eq!(mirrored_style, Some(style));
    }

    #[test]
    fn prop_annotation_style_is_reproduced(style in style_strategy()) {
        let (mut sender, mut receiver) = linked_sessions();
        let mut local = Scene::new();
        let mut remote = Scene::new();

        let id = local.create_object(ObjectKind::OpenCurve, "Path", Provenance::Local);
        local.set_control_points(id, vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]], Provenance::Local);
        local.set_style(id, style.clone(), Provenance::Local);
        sender.add_to_sync(&mut local, id).expect("add");
        deliver(&mut receiver, &mut remote);

        let mirrored = remote.find_by_name_and_kind("Path", ObjectKind::OpenCurve);
        let mirrored_style = mirrored.and_then(|m| remote.get(m)).and_then(|o| o.style()).cloned();
        prop_assert_eq!(mirrored_style, Some(style));
    }

    #[test]
    fn prop_transform_mapping_matches_sender(driven in prop::collection::vec(any::<bool>(), 1..8)) {
        let (mut sender, mut receiver) = linked_sessions();
        let mut local = Scene::new();
        let mut remote = Scene::new();

        let transform = local.create_object(ObjectKind::RigidTransform, "T1", Provenance::Local);
        sender.add_to_sync(&mut local, transform).expect("add transform");
        let mut expected = BTreeSet::new();
        for (i, is_driven) in driven.iter().enumerate() {
            let name = format!("Mesh{i}");
            let id = local.create_object(ObjectKind::Mesh, name.as_str(), Provenance::Local);
            if *is_driven {
                local.set_transform(id, Some(transform), Provenance::Local);
                expected.insert(name);
            }
            sender.add_to_sync(&mut local, id).expect("add mesh");
        }
        deliver(&mut receiver, &mut remote);

        let remote_transform = remote.find_by_name_and_kind("T1", ObjectKind::RigidTransform);
        prop_assert!(remote_transform.is_some());
        let actual: BTreeSet<String> = remote
            .iter()
            .filter(|obj| obj.transform_id.is_some() && obj.transform_id == remote_transform)
            .map(|obj| obj.name.clone())
            .collect();
        prop_assert_eq!(actual, expected);
    }
}
