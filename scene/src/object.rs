//! Scene objects: kinds, kind-specific data, and display styles.
//!
//! `ObjectData` is a tagged variant over the four data shapes a scene object
//! can carry. The `ObjectKind` decides which shape an object gets at creation
//! and never changes afterwards; setters on the store reject data that does
//! not fit the kind.

#[cfg(test)]
#[path = "object_test.rs"]
mod tests;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a scene object. Local to one scene instance.
pub type ObjectId = Uuid;

/// Row-major 4x4 homogeneous transform.
pub type Matrix4 = [f64; 16];

/// Identity transform.
pub const IDENTITY: Matrix4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Logical kind of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Surface mesh with points and polygons.
    Mesh,
    /// Unconnected control points.
    PointSet,
    /// Two-point line segment.
    LineSet,
    /// Plane defined by its control points.
    PlaneRegion,
    /// Three-point angle measurement.
    AngleAnnotation,
    /// Open curve through its control points.
    OpenCurve,
    /// Closed curve through its control points.
    ClosedCurve,
    /// Box region with a center point and a per-axis radius.
    BoxRegion,
    /// Rigid transform that can drive other objects.
    RigidTransform,
    /// Free text note.
    FreeText,
}

impl ObjectKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Mesh,
        Self::PointSet,
        Self::LineSet,
        Self::PlaneRegion,
        Self::AngleAnnotation,
        Self::OpenCurve,
        Self::ClosedCurve,
        Self::BoxRegion,
        Self::RigidTransform,
        Self::FreeText,
    ];

    /// Stable class name, used as the kind discriminator in text records.
    #[must_use]
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::Mesh => "Mesh",
            Self::PointSet => "PointSet",
            Self::LineSet => "LineSet",
            Self::PlaneRegion => "PlaneRegion",
            Self::AngleAnnotation => "AngleAnnotation",
            Self::OpenCurve => "OpenCurve",
            Self::ClosedCurve => "ClosedCurve",
            Self::BoxRegion => "BoxRegion",
            Self::RigidTransform => "RigidTransform",
            Self::FreeText => "FreeText",
        }
    }

    /// Inverse of [`ObjectKind::class_name`].
    #[must_use]
    pub fn from_class_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.class_name() == name)
    }

    /// Point, line, curve and region annotations.
    #[must_use]
    pub fn is_annotation(self) -> bool {
        matches!(
            self,
            Self::PointSet
                | Self::LineSet
                | Self::PlaneRegion
                | Self::AngleAnnotation
                | Self::OpenCurve
                | Self::ClosedCurve
                | Self::BoxRegion
        )
    }

    /// Kinds that can be driven by a rigid transform.
    #[must_use]
    pub fn is_transformable(self) -> bool {
        self != Self::FreeText
    }

    /// Kinds that carry a display style.
    #[must_use]
    pub fn has_style(self) -> bool {
        self == Self::Mesh || self.is_annotation()
    }
}

/// How a surface or annotation is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Representation {
    Points,
    Wireframe,
    Surface,
}

impl Representation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Points => "Points",
            Self::Wireframe => "Wireframe",
            Self::Surface => "Surface",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Points" => Some(Self::Points),
            "Wireframe" => Some(Self::Wireframe),
            "Surface" => Some(Self::Surface),
            _ => None,
        }
    }
}

/// Display attributes of a mesh or annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayStyle {
    pub visible: bool,
    /// RGB components in `0.0..=1.0`.
    pub color: [f64; 3],
    pub selected_color: [f64; 3],
    pub opacity: f64,
    pub line_width: f64,
    pub point_size: f64,
    pub representation: Representation,
    /// Whether the outline is drawn in 2D slice views.
    pub slice_intersection_visible: bool,
}

impl Default for DisplayStyle {
    fn default() -> Self {
        Self {
            visible: true,
            color: [0.9, 0.9, 0.3],
            selected_color: [1.0, 0.5, 0.5],
            opacity: 1.0,
            line_width: 1.0,
            point_size: 3.0,
            representation: Representation::Surface,
            slice_intersection_visible: false,
        }
    }
}

/// Surface mesh: points plus polygons indexing into them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub points: Vec<[f64; 3]>,
    pub polygons: Vec<Vec<u32>>,
}

/// Control points and style of an annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub control_points: Vec<[f64; 3]>,
    /// Per-axis half extent. Only meaningful for box regions.
    pub radius: [f64; 3],
    pub style: DisplayStyle,
}

/// Kind-specific payload of a scene object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectData {
    Mesh { geometry: Geometry, style: DisplayStyle },
    Annotation(Annotation),
    Transform { matrix: Matrix4 },
    Text { text: String, encoding: u32 },
}

impl ObjectData {
    /// Empty data for a freshly created object of `kind`.
    #[must_use]
    pub fn default_for(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Mesh => Self::Mesh { geometry: Geometry::default(), style: DisplayStyle::default() },
            ObjectKind::RigidTransform => Self::Transform { matrix: IDENTITY },
            // 106 is the IANA MIBenum for UTF-8.
            ObjectKind::FreeText => Self::Text { text: String::new(), encoding: 106 },
            _ => Self::Annotation(Annotation::default()),
        }
    }
}

/// Where a mutation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Edited in this instance.
    Local,
    /// Applied from an incoming wire message.
    Remote,
}

/// A node in the scene graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: ObjectId,
    /// Human-readable name. Not unique; the cross-instance matching key.
    pub name: String,
    pub kind: ObjectKind,
    pub data: ObjectData,
    /// Hidden objects are left out of ordinary listings.
    pub hidden: bool,
    pub description: String,
    /// Free-form string attributes (sync markers, flags).
    pub attributes: BTreeMap<String, String>,
    /// Named multi-valued references to other objects.
    pub references: BTreeMap<String, Vec<ObjectId>>,
    /// Transform driving this object, if any.
    pub transform_id: Option<ObjectId>,
    /// Provenance of the mutation that created the object.
    pub origin: Provenance,
    /// Provenance of the most recent mutation.
    pub last_edit: Provenance,
    /// Incremented on every mutation.
    pub version: u64,
}

impl SceneObject {
    pub(crate) fn new(kind: ObjectKind, name: String, provenance: Provenance) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            kind,
            data: ObjectData::default_for(kind),
            hidden: false,
            description: String::new(),
            attributes: BTreeMap::new(),
            references: BTreeMap::new(),
            transform_id: None,
            origin: provenance,
            last_edit: provenance,
            version: 1,
        }
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.data {
            ObjectData::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn geometry(&self) -> Option<&Geometry> {
        match &self.data {
            ObjectData::Mesh { geometry, .. } => Some(geometry),
            _ => None,
        }
    }

    #[must_use]
    pub fn matrix(&self) -> Option<&Matrix4> {
        match &self.data {
            ObjectData::Transform { matrix } => Some(matrix),
            _ => None,
        }
    }

    #[must_use]
    pub fn annotation(&self) -> Option<&Annotation> {
        match &self.data {
            ObjectData::Annotation(annotation) => Some(annotation),
            _ => None,
        }
    }

    /// Display style, for meshes and annotations.
    #[must_use]
    pub fn style(&self) -> Option<&DisplayStyle> {
        match &self.data {
            ObjectData::Mesh { style, .. } | ObjectData::Annotation(Annotation { style, .. }) => Some(style),
            _ => None,
        }
    }

    pub(crate) fn style_mut(&mut self) -> Option<&mut DisplayStyle> {
        match &mut self.data {
            ObjectData::Mesh { style, .. } | ObjectData::Annotation(Annotation { style, .. }) => Some(style),
            _ => None,
        }
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Targets referenced under `role`, in insertion order.
    #[must_use]
    pub fn referenced(&self, role: &str) -> &[ObjectId] {
        self.references.get(role).map_or(&[], Vec::as_slice)
    }
}
