//! Shadow-text records: attributes the wire cannot carry natively.
//!
//! DESIGN
//! ======
//! The wire carries three payload kinds. Display styles, annotation control
//! points and transform mappings have no native payload, so each travels as
//! an attribute record inside the text of a hidden free-text "shadow" object
//! named `<owner><suffix>`.
//!
//! | Owner kind      | Shadow roles            | Record classes                  |
//! |-----------------|-------------------------|---------------------------------|
//! | Mesh            | style                   | `MeshDisplay`                   |
//! | annotations     | metadata, style         | `<kind>`, `MarkupDisplay`       |
//! | RigidTransform  | metadata                | `RigidTransform`                |
//! | FreeText        | none                    |                                 |
//!
//! Every record class has one entry in a lookup table holding its encoder
//! and decoder. Decoding dispatches on `SuperclassName` first and then picks
//! the entry by `ClassName`; a pair that does not match a table entry is an
//! unknown record and is dropped without touching the scene.

#[cfg(test)]
#[path = "shadow_test.rs"]
mod tests;

use scene::{DisplayStyle, ObjectId, ObjectKind, Provenance, Representation, Scene, SceneObject};
use tracing::debug;

use crate::record::{
    Record, RecordError, format_bool, format_list, format_points, format_vector, parse_bool, parse_number,
    parse_points, parse_vector,
};
use crate::references;
use crate::resolve::{Resolved, resolve_or_create};

/// Suffix of style shadows.
pub const DISPLAY_SUFFIX: &str = "DisplayText";
/// Suffix of metadata shadows (annotation points, transform mappings).
pub const TEXT_SUFFIX: &str = "Text";

pub const MESH_DISPLAY_CLASS: &str = "MeshDisplay";
pub const MARKUP_DISPLAY_CLASS: &str = "MarkupDisplay";

pub const NODE_NAME_ATTR: &str = "NodeName";
pub const NAME_ATTR: &str = "name";
pub const CONTROL_POINTS_ATTR: &str = "ControlPoints";
pub const RADIUS_ATTR: &str = "ROIRadius";
pub const TRANSFORM_NAME_ATTR: &str = "TransformName";
pub const TRANSFORMED_NODES_ATTR: &str = "TransformedNodes";

const VISIBILITY_ATTR: &str = "visibility";
const COLOR_ATTR: &str = "color";
const SELECTED_COLOR_ATTR: &str = "selectedColor";
const OPACITY_ATTR: &str = "opacity";
const LINE_WIDTH_ATTR: &str = "lineWidth";
const POINT_SIZE_ATTR: &str = "pointSize";
const REPRESENTATION_ATTR: &str = "representation";
const SLICE_INTERSECTION_ATTR: &str = "sliceIntersectionVisibility";

/// Coarse record category, dispatched on before the class is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Superclass {
    DisplayStyle,
    Annotation,
    TransformMapping,
}

impl Superclass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DisplayStyle => "DisplayStyle",
            Self::Annotation => "Annotation",
            Self::TransformMapping => "TransformMapping",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DisplayStyle" => Some(Self::DisplayStyle),
            "Annotation" => Some(Self::Annotation),
            "TransformMapping" => Some(Self::TransformMapping),
            _ => None,
        }
    }
}

/// What a shadow carries for its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowRole {
    /// Display style.
    Style,
    /// Annotation points or transform mapping.
    Metadata,
}

impl ShadowRole {
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Style => DISPLAY_SUFFIX,
            Self::Metadata => TEXT_SUFFIX,
        }
    }

    /// Reference role from the owner to this shadow.
    #[must_use]
    pub fn reference_role(self) -> &'static str {
        match self {
            Self::Style => "displayShadow",
            Self::Metadata => "textShadow",
        }
    }
}

/// Shadow roles an object of `kind` needs while synchronized.
#[must_use]
pub fn shadow_roles(kind: ObjectKind) -> &'static [ShadowRole] {
    match kind {
        ObjectKind::Mesh => &[ShadowRole::Style],
        ObjectKind::RigidTransform => &[ShadowRole::Metadata],
        ObjectKind::FreeText => &[],
        _ => &[ShadowRole::Metadata, ShadowRole::Style],
    }
}

#[must_use]
pub fn shadow_name(owner_name: &str, role: ShadowRole) -> String {
    format!("{owner_name}{}", role.suffix())
}

// =============================================================================
// CODEC TABLE
// =============================================================================

type EncodeFn = fn(&Scene, &SceneObject, &[ObjectId]) -> Record;
type DecodeFn = fn(&mut Scene, &Record, Option<ObjectId>) -> Result<Option<ObjectId>, RecordError>;

/// Encoder and decoder for one record class.
pub struct RecordCodec {
    pub class_name: &'static str,
    pub superclass: Superclass,
    pub role: ShadowRole,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl RecordCodec {
    /// Build the record for `owner`. `synchronized` is the sync list of the
    /// session doing the encoding.
    #[must_use]
    pub fn encode(&self, scene: &Scene, owner: &SceneObject, synchronized: &[ObjectId]) -> Record {
        (self.encode)(scene, owner, synchronized)
    }

    /// Apply a record to the scene with remote provenance. Returns the owner
    /// the record applied to, or `None` when the owner is not present yet.
    ///
    /// `linked` is the owner the carrying shadow is already linked to. When
    /// it still fits the record class it is used as is; the names inside
    /// the record only locate an owner that has not been linked yet.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] when a required attribute is missing or a
    /// value does not parse.
    pub fn decode(
        &self,
        scene: &mut Scene,
        record: &Record,
        linked: Option<ObjectId>,
    ) -> Result<Option<ObjectId>, RecordError> {
        (self.decode)(scene, record, linked)
    }
}

impl std::fmt::Debug for RecordCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCodec")
            .field("class_name", &self.class_name)
            .field("superclass", &self.superclass)
            .finish_non_exhaustive()
    }
}

const fn annotation_codec(kind: ObjectKind) -> RecordCodec {
    RecordCodec {
        class_name: kind.class_name(),
        superclass: Superclass::Annotation,
        role: ShadowRole::Metadata,
        encode: encode_annotation,
        decode: decode_annotation,
    }
}

static CODECS: [RecordCodec; 10] = [
    RecordCodec {
        class_name: MESH_DISPLAY_CLASS,
        superclass: Superclass::DisplayStyle,
        role: ShadowRole::Style,
        encode: encode_style,
        decode: decode_style,
    },
    RecordCodec {
        class_name: MARKUP_DISPLAY_CLASS,
        superclass: Superclass::DisplayStyle,
        role: ShadowRole::Style,
        encode: encode_style,
        decode: decode_style,
    },
    annotation_codec(ObjectKind::PointSet),
    annotation_codec(ObjectKind::LineSet),
    annotation_codec(ObjectKind::PlaneRegion),
    annotation_codec(ObjectKind::AngleAnnotation),
    annotation_codec(ObjectKind::OpenCurve),
    annotation_codec(ObjectKind::ClosedCurve),
    annotation_codec(ObjectKind::BoxRegion),
    RecordCodec {
        class_name: "RigidTransform",
        superclass: Superclass::TransformMapping,
        role: ShadowRole::Metadata,
        encode: encode_mapping,
        decode: references::apply_transform_mapping,
    },
];

/// Table entry for a `ClassName`.
#[must_use]
pub fn codec_for_class(class_name: &str) -> Option<&'static RecordCodec> {
    CODECS.iter().find(|codec| codec.class_name == class_name)
}

/// Table entry that encodes the `role` shadow of an object of `kind`.
#[must_use]
pub fn codec_for(kind: ObjectKind, role: ShadowRole) -> Option<&'static RecordCodec> {
    let class_name = match (role, kind) {
        (ShadowRole::Style, ObjectKind::Mesh) => MESH_DISPLAY_CLASS,
        (ShadowRole::Style, k) if k.is_annotation() => MARKUP_DISPLAY_CLASS,
        (ShadowRole::Metadata, k) if k.is_annotation() || k == ObjectKind::RigidTransform => k.class_name(),
        _ => return None,
    };
    codec_for_class(class_name)
}

/// Encode the `role` shadow record of `owner`.
#[must_use]
pub fn encode_shadow(scene: &Scene, owner: &SceneObject, role: ShadowRole, synchronized: &[ObjectId]) -> Option<Record> {
    codec_for(owner.kind, role).map(|codec| codec.encode(scene, owner, synchronized))
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// How incoming text is to be handled.
#[derive(Debug)]
pub enum Incoming {
    /// Plain message: stored verbatim, no structural meaning.
    Literal,
    /// Well-formed record of a class this build does not know.
    Unknown { superclass: String, class: String },
    /// Record with a table entry.
    Known { codec: &'static RecordCodec, record: Record },
}

/// Classify incoming text without touching the scene.
#[must_use]
pub fn classify(text: &str) -> Incoming {
    let record = match Record::parse(text) {
        Ok(record) => record,
        Err(RecordError::NotARecord) => return Incoming::Literal,
        Err(e) => {
            debug!(error = %e, "shadow: malformed record, treating as text");
            return Incoming::Literal;
        }
    };
    let (Some(superclass), Some(class)) = (record.superclass(), record.class()) else {
        return Incoming::Literal;
    };
    if let Some(parsed) = Superclass::parse(superclass)
        && let Some(codec) = codec_for_class(class)
        && codec.superclass == parsed
    {
        return Incoming::Known { codec, record };
    }
    Incoming::Unknown { superclass: superclass.to_owned(), class: class.to_owned() }
}

// =============================================================================
// DISPLAY STYLE
// =============================================================================

fn encode_style(_scene: &Scene, owner: &SceneObject, _synchronized: &[ObjectId]) -> Record {
    let class = if owner.kind == ObjectKind::Mesh { MESH_DISPLAY_CLASS } else { MARKUP_DISPLAY_CLASS };
    let mut record = Record::new(Superclass::DisplayStyle.as_str(), class);
    record.set(NODE_NAME_ATTR, owner.name.as_str());
    if let Some(style) = owner.style() {
        write_style(&mut record, style);
    }
    record
}

fn write_style(record: &mut Record, style: &DisplayStyle) {
    record
        .set(VISIBILITY_ATTR, format_bool(style.visible))
        .set(COLOR_ATTR, format_vector(style.color))
        .set(SELECTED_COLOR_ATTR, format_vector(style.selected_color))
        .set(OPACITY_ATTR, style.opacity.to_string())
        .set(LINE_WIDTH_ATTR, style.line_width.to_string())
        .set(POINT_SIZE_ATTR, style.point_size.to_string())
        .set(REPRESENTATION_ATTR, style.representation.as_str())
        .set(SLICE_INTERSECTION_ATTR, format_bool(style.slice_intersection_visible));
}

/// Read style attributes over `base`. Absent attributes keep their value.
fn read_style(record: &Record, base: &DisplayStyle) -> Result<DisplayStyle, RecordError> {
    let mut style = base.clone();
    if let Some(v) = record.get(VISIBILITY_ATTR) {
        style.visible = parse_bool(VISIBILITY_ATTR, v)?;
    }
    if let Some(v) = record.get(COLOR_ATTR) {
        style.color = parse_vector(COLOR_ATTR, v)?;
    }
    if let Some(v) = record.get(SELECTED_COLOR_ATTR) {
        style.selected_color = parse_vector(SELECTED_COLOR_ATTR, v)?;
    }
    if let Some(v) = record.get(OPACITY_ATTR) {
        style.opacity = parse_number(OPACITY_ATTR, v)?;
    }
    if let Some(v) = record.get(LINE_WIDTH_ATTR) {
        style.line_width = parse_number(LINE_WIDTH_ATTR, v)?;
    }
    if let Some(v) = record.get(POINT_SIZE_ATTR) {
        style.point_size = parse_number(POINT_SIZE_ATTR, v)?;
    }
    if let Some(v) = record.get(REPRESENTATION_ATTR) {
        style.representation = Representation::parse(v)
            .ok_or_else(|| RecordError::InvalidValue { attr: REPRESENTATION_ATTR, value: v.to_owned() })?;
    }
    if let Some(v) = record.get(SLICE_INTERSECTION_ATTR) {
        style.slice_intersection_visible = parse_bool(SLICE_INTERSECTION_ATTR, v)?;
    }
    Ok(style)
}

fn fits_display_class(kind: ObjectKind, for_mesh: bool) -> bool {
    if for_mesh { kind == ObjectKind::Mesh } else { kind.is_annotation() }
}

fn decode_style(scene: &mut Scene, record: &Record, linked: Option<ObjectId>) -> Result<Option<ObjectId>, RecordError> {
    let owner_name = record.require(NODE_NAME_ATTR)?;
    let for_mesh = record.class() == Some(MESH_DISPLAY_CLASS);
    let owner = match linked.and_then(|id| scene.get(id)).filter(|obj| fits_display_class(obj.kind, for_mesh)) {
        Some(owner) => Some(owner),
        None => scene
            .iter()
            .find(|obj| obj.name == owner_name && fits_display_class(obj.kind, for_mesh)),
    };
    let Some(owner) = owner else {
        debug!(owner = owner_name, "shadow: style owner not present yet");
        return Ok(None);
    };
    let base = owner.style().cloned().unwrap_or_default();
    let id = owner.id;
    let style = read_style(record, &base)?;
    if style != base {
        scene.set_style(id, style, Provenance::Remote);
    }
    Ok(Some(id))
}

// =============================================================================
// ANNOTATIONS
// =============================================================================

fn encode_annotation(_scene: &Scene, owner: &SceneObject, _synchronized: &[ObjectId]) -> Record {
    let mut record = Record::new(Superclass::Annotation.as_str(), owner.kind.class_name());
    record.set(NAME_ATTR, owner.name.as_str());
    if let Some(annotation) = owner.annotation() {
        record.set(CONTROL_POINTS_ATTR, format_points(&annotation.control_points));
        if owner.kind == ObjectKind::BoxRegion {
            record.set(RADIUS_ATTR, format_vector(annotation.radius));
        }
    }
    record
}

fn decode_annotation(
    scene: &mut Scene,
    record: &Record,
    linked: Option<ObjectId>,
) -> Result<Option<ObjectId>, RecordError> {
    let class = record.require(crate::record::CLASS_ATTR)?;
    let kind = ObjectKind::from_class_name(class)
        .filter(|kind| kind.is_annotation())
        .ok_or_else(|| RecordError::InvalidValue { attr: crate::record::CLASS_ATTR, value: class.to_owned() })?;
    let name = record.require(NAME_ATTR)?;
    let points = record
        .get(CONTROL_POINTS_ATTR)
        .map(|v| parse_points(CONTROL_POINTS_ATTR, v))
        .transpose()?;
    let radius = match record.get(RADIUS_ATTR) {
        Some(v) if kind == ObjectKind::BoxRegion => Some(parse_vector(RADIUS_ATTR, v)?),
        _ => None,
    };

    let resolved = match linked.filter(|id| scene.get(*id).is_some_and(|obj| obj.kind == kind)) {
        Some(id) => Resolved { id, created: false },
        None => resolve_or_create(scene, name, kind),
    };
    let current = scene.get(resolved.id).and_then(SceneObject::annotation).cloned().unwrap_or_default();
    if let Some(points) = points
        && points != current.control_points
    {
        scene.set_control_points(resolved.id, points, Provenance::Remote);
    }
    if let Some(radius) = radius
        && radius != current.radius
    {
        scene.set_radius(resolved.id, radius, Provenance::Remote);
    }
    if resolved.created {
        references::attach_style_shadow(scene, resolved.id);
    }
    Ok(Some(resolved.id))
}

// =============================================================================
// TRANSFORM MAPPING
// =============================================================================

fn encode_mapping(scene: &Scene, owner: &SceneObject, synchronized: &[ObjectId]) -> Record {
    let mut record = Record::new(Superclass::TransformMapping.as_str(), owner.kind.class_name());
    let targets = references::transformed_nodes(scene, owner.id, synchronized);
    record
        .set(TRANSFORM_NAME_ATTR, owner.name.as_str())
        .set(TRANSFORMED_NODES_ATTR, format_list(&targets));
    record
}
