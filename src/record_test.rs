#![allow(clippy::float_cmp)]

use super::*;

#[test]
fn record_starts_with_discriminators() {
    let record = Record::new("DisplayStyle", "MeshDisplay");
    let keys: Vec<_> = record.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["SuperclassName", "ClassName"]);
    assert_eq!(record.superclass(), Some("DisplayStyle"));
    assert_eq!(record.class(), Some("MeshDisplay"));
}

#[test]
fn set_replaces_in_place() {
    let mut record = Record::new("Annotation", "PointSet");
    record.set("name", "a").set("opacity", "1").set("name", "b");
    let pairs: Vec<_> = record.iter().collect();
    assert_eq!(pairs[2], ("name", "b"));
    assert_eq!(pairs.len(), 4);
}

#[test]
fn to_text_is_single_line_tag() {
    let mut record = Record::new("DisplayStyle", "MeshDisplay");
    record.set("NodeName", "Tumor");
    assert_eq!(
        record.to_text(),
        r#"<MRMLNode SuperclassName="DisplayStyle" ClassName="MeshDisplay" NodeName="Tumor" />"#
    );
}

#[test]
fn parse_reads_attributes_by_name() {
    let text = r#"<MRMLNode ClassName="BoxRegion" Extra="ignored" SuperclassName="Annotation" name="Box" />"#;
    let record = Record::parse(text).expect("parse");
    assert_eq!(record.superclass(), Some("Annotation"));
    assert_eq!(record.class(), Some("BoxRegion"));
    assert_eq!(record.get("name"), Some("Box"));
    assert_eq!(record.get("Extra"), Some("ignored"));
    assert_eq!(record.get("Missing"), None);
}

#[test]
fn escaped_values_survive_text_form() {
    let mut record = Record::new("Annotation", "PointSet");
    record.set("name", r#"a "quoted" <name> & more"#);
    let parsed = Record::parse(&record.to_text()).expect("parse");
    assert_eq!(parsed, record);
}

#[test]
fn plain_text_is_not_a_record() {
    assert!(matches!(Record::parse("hello there"), Err(RecordError::NotARecord)));
    assert!(matches!(Record::parse(""), Err(RecordError::NotARecord)));
}

#[test]
fn other_tags_are_rejected() {
    let err = Record::parse("<b>bold</b>").expect_err("should fail");
    assert!(matches!(err, RecordError::UnexpectedTag(ref tag) if tag == "b"));
}

#[test]
fn broken_markup_is_an_error() {
    assert!(Record::parse(r#"<MRMLNode ClassName="x />"#).is_err());
    assert!(Record::parse("< not xml").is_err());
}

#[test]
fn require_reports_missing_attribute() {
    let record = Record::new("TransformMapping", "RigidTransform");
    let err = record.require("TransformName").expect_err("missing");
    assert!(matches!(err, RecordError::MissingAttribute("TransformName")));
}

// =============================================================
// Value formats
// =============================================================

#[test]
fn vector_format_uses_brackets() {
    assert_eq!(format_vector([1.0, -2.5, 0.125]), "[1,-2.5,0.125]");
    assert_eq!(parse_vector("ROIRadius", "[1,-2.5,0.125]").expect("parse"), [1.0, -2.5, 0.125]);
    assert_eq!(parse_vector("ROIRadius", " 4, 5 ,6 ").expect("parse"), [4.0, 5.0, 6.0]);
}

#[test]
fn vector_requires_three_components() {
    assert!(parse_vector("ROIRadius", "[1,2]").is_err());
    assert!(parse_vector("ROIRadius", "[1,2,3,4]").is_err());
    assert!(parse_vector("ROIRadius", "[1,x,3]").is_err());
}

#[test]
fn points_join_triplets_with_semicolons() {
    let points = [[0.0, 0.0, 0.0], [1.5, 2.0, -3.0]];
    let text = format_points(&points);
    assert_eq!(text, "[0,0,0];[1.5,2,-3]");
    assert_eq!(parse_points("ControlPoints", &text).expect("parse"), points.to_vec());
    assert!(parse_points("ControlPoints", "").expect("parse").is_empty());
}

#[test]
fn number_format_round_trips_exactly() {
    let value = 0.1 + 0.2;
    let text = format_vector([value, f64::MIN_POSITIVE, 1e300]);
    let back = parse_vector("v", &text).expect("parse");
    assert_eq!(back[0].to_bits(), value.to_bits());
    assert_eq!(back[1].to_bits(), f64::MIN_POSITIVE.to_bits());
    assert_eq!(back[2], 1e300);
}

#[test]
fn name_list_drops_empty_entries() {
    assert_eq!(format_list(&["Probe", "Needle"]), "Probe,Needle");
    assert_eq!(parse_list("Probe,,Needle, "), vec!["Probe".to_owned(), "Needle".to_owned()]);
    assert!(parse_list("").is_empty());
}

#[test]
fn bool_accepts_words_and_digits() {
    assert!(parse_bool("visibility", "true").expect("parse"));
    assert!(!parse_bool("visibility", "0").expect("parse"));
    assert!(parse_bool("visibility", "yes").is_err());
    assert_eq!(format_bool(false), "false");
}
