//! Self-describing attribute records carried in opaque text payloads.
//!
//! A record is a single XML empty-element tag:
//!
//! ```text
//! <MRMLNode SuperclassName="K" ClassName="C" Attr1="v1" Attr2="v2" />
//! ```
//!
//! Attributes keep their order and are looked up by name. Unknown attributes
//! are carried along and ignored by decoders. Text that is not a single tag
//! fails with [`RecordError::NotARecord`] so that callers can fall back to
//! treating it as a plain message.
//!
//! Value formats:
//! - point lists: `[x,y,z];[x,y,z];...`
//! - vectors: `[a,b,c]`
//! - name lists: `a,b,c`
//! - numbers: shortest decimal form that parses back to the same `f64`

#[cfg(test)]
#[path = "record_test.rs"]
mod tests;

use quick_xml::events::Event;
use quick_xml::events::attributes::AttrError;
use quick_xml::reader::Reader;

/// Tag name of every record.
pub const RECORD_TAG: &str = "MRMLNode";

pub const SUPERCLASS_ATTR: &str = "SuperclassName";
pub const CLASS_ATTR: &str = "ClassName";

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("text is not an attribute record")]
    NotARecord,
    #[error("unexpected tag <{0}>")]
    UnexpectedTag(String),
    #[error("malformed record: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed record attribute: {0}")]
    Attribute(#[from] AttrError),
    #[error("record is missing attribute {0}")]
    MissingAttribute(&'static str),
    #[error("invalid value for {attr}: {value:?}")]
    InvalidValue { attr: &'static str, value: String },
}

/// Ordered attribute list of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    attrs: Vec<(String, String)>,
}

impl Record {
    /// Start a record with its two discriminator attributes.
    pub fn new(superclass: &str, class: &str) -> Self {
        let mut record = Self { attrs: Vec::new() };
        record.set(SUPERCLASS_ATTR, superclass);
        record.set(CLASS_ATTR, class);
        record
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(key, _)| key == name) {
            slot.1 = value;
        } else {
            self.attrs.push((name.to_owned(), value));
        }
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(key, _)| key == name).map(|(_, v)| v.as_str())
    }

    /// Like [`Record::get`], failing when the attribute is absent.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingAttribute`].
    pub fn require(&self, name: &'static str) -> Result<&str, RecordError> {
        self.get(name).ok_or(RecordError::MissingAttribute(name))
    }

    #[must_use]
    pub fn superclass(&self) -> Option<&str> {
        self.get(SUPERCLASS_ATTR)
    }

    #[must_use]
    pub fn class(&self) -> Option<&str> {
        self.get(CLASS_ATTR)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize as a single-line tag.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(64);
        out.push('<');
        out.push_str(RECORD_TAG);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&quick_xml::escape::escape(value.as_str()));
            out.push('"');
        }
        out.push_str(" />");
        out
    }

    /// Parse a single-line tag. Content after the first tag is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::NotARecord`] when the text does not start with
    /// a tag, and the XML/attribute variants for malformed markup.
    pub fn parse(text: &str) -> Result<Self, RecordError> {
        let trimmed = text.trim();
        if !trimmed.starts_with('<') {
            return Err(RecordError::NotARecord);
        }
        let mut reader = Reader::from_str(trimmed);
        loop {
            match reader.read_event()? {
                Event::Empty(tag) | Event::Start(tag) => {
                    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                    if name != RECORD_TAG {
                        return Err(RecordError::UnexpectedTag(name));
                    }
                    let mut attrs = Vec::new();
                    for attr in tag.attributes() {
                        let attr = attr?;
                        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                        let value = attr.unescape_value()?.into_owned();
                        attrs.push((key, value));
                    }
                    return Ok(Self { attrs });
                }
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
                _ => return Err(RecordError::NotARecord),
            }
        }
    }
}

// =============================================================================
// VALUE FORMATS
// =============================================================================

#[must_use]
pub fn format_vector(v: [f64; 3]) -> String {
    format!("[{},{},{}]", v[0], v[1], v[2])
}

/// Parse `[a,b,c]`. Brackets are optional.
///
/// # Errors
///
/// Returns [`RecordError::InvalidValue`] unless there are exactly three numbers.
pub fn parse_vector(attr: &'static str, value: &str) -> Result<[f64; 3], RecordError> {
    let invalid = || RecordError::InvalidValue { attr, value: value.to_owned() };
    let inner = value.trim().trim_start_matches('[').trim_end_matches(']');
    let mut parts = inner.split(',').map(|p| p.trim().parse::<f64>());
    let (Some(Ok(a)), Some(Ok(b)), Some(Ok(c)), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    Ok([a, b, c])
}

#[must_use]
pub fn format_points(points: &[[f64; 3]]) -> String {
    points.iter().map(|p| format_vector(*p)).collect::<Vec<_>>().join(";")
}

/// Parse `[x,y,z];[x,y,z];...`. An empty string is an empty list.
///
/// # Errors
///
/// Returns [`RecordError::InvalidValue`] when any triplet is malformed.
pub fn parse_points(attr: &'static str, value: &str) -> Result<Vec<[f64; 3]>, RecordError> {
    value
        .split(';')
        .filter(|part| !part.trim().is_empty())
        .map(|part| parse_vector(attr, part))
        .collect()
}

#[must_use]
pub fn format_list<S: AsRef<str>>(names: &[S]) -> String {
    names.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",")
}

/// Split a comma-joined name list, dropping empty entries.
#[must_use]
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

#[must_use]
pub fn format_bool(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// # Errors
///
/// Returns [`RecordError::InvalidValue`] for anything but `true/false/1/0`.
pub fn parse_bool(attr: &'static str, value: &str) -> Result<bool, RecordError> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(RecordError::InvalidValue { attr, value: value.to_owned() }),
    }
}

/// # Errors
///
/// Returns [`RecordError::InvalidValue`] when `value` is not a number.
pub fn parse_number(attr: &'static str, value: &str) -> Result<f64, RecordError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| RecordError::InvalidValue { attr, value: value.to_owned() })
}
