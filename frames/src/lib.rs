//! Wire frames and native payload bodies for scene synchronization.
//!
//! This crate owns the wire representation exchanged between two connectors.
//! A frame is an envelope naming the payload kind (`device_type`) and the
//! object that produced it (`device_name`). The body is one of the three
//! payloads the transport carries natively, each encoded as its own protobuf
//! message. Anything richer (display styles, annotations, transform mappings)
//! rides inside an opaque text body.

use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;

/// Error returned when decoding frames or payload bodies.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes could not be decoded as the expected protobuf message.
    #[error("failed to decode protobuf message: {0}")]
    Decode(#[from] prost::DecodeError),
    /// A geometry point buffer whose length is not a multiple of three.
    #[error("geometry point buffer has {0} values, expected a multiple of 3")]
    PointBuffer(usize),
    /// A transform body that does not carry exactly sixteen values.
    #[error("transform body has {0} values, expected 16")]
    MatrixLength(usize),
}

/// Device type string for opaque text payloads.
pub const DEVICE_TEXT: &str = "STRING";

/// Device type string for geometry buffer payloads.
pub const DEVICE_GEOMETRY: &str = "POLYDATA";

/// Device type string for rigid transform payloads.
pub const DEVICE_TRANSFORM: &str = "TRANSFORM";

/// MIBenum for UTF-8, the default text encoding.
pub const TEXT_ENCODING_UTF8: u32 = 106;

/// The three payload kinds the wire carries natively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// Free text; also the carrier for every structured attribute record.
    OpaqueText,
    /// Surface mesh points and polygons.
    GeometryBuffer,
    /// A 4x4 rigid transform matrix, and nothing else.
    RigidTransform,
}

impl PayloadKind {
    /// Device type string used on the wire.
    #[must_use]
    pub fn device_type(self) -> &'static str {
        match self {
            Self::OpaqueText => DEVICE_TEXT,
            Self::GeometryBuffer => DEVICE_GEOMETRY,
            Self::RigidTransform => DEVICE_TRANSFORM,
        }
    }

    /// Parse a wire device type. Unknown types yield `None`.
    #[must_use]
    pub fn from_device_type(device_type: &str) -> Option<Self> {
        match device_type {
            DEVICE_TEXT => Some(Self::OpaqueText),
            DEVICE_GEOMETRY => Some(Self::GeometryBuffer),
            DEVICE_TRANSFORM => Some(Self::RigidTransform),
            _ => None,
        }
    }
}

/// A single message on the wire.
///
/// `device_type` is kept as a raw string so that frames from a newer peer
/// with payload kinds this build does not know still decode; the receiver
/// decides to drop them.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Payload kind discriminator, e.g. `"STRING"`.
    pub device_type: String,
    /// Logical name of the sending object. Matching key on the receiver.
    pub device_name: String,
    /// Milliseconds since the Unix epoch when the frame was created.
    pub ts: i64,
    /// Encoded payload body.
    pub body: Vec<u8>,
}

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Frame {
    /// Create a frame for a known payload kind.
    pub fn new(kind: PayloadKind, device_name: impl Into<String>, body: Vec<u8>) -> Self {
        Self { device_type: kind.device_type().to_owned(), device_name: device_name.into(), ts: now_ms(), body }
    }

    /// Create an opaque text frame.
    pub fn text(device_name: impl Into<String>, body: &TextBody) -> Self {
        Self::new(PayloadKind::OpaqueText, device_name, body.encode_body())
    }

    /// Create a geometry buffer frame.
    pub fn geometry(device_name: impl Into<String>, body: &GeometryBody) -> Self {
        Self::new(PayloadKind::GeometryBuffer, device_name, body.encode_body())
    }

    /// Create a rigid transform frame.
    pub fn transform(device_name: impl Into<String>, body: &TransformBody) -> Self {
        Self::new(PayloadKind::RigidTransform, device_name, body.encode_body())
    }

    /// Payload kind of this frame, if it is one this build understands.
    #[must_use]
    pub fn payload_kind(&self) -> Option<PayloadKind> {
        PayloadKind::from_device_type(&self.device_type)
    }
}

// =============================================================================
// PAYLOAD BODIES
// =============================================================================

/// Text payload with its character encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextBody {
    pub encoding: u32,
    pub text: String,
}

impl TextBody {
    /// UTF-8 text body.
    pub fn utf8(text: impl Into<String>) -> Self {
        Self { encoding: TEXT_ENCODING_UTF8, text: text.into() }
    }

    #[must_use]
    pub fn encode_body(&self) -> Vec<u8> {
        encode_message(&WireText { encoding: self.encoding, text: self.text.clone() })
    }

    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] for malformed bytes or invalid UTF-8.
    pub fn decode_body(bytes: &[u8]) -> Result<Self, CodecError> {
        let wire = WireText::decode(bytes)?;
        Ok(Self { encoding: wire.encoding, text: wire.text })
    }
}

/// Surface mesh: point coordinates plus polygons indexing into them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryBody {
    pub points: Vec<[f64; 3]>,
    pub polygons: Vec<Vec<u32>>,
}

impl GeometryBody {
    #[must_use]
    pub fn encode_body(&self) -> Vec<u8> {
        let wire = WireGeometry {
            points: self.points.iter().flatten().copied().collect(),
            polygons: self
                .polygons
                .iter()
                .map(|indices| WirePolygon { indices: indices.clone() })
                .collect(),
        };
        encode_message(&wire)
    }

    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] for malformed bytes and
    /// [`CodecError::PointBuffer`] when the flattened points are not triplets.
    pub fn decode_body(bytes: &[u8]) -> Result<Self, CodecError> {
        let wire = WireGeometry::decode(bytes)?;
        if wire.points.len() % 3 != 0 {
            return Err(CodecError::PointBuffer(wire.points.len()));
        }
        let points = wire
            .points
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        let polygons = wire.polygons.into_iter().map(|p| p.indices).collect();
        Ok(Self { points, polygons })
    }
}

/// Row-major 4x4 rigid transform.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformBody {
    pub matrix: [f64; 16],
}

impl TransformBody {
    #[must_use]
    pub fn encode_body(&self) -> Vec<u8> {
        encode_message(&WireTransform { matrix: self.matrix.to_vec() })
    }

    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] for malformed bytes and
    /// [`CodecError::MatrixLength`] when the body is not sixteen values.
    pub fn decode_body(bytes: &[u8]) -> Result<Self, CodecError> {
        let wire = WireTransform::decode(bytes)?;
        let matrix: [f64; 16] = wire
            .matrix
            .as_slice()
            .try_into()
            .map_err(|_| CodecError::MatrixLength(wire.matrix.len()))?;
        Ok(Self { matrix })
    }
}

// =============================================================================
// ENVELOPE CODEC
// =============================================================================

/// Encode a frame envelope into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    encode_message(&WireFrame {
        device_type: frame.device_type.clone(),
        device_name: frame.device_name.clone(),
        ts: frame.ts,
        body: frame.body.clone(),
    })
}

/// Decode protobuf bytes into a frame envelope.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireFrame::decode(bytes)?;
    Ok(Frame { device_type: wire.device_type, device_name: wire.device_name, ts: wire.ts, body: wire.body })
}

fn encode_message(message: &impl Message) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.encoded_len());
    // Encoding into a growable Vec cannot run out of buffer space.
    message.encode(&mut out).unwrap_or_default();
    out
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(string, tag = "1")]
    device_type: String,
    #[prost(string, tag = "2")]
    device_name: String,
    #[prost(int64, tag = "3")]
    ts: i64,
    #[prost(bytes = "vec", tag = "4")]
    body: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
struct WireText {
    #[prost(uint32, tag = "1")]
    encoding: u32,
    #[prost(string, tag = "2")]
    text: String,
}

#[derive(Clone, PartialEq, Message)]
struct WireGeometry {
    #[prost(double, repeated, tag = "1")]
    points: Vec<f64>,
    #[prost(message, repeated, tag = "2")]
    polygons: Vec<WirePolygon>,
}

#[derive(Clone, PartialEq, Message)]
struct WirePolygon {
    #[prost(uint32, repeated, tag = "1")]
    indices: Vec<u32>,
}

#[derive(Clone, PartialEq, Message)]
struct WireTransform {
    #[prost(double, repeated, tag = "1")]
    matrix: Vec<f64>,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
