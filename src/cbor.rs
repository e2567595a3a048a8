// Binary container encoding/decoding.
//
// Containers are always written with definite lengths. Two construction
// modes exist:
//   - `Device`: entries are written in the order the transformer produced
//     (device-preferred ordering)
//   - `Canonical`: map entries are sorted by the bytewise order of their
//     encoded keys (RFC 8949, 4.2.1), recursively
//
// Decoding accepts a CBOR sequence (RFC 8742) of back-to-back items.

use std::io::Cursor;

use serde::{Deserialize, Serialize};

pub use ciborium::value::{Integer, Value as CborValue};

use crate::error::CborError;

/// Tag for decimal fractions `[exponent, mantissa]` (RFC 8949, 3.4.4).
pub const TAG_DECIMAL_FRACTION: u64 = 4;
/// Bits value inside a union (RFC 9254, 6.7).
pub const TAG_BITS: u64 = 43;
/// Enumeration value inside a union (RFC 9254, 6.6).
pub const TAG_ENUM: u64 = 44;
/// Identityref value inside a union (RFC 9254, 6.10).
pub const TAG_IDENTITYREF: u64 = 45;
/// Instance-identifier value inside a union (RFC 9254, 6.13).
pub const TAG_INSTANCE_ID: u64 = 46;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerMode {
    /// Keep construction order (what the device decoder expects).
    #[default]
    Device,
    /// Sort map keys by encoded bytes for byte-exact reproducibility.
    Canonical,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a single item.
pub fn encode(value: &CborValue, mode: ContainerMode) -> Result<Vec<u8>, CborError> {
    let mut out = Vec::new();
    write_item(&mut out, value, mode)?;
    Ok(out)
}

/// Encode items back-to-back as a CBOR sequence.
pub fn encode_sequence(items: &[CborValue], mode: ContainerMode) -> Result<Vec<u8>, CborError> {
    let mut out = Vec::new();
    for item in items {
        write_item(&mut out, item, mode)?;
    }
    Ok(out)
}

fn write_item(out: &mut Vec<u8>, value: &CborValue, mode: ContainerMode) -> Result<(), CborError> {
    match mode {
        ContainerMode::Device => write_raw(out, value),
        ContainerMode::Canonical => write_raw(out, &canonicalize(value)?),
    }
}

fn write_raw(out: &mut Vec<u8>, value: &CborValue) -> Result<(), CborError> {
    ciborium::ser::into_writer(value, out).map_err(|e| CborError::Encode(e.to_string()))
}

/// Return a copy of `value` whose maps are sorted by encoded key bytes.
pub fn canonicalize(value: &CborValue) -> Result<CborValue, CborError> {
    Ok(match value {
        CborValue::Array(items) => CborValue::Array(
            items
                .iter()
                .map(canonicalize)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        CborValue::Map(entries) => {
            let mut keyed = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                let k = canonicalize(k)?;
                let mut key_bytes = Vec::new();
                write_raw(&mut key_bytes, &k)?;
                keyed.push((key_bytes, k, canonicalize(v)?));
            }
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            CborValue::Map(keyed.into_iter().map(|(_, k, v)| (k, v)).collect())
        }
        CborValue::Tag(tag, inner) => CborValue::Tag(*tag, Box::new(canonicalize(inner)?)),
        other => other.clone(),
    })
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode exactly one item; trailing bytes are an error.
pub fn decode_item(bytes: &[u8]) -> Result<CborValue, CborError> {
    let mut items = decode_sequence(bytes)?;
    match items.len() {
        1 => Ok(items.remove(0)),
        0 => Err(CborError::Decode {
            offset: 0,
            reason: "empty input".into(),
        }),
        n => Err(CborError::Shape(format!("expected one item, found {n}"))),
    }
}

/// Decode a CBOR sequence of independently encoded items.
pub fn decode_sequence(bytes: &[u8]) -> Result<Vec<CborValue>, CborError> {
    let mut cursor = Cursor::new(bytes);
    let mut items = Vec::new();
    while (cursor.position() as usize) < bytes.len() {
        let start = cursor.position();
        let item: CborValue = ciborium::de::from_reader(&mut cursor).map_err(|e| {
            let (offset, reason) = match e {
                ciborium::de::Error::Io(io) => (start, io.to_string()),
                ciborium::de::Error::Syntax(at) => (start + at as u64, "syntax error".into()),
                ciborium::de::Error::Semantic(at, msg) => {
                    (start + at.unwrap_or(0) as u64, msg)
                }
                ciborium::de::Error::RecursionLimitExceeded => {
                    (start, "nesting too deep".into())
                }
            };
            CborError::Decode { offset, reason }
        })?;
        items.push(item);
    }
    Ok(items)
}

/// Merge a sequence of top-level maps into one map, in order. A later entry
/// replaces an earlier entry with an equal key.
pub fn merge_items(items: Vec<CborValue>) -> Result<CborValue, CborError> {
    let mut merged: Vec<(CborValue, CborValue)> = Vec::new();
    for item in items {
        let CborValue::Map(entries) = item else {
            return Err(CborError::Shape(format!(
                "sequence item is not a map: {}",
                kind_name(&item)
            )));
        };
        for (k, v) in entries {
            match merged.iter_mut().find(|(existing, _)| *existing == k) {
                Some(slot) => slot.1 = v,
                None => merged.push((k, v)),
            }
        }
    }
    Ok(CborValue::Map(merged))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn int(value: i64) -> CborValue {
    CborValue::Integer(Integer::from(value))
}

pub fn uint(value: u64) -> CborValue {
    CborValue::Integer(Integer::from(value))
}

pub fn as_i128(value: &CborValue) -> Option<i128> {
    match value {
        CborValue::Integer(i) => Some(i128::from(*i)),
        _ => None,
    }
}

pub fn kind_name(value: &CborValue) -> &'static str {
    match value {
        CborValue::Integer(_) => "integer",
        CborValue::Bytes(_) => "byte string",
        CborValue::Float(_) => "float",
        CborValue::Text(_) => "text string",
        CborValue::Bool(_) => "boolean",
        CborValue::Null => "null",
        CborValue::Tag(..) => "tagged item",
        CborValue::Array(_) => "array",
        CborValue::Map(_) => "map",
        _ => "unknown item",
    }
}
