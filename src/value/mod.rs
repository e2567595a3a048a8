// Typed leaf value codec.
//
// Encodes JSON leaf values to CBOR according to their YANG type and back.
// Inside a union, values whose CBOR form would be ambiguous are tagged
// (enumeration 44, bits 43, identityref 45, instance-identifier 46).
// Unions are encoded by ordered trial: the first member type that accepts
// the value wins.

pub mod decimal;
pub mod structural;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use serde_json::Value as Json;

use crate::cbor::{
    self, CborValue, TAG_BITS, TAG_DECIMAL_FRACTION, TAG_ENUM, TAG_IDENTITYREF, TAG_INSTANCE_ID,
};
use crate::error::{TypeMismatch, ValueError};
use crate::instance_id::InstancePath;
use crate::schema::{BitTable, EnumTable, SchemaIndex, TypeDescriptor};

pub use structural::{cbor_from_json, json_from_cbor, key_string};

/// Leafref chains longer than this are treated as untyped.
const MAX_LEAFREF_DEPTH: u8 = 8;

/// Rewrite a MAC address written with `:` or `-` separators to the dash form.
///
/// Returns `None` when `s` is not six hex octet pairs.
pub fn normalize_mac(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    if bytes.len() != 17 {
        return None;
    }
    for (i, &b) in bytes.iter().enumerate() {
        let ok = if i % 3 == 2 {
            b == b':' || b == b'-'
        } else {
            b.is_ascii_hexdigit()
        };
        if !ok {
            return None;
        }
    }
    Some(s.replace(':', "-"))
}

fn mismatch(expected: &'static str, found: impl std::fmt::Display) -> ValueError {
    TypeMismatch::new(expected, found.to_string()).into()
}

fn tagged(tag: u64, inner: CborValue, in_union: bool) -> CborValue {
    if in_union {
        CborValue::Tag(tag, Box::new(inner))
    } else {
        inner
    }
}

/// Strip `tag` if present. Inside a union the tag is mandatory.
fn untag(value: &CborValue, tag: u64, in_union: bool) -> Option<&CborValue> {
    match value {
        CborValue::Tag(t, inner) if *t == tag => Some(inner),
        CborValue::Tag(..) => None,
        other if !in_union => Some(other),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Value codec bound to a schema index (for identities and leafref targets).
#[derive(Debug, Clone, Copy)]
pub struct ValueCodec<'a> {
    index: &'a SchemaIndex,
}

impl<'a> ValueCodec<'a> {
    pub fn new(index: &'a SchemaIndex) -> Self {
        Self { index }
    }

    /// Encode `value` as type `ty`; `None` or an unmodeled type falls back to
    /// structural encoding.
    pub fn encode(
        &self,
        value: &Json,
        ty: Option<&TypeDescriptor>,
        in_union: bool,
    ) -> Result<CborValue, ValueError> {
        let normalized;
        let value = match value {
            Json::String(s) => match normalize_mac(s) {
                Some(mac) => {
                    normalized = Json::String(mac);
                    &normalized
                }
                None => value,
            },
            _ => value,
        };
        match ty {
            Some(ty) => self.encode_typed(value, ty, in_union, 0),
            None => Ok(cbor_from_json(value)),
        }
    }

    /// Decode `value` as type `ty`; `None` or an unmodeled type falls back to
    /// structural decoding.
    pub fn decode(
        &self,
        value: &CborValue,
        ty: Option<&TypeDescriptor>,
        in_union: bool,
    ) -> Result<Json, ValueError> {
        match ty {
            Some(ty) => self.decode_typed(value, ty, in_union, 0),
            None => Ok(json_from_cbor(value)),
        }
    }

    fn encode_typed(
        &self,
        value: &Json,
        ty: &TypeDescriptor,
        in_union: bool,
        depth: u8,
    ) -> Result<CborValue, ValueError> {
        match ty {
            TypeDescriptor::Enumeration { enums } => {
                let v = encode_enum(value, enums)?;
                Ok(tagged(TAG_ENUM, cbor::int(v), in_union))
            }
            TypeDescriptor::Identityref { .. } => {
                let sid = match value {
                    Json::String(name) => self.index.identity_sid(name)?,
                    Json::Number(n) => {
                        let sid = n.as_u64().ok_or_else(|| mismatch("identityref", n))?;
                        self.index.identity_name(sid)?;
                        sid
                    }
                    other => return Err(mismatch("identityref", other)),
                };
                Ok(tagged(TAG_IDENTITYREF, cbor::uint(sid), in_union))
            }
            TypeDescriptor::Decimal64 { fraction_digits } => {
                let text = match value {
                    Json::Number(n) => n.to_string(),
                    Json::String(s) => s.clone(),
                    other => return Err(mismatch("decimal64", other)),
                };
                let mantissa = decimal::to_mantissa(&text, *fraction_digits)
                    .ok_or_else(|| mismatch("decimal64", &text))?;
                Ok(CborValue::Tag(
                    TAG_DECIMAL_FRACTION,
                    Box::new(CborValue::Array(vec![
                        cbor::int(-i64::from(*fraction_digits)),
                        cbor::int(mantissa),
                    ])),
                ))
            }
            TypeDescriptor::Bits { bits } => {
                let bytes = encode_bits(value, bits)?;
                Ok(tagged(TAG_BITS, CborValue::Bytes(bytes), in_union))
            }
            TypeDescriptor::Union { types } => {
                for member in types {
                    match self.encode_typed(value, member, true, depth) {
                        Ok(v) => return Ok(v),
                        Err(e) => debug!("union member {} rejected {value}: {e}", member.name()),
                    }
                }
                Err(mismatch("union", value))
            }
            TypeDescriptor::Leafref { path } => match self.leafref_target(path, depth) {
                Some(target) => self.encode_typed(value, target, in_union, depth + 1),
                None => Ok(cbor_from_json(value)),
            },
            TypeDescriptor::Boolean => match value {
                Json::Bool(b) => Ok(CborValue::Bool(*b)),
                Json::String(s) if s == "true" || s == "false" => Ok(CborValue::Bool(s == "true")),
                other => Err(mismatch("boolean", other)),
            },
            TypeDescriptor::String => match value {
                Json::String(s) => Ok(CborValue::Text(s.clone())),
                other => Err(mismatch("string", other)),
            },
            TypeDescriptor::Binary => match value {
                Json::String(s) => STANDARD
                    .decode(s.as_bytes())
                    .map(CborValue::Bytes)
                    .map_err(|_| mismatch("base64 binary", s)),
                other => Err(mismatch("binary", other)),
            },
            TypeDescriptor::Empty => match value {
                Json::Null => Ok(CborValue::Null),
                Json::Array(items) if matches!(items.as_slice(), [Json::Null]) => {
                    Ok(CborValue::Null)
                }
                other => Err(mismatch("empty", other)),
            },
            TypeDescriptor::InstanceIdentifier => {
                let Json::String(text) = value else {
                    return Err(mismatch("instance-identifier", value));
                };
                let path =
                    InstancePath::parse(text).map_err(|e| mismatch("instance-identifier", e))?;
                let resolved = path.resolve(self.index)?;
                let address = if resolved.keys.is_empty() {
                    cbor::uint(resolved.sid)
                } else {
                    let mut items = vec![cbor::uint(resolved.sid)];
                    items.extend(resolved.keys.into_iter().map(|k| CborValue::Text(k.value)));
                    CborValue::Array(items)
                };
                Ok(tagged(TAG_INSTANCE_ID, address, in_union))
            }
            TypeDescriptor::Unknown => Ok(cbor_from_json(value)),
            int_ty => {
                let (min, max) = int_ty
                    .integer_range()
                    .ok_or_else(|| mismatch("integer", value))?;
                let v = json_integer(value).ok_or_else(|| mismatch(int_ty.name(), value))?;
                if v < min || v > max {
                    return Err(mismatch(int_ty.name(), v));
                }
                Ok(integer_to_cbor(v))
            }
        }
    }

    fn decode_typed(
        &self,
        value: &CborValue,
        ty: &TypeDescriptor,
        in_union: bool,
        depth: u8,
    ) -> Result<Json, ValueError> {
        let found = || cbor::kind_name(value);
        match ty {
            TypeDescriptor::Enumeration { enums } => {
                let inner = untag(value, TAG_ENUM, in_union).ok_or_else(|| mismatch("enumeration", found()))?;
                match inner {
                    CborValue::Text(name) if !in_union && enums.value_of(name).is_some() => {
                        Ok(Json::String(name.clone()))
                    }
                    _ => {
                        let v = cbor::as_i128(inner).ok_or_else(|| mismatch("enumeration", found()))?;
                        i64::try_from(v)
                            .ok()
                            .and_then(|v| enums.name_of(v))
                            .map(|n| Json::String(n.to_string()))
                            .ok_or_else(|| mismatch("enumeration value", v))
                    }
                }
            }
            TypeDescriptor::Identityref { .. } => {
                let inner = untag(value, TAG_IDENTITYREF, in_union)
                    .ok_or_else(|| mismatch("identityref", found()))?;
                match inner {
                    CborValue::Text(name) => {
                        self.index.identity_sid(name)?;
                        Ok(Json::String(name.clone()))
                    }
                    _ => {
                        let sid = cbor::as_i128(inner)
                            .and_then(|v| u64::try_from(v).ok())
                            .ok_or_else(|| mismatch("identityref", found()))?;
                        Ok(Json::String(self.index.identity_name(sid)?.to_string()))
                    }
                }
            }
            TypeDescriptor::Decimal64 { .. } => match value {
                CborValue::Tag(TAG_DECIMAL_FRACTION, inner) => structural::decimal_fraction(inner)
                    .ok_or_else(|| mismatch("decimal fraction", found())),
                CborValue::Integer(_) | CborValue::Float(_) if !in_union => Ok(json_from_cbor(value)),
                _ => Err(mismatch("decimal64", found())),
            },
            TypeDescriptor::Bits { bits } => {
                let inner = untag(value, TAG_BITS, in_union).ok_or_else(|| mismatch("bits", found()))?;
                let CborValue::Bytes(bytes) = inner else {
                    return Err(mismatch("bits", found()));
                };
                decode_bits(bytes, bits).map(Json::String)
            }
            TypeDescriptor::Union { types } => {
                for member in types {
                    match self.decode_typed(value, member, true, depth) {
                        Ok(v) => return Ok(v),
                        Err(e) => debug!("union member {} rejected {}: {e}", member.name(), found()),
                    }
                }
                Err(mismatch("union", found()))
            }
            TypeDescriptor::Leafref { path } => match self.leafref_target(path, depth) {
                Some(target) => self.decode_typed(value, target, in_union, depth + 1),
                None => Ok(json_from_cbor(value)),
            },
            TypeDescriptor::Boolean => match value {
                CborValue::Bool(b) => Ok(Json::Bool(*b)),
                _ => Err(mismatch("boolean", found())),
            },
            TypeDescriptor::String => match value {
                CborValue::Text(s) => Ok(Json::String(s.clone())),
                _ => Err(mismatch("string", found())),
            },
            TypeDescriptor::Binary => match value {
                CborValue::Bytes(b) => Ok(Json::String(STANDARD.encode(b))),
                _ => Err(mismatch("binary", found())),
            },
            TypeDescriptor::Empty => match value {
                CborValue::Null => Ok(Json::Null),
                _ => Err(mismatch("empty", found())),
            },
            TypeDescriptor::InstanceIdentifier => {
                let inner = untag(value, TAG_INSTANCE_ID, in_union)
                    .ok_or_else(|| mismatch("instance-identifier", found()))?;
                let (sid, keys): (&CborValue, Vec<String>) = match inner {
                    CborValue::Array(items) => match items.split_first() {
                        Some((sid, keys)) => (sid, keys.iter().map(key_string).collect()),
                        None => return Err(mismatch("instance-identifier", "empty array")),
                    },
                    other => (other, Vec::new()),
                };
                let sid = cbor::as_i128(sid)
                    .and_then(|v| u64::try_from(v).ok())
                    .ok_or_else(|| mismatch("instance-identifier SID", found()))?;
                let path = InstancePath::from_address(self.index, sid, &keys)?;
                Ok(Json::String(path.to_string()))
            }
            TypeDescriptor::Unknown => Ok(json_from_cbor(value)),
            int_ty => {
                let (min, max) = int_ty
                    .integer_range()
                    .ok_or_else(|| mismatch("integer", found()))?;
                let v = cbor::as_i128(value).ok_or_else(|| mismatch(int_ty.name(), found()))?;
                if v < min || v > max {
                    return Err(mismatch(int_ty.name(), v));
                }
                Ok(structural::integer_to_json(v))
            }
        }
    }

    fn leafref_target(&self, path: &Option<String>, depth: u8) -> Option<&'a TypeDescriptor> {
        if depth >= MAX_LEAFREF_DEPTH {
            return None;
        }
        path.as_deref().and_then(|p| self.index.type_at(p))
    }
}

// ---------------------------------------------------------------------------
// Per-type helpers
// ---------------------------------------------------------------------------

fn encode_enum(value: &Json, enums: &EnumTable) -> Result<i64, ValueError> {
    let declared = |v: i64| enums.name_of(v).map(|_| v);
    let v = match value {
        Json::String(name) => enums
            .value_of(name)
            .or_else(|| name.trim().parse::<i64>().ok().and_then(declared)),
        Json::Number(n) => n.as_i64().and_then(declared),
        _ => None,
    };
    v.ok_or_else(|| mismatch("enumeration", value))
}

fn encode_bits(value: &Json, bits: &BitTable) -> Result<Vec<u8>, ValueError> {
    let names: Vec<&str> = match value {
        Json::String(s) => s.split_whitespace().collect(),
        Json::Array(items) => items
            .iter()
            .map(|i| i.as_str().ok_or_else(|| mismatch("bit name", i)))
            .collect::<Result<_, _>>()?,
        other => return Err(mismatch("bits", other)),
    };
    let mut out: Vec<u8> = Vec::new();
    for name in names {
        let pos = bits
            .position_of(name)
            .ok_or_else(|| mismatch("declared bit name", name))? as usize;
        let byte = pos / 8;
        if out.len() <= byte {
            out.resize(byte + 1, 0);
        }
        out[byte] |= 1 << (pos % 8);
    }
    Ok(out)
}

fn decode_bits(bytes: &[u8], bits: &BitTable) -> Result<String, ValueError> {
    let mut names = Vec::new();
    for (i, byte) in bytes.iter().enumerate() {
        for bit in 0..8 {
            if byte & (1 << bit) != 0 {
                let pos = (i * 8 + bit) as u32;
                names.push(
                    bits.name_at(pos)
                        .ok_or_else(|| mismatch("declared bit position", pos))?,
                );
            }
        }
    }
    Ok(names.join(" "))
}

fn json_integer(value: &Json) -> Option<i128> {
    match value {
        Json::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn integer_to_cbor(v: i128) -> CborValue {
    match (u64::try_from(v), i64::try_from(v)) {
        (Ok(u), _) => cbor::uint(u),
        (_, Ok(i)) => cbor::int(i),
        // Callers range-check against 64-bit types first.
        _ => CborValue::Null,
    }
}
