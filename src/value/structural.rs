// Structural JSON <-> CBOR mapping for values without a modeled type.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Number, Value as Json};

use crate::cbor::{self, CborValue, TAG_DECIMAL_FRACTION};

use super::{decimal, normalize_mac};

/// Encode a JSON value by its shape: booleans, numbers, strings, arrays and
/// objects map onto their CBOR counterparts. Strings are MAC-normalized.
pub fn cbor_from_json(value: &Json) -> CborValue {
    match value {
        Json::Null => CborValue::Null,
        Json::Bool(b) => CborValue::Bool(*b),
        Json::Number(n) => number_to_cbor(n),
        Json::String(s) => CborValue::Text(normalize_mac(s).unwrap_or_else(|| s.clone())),
        Json::Array(items) => CborValue::Array(items.iter().map(cbor_from_json).collect()),
        Json::Object(map) => CborValue::Map(
            map.iter()
                .map(|(k, v)| (CborValue::Text(k.clone()), cbor_from_json(v)))
                .collect(),
        ),
    }
}

pub(crate) fn number_to_cbor(n: &Number) -> CborValue {
    if let Some(u) = n.as_u64() {
        cbor::uint(u)
    } else if let Some(i) = n.as_i64() {
        cbor::int(i)
    } else {
        CborValue::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Decode a CBOR item by its shape. Map keys become strings, byte strings
/// become base64 text and decimal fractions become numbers.
pub fn json_from_cbor(value: &CborValue) -> Json {
    match value {
        CborValue::Integer(i) => integer_to_json(i128::from(*i)),
        CborValue::Bytes(b) => Json::String(STANDARD.encode(b)),
        CborValue::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        CborValue::Text(s) => Json::String(s.clone()),
        CborValue::Bool(b) => Json::Bool(*b),
        CborValue::Null => Json::Null,
        CborValue::Tag(TAG_DECIMAL_FRACTION, inner) => {
            decimal_fraction(inner).unwrap_or_else(|| json_from_cbor(inner))
        }
        CborValue::Tag(_, inner) => json_from_cbor(inner),
        CborValue::Array(items) => Json::Array(items.iter().map(json_from_cbor).collect()),
        CborValue::Map(entries) => {
            let mut out = Map::with_capacity(entries.len());
            for (k, v) in entries {
                out.insert(key_string(k), json_from_cbor(v));
            }
            Json::Object(out)
        }
        _ => Json::Null,
    }
}

pub(crate) fn integer_to_json(i: i128) -> Json {
    if let Ok(u) = u64::try_from(i) {
        Json::from(u)
    } else if let Ok(s) = i64::try_from(i) {
        Json::from(s)
    } else {
        Json::String(i.to_string())
    }
}

/// `[exponent, mantissa]` under tag 4, as a JSON number.
pub(crate) fn decimal_fraction(inner: &CborValue) -> Option<Json> {
    let CborValue::Array(parts) = inner else {
        return None;
    };
    let [exp, mantissa] = parts.as_slice() else {
        return None;
    };
    let exp = i64::try_from(cbor::as_i128(exp)?).ok()?;
    let v = decimal::from_mantissa(exp, cbor::as_i128(mantissa)?)?;
    Number::from_f64(v).map(Json::Number)
}

/// String form of a map key.
pub fn key_string(key: &CborValue) -> String {
    match key {
        CborValue::Text(s) => s.clone(),
        CborValue::Integer(i) => i128::from(*i).to_string(),
        other => json_from_cbor(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_to_cbor_by_shape() {
        let v = cbor_from_json(&json!({"a": [1, -2, 1.5, true, null, "00:11:22:33:44:55"]}));
        assert_eq!(
            v,
            CborValue::Map(vec![(
                CborValue::Text("a".into()),
                CborValue::Array(vec![
                    cbor::uint(1),
                    cbor::int(-2),
                    CborValue::Float(1.5),
                    CborValue::Bool(true),
                    CborValue::Null,
                    CborValue::Text("00-11-22-33-44-55".into()),
                ])
            )])
        );
    }

    #[test]
    fn cbor_to_json_stringifies_keys() {
        let v = CborValue::Map(vec![
            (cbor::uint(1024), CborValue::Text("bad".into())),
            (cbor::int(-3), CborValue::Bytes(vec![1, 2, 3])),
        ]);
        assert_eq!(json_from_cbor(&v), json!({"1024": "bad", "-3": "AQID"}));
    }

    #[test]
    fn decimal_fraction_becomes_number() {
        let v = CborValue::Tag(
            TAG_DECIMAL_FRACTION,
            Box::new(CborValue::Array(vec![cbor::int(-2), cbor::uint(314)])),
        );
        assert_eq!(json_from_cbor(&v), json!(3.14));
        // Other tags are transparent.
        let tagged = CborValue::Tag(44, Box::new(cbor::uint(2)));
        assert_eq!(json_from_cbor(&tagged), json!(2));
    }

    #[test]
    fn wide_integers_survive_as_strings() {
        assert_eq!(integer_to_json(-(1i128 << 64)), json!("-18446744073709551616"));
        assert_eq!(integer_to_json(u64::MAX as i128), json!(u64::MAX));
    }
}
