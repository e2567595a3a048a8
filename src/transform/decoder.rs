// SID-keyed CBOR -> JSON.
//
// Integer keys are tried as a delta from the traversal parent first. The
// delta reading is accepted only if the node it lands on has that parent in
// the schema; otherwise the key is read as an absolute SID. Keys that match
// neither get a placeholder name and a warning, and decoding continues.

use std::fmt;

use log::warn;
use serde_json::{Map, Value as Json};

use crate::cbor::{self, CborValue};
use crate::instance_id::InstancePath;
use crate::schema::{PathEntry, SchemaIndex, TypeDescriptor, path};
use crate::value::{ValueCodec, json_from_cbor, key_string};

use super::key::InstanceKey;

/// A non-fatal problem found while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeWarning {
    /// Location in the decoded output (local names joined with `/`).
    pub location: String,
    pub message: String,
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Detransformed {
    pub value: Json,
    pub warnings: Vec<DecodeWarning>,
}

impl Detransformed {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

pub struct Detransformer<'a> {
    index: &'a SchemaIndex,
    codec: ValueCodec<'a>,
    warnings: Vec<DecodeWarning>,
}

impl<'a> Detransformer<'a> {
    pub fn new(index: &'a SchemaIndex) -> Self {
        Self {
            index,
            codec: ValueCodec::new(index),
            warnings: Vec::new(),
        }
    }

    /// Decode a container whose top level is keyed by absolute SIDs (or
    /// instance addresses) into nested local names.
    pub fn detransform(self, container: &CborValue) -> Detransformed {
        self.detransform_under(container, None)
    }

    /// Decode a container whose keys are relative to `parent`.
    pub fn detransform_under(mut self, container: &CborValue, parent: Option<u64>) -> Detransformed {
        let value = match container {
            CborValue::Map(entries) => self.map(entries, parent, ""),
            CborValue::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|item| match item {
                        CborValue::Map(entries) => self.map(entries, parent, ""),
                        other => json_from_cbor(other),
                    })
                    .collect(),
            ),
            other => {
                self.warn("", format!("expected a map, got {}", cbor::kind_name(other)));
                json_from_cbor(other)
            }
        };
        self.finish(value)
    }

    /// Decode an instance container into `{instance-path: value}` pairs.
    pub fn detransform_instances(mut self, container: &CborValue) -> Detransformed {
        let CborValue::Map(entries) = container else {
            self.warn("", format!("expected a map, got {}", cbor::kind_name(container)));
            let value = json_from_cbor(container);
            return self.finish(value);
        };
        let mut out = Map::with_capacity(entries.len());
        for (k, v) in entries {
            let (name, value) = match InstanceKey::from_cbor(k) {
                Some(key) => self.instance(&key, v),
                None => self.unknown(&key_string(k), "", v),
            };
            out.insert(name, value);
        }
        self.finish(Json::Object(out))
    }

    /// Node a key denotes under `parent`: delta first, then absolute.
    pub fn resolve_key(&self, key: i128, parent: Option<u64>) -> Option<&'a PathEntry> {
        if let Some(p) = parent
            && let Ok(candidate) = u64::try_from(key + i128::from(p))
            && let Some(entry) = self.index.entry(candidate)
            && entry.parent_sid == Some(p)
        {
            return Some(entry);
        }
        u64::try_from(key).ok().and_then(|sid| self.index.entry(sid))
    }

    fn finish(self, value: Json) -> Detransformed {
        Detransformed {
            value,
            warnings: self.warnings,
        }
    }

    fn warn(&mut self, location: &str, message: String) {
        let location = if location.is_empty() { "/" } else { location };
        warn!("{location}: {message}");
        self.warnings.push(DecodeWarning {
            location: location.to_string(),
            message,
        });
    }

    fn unknown(&mut self, key: &str, trail: &str, value: &CborValue) -> (String, Json) {
        let name = format!("unknown-{key}");
        self.warn(trail, format!("key {key} matches no known SID"));
        (name, json_from_cbor(value))
    }

    fn instance(&mut self, key: &InstanceKey, value: &CborValue) -> (String, Json) {
        let sid = key.sid();
        let Some(path) = self.instance_path(key) else {
            return self.unknown(&sid.to_string(), "", value);
        };
        let name = path.to_string();
        let decoded = self.node(value, sid, &name);
        (name, decoded)
    }

    /// Rebuild the instance path for an address, decoding key values with
    /// their key leaf types when known.
    pub fn instance_path(&self, key: &InstanceKey) -> Option<InstancePath> {
        let raw = key.keys();
        let texts: Vec<String> = raw.iter().map(key_string).collect();
        let mut path = InstancePath::from_address(self.index, key.sid(), &texts).ok()?;

        let mut context = String::from("/");
        let mut i = 0;
        for component in path.components_mut() {
            context = path::join(&context, &component.name);
            for predicate in &mut component.predicates {
                if let (Some(value), false) = (raw.get(i), predicate.key == ".")
                    && let Ok(leaf) = self.index.resolve(&predicate.key, &context)
                    && let Some(ty) = self.index.type_of(leaf)
                    && let Ok(decoded) = self.codec.decode(value, Some(ty), false)
                {
                    predicate.value = match decoded {
                        Json::String(s) => s,
                        other => other.to_string(),
                    };
                }
                i += 1;
            }
        }
        Some(path)
    }

    fn map(&mut self, entries: &[(CborValue, CborValue)], parent: Option<u64>, trail: &str) -> Json {
        let mut out = Map::with_capacity(entries.len());
        for (k, v) in entries {
            let (name, value) = match k {
                CborValue::Integer(i) => match self.resolve_key(i128::from(*i), parent) {
                    Some(entry) => {
                        let here = format!("{trail}/{}", entry.local_name);
                        (entry.local_name.clone(), self.node(v, entry.sid, &here))
                    }
                    None => self.unknown(&i128::from(*i).to_string(), trail, v),
                },
                CborValue::Array(_) => match InstanceKey::from_cbor(k) {
                    Some(key) => self.instance(&key, v),
                    None => self.unknown(&key_string(k), trail, v),
                },
                CborValue::Text(name) => (name.clone(), json_from_cbor(v)),
                other => self.unknown(&key_string(other), trail, v),
            };
            out.insert(name, value);
        }
        Json::Object(out)
    }

    fn node(&mut self, value: &CborValue, sid: u64, trail: &str) -> Json {
        match value {
            CborValue::Map(entries) => self.map(entries, Some(sid), trail),
            CborValue::Array(items) if !self.is_array_leaf(items, sid) => Json::Array(
                items
                    .iter()
                    .map(|item| self.node(item, sid, trail))
                    .collect(),
            ),
            leaf => self.leaf(leaf, sid, trail),
        }
    }

    /// An instance-identifier leaf is itself an array `[sid, key...]`.
    fn is_array_leaf(&self, items: &[CborValue], sid: u64) -> bool {
        matches!(self.index.type_of(sid), Some(TypeDescriptor::InstanceIdentifier))
            && matches!(items.first(), Some(CborValue::Integer(_)))
    }

    fn leaf(&mut self, value: &CborValue, sid: u64, trail: &str) -> Json {
        let ty = self.index.type_of(sid);
        match self.codec.decode(value, ty, false) {
            Ok(v) => v,
            Err(e) => {
                self.warn(trail, format!("value does not match its declared type: {e}"));
                json_from_cbor(value)
            }
        }
    }
}
