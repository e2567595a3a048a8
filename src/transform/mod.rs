// Delta-SID transformation between JSON configuration and SID-keyed CBOR.
//
// # Modules
//
// - `key`: container key forms (delta, absolute, text, instance address)
// - `order`: device-preferred and canonical entry ordering
// - `encoder`: JSON -> delta-keyed tree
// - `decoder`: CBOR -> JSON, with unknown keys reported as warnings
// - `flatten`: nested output as `"/a/b" -> leaf` pairs

pub mod decoder;
pub mod encoder;
pub mod flatten;
pub mod key;
pub mod order;

use serde_json::Value as Json;

use crate::cbor::CborValue;
use crate::error::FormatError;
use crate::instance_id::InstancePath;

pub use decoder::{DecodeWarning, Detransformed, Detransformer};
pub use encoder::Transformer;
pub use flatten::flatten;
pub use key::{InstanceKey, SidKey};

// ---------------------------------------------------------------------------
// Delta-keyed tree
// ---------------------------------------------------------------------------

/// A transformed value before container encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaNode {
    Leaf(CborValue),
    /// Leaf-list values or list entries.
    List(Vec<DeltaNode>),
    Container(DeltaMap),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeltaEntry {
    pub key: SidKey,
    /// Absolute SID of the node; `None` for text keys.
    pub sid: Option<u64>,
    pub node: DeltaNode,
}

/// Entries of one container level, with the traversal parent they are
/// keyed against.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeltaMap {
    pub parent: Option<u64>,
    pub entries: Vec<DeltaEntry>,
}

impl DeltaNode {
    pub fn to_cbor(&self) -> CborValue {
        match self {
            Self::Leaf(v) => v.clone(),
            Self::List(items) => CborValue::Array(items.iter().map(Self::to_cbor).collect()),
            Self::Container(map) => map.to_cbor(),
        }
    }
}

impl DeltaMap {
    pub fn to_cbor(&self) -> CborValue {
        CborValue::Map(
            self.entries
                .iter()
                .map(|e| (e.key.to_cbor(), e.node.to_cbor()))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Input detection
// ---------------------------------------------------------------------------

/// Instance-identifier addressed input.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// Bare paths: a read query.
    Paths(Vec<InstancePath>),
    /// `{path: value}` pairs: a write.
    Patches(Vec<(InstancePath, Json)>),
}

fn is_path_key(key: &str) -> bool {
    key.starts_with('/')
}

impl QueryInput {
    /// Classify a parsed YAML/JSON document.
    ///
    /// Accepts a list of path strings, a list of single-entry `{path: value}`
    /// maps, or one map whose keys are all paths. Configuration trees keyed
    /// by node names are rejected.
    pub fn detect(input: &Json) -> Result<Self, FormatError> {
        match input {
            Json::String(s) => Ok(Self::Paths(vec![InstancePath::parse(s)?])),
            Json::Array(items) if items.is_empty() => {
                Err(FormatError::InvalidInput("empty query list".into()))
            }
            Json::Array(items) if items.iter().all(Json::is_string) => items
                .iter()
                .filter_map(Json::as_str)
                .map(InstancePath::parse)
                .collect::<Result<_, _>>()
                .map(Self::Paths),
            Json::Array(items) => {
                let mut patches = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let pair = item
                        .as_object()
                        .filter(|m| m.len() == 1)
                        .and_then(|m| m.iter().next())
                        .filter(|(k, _)| is_path_key(k))
                        .ok_or_else(|| {
                            FormatError::NotInstanceIdentifier(format!(
                                "item {i} is neither a path nor a single {{path: value}} entry"
                            ))
                        })?;
                    patches.push((InstancePath::parse(pair.0)?, pair.1.clone()));
                }
                Ok(Self::Patches(patches))
            }
            Json::Object(map) if !map.is_empty() && map.keys().all(|k| is_path_key(k)) => map
                .iter()
                .map(|(k, v)| Ok((InstancePath::parse(k)?, v.clone())))
                .collect::<Result<_, FormatError>>()
                .map(Self::Patches),
            Json::Object(_) => Err(FormatError::NotInstanceIdentifier(
                "configuration trees must be addressed by instance-identifier paths".into(),
            )),
            other => Err(FormatError::NotInstanceIdentifier(format!(
                "unsupported input: {other}"
            ))),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Paths(p) => p.len(),
            Self::Patches(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_paths() {
        let q = QueryInput::detect(&json!(["/m:a", "/m:a/b[k='1']"])).unwrap();
        assert!(matches!(q, QueryInput::Paths(ref p) if p.len() == 2));
    }

    #[test]
    fn detects_patch_lists_and_maps() {
        let list = QueryInput::detect(&json!([{"/m:a/x": 1}, {"/m:a/y": "z"}])).unwrap();
        let QueryInput::Patches(items) = list else {
            panic!("expected patches");
        };
        assert_eq!(items[1].0.to_string(), "/m:a/y");
        assert_eq!(items[1].1, json!("z"));

        let map = QueryInput::detect(&json!({"/m:a/x": 1, "/m:a/y": 2})).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn rejects_trees_and_mixed_lists() {
        for input in [
            json!({"interfaces": {"interface": []}}),
            json!(["/m:a", {"/m:b": 1}]),
            json!([{"/m:a": 1, "/m:b": 2}]),
            json!(42),
        ] {
            assert!(
                matches!(
                    QueryInput::detect(&input),
                    Err(FormatError::NotInstanceIdentifier(_))
                ),
                "{input}"
            );
        }
        assert!(matches!(
            QueryInput::detect(&json!(["not-a-path"])),
            Err(FormatError::InvalidPath { .. })
        ));
    }
}
