// JSON -> delta-keyed tree.

use log::{debug, warn};
use serde_json::{Map, Value as Json};

use crate::cbor::CborValue;
use crate::config::{ConverterOptions, UnknownKeyPolicy};
use crate::error::{Error, Result};
use crate::instance_id::{InstancePath, ResolvedKey};
use crate::schema::SchemaIndex;
use crate::value::{ValueCodec, cbor_from_json};

use super::key::{InstanceKey, SidKey};
use super::order::order_entries;
use super::{DeltaEntry, DeltaMap, DeltaNode};

pub struct Transformer<'a> {
    index: &'a SchemaIndex,
    codec: ValueCodec<'a>,
    options: &'a ConverterOptions,
}

impl<'a> Transformer<'a> {
    pub fn new(index: &'a SchemaIndex, options: &'a ConverterOptions) -> Self {
        Self {
            index,
            codec: ValueCodec::new(index),
            options,
        }
    }

    /// `{[sid, keys...]: value}` for one patch item.
    pub fn patch(&self, target: &InstancePath, value: &Json) -> Result<CborValue> {
        let resolved = target.resolve(self.index)?;
        let key = InstanceKey::new(resolved.sid, self.encode_keys(&resolved.keys)?);
        let node = self.node(value, resolved.sid, &resolved.schema_path)?;
        debug!("patch {target} -> SID {}", resolved.sid);
        Ok(CborValue::Map(vec![(key.to_cbor(), node.to_cbor())]))
    }

    /// `sid` or `[sid, keys...]` for one read query path.
    pub fn address(&self, target: &InstancePath) -> Result<InstanceKey> {
        let resolved = if self.options.query_fallback {
            let (resolved, dropped) = target.resolve_nearest(self.index)?;
            if dropped > 0 {
                warn!(
                    "'{target}': last {dropped} component(s) have no SID; querying SID {} instead",
                    resolved.sid
                );
            }
            resolved
        } else {
            target.resolve(self.index)?
        };
        Ok(InstanceKey::new(resolved.sid, self.encode_keys(&resolved.keys)?))
    }

    /// Whole configuration tree keyed by top-level node names.
    pub fn tree(&self, config: &Json) -> Result<DeltaMap> {
        let Json::Object(map) = config else {
            return Err(crate::error::FormatError::InvalidInput(
                "datastore content must be a map of top-level nodes".into(),
            )
            .into());
        };
        self.children(map, None, "/")
    }

    fn encode_keys(&self, keys: &[ResolvedKey]) -> Result<Vec<CborValue>> {
        keys.iter()
            .map(|k| {
                let ty = k.leaf_sid.and_then(|s| self.index.type_of(s));
                let text = Json::String(k.value.clone());
                self.codec.encode(&text, ty, false).map_err(Error::from)
            })
            .collect()
    }

    fn node(&self, value: &Json, sid: u64, schema_path: &str) -> Result<DeltaNode> {
        Ok(match value {
            Json::Object(map) => DeltaNode::Container(self.children(map, Some(sid), schema_path)?),
            Json::Array(items) => DeltaNode::List(
                items
                    .iter()
                    .map(|item| self.node(item, sid, schema_path))
                    .collect::<Result<_>>()?,
            ),
            scalar => DeltaNode::Leaf(self.codec.encode(scalar, self.index.type_of(sid), false)?),
        })
    }

    fn children(
        &self,
        map: &Map<String, Json>,
        parent: Option<u64>,
        context: &str,
    ) -> Result<DeltaMap> {
        let mut entries = Vec::with_capacity(map.len());
        for (name, value) in map {
            match self.index.resolve_entry(name, context) {
                Ok(entry) => {
                    let node = self.node(value, entry.sid, &entry.stripped_path)?;
                    entries.push(DeltaEntry {
                        key: SidKey::for_node(self.index, entry.sid, parent),
                        sid: Some(entry.sid),
                        node,
                    });
                }
                Err(e) => match self.options.unknown_keys {
                    UnknownKeyPolicy::Abort => return Err(e.into()),
                    UnknownKeyPolicy::Text => {
                        warn!("'{name}' under '{context}' has no SID; keeping it as a text key");
                        entries.push(DeltaEntry {
                            key: SidKey::Text(name.clone()),
                            sid: None,
                            node: DeltaNode::Leaf(cbor_from_json(value)),
                        });
                    }
                },
            }
        }
        order_entries(&mut entries, self.index, parent, self.options.container_mode);
        Ok(DeltaMap { parent, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbor;
    use crate::error::SchemaError;
    use crate::schema::{Catalog, EnumTable, Namespace, SidFile, SidItem, TypeDescriptor};
    use serde_json::json;

    fn index() -> SchemaIndex {
        let items = [
            (2000, "/ietf-interfaces:interfaces"),
            (2033, "/ietf-interfaces:interfaces/interface"),
            (2034, "/ietf-interfaces:interfaces/interface/name"),
            (2035, "/ietf-interfaces:interfaces/interface/enabled"),
            (2036, "/ietf-interfaces:interfaces/interface/state"),
            (2040, "/ietf-interfaces:interfaces/interface/ietf-ip:ipv4"),
            (2041, "/ietf-interfaces:interfaces/interface/ietf-ip:ipv4/mtu"),
            (3000, "/m:ports/port"),
            (3001, "/m:ports/port/index"),
        ]
        .into_iter()
        .map(|(sid, id)| SidItem {
            namespace: Namespace::Data,
            identifier: id.into(),
            sid,
        })
        .collect();
        SchemaIndex::builder()
            .sid_file(SidFile {
                module_name: "ietf-interfaces".into(),
                module_revision: None,
                items,
            })
            .catalog(
                Catalog::new()
                    .with_type(
                        "/ietf-interfaces:interfaces/interface/state",
                        TypeDescriptor::Enumeration {
                            enums: EnumTable::from([("down", 0), ("up", 1)]),
                        },
                    )
                    .with_type("/m:ports/port/index", TypeDescriptor::Uint16),
            )
            .build()
    }

    #[test]
    fn query_address_scenario() {
        let idx = SchemaIndex::builder()
            .sid_file(SidFile {
                module_name: "ietf-interfaces".into(),
                module_revision: None,
                items: vec![
                    SidItem {
                        namespace: Namespace::Data,
                        identifier: "/ietf-interfaces:interfaces/interface".into(),
                        sid: 2033,
                    },
                    SidItem {
                        namespace: Namespace::Data,
                        identifier: "/ietf-interfaces:interfaces/interface/name".into(),
                        sid: 2034,
                    },
                ],
            })
            .build();
        let options = ConverterOptions::default();
        let t = Transformer::new(&idx, &options);
        let path = InstancePath::parse("/if:interfaces/if:interface[name='1']/enabled").unwrap();
        assert_eq!(
            t.address(&path).unwrap().to_cbor(),
            CborValue::Array(vec![cbor::uint(2033), CborValue::Text("1".into())])
        );
        assert_eq!(idx.parent_delta_of("/interfaces/interface/name"), Some((2033, 1)));

        let strict = ConverterOptions {
            query_fallback: false,
            ..Default::default()
        };
        let t = Transformer::new(&idx, &strict);
        assert!(matches!(t.address(&path), Err(Error::Schema(_))));
    }

    #[test]
    fn typed_keys_in_address() {
        let idx = index();
        let options = ConverterOptions::default();
        let t = Transformer::new(&idx, &options);
        let path = InstancePath::parse("/m:ports/port[index='7']").unwrap();
        assert_eq!(
            t.address(&path).unwrap(),
            InstanceKey::Entry {
                sid: 3000,
                keys: vec![cbor::uint(7)]
            }
        );
    }

    #[test]
    fn patch_with_nested_container_uses_deltas() {
        let idx = index();
        let options = ConverterOptions::default();
        let t = Transformer::new(&idx, &options);
        let path = InstancePath::parse("/ietf-interfaces:interfaces/interface[name='eth0']").unwrap();
        let value = json!({"ietf-ip:ipv4": {"mtu": 1500}, "enabled": true, "state": "up"});
        let encoded = t.patch(&path, &value).unwrap();
        let expected = CborValue::Map(vec![(
            CborValue::Array(vec![cbor::uint(2033), CborValue::Text("eth0".into())]),
            CborValue::Map(vec![
                (cbor::uint(2), CborValue::Bool(true)),
                (cbor::uint(3), cbor::uint(1)),
                (
                    cbor::uint(7),
                    CborValue::Map(vec![(cbor::uint(1), cbor::uint(1500))]),
                ),
            ]),
        )]);
        assert_eq!(encoded, expected);
    }

    #[test]
    fn lists_map_element_wise() {
        let idx = index();
        let options = ConverterOptions::default();
        let t = Transformer::new(&idx, &options);
        let path = InstancePath::parse("/ietf-interfaces:interfaces").unwrap();
        let value = json!({"interface": [{"name": "a"}, {"name": "b", "enabled": false}]});
        let encoded = t.patch(&path, &value).unwrap();
        let CborValue::Map(top) = encoded else { panic!() };
        assert_eq!(top[0].0, cbor::uint(2000));
        let CborValue::Map(inner) = &top[0].1 else { panic!() };
        assert_eq!(inner[0].0, cbor::uint(33));
        let CborValue::Array(list) = &inner[0].1 else { panic!() };
        assert_eq!(list.len(), 2);
        assert_eq!(
            list[1],
            CborValue::Map(vec![
                (cbor::uint(1), CborValue::Text("b".into())),
                (cbor::uint(2), CborValue::Bool(false)),
            ])
        );
    }

    #[test]
    fn unknown_key_policy() {
        let idx = index();
        let path = InstancePath::parse("/ietf-interfaces:interfaces/interface[name='eth0']").unwrap();
        let value = json!({"enabled": true, "vendor-extra": 5});

        let abort = ConverterOptions::default();
        assert!(matches!(
            Transformer::new(&idx, &abort).patch(&path, &value),
            Err(Error::Schema(SchemaError::UnknownNode { .. }))
        ));

        let text = ConverterOptions {
            unknown_keys: UnknownKeyPolicy::Text,
            ..Default::default()
        };
        let encoded = Transformer::new(&idx, &text).patch(&path, &value).unwrap();
        let CborValue::Map(top) = encoded else { panic!() };
        assert_eq!(
            top[0].1,
            CborValue::Map(vec![
                (cbor::uint(2), CborValue::Bool(true)),
                (CborValue::Text("vendor-extra".into()), cbor::uint(5)),
            ])
        );
    }

    #[test]
    fn type_mismatch_is_reported() {
        let idx = index();
        let options = ConverterOptions::default();
        let t = Transformer::new(&idx, &options);
        let path = InstancePath::parse("/ietf-interfaces:interfaces/interface[name='eth0']/state").unwrap();
        assert!(matches!(t.patch(&path, &json!("sideways")), Err(Error::Type(_))));
    }

    #[test]
    fn tree_is_absolute_at_top() {
        let idx = index();
        let options = ConverterOptions::default();
        let t = Transformer::new(&idx, &options);
        let tree = t.tree(&json!({"ietf-interfaces:interfaces": {}})).unwrap();
        assert_eq!(tree.entries[0].key, SidKey::Absolute(2000));
        assert!(t.tree(&json!([1])).is_err());
    }
}
