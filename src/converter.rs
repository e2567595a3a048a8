// Converter: a loaded schema plus options, and the encode/decode entry
// points the client and the CLI use.
//
// The index is built once and only read afterwards, so one converter can
// serve concurrent encode/decode calls.

use serde_json::Value as Json;

use crate::cbor::{self, CborValue};
use crate::coap::PayloadKind;
use crate::config::ConverterOptions;
use crate::error::Result;
use crate::instance_id::InstancePath;
use crate::schema::SchemaIndex;
use crate::transform::{DecodeWarning, Detransformed, Detransformer, InstanceKey, Transformer};

#[derive(Debug, Clone)]
pub struct Converter {
    index: SchemaIndex,
    options: ConverterOptions,
}

impl Converter {
    pub fn new(index: SchemaIndex, options: ConverterOptions) -> Self {
        Self { index, options }
    }

    pub fn index(&self) -> &SchemaIndex {
        &self.index
    }

    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    pub fn transformer(&self) -> Transformer<'_> {
        Transformer::new(&self.index, &self.options)
    }

    pub fn detransformer(&self) -> Detransformer<'_> {
        Detransformer::new(&self.index)
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    pub fn query_addresses(&self, paths: &[InstancePath]) -> Result<Vec<InstanceKey>> {
        let t = self.transformer();
        paths.iter().map(|p| t.address(p)).collect()
    }

    /// FETCH payload: the addresses of `paths` as a CBOR sequence.
    pub fn encode_query(&self, paths: &[InstancePath]) -> Result<Vec<u8>> {
        let items: Vec<CborValue> = self
            .query_addresses(paths)?
            .iter()
            .map(InstanceKey::to_cbor)
            .collect();
        Ok(cbor::encode_sequence(&items, self.options.container_mode)?)
    }

    /// iPATCH payload for one item.
    pub fn encode_patch(&self, target: &InstancePath, value: &Json) -> Result<Vec<u8>> {
        let item = self.transformer().patch(target, value)?;
        Ok(cbor::encode(&item, self.options.container_mode)?)
    }

    /// One payload per item; failures stay attached to their item.
    pub fn encode_patches(&self, items: &[(InstancePath, Json)]) -> Vec<Result<Vec<u8>>> {
        items
            .iter()
            .map(|(path, value)| self.encode_patch(path, value))
            .collect()
    }

    /// Like [`encode_patches`](Self::encode_patches), spread over the rayon
    /// pool. Output order matches input order.
    #[cfg(feature = "parallel")]
    pub fn encode_patches_parallel(&self, items: &[(InstancePath, Json)]) -> Vec<Result<Vec<u8>>> {
        use rayon::prelude::*;

        items
            .par_iter()
            .map(|(path, value)| self.encode_patch(path, value))
            .collect()
    }

    /// PUT payload: a whole configuration tree keyed by top-level names.
    pub fn encode_datastore(&self, config: &Json) -> Result<Vec<u8>> {
        let tree = self.transformer().tree(config)?;
        Ok(cbor::encode(&tree.to_cbor(), self.options.container_mode)?)
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    /// Instance sequence (FETCH response) -> `{instance-path: value}`.
    pub fn decode_instances(&self, payload: &[u8]) -> Result<Detransformed> {
        let merged = cbor::merge_items(cbor::decode_sequence(payload)?)?;
        Ok(self.detransformer().detransform_instances(&merged))
    }

    /// FETCH payload -> the instance paths it addresses.
    pub fn decode_query(&self, payload: &[u8]) -> Result<Detransformed> {
        let detransformer = self.detransformer();
        let mut out = Detransformed::default();
        let mut paths = Vec::new();
        for (i, item) in cbor::decode_sequence(payload)?.iter().enumerate() {
            match InstanceKey::from_cbor(item).and_then(|k| detransformer.instance_path(&k)) {
                Some(path) => paths.push(Json::String(path.to_string())),
                None => {
                    out.warnings.push(DecodeWarning {
                        location: format!("[{i}]"),
                        message: "address does not resolve to a known node".into(),
                    });
                    paths.push(crate::value::json_from_cbor(item));
                }
            }
        }
        out.value = Json::Array(paths);
        Ok(out)
    }

    /// SID-keyed container(s) -> nested local names.
    pub fn decode_tree(&self, payload: &[u8]) -> Result<Detransformed> {
        let merged = cbor::merge_items(cbor::decode_sequence(payload)?)?;
        Ok(self.detransformer().detransform(&merged))
    }

    /// Decode by the content format the response actually carried.
    pub fn decode_payload(&self, kind: PayloadKind, payload: &[u8]) -> Result<Detransformed> {
        match kind {
            PayloadKind::Instances => self.decode_instances(payload),
            PayloadKind::Datastore => self.decode_tree(payload),
            PayloadKind::Cbor => {
                let item = cbor::decode_item(payload)?;
                Ok(self.detransformer().detransform(&item))
            }
            PayloadKind::Text => Ok(Detransformed {
                value: Json::String(String::from_utf8_lossy(payload).into_owned()),
                warnings: Vec::new(),
            }),
            PayloadKind::Unspecified if payload.is_empty() => Ok(Detransformed::default()),
            PayloadKind::Unspecified | PayloadKind::Unknown(_) => {
                let items = cbor::decode_sequence(payload)?;
                let value = match items.as_slice() {
                    [one] => crate::value::json_from_cbor(one),
                    many => Json::Array(many.iter().map(crate::value::json_from_cbor).collect()),
                };
                Ok(Detransformed {
                    value,
                    warnings: vec![DecodeWarning {
                        location: "/".into(),
                        message: "response has no YANG content format; decoded structurally"
                            .into(),
                    }],
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Namespace, SidFile, SidItem};
    use serde_json::json;

    fn converter() -> Converter {
        let items = [
            (2000, "/ietf-interfaces:interfaces"),
            (2033, "/ietf-interfaces:interfaces/interface"),
            (2034, "/ietf-interfaces:interfaces/interface/name"),
            (2035, "/ietf-interfaces:interfaces/interface/enabled"),
        ]
        .into_iter()
        .map(|(sid, id)| SidItem {
            namespace: Namespace::Data,
            identifier: id.into(),
            sid,
        })
        .collect();
        let index = SchemaIndex::builder()
            .sid_file(SidFile {
                module_name: "ietf-interfaces".into(),
                module_revision: None,
                items,
            })
            .build();
        Converter::new(index, ConverterOptions::default())
    }

    #[test]
    fn query_payload_is_a_sequence() {
        let c = converter();
        let paths = vec![
            InstancePath::parse("/ietf-interfaces:interfaces").unwrap(),
            InstancePath::parse("/ietf-interfaces:interfaces/interface[name='1']").unwrap(),
        ];
        let bytes = c.encode_query(&paths).unwrap();
        // 2000, [2033, "1"]
        assert_eq!(
            bytes,
            vec![0x19, 0x07, 0xD0, 0x82, 0x19, 0x07, 0xF1, 0x61, b'1']
        );
    }

    #[test]
    fn patch_then_decode_instances() {
        let c = converter();
        let path = InstancePath::parse("/ietf-interfaces:interfaces/interface[name='eth0']/enabled").unwrap();
        let bytes = c.encode_patch(&path, &json!(true)).unwrap();
        let back = c.decode_instances(&bytes).unwrap();
        assert_eq!(
            back.value,
            json!({"/ietf-interfaces:interfaces/interface[name='eth0']/enabled": true})
        );
    }

    #[test]
    fn query_payload_decodes_to_paths() {
        let c = converter();
        let bytes = [0x19, 0x07, 0xD0, 0x82, 0x19, 0x07, 0xF1, 0x61, b'1', 0x19, 0x0F, 0xA0];
        let out = c.decode_query(&bytes).unwrap();
        assert_eq!(
            out.value,
            json!([
                "/ietf-interfaces:interfaces",
                "/ietf-interfaces:interfaces/interface[name='1']",
                4000
            ])
        );
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn patches_keep_per_item_errors() {
        let c = converter();
        let items = vec![
            (InstancePath::parse("/ietf-interfaces:interfaces").unwrap(), json!({})),
            (InstancePath::parse("/ietf-interfaces:nope").unwrap(), json!(1)),
        ];
        let out = c.encode_patches(&items);
        assert!(out[0].is_ok());
        assert!(out[1].is_err());
    }

    #[test]
    fn decode_by_content_format() {
        let c = converter();
        let datastore = cbor::encode(
            &CborValue::Map(vec![(cbor::uint(2000), CborValue::Map(vec![]))]),
            Default::default(),
        )
        .unwrap();
        assert_eq!(
            c.decode_payload(PayloadKind::Datastore, &datastore).unwrap().value,
            json!({"interfaces": {}})
        );
        assert_eq!(
            c.decode_payload(PayloadKind::Text, b"hello").unwrap().value,
            json!("hello")
        );
        assert_eq!(
            c.decode_payload(PayloadKind::Unspecified, &[]).unwrap(),
            Detransformed::default()
        );
        let unknown = c.decode_payload(PayloadKind::Unknown(999), &[0x01]).unwrap();
        assert_eq!(unknown.value, json!(1));
        assert_eq!(unknown.warnings.len(), 1);
    }

    #[test]
    fn datastore_payload() {
        let c = converter();
        let bytes = c
            .encode_datastore(&json!({"ietf-interfaces:interfaces": {"interface": [{"name": "a"}]}}))
            .unwrap();
        let back = c.decode_tree(&bytes).unwrap();
        assert_eq!(back.value, json!({"interfaces": {"interface": [{"name": "a"}]}}));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_matches_sequential() {
        let c = converter();
        let items: Vec<_> = (0..32)
            .map(|i| {
                (
                    InstancePath::parse(&format!(
                        "/ietf-interfaces:interfaces/interface[name='eth{i}']/enabled"
                    ))
                    .unwrap(),
                    json!(i % 2 == 0),
                )
            })
            .collect();
        let seq: Vec<_> = c.encode_patches(&items).into_iter().map(|r| r.unwrap()).collect();
        let par: Vec<_> = c
            .encode_patches_parallel(&items)
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(seq, par);
    }
}
