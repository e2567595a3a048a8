// YANG SID file parsing.
//
// Accepts the RFC 9595 layout
//   {"ietf-sid-file:sid-file": {"module-name": ..., "item": [...]}}
// and the older pyang layout
//   {"module-name": ..., "items": [...]}
// SIDs may be JSON numbers or strings (RFC 9595 encodes uint64 as a string).

use serde::Deserialize;

use crate::error::SchemaError;

const RFC9595_WRAPPER: &str = "ietf-sid-file:sid-file";

/// The namespace an item's identifier lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Namespace {
    Module,
    Identity,
    Feature,
    Data,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidItem {
    pub namespace: Namespace,
    pub identifier: String,
    pub sid: u64,
}

/// One parsed SID file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SidFile {
    pub module_name: String,
    pub module_revision: Option<String>,
    pub items: Vec<SidItem>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SidRepr {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawItem {
    namespace: Namespace,
    identifier: String,
    sid: SidRepr,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawFile {
    #[serde(default)]
    module_name: String,
    #[serde(default)]
    module_revision: Option<String>,
    #[serde(default, alias = "items")]
    item: Vec<RawItem>,
}

impl SidFile {
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| SchemaError::InvalidSidFile(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(mut value: serde_json::Value) -> Result<Self, SchemaError> {
        if let Some(inner) = value.get_mut(RFC9595_WRAPPER) {
            value = inner.take();
        }
        let raw: RawFile = serde_json::from_value(value)
            .map_err(|e| SchemaError::InvalidSidFile(e.to_string()))?;

        let mut items = Vec::with_capacity(raw.item.len());
        for item in raw.item {
            let sid = match item.sid {
                SidRepr::Number(n) => n,
                SidRepr::Text(s) => s.trim().parse::<u64>().map_err(|_| {
                    SchemaError::InvalidSidFile(format!(
                        "SID '{s}' of '{}' is not an unsigned integer",
                        item.identifier
                    ))
                })?,
            };
            items.push(SidItem {
                namespace: item.namespace,
                identifier: item.identifier,
                sid,
            });
        }

        Ok(Self {
            module_name: raw.module_name,
            module_revision: raw.module_revision,
            items,
        })
    }

    pub fn data_items(&self) -> impl Iterator<Item = &SidItem> {
        self.items
            .iter()
            .filter(|i| i.namespace == Namespace::Data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc9595_layout() {
        let text = r#"{
          "ietf-sid-file:sid-file": {
            "module-name": "ietf-interfaces",
            "module-revision": "2018-02-20",
            "item": [
              {"namespace": "module", "identifier": "ietf-interfaces", "sid": "1500"},
              {"namespace": "identity", "identifier": "ietf-interfaces:interface-type", "sid": "1501"},
              {"namespace": "data", "identifier": "/ietf-interfaces:interfaces", "sid": "2000"}
            ]
          }
        }"#;
        let file = SidFile::from_json(text).unwrap();
        assert_eq!(file.module_name, "ietf-interfaces");
        assert_eq!(file.module_revision.as_deref(), Some("2018-02-20"));
        assert_eq!(file.items.len(), 3);
        assert_eq!(file.items[1].namespace, Namespace::Identity);
        assert_eq!(file.data_items().next().unwrap().sid, 2000);
    }

    #[test]
    fn parses_legacy_layout_with_numeric_sids() {
        let text = r#"{
          "module-name": "ieee802-dot1q-sched",
          "items": [
            {"namespace": "data", "identifier": "/ieee802-dot1q-sched:gate-parameters", "sid": 1000},
            {"namespace": "feature", "identifier": "scheduled-traffic", "sid": 1001},
            {"namespace": "something-new", "identifier": "x", "sid": 1002}
          ]
        }"#;
        let file = SidFile::from_json(text).unwrap();
        assert_eq!(file.items[0].sid, 1000);
        assert_eq!(file.items[1].namespace, Namespace::Feature);
        assert_eq!(file.items[2].namespace, Namespace::Other);
    }

    #[test]
    fn rejects_non_numeric_sid() {
        let text = r#"{"module-name": "m", "items": [
            {"namespace": "data", "identifier": "/m:a", "sid": "abc"}
        ]}"#;
        assert!(matches!(
            SidFile::from_json(text),
            Err(SchemaError::InvalidSidFile(_))
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(SidFile::from_json("{").is_err());
    }
}
