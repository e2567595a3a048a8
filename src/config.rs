// Converter and client configuration.
//
// Both option sets deserialize from JSON or YAML with every field optional,
// so embedding applications can keep them in their own config files.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::cbor::ContainerMode;
use crate::coap::{ContentFormats, RequestProfile};

/// What to do with a configuration key that has no SID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownKeyPolicy {
    /// Fail the item with a schema error.
    #[default]
    Abort,
    /// Keep the name as a text key and encode its value structurally.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConverterOptions {
    pub container_mode: ContainerMode,
    pub unknown_keys: UnknownKeyPolicy,
    /// Address the nearest known ancestor when a read query names a node
    /// that has no SID.
    pub query_fallback: bool,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            container_mode: ContainerMode::Device,
            unknown_keys: UnknownKeyPolicy::Abort,
            query_fallback: true,
        }
    }
}

impl ConverterOptions {
    pub fn canonical() -> Self {
        Self {
            container_mode: ContainerMode::Canonical,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientOptions {
    /// Datastore resource path, one element per segment.
    pub uri_path: Vec<String>,
    /// Preferred block size exponent (block size is `16 << block_szx`).
    pub block_szx: u8,
    #[serde(with = "millis")]
    pub ready_timeout: Duration,
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    pub confirmable: bool,
    pub formats: ContentFormats,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            uri_path: vec!["c".into()],
            block_szx: 6,
            ready_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            confirmable: true,
            formats: ContentFormats::default(),
        }
    }
}

impl ClientOptions {
    /// Request shapes derived from these options.
    pub fn profile(&self) -> RequestProfile {
        RequestProfile {
            uri_path: self.uri_path.clone(),
            confirmable: self.confirmable,
            block_szx: self.block_szx.min(crate::coap::block::MAX_SZX),
            formats: self.formats,
        }
    }
}

/// Durations as integer milliseconds.
mod millis {
    use super::*;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().min(u128::from(u64::MAX)) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConverterOptions::default();
        assert_eq!(c.container_mode, ContainerMode::Device);
        assert_eq!(c.unknown_keys, UnknownKeyPolicy::Abort);
        assert!(c.query_fallback);

        let o = ClientOptions::default();
        assert_eq!(o.uri_path, vec!["c".to_string()]);
        assert_eq!(o.profile().block_szx, 6);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "container-mode: canonical\nunknown-keys: text\n";
        let c: ConverterOptions = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.container_mode, ContainerMode::Canonical);
        assert_eq!(c.unknown_keys, UnknownKeyPolicy::Text);
        assert!(c.query_fallback);

        let json = r#"{"request-timeout": 250, "block-szx": 9, "uri-path": ["c", "x"]}"#;
        let o: ClientOptions = serde_json::from_str(json).unwrap();
        assert_eq!(o.request_timeout, Duration::from_millis(250));
        assert_eq!(o.ready_timeout, Duration::from_secs(10));
        assert_eq!(o.profile().block_szx, 6);
        assert_eq!(o.profile().uri_path, vec!["c".to_string(), "x".to_string()]);
    }
}
