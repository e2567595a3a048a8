// Request shapes used against a CORECONF datastore and response classification.
//
// FETCH carries SID addresses and asks for instances back, iPATCH carries one
// delta-keyed container per message, PUT replaces the whole datastore, POST
// invokes an RPC/action.

use serde::{Deserialize, Serialize};

use crate::cbor;
use crate::error::ProtocolError;
use crate::value;

use super::block::{Block, BlockDirection, MAX_SZX};
use super::message::{Code, Message, MessageType};
use super::option::{self, CoapOption};

// ---------------------------------------------------------------------------
// Content formats (RFC 9254, 8.3)
// ---------------------------------------------------------------------------

pub const CF_TEXT_PLAIN: u16 = 0;
pub const CF_CBOR: u16 = 60;
/// application/yang-data+cbor; id=sid
pub const CF_YANG_DATA_CBOR_SID: u16 = 140;
/// application/yang-identifiers+cbor-seq
pub const CF_YANG_IDENTIFIERS_CBOR_SEQ: u16 = 141;
/// application/yang-instances+cbor-seq
pub const CF_YANG_INSTANCES_CBOR_SEQ: u16 = 142;

/// Numeric content-format codes carried in Content-Format/Accept options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ContentFormats {
    /// Generic CBOR container.
    pub cbor: u16,
    /// Whole-datastore container keyed by SID.
    pub datastore: u16,
    /// FETCH payload: sequence of SID addresses.
    pub query: u16,
    /// iPATCH payload and FETCH response: sequence of instance maps.
    pub instances: u16,
}

impl Default for ContentFormats {
    fn default() -> Self {
        Self {
            cbor: CF_CBOR,
            datastore: CF_YANG_DATA_CBOR_SID,
            query: CF_YANG_IDENTIFIERS_CBOR_SEQ,
            instances: CF_YANG_INSTANCES_CBOR_SEQ,
        }
    }
}

/// How a received payload must be decoded, chosen from the content format
/// the response actually carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Zero or more concatenated instance maps.
    Instances,
    /// One SID-keyed map.
    Datastore,
    /// Any single CBOR item.
    Cbor,
    Text,
    Unknown(u16),
    /// No Content-Format option present.
    Unspecified,
}

impl ContentFormats {
    pub fn classify(&self, content_format: Option<u16>) -> PayloadKind {
        match content_format {
            None => PayloadKind::Unspecified,
            Some(cf) if cf == self.instances => PayloadKind::Instances,
            Some(cf) if cf == self.datastore => PayloadKind::Datastore,
            Some(cf) if cf == self.cbor => PayloadKind::Cbor,
            Some(CF_TEXT_PLAIN) => PayloadKind::Text,
            Some(cf) => PayloadKind::Unknown(cf),
        }
    }
}

// ---------------------------------------------------------------------------
// Request profile
// ---------------------------------------------------------------------------

/// Per-device request framing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RequestProfile {
    /// Datastore resource path segments (`/c` by default).
    pub uri_path: Vec<String>,
    /// Send confirmable requests.
    pub confirmable: bool,
    /// Preferred block size exponent for chunked transfers.
    pub block_szx: u8,
    pub formats: ContentFormats,
}

impl Default for RequestProfile {
    fn default() -> Self {
        Self {
            uri_path: vec!["c".to_string()],
            confirmable: true,
            block_szx: MAX_SZX,
            formats: ContentFormats::default(),
        }
    }
}

/// The request shapes the client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// FETCH of SID addresses.
    Query,
    /// iPATCH of one instance container.
    Patch,
    /// PUT of the whole datastore.
    Replace,
    /// POST of RPC/action input.
    Invoke,
    /// GET of the whole datastore.
    Retrieve,
}

impl RequestKind {
    pub fn method(self) -> Code {
        match self {
            Self::Query => Code::FETCH,
            Self::Patch => Code::IPATCH,
            Self::Replace => Code::PUT,
            Self::Invoke => Code::POST,
            Self::Retrieve => Code::GET,
        }
    }
}

impl RequestProfile {
    /// Frame a request. The payload is attached as-is; block-wise splitting is
    /// the caller's concern.
    pub fn build(
        &self,
        kind: RequestKind,
        message_id: u16,
        token: &[u8],
        payload: Vec<u8>,
    ) -> Message {
        let mtype = if self.confirmable {
            MessageType::Confirmable
        } else {
            MessageType::NonConfirmable
        };
        let mut msg = Message::new(mtype, kind.method(), message_id)
            .with_token(token.to_vec())
            .with_payload(payload);
        for segment in &self.uri_path {
            msg.add_option(CoapOption::new(option::URI_PATH, segment.as_bytes()));
        }

        let f = &self.formats;
        match kind {
            RequestKind::Query => {
                msg.add_option(CoapOption::uint(option::CONTENT_FORMAT, f.query.into()));
                msg.add_option(CoapOption::uint(option::ACCEPT, f.instances.into()));
                // Ask for an oversized response to be delivered in blocks.
                if let Ok(block) = Block::new(0, false, self.block_szx) {
                    msg.add_option(block.to_option(BlockDirection::Response));
                }
            }
            RequestKind::Patch | RequestKind::Invoke => {
                msg.add_option(CoapOption::uint(option::CONTENT_FORMAT, f.instances.into()));
            }
            RequestKind::Replace => {
                msg.add_option(CoapOption::uint(option::CONTENT_FORMAT, f.datastore.into()));
            }
            RequestKind::Retrieve => {
                msg.add_option(CoapOption::uint(option::ACCEPT, f.datastore.into()));
            }
        }
        msg
    }

    /// Follow-up request for the next response block: same method, options
    /// and payload, with the Block2 option advanced.
    pub fn next_block_request(&self, original: &Message, message_id: u16, block: Block) -> Message {
        let mut next = original.clone();
        next.message_id = message_id;
        next.set_option(block.to_option(BlockDirection::Response));
        next
    }
}

// ---------------------------------------------------------------------------
// Response classification
// ---------------------------------------------------------------------------

/// Accept 2.xx responses; turn anything else into a `ProtocolError` carrying
/// the numeric code and whatever error payload could be decoded.
pub fn check_response(
    response: &Message,
    formats: &ContentFormats,
) -> Result<(), ProtocolError> {
    if response.code.is_success() {
        return Ok(());
    }

    let mut err = ProtocolError {
        code: response.code,
        diagnostic: None,
        payload: None,
    };
    if response.payload.is_empty() {
        return Err(err);
    }

    match formats.classify(response.content_format()) {
        PayloadKind::Text | PayloadKind::Unspecified => {
            err.diagnostic = Some(String::from_utf8_lossy(&response.payload).into_owned());
        }
        _ => match cbor::decode_sequence(&response.payload) {
            Ok(items) => {
                let mut values: Vec<serde_json::Value> =
                    items.iter().map(value::json_from_cbor).collect();
                err.payload = Some(if values.len() == 1 {
                    values.remove(0)
                } else {
                    serde_json::Value::Array(values)
                });
            }
            Err(_) => {
                err.diagnostic = Some(String::from_utf8_lossy(&response.payload).into_owned());
            }
        },
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_request_options() {
        let profile = RequestProfile::default();
        let msg = profile.build(RequestKind::Query, 10, &[1], vec![0x19, 0x07, 0xF1]);
        assert_eq!(msg.code, Code::FETCH);
        assert_eq!(msg.uri_path(), "/c");
        assert_eq!(msg.content_format(), Some(141));
        assert_eq!(
            msg.option(option::ACCEPT).and_then(CoapOption::as_uint),
            Some(142)
        );
        let block = msg.block(BlockDirection::Response).unwrap().unwrap();
        assert_eq!((block.num, block.more, block.szx), (0, false, 6));
    }

    #[test]
    fn patch_and_replace_formats() {
        let profile = RequestProfile::default();
        let patch = profile.build(RequestKind::Patch, 1, &[], vec![0xA0]);
        assert_eq!(patch.code, Code::IPATCH);
        assert_eq!(patch.content_format(), Some(142));
        assert!(patch.option(option::BLOCK2).is_none());

        let put = profile.build(RequestKind::Replace, 2, &[], vec![0xA0]);
        assert_eq!(put.code, Code::PUT);
        assert_eq!(put.content_format(), Some(140));

        let post = profile.build(RequestKind::Invoke, 3, &[], vec![0xA0]);
        assert_eq!(post.code, Code::POST);
    }

    #[test]
    fn non_confirmable_profile() {
        let profile = RequestProfile {
            confirmable: false,
            ..Default::default()
        };
        let msg = profile.build(RequestKind::Patch, 1, &[], vec![]);
        assert_eq!(msg.mtype, MessageType::NonConfirmable);
    }

    #[test]
    fn classify_uses_received_format() {
        let f = ContentFormats::default();
        assert_eq!(f.classify(Some(142)), PayloadKind::Instances);
        assert_eq!(f.classify(Some(140)), PayloadKind::Datastore);
        assert_eq!(f.classify(Some(60)), PayloadKind::Cbor);
        assert_eq!(f.classify(Some(0)), PayloadKind::Text);
        assert_eq!(f.classify(Some(999)), PayloadKind::Unknown(999));
        assert_eq!(f.classify(None), PayloadKind::Unspecified);
    }

    #[test]
    fn error_response_surfaces_code_and_text() {
        let resp = Message::new(MessageType::Acknowledgement, Code::NOT_FOUND, 1)
            .with_payload(b"no such instance".to_vec());
        let err = check_response(&resp, &ContentFormats::default()).unwrap_err();
        assert_eq!(err.code, Code::NOT_FOUND);
        assert_eq!(err.diagnostic.as_deref(), Some("no such instance"));
    }

    #[test]
    fn error_response_decodes_cbor_payload() {
        // {1024: "bad"} under the instances format
        let resp = Message::new(MessageType::Acknowledgement, Code::BAD_REQUEST, 1)
            .with_option(CoapOption::uint(option::CONTENT_FORMAT, 142))
            .with_payload(vec![0xA1, 0x19, 0x04, 0x00, 0x63, b'b', b'a', b'd']);
        let err = check_response(&resp, &ContentFormats::default()).unwrap_err();
        assert_eq!(err.payload, Some(serde_json::json!({"1024": "bad"})));
    }

    #[test]
    fn success_passes() {
        let resp = Message::new(MessageType::Acknowledgement, Code::CHANGED, 1);
        assert!(check_response(&resp, &ContentFormats::default()).is_ok());
    }
}
