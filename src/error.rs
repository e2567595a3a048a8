// Error taxonomy for the codec pipeline and the request layer.
//
// Schema and type errors are per-item and recoverable; format errors reject
// an operation before any network I/O; protocol errors carry the device's
// response code; transport errors abort the whole operation.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::client::BatchReport;
use crate::coap::Code;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Schema resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown schema node '{name}' under '{context}'")]
    UnknownNode { name: String, context: String },
    #[error("unknown SID {0}")]
    UnknownSid(u64),
    #[error("unknown identity '{0}'")]
    UnknownIdentity(String),
    #[error("no identity is assigned SID {0}")]
    UnknownIdentitySid(u64),
    #[error("invalid SID file: {0}")]
    InvalidSidFile(String),
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
}

// ---------------------------------------------------------------------------
// Typed values
// ---------------------------------------------------------------------------

/// A value that does not satisfy its declared YANG type.
///
/// Union encoding treats this as a soft failure and advances to the next
/// member type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, got {found}")]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub found: String,
}

impl TypeMismatch {
    pub fn new(expected: &'static str, found: impl Into<String>) -> Self {
        Self {
            expected,
            found: found.into(),
        }
    }
}

/// Failure to encode or decode one leaf value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error(transparent)]
    Type(#[from] TypeMismatch),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

// ---------------------------------------------------------------------------
// Input format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("input is not instance-identifier addressed: {0}")]
    NotInstanceIdentifier(String),
    #[error("invalid instance-identifier '{path}' at byte {offset}: {reason}")]
    InvalidPath {
        path: String,
        offset: usize,
        reason: &'static str,
    },
    #[error("invalid query input: {0}")]
    InvalidInput(String),
    #[error("invalid hex payload: {0}")]
    Hex(#[from] hex::FromHexError),
}

// ---------------------------------------------------------------------------
// Binary container
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CborError {
    #[error("CBOR decode error at byte {offset}: {reason}")]
    Decode { offset: u64, reason: String },
    #[error("CBOR encode error: {0}")]
    Encode(String),
    #[error("unexpected CBOR structure: {0}")]
    Shape(String),
}

// ---------------------------------------------------------------------------
// Request protocol
// ---------------------------------------------------------------------------

/// Malformed CoAP message bytes, or a message that cannot be framed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("message truncated while reading {0}")]
    Truncated(&'static str),
    #[error("unsupported protocol version {0}")]
    InvalidVersion(u8),
    #[error("token length {0} exceeds 8 bytes")]
    InvalidTokenLength(usize),
    #[error("reserved option nibble 15 in {0}")]
    ReservedNibble(&'static str),
    #[error("payload marker followed by an empty payload")]
    EmptyPayload,
    #[error("option number {0} exceeds 65535")]
    OptionNumberOverflow(u32),
    #[error("option value of {0} bytes is too long")]
    OptionTooLong(usize),
    #[error("invalid block option: {0}")]
    InvalidBlock(String),
}

/// A non-success (class other than 2.xx) response from the device.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("request failed with response code {code}{}", diagnostic_suffix(.diagnostic))]
pub struct ProtocolError {
    pub code: Code,
    /// Text diagnostic payload, if the device sent one.
    pub diagnostic: Option<String>,
    /// CBOR error payload decoded to JSON, if it was decodable.
    pub payload: Option<serde_json::Value>,
}

fn diagnostic_suffix(diagnostic: &Option<String>) -> String {
    match diagnostic {
        Some(d) if !d.is_empty() => format!(": {d}"),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,
    #[error("device did not become ready within {0:?}")]
    ReadyTimeout(Duration),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("unsupported endpoint: {0}")]
    UnsupportedEndpoint(String),
    #[error("response does not match the request: {0}")]
    Mismatch(String),
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Crate-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Type(#[from] TypeMismatch),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Cbor(#[from] CborError),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("all {} patch items failed", .0.total)]
    BatchFailed(BatchReport),
}

impl From<ValueError> for Error {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::Type(e) => Self::Type(e),
            ValueError::Schema(e) => Self::Schema(e),
        }
    }
}

impl Error {
    /// Whether this error must abort a multi-item operation rather than be
    /// recorded against a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Format(_) | Self::Io(_) | Self::BatchFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_display_includes_code_and_diagnostic() {
        let err = ProtocolError {
            code: Code::new(4, 4),
            diagnostic: Some("no such node".into()),
            payload: None,
        };
        assert_eq!(
            err.to_string(),
            "request failed with response code 4.04: no such node"
        );
    }

    #[test]
    fn fatal_classification() {
        assert!(Error::from(TransportError::NotConnected).is_fatal());
        assert!(Error::from(FormatError::InvalidInput("x".into())).is_fatal());
        assert!(!Error::from(SchemaError::UnknownSid(7)).is_fatal());
        assert!(Error::from(FormatError::from(hex::FromHexError::OddLength)).is_fatal());
        let protocol = ProtocolError {
            code: Code::new(5, 0),
            diagnostic: None,
            payload: None,
        };
        assert!(!Error::from(protocol).is_fatal());
    }
}
