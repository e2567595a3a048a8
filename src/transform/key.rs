// Container keys.
//
// Keys are resolved once, when a container is built, into one of three
// forms. Nested levels use a delta when the node's schema parent is the
// traversal parent; otherwise the absolute SID is written.

use std::fmt;

use crate::cbor::{self, CborValue};
use crate::schema::SchemaIndex;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SidKey {
    /// `sid - parent_sid`
    Delta(i64),
    Absolute(u64),
    /// Name kept verbatim (unknown-key policy `text`).
    Text(String),
}

impl SidKey {
    /// Key for `sid` written under `parent`.
    pub fn for_node(index: &SchemaIndex, sid: u64, parent: Option<u64>) -> Self {
        match parent {
            Some(p) if index.parent_of(sid) == Some(p) => Self::Delta(sid as i64 - p as i64),
            _ => Self::Absolute(sid),
        }
    }

    pub fn to_cbor(&self) -> CborValue {
        match self {
            Self::Delta(d) => cbor::int(*d),
            Self::Absolute(s) => cbor::uint(*s),
            Self::Text(t) => CborValue::Text(t.clone()),
        }
    }

    /// Numeric value for ordering; text keys have none.
    pub fn numeric(&self) -> Option<i128> {
        match self {
            Self::Delta(d) => Some(i128::from(*d)),
            Self::Absolute(s) => Some(i128::from(*s)),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for SidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delta(d) => write!(f, "{d:+}"),
            Self::Absolute(s) => write!(f, "{s}"),
            Self::Text(t) => write!(f, "{t:?}"),
        }
    }
}

/// Top-level key of an instance container: a bare SID, or a SID with the
/// key values of every list on the way down.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceKey {
    Sid(u64),
    Entry { sid: u64, keys: Vec<CborValue> },
}

impl InstanceKey {
    pub fn new(sid: u64, keys: Vec<CborValue>) -> Self {
        if keys.is_empty() {
            Self::Sid(sid)
        } else {
            Self::Entry { sid, keys }
        }
    }

    pub fn sid(&self) -> u64 {
        match self {
            Self::Sid(sid) | Self::Entry { sid, .. } => *sid,
        }
    }

    pub fn keys(&self) -> &[CborValue] {
        match self {
            Self::Sid(_) => &[],
            Self::Entry { keys, .. } => keys,
        }
    }

    pub fn to_cbor(&self) -> CborValue {
        match self {
            Self::Sid(sid) => cbor::uint(*sid),
            Self::Entry { sid, keys } => {
                let mut items = Vec::with_capacity(keys.len() + 1);
                items.push(cbor::uint(*sid));
                items.extend(keys.iter().cloned());
                CborValue::Array(items)
            }
        }
    }

    /// Parse `sid` or `[sid, key...]`.
    pub fn from_cbor(value: &CborValue) -> Option<Self> {
        let sid_of = |v: &CborValue| cbor::as_i128(v).and_then(|s| u64::try_from(s).ok());
        match value {
            CborValue::Array(items) => {
                let (sid, keys) = items.split_first()?;
                Some(Self::new(sid_of(sid)?, keys.to_vec()))
            }
            other => sid_of(other).map(Self::Sid),
        }
    }
}
