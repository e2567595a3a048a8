// Per-path type descriptors and list key names.
//
// The catalog is produced outside this crate (from the YANG modules) and is
// consumed read-only. JSON layout:
//
//   {
//     "types": {
//       "/ietf-interfaces:interfaces/interface/enabled": {"base": "boolean"},
//       "/m:clock/state": {"base": "enumeration", "enums": {"Init": 0, "Locked": 2}}
//     },
//     "keys": {
//       "/ietf-interfaces:interfaces/interface": ["name"]
//     }
//   }
//
// Paths are normalized to their stripped form on load.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::error::SchemaError;

use super::path;

// ---------------------------------------------------------------------------
// Enumeration and bits tables
// ---------------------------------------------------------------------------

/// Bidirectional enumeration name/value table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, i64>")]
pub struct EnumTable {
    by_name: HashMap<String, i64>,
    by_value: BTreeMap<i64, String>,
}

impl From<BTreeMap<String, i64>> for EnumTable {
    fn from(map: BTreeMap<String, i64>) -> Self {
        let mut table = EnumTable::default();
        for (name, value) in map {
            table.insert(name, value);
        }
        table
    }
}

impl EnumTable {
    pub fn insert(&mut self, name: impl Into<String>, value: i64) {
        let name = name.into();
        self.by_value.entry(value).or_insert_with(|| name.clone());
        self.by_name.insert(name, value);
    }

    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.by_value.get(&value).map(String::as_str)
    }
}

impl<const N: usize> From<[(&str, i64); N]> for EnumTable {
    fn from(entries: [(&str, i64); N]) -> Self {
        let mut table = EnumTable::default();
        for (name, value) in entries {
            table.insert(name, value);
        }
        table
    }
}

/// Bit name to bit position table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, u32>")]
pub struct BitTable {
    by_name: HashMap<String, u32>,
    by_position: BTreeMap<u32, String>,
}

impl From<BTreeMap<String, u32>> for BitTable {
    fn from(map: BTreeMap<String, u32>) -> Self {
        let mut table = BitTable::default();
        for (name, position) in map {
            table.insert(name, position);
        }
        table
    }
}

impl<const N: usize> From<[(&str, u32); N]> for BitTable {
    fn from(entries: [(&str, u32); N]) -> Self {
        let mut table = BitTable::default();
        for (name, position) in entries {
            table.insert(name, position);
        }
        table
    }
}

impl BitTable {
    pub fn insert(&mut self, name: impl Into<String>, position: u32) {
        let name = name.into();
        self.by_position.insert(position, name.clone());
        self.by_name.insert(name, position);
    }

    pub fn position_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn name_at(&self, position: u32) -> Option<&str> {
        self.by_position.get(&position).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Type descriptor
// ---------------------------------------------------------------------------

/// YANG built-in type of a leaf or leaf-list, resolved through typedefs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "base", rename_all = "kebab-case")]
pub enum TypeDescriptor {
    Enumeration {
        enums: EnumTable,
    },
    Identityref {
        #[serde(default)]
        base: Option<String>,
    },
    Decimal64 {
        #[serde(rename = "fraction-digits")]
        fraction_digits: u8,
    },
    Bits {
        bits: BitTable,
    },
    Union {
        types: Vec<TypeDescriptor>,
    },
    Leafref {
        /// Schema path of the referenced leaf.
        #[serde(default)]
        path: Option<String>,
    },
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Boolean,
    String,
    Binary,
    Empty,
    InstanceIdentifier,
    /// Anything not modeled; encoded by structural auto-detection.
    #[serde(other)]
    Unknown,
}

impl TypeDescriptor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enumeration { .. } => "enumeration",
            Self::Identityref { .. } => "identityref",
            Self::Decimal64 { .. } => "decimal64",
            Self::Bits { .. } => "bits",
            Self::Union { .. } => "union",
            Self::Leafref { .. } => "leafref",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Empty => "empty",
            Self::InstanceIdentifier => "instance-identifier",
            Self::Unknown => "unknown",
        }
    }

    /// Inclusive range of an integer type.
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        Some(match self {
            Self::Int8 => (i8::MIN.into(), i8::MAX.into()),
            Self::Int16 => (i16::MIN.into(), i16::MAX.into()),
            Self::Int32 => (i32::MIN.into(), i32::MAX.into()),
            Self::Int64 => (i64::MIN.into(), i64::MAX.into()),
            Self::Uint8 => (0, u8::MAX.into()),
            Self::Uint16 => (0, u16::MAX.into()),
            Self::Uint32 => (0, u32::MAX.into()),
            Self::Uint64 => (0, u64::MAX.into()),
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    types: HashMap<String, TypeDescriptor>,
    keys: HashMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct RawCatalog {
    #[serde(default)]
    types: HashMap<String, TypeDescriptor>,
    #[serde(default)]
    keys: HashMap<String, Vec<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let raw: RawCatalog =
            serde_json::from_str(text).map_err(|e| SchemaError::InvalidCatalog(e.to_string()))?;
        let mut catalog = Catalog::new();
        for (p, ty) in raw.types {
            catalog.insert_type(&p, ty);
        }
        for (p, keys) in raw.keys {
            catalog.insert_keys(&p, keys);
        }
        Ok(catalog)
    }

    pub fn insert_type(&mut self, schema_path: &str, ty: TypeDescriptor) {
        self.types.insert(path::strip_prefixes(schema_path), ty);
    }

    pub fn insert_keys(&mut self, list_path: &str, keys: Vec<String>) {
        let keys = keys.iter().map(|k| path::local_name(k).to_string()).collect();
        self.keys.insert(path::strip_prefixes(list_path), keys);
    }

    pub fn with_type(mut self, schema_path: &str, ty: TypeDescriptor) -> Self {
        self.insert_type(schema_path, ty);
        self
    }

    pub fn with_keys(mut self, list_path: &str, keys: &[&str]) -> Self {
        self.insert_keys(list_path, keys.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Type of the node at `stripped_path`.
    pub fn type_of(&self, stripped_path: &str) -> Option<&TypeDescriptor> {
        self.types.get(stripped_path)
    }

    /// Key leaf names of the list at `stripped_path`.
    pub fn keys_of(&self, stripped_path: &str) -> Option<&[String]> {
        self.keys.get(stripped_path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.keys.is_empty()
    }
}
