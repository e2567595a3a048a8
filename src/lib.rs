//! tsnconf: CORECONF (RFC 9254) configuration codec for TSN switches.
//!
//! The crate provides:
//! - SID file loading and the schema index (`schema`, `io`)
//! - YANG typed values over CBOR (`value`)
//! - Delta-SID transformation of configuration trees (`transform`, `converter`)
//! - CoAP framing with block-wise transfer (`coap`)
//! - A transport contract, a UDP transport and a device client (`transport`, `client`)
//! - An optional offline CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use tsnconf::config::ConverterOptions;
//! use tsnconf::converter::Converter;
//! use tsnconf::instance_id::InstancePath;
//! use serde_json::json;
//!
//! let schema = tsnconf::io::load_schema(&["ietf-interfaces.sid"], None).unwrap();
//! let converter = Converter::new(schema.index, ConverterOptions::default());
//!
//! let target = InstancePath::parse("/ietf-interfaces:interfaces/interface[name='1']/enabled").unwrap();
//! let payload = converter.encode_patch(&target, &json!(true)).unwrap();
//! let back = converter.decode_instances(&payload).unwrap();
//! assert!(back.is_clean());
//! ```

pub mod cbor;
pub mod client;
pub mod coap;
pub mod config;
pub mod converter;
pub mod error;
pub mod instance_id;
pub mod io;
pub mod schema;
pub mod transform;
pub mod transport;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use client::{BatchReport, Client, ItemOutcome, ItemStatus};
pub use config::{ClientOptions, ConverterOptions, UnknownKeyPolicy};
pub use converter::Converter;
pub use error::{Error, Result};
pub use instance_id::InstancePath;
pub use schema::SchemaIndex;
pub use transform::{DecodeWarning, Detransformed};
pub use transport::{Endpoint, Transport, UdpTransport};
