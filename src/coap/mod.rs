// CoAP request/response framing (RFC 7252) with block-wise transfer (RFC 7959).
//
// # Modules
//
// - `option`: Option numbers and delta/length nibble encoding
// - `block`: Block1/Block2 option values and payload splitting
// - `message`: Header, token, options and payload framing
// - `request`: CORECONF request shapes, content formats, response checks

pub mod block;
pub mod message;
pub mod option;
pub mod request;

pub use block::{Block, BlockDirection};
pub use message::{Code, Message, MessageType};
pub use option::CoapOption;
pub use request::{ContentFormats, PayloadKind, RequestKind, RequestProfile, check_response};
