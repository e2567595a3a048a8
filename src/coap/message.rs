// CoAP message framing (RFC 7252, 3).
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// |Ver| T |  TKL  |      Code     |          Message ID           |
// |   Token (if any, TKL bytes) ...
// |   Options (if any) ...
// |1 1 1 1 1 1 1 1|    Payload (if any) ...

use std::fmt;

use crate::error::MessageError;

use super::block::{Block, BlockDirection};
use super::option::{self, CoapOption};

pub const VERSION: u8 = 1;
pub const PAYLOAD_MARKER: u8 = 0xFF;
pub const MAX_TOKEN_LEN: usize = 8;

const HEADER_LEN: usize = 4;

// ---------------------------------------------------------------------------
// Message type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Confirmable = 0,
    NonConfirmable = 1,
    Acknowledgement = 2,
    Reset = 3,
}

impl MessageType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Confirmable,
            1 => Self::NonConfirmable,
            2 => Self::Acknowledgement,
            _ => Self::Reset,
        }
    }
}

// ---------------------------------------------------------------------------
// Method / response code
// ---------------------------------------------------------------------------

/// An 8-bit code: 3-bit class and 5-bit detail, written `c.dd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(pub u8);

impl Code {
    pub const EMPTY: Code = Code(0x00);

    pub const GET: Code = Code(0x01);
    pub const POST: Code = Code(0x02);
    pub const PUT: Code = Code(0x03);
    pub const DELETE: Code = Code(0x04);
    pub const FETCH: Code = Code(0x05);
    pub const PATCH: Code = Code(0x06);
    pub const IPATCH: Code = Code(0x07);

    pub const CREATED: Code = Code::new(2, 1);
    pub const DELETED: Code = Code::new(2, 2);
    pub const VALID: Code = Code::new(2, 3);
    pub const CHANGED: Code = Code::new(2, 4);
    pub const CONTENT: Code = Code::new(2, 5);
    pub const CONTINUE: Code = Code::new(2, 31);

    pub const BAD_REQUEST: Code = Code::new(4, 0);
    pub const NOT_FOUND: Code = Code::new(4, 4);
    pub const METHOD_NOT_ALLOWED: Code = Code::new(4, 5);
    pub const REQUEST_ENTITY_INCOMPLETE: Code = Code::new(4, 8);
    pub const REQUEST_ENTITY_TOO_LARGE: Code = Code::new(4, 13);
    pub const UNSUPPORTED_CONTENT_FORMAT: Code = Code::new(4, 15);
    pub const INTERNAL_SERVER_ERROR: Code = Code::new(5, 0);

    pub const fn new(class: u8, detail: u8) -> Self {
        Code(((class & 0x07) << 5) | (detail & 0x1F))
    }

    #[inline]
    pub fn class(self) -> u8 {
        self.0 >> 5
    }

    #[inline]
    pub fn detail(self) -> u8 {
        self.0 & 0x1F
    }

    pub fn is_request(self) -> bool {
        self.class() == 0 && self.0 != 0
    }

    /// 2.xx responses are the only success class.
    pub fn is_success(self) -> bool {
        self.class() == 0b010
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub mtype: MessageType,
    pub code: Code,
    pub message_id: u16,
    pub token: Vec<u8>,
    /// Kept sorted by option number; equal numbers keep insertion order.
    options: Vec<CoapOption>,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(mtype: MessageType, code: Code, message_id: u16) -> Self {
        Self {
            mtype,
            code,
            message_id,
            token: Vec::new(),
            options: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// Empty confirmable message, used as a liveness ping.
    pub fn ping(message_id: u16) -> Self {
        Self::new(MessageType::Confirmable, Code::EMPTY, message_id)
    }

    pub fn with_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn with_option(mut self, opt: CoapOption) -> Self {
        self.add_option(opt);
        self
    }

    /// Insert an option after any existing options with the same number.
    pub fn add_option(&mut self, opt: CoapOption) {
        let at = self.options.partition_point(|o| o.number <= opt.number);
        self.options.insert(at, opt);
    }

    /// Replace every instance of `opt.number` with `opt`.
    pub fn set_option(&mut self, opt: CoapOption) {
        self.remove_option(opt.number);
        self.add_option(opt);
    }

    pub fn remove_option(&mut self, number: u16) {
        self.options.retain(|o| o.number != number);
    }

    pub fn options(&self) -> &[CoapOption] {
        &self.options
    }

    pub fn option(&self, number: u16) -> Option<&CoapOption> {
        self.options.iter().find(|o| o.number == number)
    }

    pub fn option_values(&self, number: u16) -> impl Iterator<Item = &[u8]> {
        self.options
            .iter()
            .filter(move |o| o.number == number)
            .map(|o| o.value.as_slice())
    }

    pub fn uri_path(&self) -> String {
        let segments: Vec<String> = self
            .option_values(option::URI_PATH)
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .collect();
        format!("/{}", segments.join("/"))
    }

    pub fn content_format(&self) -> Option<u16> {
        self.option(option::CONTENT_FORMAT)
            .and_then(CoapOption::as_uint)
            .and_then(|v| u16::try_from(v).ok())
    }

    pub fn block(&self, direction: BlockDirection) -> Result<Option<Block>, MessageError> {
        self.option(direction.option_number())
            .map(Block::from_option)
            .transpose()
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        if self.token.len() > MAX_TOKEN_LEN {
            return Err(MessageError::InvalidTokenLength(self.token.len()));
        }
        let mut out = Vec::with_capacity(
            HEADER_LEN + self.token.len() + self.options.len() * 4 + self.payload.len() + 1,
        );
        out.push((VERSION << 6) | ((self.mtype as u8) << 4) | self.token.len() as u8);
        out.push(self.code.0);
        out.extend_from_slice(&self.message_id.to_be_bytes());
        out.extend_from_slice(&self.token);
        option::write_options(&mut out, &self.options)?;
        if !self.payload.is_empty() {
            out.push(PAYLOAD_MARKER);
            out.extend_from_slice(&self.payload);
        }
        Ok(out)
    }

    /// Parse wire bytes.
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        if data.len() < HEADER_LEN {
            return Err(MessageError::Truncated("header"));
        }
        let version = data[0] >> 6;
        if version != VERSION {
            return Err(MessageError::InvalidVersion(version));
        }
        let mtype = MessageType::from_bits(data[0] >> 4);
        let tkl = (data[0] & 0x0F) as usize;
        if tkl > MAX_TOKEN_LEN {
            return Err(MessageError::InvalidTokenLength(tkl));
        }
        let code = Code(data[1]);
        let message_id = u16::from_be_bytes([data[2], data[3]]);

        let mut pos = HEADER_LEN;
        if data.len() < pos + tkl {
            return Err(MessageError::Truncated("token"));
        }
        let token = data[pos..pos + tkl].to_vec();
        pos += tkl;

        let (options, used) = option::read_options(&data[pos..])?;
        pos += used;

        let payload = if pos < data.len() {
            // read_options stops only at the marker or end of input.
            pos += 1;
            if pos == data.len() {
                return Err(MessageError::EmptyPayload);
            }
            data[pos..].to_vec()
        } else {
            Vec::new()
        };

        Ok(Self {
            mtype,
            code,
            message_id,
            token,
            options,
            payload,
        })
    }
}
