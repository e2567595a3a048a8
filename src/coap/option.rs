// CoAP option numbers and the option delta/length encoding (RFC 7252, 3.1).
//
// Each option is written as a 4-bit delta nibble (from the previous option
// number) and a 4-bit length nibble, each promoted to an extended form:
//   0..=12     : stored in the nibble
//   13..=268   : nibble 13, one extension byte holding value - 13
//   269..=65804: nibble 14, two extension bytes holding value - 269
// Nibble 15 is reserved (0xFF is the payload marker).

use crate::error::MessageError;

// ---------------------------------------------------------------------------
// Option numbers
// ---------------------------------------------------------------------------

pub const IF_MATCH: u16 = 1;
pub const URI_HOST: u16 = 3;
pub const ETAG: u16 = 4;
pub const IF_NONE_MATCH: u16 = 5;
pub const OBSERVE: u16 = 6;
pub const URI_PORT: u16 = 7;
pub const LOCATION_PATH: u16 = 8;
pub const URI_PATH: u16 = 11;
pub const CONTENT_FORMAT: u16 = 12;
pub const MAX_AGE: u16 = 14;
pub const URI_QUERY: u16 = 15;
pub const ACCEPT: u16 = 17;
pub const LOCATION_QUERY: u16 = 20;
/// Response-direction block transfer (RFC 7959).
pub const BLOCK2: u16 = 23;
/// Request-direction block transfer (RFC 7959).
pub const BLOCK1: u16 = 27;
pub const SIZE2: u16 = 28;
pub const PROXY_URI: u16 = 35;
pub const SIZE1: u16 = 60;

/// Largest delta or length representable with the two-byte extension.
pub const MAX_EXTENDED: u32 = 65535 + 269;

const EXT8_BASE: u32 = 13;
const EXT16_BASE: u32 = 269;
const NIBBLE_EXT8: u8 = 13;
const NIBBLE_EXT16: u8 = 14;
const NIBBLE_RESERVED: u8 = 15;

/// A single option instance: number plus raw value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoapOption {
    pub number: u16,
    pub value: Vec<u8>,
}

impl CoapOption {
    pub fn new(number: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            number,
            value: value.into(),
        }
    }

    /// Option carrying an unsigned integer in minimal big-endian form.
    pub fn uint(number: u16, value: u32) -> Self {
        Self::new(number, encode_uint(value))
    }

    /// Interpret the value as an unsigned integer (empty value is 0).
    pub fn as_uint(&self) -> Option<u32> {
        decode_uint(&self.value)
    }

    /// Critical options must be understood by the receiver (odd numbers).
    pub fn is_critical(&self) -> bool {
        self.number & 1 == 1
    }
}

// ---------------------------------------------------------------------------
// Nibble + extension encoding
// ---------------------------------------------------------------------------

/// Split `value` into its 4-bit nibble and extension bytes.
/// Returns `(nibble, extension, extension_len)`.
#[inline]
pub fn encode_nibble(value: u32) -> Result<(u8, [u8; 2], usize), MessageError> {
    if value < EXT8_BASE {
        Ok((value as u8, [0, 0], 0))
    } else if value < EXT16_BASE {
        Ok((NIBBLE_EXT8, [(value - EXT8_BASE) as u8, 0], 1))
    } else if value <= MAX_EXTENDED {
        let ext = ((value - EXT16_BASE) as u16).to_be_bytes();
        Ok((NIBBLE_EXT16, ext, 2))
    } else {
        Err(MessageError::OptionTooLong(value as usize))
    }
}

/// Read the extended form of `nibble` from `data`.
/// Returns `(value, bytes_consumed)`.
#[inline]
pub fn decode_nibble(
    nibble: u8,
    data: &[u8],
    field: &'static str,
) -> Result<(u32, usize), MessageError> {
    match nibble {
        0..=12 => Ok((u32::from(nibble), 0)),
        NIBBLE_EXT8 => {
            let b = *data.first().ok_or(MessageError::Truncated(field))?;
            Ok((u32::from(b) + EXT8_BASE, 1))
        }
        NIBBLE_EXT16 => {
            if data.len() < 2 {
                return Err(MessageError::Truncated(field));
            }
            let v = u16::from_be_bytes([data[0], data[1]]);
            Ok((u32::from(v) + EXT16_BASE, 2))
        }
        _ => Err(MessageError::ReservedNibble(field)),
    }
}

/// Encode a sorted option list. Options must be in non-decreasing number
/// order; repeated numbers produce a zero delta.
pub fn write_options(out: &mut Vec<u8>, options: &[CoapOption]) -> Result<(), MessageError> {
    let mut previous = 0u32;
    for opt in options {
        let number = u32::from(opt.number);
        let delta = number
            .checked_sub(previous)
            .ok_or(MessageError::OptionNumberOverflow(number))?;
        let (d_nib, d_ext, d_len) = encode_nibble(delta)?;
        let (l_nib, l_ext, l_len) = encode_nibble(opt.value.len() as u32)
            .map_err(|_| MessageError::OptionTooLong(opt.value.len()))?;
        out.push((d_nib << 4) | l_nib);
        out.extend_from_slice(&d_ext[..d_len]);
        out.extend_from_slice(&l_ext[..l_len]);
        out.extend_from_slice(&opt.value);
        previous = number;
    }
    Ok(())
}

/// Parse options until the payload marker or end of input.
/// Returns the options and the number of bytes consumed (excluding the marker).
pub fn read_options(data: &[u8]) -> Result<(Vec<CoapOption>, usize), MessageError> {
    let mut options = Vec::new();
    let mut pos = 0usize;
    let mut number = 0u32;

    while pos < data.len() {
        let byte = data[pos];
        if byte == 0xFF {
            break;
        }
        pos += 1;

        let d_nib = byte >> 4;
        let l_nib = byte & 0x0F;
        if d_nib == NIBBLE_RESERVED {
            return Err(MessageError::ReservedNibble("option delta"));
        }
        if l_nib == NIBBLE_RESERVED {
            return Err(MessageError::ReservedNibble("option length"));
        }

        let (delta, used) = decode_nibble(d_nib, &data[pos..], "option delta")?;
        pos += used;
        let (len, used) = decode_nibble(l_nib, &data[pos..], "option length")?;
        pos += used;

        number += delta;
        let number16 = u16::try_from(number).map_err(|_| MessageError::OptionNumberOverflow(number))?;
        let len = len as usize;
        if data.len() - pos < len {
            return Err(MessageError::Truncated("option value"));
        }
        options.push(CoapOption::new(number16, &data[pos..pos + len]));
        pos += len;
    }

    Ok((options, pos))
}

// ---------------------------------------------------------------------------
// uint option values
// ---------------------------------------------------------------------------

/// Minimal big-endian encoding; zero is the empty string.
pub fn encode_uint(value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = (value.leading_zeros() / 8) as usize;
    bytes[skip..].to_vec()
}

pub fn decode_uint(bytes: &[u8]) -> Option<u32> {
    if bytes.len() > 4 {
        return None;
    }
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
}
