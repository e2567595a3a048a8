// Block-wise transfer option values (RFC 7959, 2.2).
//
// The option integer packs `(num << 4) | (more << 3) | szx` and the block
// size is `16 << szx`. Block1 (request payload) and Block2 (response payload)
// share the layout; only the option number differs.

use crate::error::MessageError;

use super::option::{self, CoapOption};

/// Largest block number representable in a 3-byte option value.
pub const MAX_BLOCK_NUM: u32 = (1 << 20) - 1;

/// Largest size exponent (1024-byte blocks). 7 is reserved for BERT.
pub const MAX_SZX: u8 = 6;

/// Which payload a block option segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDirection {
    /// Request payload chunks (Block1).
    Request,
    /// Response payload chunks (Block2).
    Response,
}

impl BlockDirection {
    pub fn option_number(self) -> u16 {
        match self {
            Self::Request => option::BLOCK1,
            Self::Response => option::BLOCK2,
        }
    }
}

/// A decoded block option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub num: u32,
    pub more: bool,
    pub szx: u8,
}

impl Block {
    pub fn new(num: u32, more: bool, szx: u8) -> Result<Self, MessageError> {
        if num > MAX_BLOCK_NUM {
            return Err(MessageError::InvalidBlock(format!(
                "block number {num} exceeds {MAX_BLOCK_NUM}"
            )));
        }
        if szx > MAX_SZX {
            return Err(MessageError::InvalidBlock(format!(
                "size exponent {szx} is reserved"
            )));
        }
        Ok(Self { num, more, szx })
    }

    /// Block size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        16 << self.szx
    }

    /// Byte offset of this block within the whole payload.
    #[inline]
    pub fn offset(&self) -> usize {
        self.num as usize * self.size()
    }

    /// Packed option integer.
    #[inline]
    pub fn encode(&self) -> u32 {
        (self.num << 4) | (u32::from(self.more) << 3) | u32::from(self.szx)
    }

    pub fn decode(value: u32) -> Result<Self, MessageError> {
        Self::new(value >> 4, value & 0x08 != 0, (value & 0x07) as u8)
    }

    pub fn to_option(&self, direction: BlockDirection) -> CoapOption {
        CoapOption::uint(direction.option_number(), self.encode())
    }

    pub fn from_option(opt: &CoapOption) -> Result<Self, MessageError> {
        if opt.value.len() > 3 {
            return Err(MessageError::InvalidBlock(format!(
                "option value of {} bytes",
                opt.value.len()
            )));
        }
        let value = opt
            .as_uint()
            .ok_or_else(|| MessageError::InvalidBlock("unreadable value".into()))?;
        Self::decode(value)
    }

    /// The block following this one, with the same size.
    pub fn next(&self) -> Result<Self, MessageError> {
        Self::new(self.num + 1, false, self.szx)
    }
}

/// Size exponent for the largest block not exceeding `bytes`.
pub fn szx_for_size(bytes: usize) -> u8 {
    let mut szx = MAX_SZX;
    while szx > 0 && (16usize << szx) > bytes {
        szx -= 1;
    }
    szx
}

/// Split a payload into block-sized chunks, pairing each with its option value.
pub fn split_payload(payload: &[u8], szx: u8) -> Result<Vec<(Block, &[u8])>, MessageError> {
    let size = 16usize << szx.min(MAX_SZX);
    if payload.is_empty() {
        return Ok(vec![(Block::new(0, false, szx)?, payload)]);
    }
    let count = payload.len().div_ceil(size);
    payload
        .chunks(size)
        .enumerate()
        .map(|(i, chunk)| {
            let num = u32::try_from(i).map_err(|_| {
                MessageError::InvalidBlock("payload needs too many blocks".into())
            })?;
            Ok((Block::new(num, i + 1 < count, szx)?, chunk))
        })
        .collect()
}
