//! Unsigned LEB128 lengths used by the linear string table.

use crate::error::{DecodeError, Result};
use bytes::BufMut;

pub fn write_u32(buf: &mut impl BufMut, mut value: u32) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

/// Returns the value and the number of bytes it occupied
pub fn read_u32(buf: &[u8], offset: usize) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    let mut index = offset;
    loop {
        let byte = *buf.get(index).ok_or(DecodeError::Truncated {
            offset: index,
            needed: 1,
            len: buf.len(),
        })?;
        let bits = u32::from(byte & 0x7F);
        if shift >= 32 || (shift == 28 && bits > 0x0F) {
            return Err(DecodeError::Leb128Overflow { offset });
        }
        value |= bits << shift;
        index += 1;
        if byte & 0x80 == 0 {
            return Ok((value, index - offset));
        }
        shift += 7;
    }
}
