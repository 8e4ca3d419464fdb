//! TLV sub-fields and fixed-width body fields.
//!
//! A TLV is a 2-byte big-endian length followed by that many bytes. It
//! carries tracepoint names and trace payloads.

use bytes::{BufMut, Bytes};

use super::wire_format::{MAX_TLV_LEN, TIMESTAMP_SIZE, TLV_LENGTH_SIZE};
use crate::error::{ParseFault, Result, TracyError};

/// Encoded size of a TLV carrying `value_len` bytes.
#[inline]
pub fn tlv_len(value_len: usize) -> usize {
    TLV_LENGTH_SIZE + value_len
}

/// Encode a value as a TLV.
///
/// Fails if the value is longer than 65535 bytes.
///
/// # Example
///
/// ```
/// use tracy_client::protocol::encode_tlv;
///
/// assert_eq!(encode_tlv(b"ab").unwrap(), vec![0, 2, b'a', b'b']);
/// ```
pub fn encode_tlv(value: &[u8]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(tlv_len(value.len()));
    encode_tlv_into(&mut buf, value)?;
    Ok(buf)
}

/// Append a TLV to any `BufMut`.
pub fn encode_tlv_into<B: BufMut>(buf: &mut B, value: &[u8]) -> Result<()> {
    if value.len() > MAX_TLV_LEN {
        return Err(TracyError::TlvTooLong(value.len()));
    }
    buf.put_u16(value.len() as u16);
    buf.put_slice(value);
    Ok(())
}

/// Decode the TLV starting at `offset`.
///
/// Returns the value and the offset just past it.
pub fn decode_tlv(buf: &[u8], offset: usize) -> std::result::Result<(&[u8], usize), ParseFault> {
    let value_start = offset + TLV_LENGTH_SIZE;
    if buf.len() < value_start {
        return Err(ParseFault::TruncatedBuffer {
            needed: TLV_LENGTH_SIZE,
            available: buf.len().saturating_sub(offset),
        });
    }

    let len = u16::from_be_bytes([buf[offset], buf[offset + 1]]) as usize;
    let value_end = value_start + len;
    if buf.len() < value_end {
        return Err(ParseFault::TruncatedBuffer {
            needed: len,
            available: buf.len() - value_start,
        });
    }

    Ok((&buf[value_start..value_end], value_end))
}

/// Zero-copy variant of [`decode_tlv`] returning a slice of the shared buffer.
pub fn decode_tlv_bytes(buf: &Bytes, offset: usize) -> std::result::Result<(Bytes, usize), ParseFault> {
    let (value, next) = decode_tlv(buf, offset)?;
    Ok((buf.slice_ref(value), next))
}

/// Decode the 8-byte big-endian timestamp starting at `offset`.
pub fn decode_timestamp(buf: &[u8], offset: usize) -> std::result::Result<(u64, usize), ParseFault> {
    let end = offset + TIMESTAMP_SIZE;
    let field = buf.get(offset..end).ok_or(ParseFault::TruncatedBuffer {
        needed: TIMESTAMP_SIZE,
        available: buf.len().saturating_sub(offset),
    })?;

    let mut raw = [0u8; TIMESTAMP_SIZE];
    raw.copy_from_slice(field);
    Ok((u64::from_be_bytes(raw), end))
}
