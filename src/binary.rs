//! Big-endian integer primitives
//!
//! Stream readers (`read_*`) pull fixed-width values from any `Read`
//! implementation. Slice readers (`*_at`) decode from a byte buffer at a
//! given offset and return `None` when the buffer is too short.

use std::io::{self, Read};

/// Read a 32-bit big endian value from `r`.
pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Read four raw bytes (a box name) from `r`.
pub fn read_fourcc<R: Read>(r: &mut R) -> io::Result<[u8; 4]> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Decode a big endian `i16` at `pos`.
pub fn i16_at(data: &[u8], pos: usize) -> Option<i16> {
    let bytes = data.get(pos..pos.checked_add(2)?)?;
    Some(i16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Decode a big endian `i32` at `pos`.
pub fn i32_at(data: &[u8], pos: usize) -> Option<i32> {
    let bytes = data.get(pos..pos.checked_add(4)?)?;
    Some(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode a big endian `u32` at `pos`.
pub fn u32_at(data: &[u8], pos: usize) -> Option<u32> {
    let bytes = data.get(pos..pos.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode a big endian `u64` at `pos`.
pub fn u64_at(data: &[u8], pos: usize) -> Option<u64> {
    let bytes = data.get(pos..pos.checked_add(8)?)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Some(u64::from_be_bytes(buf))
}

/// Append a big endian `i16` to `out`.
pub fn put_i16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Append a big endian `i32` to `out`.
pub fn put_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Append a big endian `u32` to `out`.
pub fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Append a big endian `u64` to `out`.
pub fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_be_bytes());
}
