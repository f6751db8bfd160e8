//! Chunk offset tables (`stco` / `co64`)
//!
//! Both tables share one layout: 4 bytes of version/flags, a 32-bit entry
//! count, then the absolute file offset of every media chunk. Moving
//! `mdat` by growing or shrinking `moov` means every entry moves too.

use crate::binary;
use crate::boxes::{BoxInfo, CO64_PATH, STCO_PATH};
use crate::error::{Error, Result};

const ENTRIES_START: usize = 8;

/// Entry width of a chunk offset table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOffsetTable {
    /// `stco`, 32-bit entries
    Stco,
    /// `co64`, 64-bit entries
    Co64,
}

impl ChunkOffsetTable {
    /// Table kind for a box, if it is one
    pub fn for_box(info: &BoxInfo) -> Option<Self> {
        match info.path.as_str() {
            STCO_PATH => Some(ChunkOffsetTable::Stco),
            CO64_PATH => Some(ChunkOffsetTable::Co64),
            _ => None,
        }
    }

    fn entry_size(self) -> usize {
        match self {
            ChunkOffsetTable::Stco => 4,
            ChunkOffsetTable::Co64 => 8,
        }
    }

    /// Shift every entry of `payload` by `delta`.
    ///
    /// Returns the patched payload and the number of entries. `offset` is
    /// the box position, used for error reporting.
    pub fn shift(self, payload: &[u8], delta: i64, offset: u64) -> Result<(Vec<u8>, u32)> {
        let count = binary::u32_at(payload, 4)
            .ok_or_else(|| Error::malformed(offset, "chunk offset table without entry count"))?;
        let needed = (count as u64)
            .checked_mul(self.entry_size() as u64)
            .and_then(|n| n.checked_add(ENTRIES_START as u64));
        if needed.map_or(true, |n| n > payload.len() as u64) {
            return Err(Error::malformed(
                offset,
                format!(
                    "chunk offset table declares {} entries in {} bytes",
                    count,
                    payload.len()
                ),
            ));
        }

        let mut out = Vec::with_capacity(payload.len());
        out.extend_from_slice(&payload[..ENTRIES_START]);
        for i in 0..count as usize {
            let pos = ENTRIES_START + i * self.entry_size();
            match self {
                ChunkOffsetTable::Stco => {
                    let entry = binary::u32_at(payload, pos).unwrap_or_default();
                    let shifted = shift_entry(entry as u64, delta)
                        .and_then(|v| u32::try_from(v).ok())
                        .ok_or(Error::OffsetOverflow {
                            offset: entry as u64,
                            delta,
                        })?;
                    binary::put_u32(&mut out, shifted);
                }
                ChunkOffsetTable::Co64 => {
                    let entry = binary::u64_at(payload, pos).unwrap_or_default();
                    let shifted =
                        shift_entry(entry, delta).ok_or(Error::OffsetOverflow { offset: entry, delta })?;
                    binary::put_u64(&mut out, shifted);
                }
            }
        }
        // anything past the declared entries is carried over
        out.extend_from_slice(&payload[ENTRIES_START + count as usize * self.entry_size()..]);

        Ok((out, count))
    }
}

fn shift_entry(entry: u64, delta: i64) -> Option<u64> {
    if delta >= 0 {
        entry.checked_add(delta as u64)
    } else {
        entry.checked_sub(delta.unsigned_abs())
    }
}
