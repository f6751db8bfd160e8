//! In-memory MP4 fixtures for unit tests

use std::io::Cursor;
use std::ops::ControlFlow;

use crate::binary;
use crate::boxes::{frame_box, STCO_PATH};
use crate::ilst::{InternationalText, TagValue};
use crate::walk::walk;

pub(crate) const MDAT_PAYLOAD: &[u8] = b"\x00\x01\x02\x03media payload";

pub(crate) fn container(name: &str, children: &[Vec<u8>]) -> Vec<u8> {
    frame_box(name, &children.concat()).unwrap()
}

pub(crate) fn text_payload(text: &str) -> Vec<u8> {
    TagValue::Text(InternationalText::new(text)).encode()
}

pub(crate) fn tag_box(id: &str, payload: &[u8]) -> Vec<u8> {
    container(id, &[frame_box("data", payload).unwrap()])
}

pub(crate) fn stco_box(entries: &[u32]) -> Vec<u8> {
    let mut payload = vec![0, 0, 0, 0];
    binary::put_u32(&mut payload, entries.len() as u32);
    for &entry in entries {
        binary::put_u32(&mut payload, entry);
    }
    frame_box("stco", &payload).unwrap()
}

pub(crate) fn moov(items: &[Vec<u8>], stco: &[u32]) -> Vec<u8> {
    let stbl = container("stbl", &[stco_box(stco)]);
    let trak = container(
        "trak",
        &[container("mdia", &[container("minf", &[stbl])])],
    );

    let mut meta = vec![0, 0, 0, 0];
    meta.extend(frame_box("hdlr", &[0u8; 25]).unwrap());
    meta.extend(container("ilst", items));
    let udta = container("udta", &[frame_box("meta", &meta).unwrap()]);

    container("moov", &[trak, udta])
}

/// `ftyp`, `moov` and `mdat` with the given tags and chunk offsets
pub(crate) fn sample_file(tags: &[(&str, Vec<u8>)], stco: &[u32], mdat_first: bool) -> Vec<u8> {
    let items: Vec<Vec<u8>> = tags.iter().map(|(id, payload)| tag_box(id, payload)).collect();
    sample_file_with_items(&items, stco, mdat_first)
}

/// Like [`sample_file`], with the `ilst` children given as framed boxes
pub(crate) fn sample_file_with_items(items: &[Vec<u8>], stco: &[u32], mdat_first: bool) -> Vec<u8> {
    let ftyp = frame_box("ftyp", b"M4A \x00\x00\x00\x00M4A isom").unwrap();
    let mdat = frame_box("mdat", MDAT_PAYLOAD).unwrap();
    let moov = moov(items, stco);
    if mdat_first {
        [ftyp, mdat, moov].concat()
    } else {
        [ftyp, moov, mdat].concat()
    }
}

/// Entries of the first `stco` table in `data`
pub(crate) fn stco_entries(data: &[u8]) -> Vec<u32> {
    let mut entries = Vec::new();
    let mut cursor = Cursor::new(data);
    walk(&mut cursor, data.len() as u64, |_, info| {
        if info.path != STCO_PATH {
            return Ok(ControlFlow::Continue(()));
        }
        let start = info.data_position as usize;
        let payload = &data[start..start + info.data_size as usize];
        let count = binary::u32_at(payload, 4).unwrap_or(0) as usize;
        entries = (0..count)
            .filter_map(|i| binary::u32_at(payload, 8 + i * 4))
            .collect();
        Ok(ControlFlow::Break(()))
    })
    .unwrap();
    entries
}
