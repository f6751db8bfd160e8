//! Box (atom) model shared by the walker and the rewriter
//!
//! Layout of the subset handled here:
//! ```text
//! ftyp (file type)
//! moov (movie/metadata container)
//!   ├── trak (track)
//!   │   └── mdia / minf / stbl
//!   │       └── stco (32-bit chunk offsets)
//!   └── udta (user data)
//!       └── meta (4 bytes version/flags, then children)
//!           └── ilst (iTunes metadata list)
//!               └── ©nam, trkn, ... (one per tag)
//!                   └── data (encoded value)
//! mdat (media data)
//! ```

use std::io::{Read, Seek, SeekFrom, Write};

use crate::binary;
use crate::error::{Error, Result};
use crate::ilst::schema;

/// Size of the `size` + `name` header preceding every payload
pub const HEADER_SIZE: u64 = 8;

/// Version/flags bytes at the start of a `meta` payload
pub const META_PREFIX_SIZE: u64 = 4;

/// Raw first byte of copyright/localized names (`©`)
pub const COPYRIGHT_BYTE: u8 = 0xA9;

/// Display prefix standing in for [`COPYRIGHT_BYTE`]
pub const COPYRIGHT_PREFIX: &str = "(c)";

pub const MDAT_PATH: &str = ".mdat";
pub const ILST_PATH: &str = ".moov.udta.meta.ilst";
pub const STCO_PATH: &str = ".moov.trak.mdia.minf.stbl.stco";
pub const CO64_PATH: &str = ".moov.trak.mdia.minf.stbl.co64";

pub const META: &str = "meta";
pub const DATA: &str = "data";

/// Boxes whose payload is always a sequence of child boxes
const STRUCTURAL_CONTAINERS: [&str; 8] =
    ["moov", "udta", "meta", "ilst", "trak", "mdia", "minf", "stbl"];

/// A box as seen while walking; never kept as a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxInfo {
    /// Display name, `(c)` substituted for a leading `0xA9`
    pub name: String,
    /// Name bytes exactly as stored in the file
    pub raw_name: [u8; 4],
    /// Nesting depth, 0 for top-level boxes
    pub level: u32,
    /// Dot-joined names from the root, e.g. `.moov.udta.meta.ilst`
    pub path: String,
    /// Absolute offset of the payload (after the 8-byte header)
    pub data_position: u64,
    /// Payload length in bytes (box size minus 8)
    pub data_size: u32,
    pub is_containable: bool,
}

impl BoxInfo {
    pub(crate) fn new(
        raw_name: [u8; 4],
        size: u32,
        offset: u64,
        level: u32,
        parent_path: &str,
    ) -> Self {
        let name = display_name(raw_name);
        let is_containable = is_container(&name, parent_path);
        BoxInfo {
            path: format!("{}.{}", parent_path, name),
            name,
            raw_name,
            level,
            data_position: offset + HEADER_SIZE,
            data_size: size - HEADER_SIZE as u32,
            is_containable,
        }
    }

    /// Absolute offset of the box header
    pub fn offset(&self) -> u64 {
        self.data_position - HEADER_SIZE
    }

    /// First byte after the box
    pub fn end(&self) -> u64 {
        self.data_position + self.data_size as u64
    }

    /// Where child boxes start; `meta` carries 4 bytes of version/flags first
    pub fn child_offset(&self) -> u64 {
        if self.name == META {
            (self.data_position + META_PREFIX_SIZE).min(self.end())
        } else {
            self.data_position
        }
    }

    /// Path of the parent box (empty for top-level boxes)
    pub fn parent_path(&self) -> &str {
        &self.path[..self.path.len() - self.name.len() - 1]
    }

    /// Whether this box is a container that always exists in the layout
    /// (as opposed to a per-tag container under `ilst`)
    pub fn is_structural(&self) -> bool {
        STRUCTURAL_CONTAINERS.contains(&self.name.as_str())
    }

    /// Tag identifier when this is a `.moov.udta.meta.ilst.<id>.data` box
    pub fn ilst_data_id(&self) -> Option<&str> {
        if self.is_containable || self.name != DATA {
            return None;
        }
        self.parent_path()
            .strip_prefix(ILST_PATH)?
            .strip_prefix('.')
            .filter(|id| !id.contains('.'))
    }
}

/// Whether `name` is walked as a container when found under `parent_path`.
///
/// Tag identifiers only count as containers directly under `ilst`; elsewhere
/// (e.g. `moov.udta.©nam` text atoms) the same names hold plain data.
pub fn is_container(name: &str, parent_path: &str) -> bool {
    STRUCTURAL_CONTAINERS.contains(&name) || (parent_path == ILST_PATH && schema::is_known(name))
}

/// Render raw name bytes for display and paths
pub fn display_name(raw: [u8; 4]) -> String {
    if raw[0] == COPYRIGHT_BYTE {
        format!("{}{}", COPYRIGHT_PREFIX, String::from_utf8_lossy(&raw[1..]))
    } else {
        String::from_utf8_lossy(&raw).into_owned()
    }
}

/// Reverse of [`display_name`]
pub fn name_to_raw(name: &str) -> Result<[u8; 4]> {
    let mut bytes = Vec::with_capacity(4);
    match name.strip_prefix(COPYRIGHT_PREFIX) {
        Some(rest) => {
            bytes.push(COPYRIGHT_BYTE);
            bytes.extend_from_slice(rest.as_bytes());
        }
        None => bytes.extend_from_slice(name.as_bytes()),
    }
    <[u8; 4]>::try_from(bytes.as_slice()).map_err(|_| Error::InvalidBoxName(name.to_string()))
}

/// Read and validate the header of the box starting at `offset`.
///
/// `parent_end` bounds the box; sizes 0 (to end of file) and 1 (64-bit
/// largesize) are rejected.
pub(crate) fn read_header<R: Read + Seek>(
    source: &mut R,
    offset: u64,
    parent_end: u64,
) -> Result<(u32, [u8; 4])> {
    source.seek(SeekFrom::Start(offset))?;
    let header = binary::read_u32(source).and_then(|size| Ok((size, binary::read_fourcc(source)?)));
    let (size, raw_name) = match header {
        Ok(header) => header,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(Error::malformed(offset, "truncated box header"));
        }
        Err(e) => return Err(e.into()),
    };

    match size {
        0 => Err(Error::malformed(offset, "boxes extending to end of file are not supported")),
        1 => Err(Error::malformed(offset, "64-bit box sizes are not supported")),
        s if (s as u64) < HEADER_SIZE => {
            Err(Error::malformed(offset, format!("box size {} is smaller than its header", s)))
        }
        s if offset + s as u64 > parent_end => Err(Error::malformed(
            offset,
            format!(
                "`{}` ({} bytes) extends past its parent (ends at {})",
                display_name(raw_name),
                s,
                parent_end
            ),
        )),
        s => Ok((s, raw_name)),
    }
}

/// Frame `payload` as a box and append it to `dest`.
pub fn write_box<W: Write + ?Sized>(dest: &mut W, name: &str, payload: &[u8]) -> Result<u64> {
    let raw = name_to_raw(name)?;
    write_raw_box(dest, raw, name, payload)
}

pub(crate) fn write_raw_box<W: Write + ?Sized>(
    dest: &mut W,
    raw: [u8; 4],
    path: &str,
    payload: &[u8],
) -> Result<u64> {
    let size = box_size(path, payload.len() as u64)?;
    dest.write_all(&size.to_be_bytes())?;
    dest.write_all(&raw)?;
    dest.write_all(payload)?;
    Ok(size as u64)
}

/// Total size of a box holding `payload_len` bytes, checked against the
/// 32-bit header.
pub(crate) fn box_size(path: &str, payload_len: u64) -> Result<u32> {
    let total = payload_len + HEADER_SIZE;
    u32::try_from(total).map_err(|_| Error::BoxTooLarge {
        path: path.to_string(),
        size: total,
    })
}

/// Frame `payload` as a standalone box
pub fn frame_box(name: &str, payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(payload.len() + HEADER_SIZE as usize);
    write_box(&mut out, name, payload)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_copyright_name_symmetry() {
        let raw = [0xA9, b'n', b'a', b'm'];
        let name = display_name(raw);
        assert_eq!(name, "(c)nam");
        assert_eq!(name_to_raw(&name).unwrap(), raw);
        assert_eq!(name_to_raw("trkn").unwrap(), *b"trkn");
    }

    #[test]
    fn test_invalid_names() {
        assert!(matches!(name_to_raw("(c)na"), Err(Error::InvalidBoxName(_))));
        assert!(matches!(name_to_raw("toolong"), Err(Error::InvalidBoxName(_))));
    }

    #[test]
    fn test_container_rule() {
        assert!(is_container("moov", ""));
        assert!(is_container("stbl", ".moov.trak.mdia.minf"));
        assert!(is_container("(c)nam", ILST_PATH));
        assert!(!is_container("(c)nam", ".moov.udta"));
        assert!(!is_container("----", ILST_PATH));
        assert!(!is_container("data", ".moov.udta.meta.ilst.(c)nam"));
        assert!(!is_container("mdat", ""));
    }

    #[test]
    fn test_box_info_offsets() {
        let info = BoxInfo::new(*b"meta", 20, 100, 2, ".moov.udta");
        assert_eq!(info.path, ".moov.udta.meta");
        assert_eq!(info.offset(), 100);
        assert_eq!(info.data_position, 108);
        assert_eq!(info.data_size, 12);
        assert_eq!(info.end(), 120);
        assert_eq!(info.child_offset(), 112);
        assert_eq!(info.parent_path(), ".moov.udta");
        assert!(info.is_containable);
        assert!(info.is_structural());
        assert_eq!(info.ilst_data_id(), None);
    }

    #[test]
    fn test_ilst_data_id() {
        let data = BoxInfo::new(*b"data", 20, 0, 5, ".moov.udta.meta.ilst.(c)nam");
        assert_eq!(data.ilst_data_id(), Some("(c)nam"));

        let nested = BoxInfo::new(*b"data", 20, 0, 6, ".moov.udta.meta.ilst.trkn.x");
        assert_eq!(nested.ilst_data_id(), None);

        let elsewhere = BoxInfo::new(*b"data", 20, 0, 3, ".moov.udta.(c)nam");
        assert_eq!(elsewhere.ilst_data_id(), None);

        let not_data = BoxInfo::new(*b"mean", 20, 0, 5, ".moov.udta.meta.ilst.----");
        assert_eq!(not_data.ilst_data_id(), None);
    }

    #[test]
    fn test_read_header_bounds() {
        let mut data = frame_box("free", &[0u8; 4]).unwrap();
        let mut cursor = Cursor::new(data.clone());
        assert_eq!(read_header(&mut cursor, 0, 12).unwrap(), (12, *b"free"));
        assert!(matches!(
            read_header(&mut cursor, 0, 10),
            Err(Error::MalformedBox { offset: 0, .. })
        ));
        assert!(matches!(
            read_header(&mut cursor, 8, 12),
            Err(Error::MalformedBox { offset: 8, .. })
        ));

        data[3] = 1;
        let mut cursor = Cursor::new(data);
        assert!(matches!(
            read_header(&mut cursor, 0, 12),
            Err(Error::MalformedBox { .. })
        ));
    }

    #[test]
    fn test_frame_box() {
        let framed = frame_box("(c)nam", b"abc").unwrap();
        assert_eq!(framed, vec![0, 0, 0, 11, 0xA9, b'n', b'a', b'm', b'a', b'b', b'c']);
    }
}
