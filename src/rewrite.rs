//! Copy-and-patch box rewriter
//!
//! [`rewrite`] walks the same way as [`crate::walk::walk`] but copies every
//! box to a destination stream while the editor substitutes, deletes or
//! inserts payloads. Container sizes are recomputed bottom-up: children are
//! rebuilt into a buffer first, then the container is handed to the editor
//! and written with a fresh header.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;

use tracing::{debug, trace};

use crate::boxes::{self, BoxInfo, HEADER_SIZE};
use crate::error::{Error, Result};

/// A box handed to the rewrite editor.
///
/// Leaves accept [`write`](Self::write) (at most once) and containers accept
/// [`insert_new_box`](Self::insert_new_box). The state is consumed by the
/// rewriter as soon as the editor returns.
pub struct WritableBox<'a, R> {
    info: BoxInfo,
    source: &'a mut R,
    cached: Option<Vec<u8>>,
    replacement: Option<Vec<u8>>,
    staged: Vec<StagedBox>,
    emptied: bool,
}

struct StagedBox {
    raw_name: [u8; 4],
    path: String,
    payload: Vec<u8>,
}

impl<'a, R: Read + Seek> WritableBox<'a, R> {
    fn new(info: BoxInfo, source: &'a mut R, emptied: bool) -> Self {
        WritableBox {
            info,
            source,
            cached: None,
            replacement: None,
            staged: Vec::new(),
            emptied,
        }
    }

    pub fn info(&self) -> &BoxInfo {
        &self.info
    }

    /// Original payload of the box, read on first use
    pub fn read_data(&mut self) -> Result<&[u8]> {
        let data = match self.cached.take() {
            Some(data) => data,
            None => {
                self.source.seek(SeekFrom::Start(self.info.data_position))?;
                let mut data = vec![0u8; self.info.data_size as usize];
                self.source.read_exact(&mut data)?;
                data
            }
        };
        Ok(self.cached.insert(data).as_slice())
    }

    /// Replace the payload of a leaf box, returning the new payload size.
    ///
    /// An empty payload removes the box from the output.
    pub fn write(&mut self, payload: impl Into<Vec<u8>>) -> Result<u32> {
        if self.info.is_containable {
            return Err(Error::NotWritable(self.info.path.clone()));
        }
        if self.replacement.is_some() {
            return Err(Error::AlreadyWritten(self.info.path.clone()));
        }
        let payload = payload.into();
        let size = boxes::box_size(&self.info.path, payload.len() as u64)? - HEADER_SIZE as u32;
        self.replacement = Some(payload);
        Ok(size)
    }

    /// Drop the box from the output; same as writing an empty payload
    pub fn remove(&mut self) -> Result<()> {
        self.write(Vec::<u8>::new()).map(|_| ())
    }

    /// Stage a new child box after the existing children of a container.
    ///
    /// Returns the total length the new box adds (payload plus header).
    pub fn insert_new_box(&mut self, name: &str, payload: impl Into<Vec<u8>>) -> Result<u32> {
        if !self.info.is_containable {
            return Err(Error::NotContainer(self.info.path.clone()));
        }
        let raw_name = boxes::name_to_raw(name)?;
        let path = format!("{}.{}", self.info.path, name);
        let payload = payload.into();
        let size = boxes::box_size(&path, payload.len() as u64)?;
        self.staged.push(StagedBox {
            raw_name,
            path,
            payload,
        });
        Ok(size)
    }

    /// Whether every original child of this container was removed
    pub fn is_emptied(&self) -> bool {
        self.emptied
    }
}

/// Copy `size` bytes of boxes from `source` to `dest`, letting `edit` patch
/// each box on the way.
///
/// Leaves are yielded before they are written and containers after their
/// children were rebuilt. A `ControlFlow::Break` from the editor stops the
/// copy, returning `Ok(())` with `dest` incomplete.
pub fn rewrite<R, W, F>(source: &mut R, size: u64, dest: &mut W, mut edit: F) -> Result<()>
where
    R: Read + Seek,
    W: Write,
    F: FnMut(&mut WritableBox<'_, R>) -> Result<ControlFlow<()>>,
{
    rewrite_range(source, 0, size, 0, "", dest, &mut edit).map(|_| ())
}

fn rewrite_range<R, F>(
    source: &mut R,
    start: u64,
    end: u64,
    level: u32,
    parent_path: &str,
    dest: &mut dyn Write,
    edit: &mut F,
) -> Result<ControlFlow<()>>
where
    R: Read + Seek,
    F: FnMut(&mut WritableBox<'_, R>) -> Result<ControlFlow<()>>,
{
    let mut pos = start;

    while pos < end {
        let (size, raw_name) = boxes::read_header(source, pos, end)?;
        let info = BoxInfo::new(raw_name, size, pos, level, parent_path);
        pos = info.end();

        let flow = if info.is_containable {
            rewrite_container(source, info, dest, edit)?
        } else {
            rewrite_leaf(source, info, dest, edit)?
        };
        if flow.is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }

    Ok(ControlFlow::Continue(()))
}

fn rewrite_leaf<R, F>(
    source: &mut R,
    info: BoxInfo,
    dest: &mut dyn Write,
    edit: &mut F,
) -> Result<ControlFlow<()>>
where
    R: Read + Seek,
    F: FnMut(&mut WritableBox<'_, R>) -> Result<ControlFlow<()>>,
{
    let mut writable = WritableBox::new(info, source, false);
    if edit(&mut writable)?.is_break() {
        return Ok(ControlFlow::Break(()));
    }
    let WritableBox {
        info,
        cached,
        replacement,
        ..
    } = writable;

    match (replacement, cached) {
        (Some(payload), _) if payload.is_empty() => {
            debug!(path = %info.path, old = info.data_size, diff = -(info.data_size as i64), "box removed");
        }
        (Some(payload), _) => {
            debug!(
                path = %info.path,
                old = info.data_size,
                new = payload.len(),
                diff = payload.len() as i64 - info.data_size as i64,
                "payload replaced"
            );
            boxes::write_raw_box(dest, info.raw_name, &info.path, &payload)?;
        }
        (None, Some(original)) => {
            boxes::write_raw_box(dest, info.raw_name, &info.path, &original)?;
        }
        (None, None) => {
            trace!(path = %info.path, size = info.data_size, "copied");
            copy_box(source, &info, dest)?;
        }
    }

    Ok(ControlFlow::Continue(()))
}

fn rewrite_container<R, F>(
    source: &mut R,
    info: BoxInfo,
    dest: &mut dyn Write,
    edit: &mut F,
) -> Result<ControlFlow<()>>
where
    R: Read + Seek,
    F: FnMut(&mut WritableBox<'_, R>) -> Result<ControlFlow<()>>,
{
    // meta version/flags are carried over as-is
    let prefix_len = (info.child_offset() - info.data_position) as usize;
    let mut children = vec![0u8; prefix_len];
    if prefix_len > 0 {
        source.seek(SeekFrom::Start(info.data_position))?;
        source.read_exact(&mut children)?;
    }

    let flow = rewrite_range(
        source,
        info.child_offset(),
        info.end(),
        info.level + 1,
        &info.path,
        &mut children,
        edit,
    )?;
    if flow.is_break() {
        return Ok(ControlFlow::Break(()));
    }

    let had_children = info.child_offset() < info.end();
    let emptied = had_children && children.len() == prefix_len;

    let mut writable = WritableBox::new(info, source, emptied);
    if edit(&mut writable)?.is_break() {
        return Ok(ControlFlow::Break(()));
    }
    let WritableBox { info, staged, .. } = writable;

    if emptied && staged.is_empty() && !info.is_structural() {
        debug!(path = %info.path, "container emptied, dropped");
        return Ok(ControlFlow::Continue(()));
    }

    let staged_len: u64 = staged
        .iter()
        .map(|b| b.payload.len() as u64 + HEADER_SIZE)
        .sum();
    let payload_len = children.len() as u64 + staged_len;
    let size = boxes::box_size(&info.path, payload_len)?;
    debug!(
        path = %info.path,
        old = info.data_size,
        new = payload_len,
        diff = payload_len as i64 - info.data_size as i64,
        "container rebuilt"
    );

    dest.write_all(&size.to_be_bytes())?;
    dest.write_all(&info.raw_name)?;
    dest.write_all(&children)?;
    for new_box in &staged {
        debug!(path = %new_box.path, size = new_box.payload.len() as u64 + HEADER_SIZE, "box inserted");
        boxes::write_raw_box(dest, new_box.raw_name, &new_box.path, &new_box.payload)?;
    }

    Ok(ControlFlow::Continue(()))
}

/// Stream an untouched box without buffering its payload
fn copy_box<R: Read + Seek>(source: &mut R, info: &BoxInfo, dest: &mut dyn Write) -> Result<()> {
    let size = info.data_size as u64 + HEADER_SIZE;
    dest.write_all(&(size as u32).to_be_bytes())?;
    dest.write_all(&info.raw_name)?;

    source.seek(SeekFrom::Start(info.data_position))?;
    let copied = io::copy(&mut source.by_ref().take(info.data_size as u64), dest)?;
    if copied != info.data_size as u64 {
        return Err(Error::malformed(
            info.offset(),
            format!("`{}` payload ends after {} of {} bytes", info.path, copied, info.data_size),
        ));
    }
    Ok(())
}
