//! Read-only depth-first box walker

use std::io::{Read, Seek};
use std::ops::ControlFlow;

use crate::boxes::{self, BoxInfo};
use crate::error::Result;

/// Visit every box of `source` in pre-order.
///
/// `size` is the number of bytes of `source` holding boxes, starting at
/// offset 0. Container payloads are descended into right after the
/// container itself is visited. The visitor may read from the stream; the
/// walker seeks back into place before continuing. Returning
/// `ControlFlow::Break` ends the walk with `Ok(())`.
pub fn walk<R, F>(source: &mut R, size: u64, mut visit: F) -> Result<()>
where
    R: Read + Seek,
    F: FnMut(&mut R, &BoxInfo) -> Result<ControlFlow<()>>,
{
    walk_range(source, 0, size, 0, "", &mut visit).map(|_| ())
}

fn walk_range<R, F>(
    source: &mut R,
    start: u64,
    end: u64,
    level: u32,
    parent_path: &str,
    visit: &mut F,
) -> Result<ControlFlow<()>>
where
    R: Read + Seek,
    F: FnMut(&mut R, &BoxInfo) -> Result<ControlFlow<()>>,
{
    let mut pos = start;

    while pos < end {
        let (size, raw_name) = boxes::read_header(source, pos, end)?;
        let info = BoxInfo::new(raw_name, size, pos, level, parent_path);

        if visit(source, &info)?.is_break() {
            return Ok(ControlFlow::Break(()));
        }

        if info.is_containable
            && walk_range(
                source,
                info.child_offset(),
                info.end(),
                level + 1,
                &info.path,
                visit,
            )?
            .is_break()
        {
            return Ok(ControlFlow::Break(()));
        }

        pos = info.end();
    }

    Ok(ControlFlow::Continue(()))
}
