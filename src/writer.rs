//! Tag writing
//!
//! A write runs up to three forward passes, each one a [`rewrite`] from the
//! previous stream into the next:
//!
//! 1. source → tmp: replace or remove existing tag payloads
//! 2. tmp → tmp2: append tags the file did not have yet (skipped when none)
//! 3. tmp2 → dest: shift `stco`/`co64` entries by the net size change
//!    (skipped when the size is unchanged or media data precedes `moov`)
//!
//! Skipped passes are plain copies.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::boxes::{self, HEADER_SIZE, ILST_PATH, MDAT_PATH};
use crate::chunk_offset::ChunkOffsetTable;
use crate::error::{Error, Result};
use crate::ilst::schema::{self, TAGS};
use crate::ilst::ItemList;
use crate::reader::Tagger;
use crate::rewrite::rewrite;
use crate::walk::walk;

/// Scratch files used between passes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempPaths {
    pub tmp: PathBuf,
    pub tmp2: PathBuf,
}

impl TempPaths {
    pub fn new(tmp: impl Into<PathBuf>, tmp2: impl Into<PathBuf>) -> Self {
        TempPaths {
            tmp: tmp.into(),
            tmp2: tmp2.into(),
        }
    }

    /// `<dest>.tmp` and `<dest>.tmp2`
    pub fn beside(dest: &Path) -> Self {
        let with_suffix = |suffix: &str| {
            let mut name = dest.as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        };
        TempPaths::new(with_suffix(".tmp"), with_suffix(".tmp2"))
    }

    /// Delete both files; missing files are not an error
    pub fn remove(&self) -> io::Result<()> {
        for path in [&self.tmp, &self.tmp2] {
            match fs::remove_file(path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
        }
        Ok(())
    }
}

/// What happened to the chunk offset tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetPatch {
    /// Net size change was zero
    Unchanged,
    /// Media data is stored before `moov`, so its offsets did not move
    SkippedMdatFirst,
    Patched { tables: u32, entries: u32 },
}

/// Summary of a completed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Tags found in the source while rewriting (empty for a plain copy)
    pub previous: ItemList,
    pub removed: Vec<&'static str>,
    pub modified: Vec<&'static str>,
    pub appended: Vec<&'static str>,
    /// Net change of the file size in bytes
    pub size_delta: i64,
    pub offsets: OffsetPatch,
}

impl WriteReport {
    fn new() -> Self {
        WriteReport {
            previous: ItemList::new(),
            removed: Vec::new(),
            modified: Vec::new(),
            appended: Vec::new(),
            size_delta: 0,
            offsets: OffsetPatch::Unchanged,
        }
    }
}

impl Tagger {
    /// Write `source` to `dest` with `tags` set and the `delete` ids removed.
    ///
    /// `tmp` and `tmp2` hold intermediate passes; only the bytes written
    /// during this call are read back. An id both set and deleted is
    /// deleted. `dest` is complete only when `Ok` is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn write<R, W, T1, T2, S>(
        &self,
        source: &mut R,
        source_len: u64,
        dest: &mut W,
        tmp: &mut T1,
        tmp2: &mut T2,
        tags: &ItemList,
        delete: &[S],
    ) -> Result<WriteReport>
    where
        R: Read + Seek,
        W: Write,
        T1: Read + Write + Seek,
        T2: Read + Write + Seek,
        S: AsRef<str>,
    {
        self.scoped(|| -> Result<WriteReport> {
            let mut deleted = BTreeSet::new();
            for id in delete {
                let index = schema::index_of(id.as_ref())
                    .ok_or_else(|| Error::UnknownTag(id.as_ref().to_string()))?;
                deleted.insert(index);
            }
            let pending: BTreeSet<usize> = tags
                .iter()
                .filter_map(|(spec, _)| schema::index_of(spec.id))
                .filter(|index| !deleted.contains(index))
                .collect();

            let mut report = WriteReport::new();
            if pending.is_empty() && deleted.is_empty() {
                debug!("nothing to change, copying source");
                copy_stream(source, source_len, dest)?;
                return Ok(report);
            }

            let plan = Plan {
                tags,
                deleted,
                pending,
            };
            plan.run(source, source_len, dest, tmp, tmp2, &mut report)?;
            Ok(report)
        })
    }

    /// File-backed [`write`](Self::write). The temp files are created (or
    /// truncated) but not removed; see [`TempPaths::remove`].
    ///
    /// Fails with [`Error::SamePath`] before touching anything when two of
    /// `source`, `dest` and the temp paths name the same file. The last pass
    /// goes to a file next to `dest` that replaces it only on success, so a
    /// failed write leaves `dest` as it was.
    pub fn write_file<S: AsRef<str>>(
        &self,
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        temp: &TempPaths,
        tags: &ItemList,
        delete: &[S],
    ) -> Result<WriteReport> {
        let (source, dest) = (source.as_ref(), dest.as_ref());
        check_distinct(&[source, dest, temp.tmp.as_path(), temp.tmp2.as_path()])?;

        let file = File::open(source)?;
        let metadata = file.metadata()?;
        let mut reader = BufReader::new(file);
        let mut tmp = scratch_file(&temp.tmp)?;
        let mut tmp2 = scratch_file(&temp.tmp2)?;

        let mut staged = NamedTempFile::new_in(parent_dir(dest))?;
        staged.as_file().set_permissions(metadata.permissions())?;
        let report = {
            let mut out = BufWriter::new(&mut staged);
            let report = self.write(
                &mut reader,
                metadata.len(),
                &mut out,
                &mut tmp,
                &mut tmp2,
                tags,
                delete,
            )?;
            out.flush()?;
            report
        };
        staged.persist(dest).map_err(io::Error::from)?;
        debug!(dest = %dest.display(), "destination written");
        Ok(report)
    }
}

fn scratch_file(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}

/// Directory holding `path`; `.` for a bare file name
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Absolute path with symlinks resolved, also for files not created yet
fn resolve(path: &Path) -> io::Result<PathBuf> {
    match fs::canonicalize(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let Some(name) = path.file_name() else {
                return Err(e);
            };
            Ok(fs::canonicalize(parent_dir(path))?.join(name))
        }
        resolved => resolved,
    }
}

/// Fail when two of `paths` resolve to the same file
fn check_distinct(paths: &[&Path]) -> Result<()> {
    let resolved = paths
        .iter()
        .map(|path| resolve(path))
        .collect::<io::Result<Vec<_>>>()?;
    for (i, first) in resolved.iter().enumerate() {
        if let Some(j) = resolved[i + 1..].iter().position(|other| other == first) {
            return Err(Error::SamePath {
                first: paths[i].to_path_buf(),
                second: paths[i + 1 + j].to_path_buf(),
            });
        }
    }
    Ok(())
}

struct Plan<'a> {
    tags: &'a ItemList,
    /// schema indices to remove
    deleted: BTreeSet<usize>,
    /// schema indices still to be written
    pending: BTreeSet<usize>,
}

impl Plan<'_> {
    fn run<R, W, T1, T2>(
        mut self,
        source: &mut R,
        source_len: u64,
        dest: &mut W,
        tmp: &mut T1,
        tmp2: &mut T2,
        report: &mut WriteReport,
    ) -> Result<()>
    where
        R: Read + Seek,
        W: Write,
        T1: Read + Write + Seek,
        T2: Read + Write + Seek,
    {
        tmp.seek(SeekFrom::Start(0))?;
        self.update_existing(source, source_len, tmp, report)?;
        let tmp_len = tmp.stream_position()?;

        tmp2.seek(SeekFrom::Start(0))?;
        if self.pending.is_empty() {
            copy_stream(tmp, tmp_len, tmp2)?;
        } else {
            self.append_missing(tmp, tmp_len, tmp2, report)?;
        }
        let tmp2_len = tmp2.stream_position()?;

        if report.size_delta == 0 {
            debug!("ilst size unchanged, chunk offsets left as is");
            return copy_stream(tmp2, tmp2_len, dest);
        }
        if mdat_precedes_ilst(tmp2, tmp2_len)? {
            debug!(diff = report.size_delta, "mdat precedes ilst, chunk offsets left as is");
            report.offsets = OffsetPatch::SkippedMdatFirst;
            return copy_stream(tmp2, tmp2_len, dest);
        }

        info!(diff = %format!("{:+}", report.size_delta), "modify chunk offsets");
        report.offsets = patch_chunk_offsets(tmp2, tmp2_len, dest, report.size_delta)?;
        Ok(())
    }

    /// Pass 1: rewrite or drop tags already present in the file
    fn update_existing<R: Read + Seek, W: Write>(
        &mut self,
        source: &mut R,
        source_len: u64,
        tmp: &mut W,
        report: &mut WriteReport,
    ) -> Result<()> {
        rewrite(source, source_len, tmp, |b| {
            if b.info().is_containable {
                // a tag whose every data box was removed is dropped with it
                if b.is_emptied() && b.info().parent_path() == ILST_PATH {
                    report.size_delta -= HEADER_SIZE as i64;
                }
                return Ok(ControlFlow::Continue(()));
            }
            let Some(index) = b.info().ilst_data_id().and_then(schema::index_of) else {
                return Ok(ControlFlow::Continue(()));
            };
            let spec = &TAGS[index];
            let old_size = b.info().data_size as i64;

            report.previous.set_decoded(spec.id, b.read_data()?)?;

            if self.deleted.contains(&index) {
                b.remove()?;
                let diff = -(old_size + HEADER_SIZE as i64);
                info!(id = spec.id, diff = %format!("{:+}", diff), "remove");
                report.size_delta += diff;
                if !report.removed.contains(&spec.id) {
                    report.removed.push(spec.id);
                }
            } else if self.pending.remove(&index) {
                if let Some(value) = self.tags.get(spec.id) {
                    let new_size = b.write(value.encode())? as i64;
                    let diff = new_size - old_size;
                    info!(id = spec.id, diff = %format!("{:+}", diff), "modify");
                    report.size_delta += diff;
                    report.modified.push(spec.id);
                }
            }
            Ok(ControlFlow::Continue(()))
        })
    }

    /// Pass 2: append the remaining tags as the last children of `ilst`
    fn append_missing<R: Read + Seek, W: Write>(
        &mut self,
        tmp: &mut R,
        tmp_len: u64,
        tmp2: &mut W,
        report: &mut WriteReport,
    ) -> Result<()> {
        let mut found = false;
        rewrite(tmp, tmp_len, tmp2, |b| {
            if found || b.info().path != ILST_PATH {
                return Ok(ControlFlow::Continue(()));
            }
            found = true;
            for &index in &self.pending {
                let spec = &TAGS[index];
                let Some(value) = self.tags.get(spec.id) else {
                    continue;
                };
                let data = boxes::frame_box(boxes::DATA, &value.encode())?;
                let added = b.insert_new_box(spec.id, data)? as i64;
                info!(id = spec.id, diff = %format!("{:+}", added), "append");
                report.size_delta += added;
                report.appended.push(spec.id);
            }
            Ok(ControlFlow::Continue(()))
        })?;

        if !found {
            return Err(Error::IlstNotFound);
        }
        self.pending.clear();
        Ok(())
    }
}

/// Whether a top-level `mdat` comes before the item list
fn mdat_precedes_ilst<R: Read + Seek>(source: &mut R, len: u64) -> Result<bool> {
    let mut mdat_seen = false;
    let mut ilst_found = false;
    walk(source, len, |_, info| {
        if info.path == MDAT_PATH {
            mdat_seen = true;
        } else if info.path == ILST_PATH {
            ilst_found = true;
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    })?;

    if !ilst_found {
        return Err(Error::IlstNotFound);
    }
    Ok(mdat_seen)
}

/// Pass 3: shift every chunk offset entry by `delta`
fn patch_chunk_offsets<R: Read + Seek, W: Write>(
    source: &mut R,
    len: u64,
    dest: &mut W,
    delta: i64,
) -> Result<OffsetPatch> {
    let mut tables = 0;
    let mut entries = 0;
    rewrite(source, len, dest, |b| {
        let Some(table) = ChunkOffsetTable::for_box(b.info()) else {
            return Ok(ControlFlow::Continue(()));
        };
        let offset = b.info().offset();
        let (patched, count) = table.shift(b.read_data()?, delta, offset)?;
        b.write(patched)?;
        debug!(path = %b.info().path, entries = count, "chunk offsets shifted");
        tables += 1;
        entries += count;
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(OffsetPatch::Patched { tables, entries })
}

/// Copy the first `len` bytes of `source` to `dest`
fn copy_stream<R: Read + Seek, W: Write + ?Sized>(source: &mut R, len: u64, dest: &mut W) -> Result<()> {
    source.seek(SeekFrom::Start(0))?;
    let copied = io::copy(&mut source.by_ref().take(len), dest)?;
    if copied != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} bytes, copied {}", len, copied),
        )
        .into());
    }
    Ok(())
}
