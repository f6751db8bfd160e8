//! Tag reading and the shared [`Tagger`] entry point

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::ControlFlow;
use std::path::Path;

use tracing::{debug, Dispatch};

use crate::error::Result;
use crate::ilst::ItemList;
use crate::walk::walk;

/// Reads and rewrites `ilst` tags.
///
/// Diagnostics are emitted as `tracing` events. A dispatch set with
/// [`with_dispatch`](Self::with_dispatch) receives the events of every call
/// made through this value; otherwise the thread's default subscriber does.
#[derive(Debug, Clone, Default)]
pub struct Tagger {
    dispatch: Option<Dispatch>,
}

impl Tagger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route diagnostics of this tagger to `dispatch`
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub(crate) fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }

    /// Decode every supported tag found under `.moov.udta.meta.ilst`.
    ///
    /// `size` is the number of bytes of `source` to walk.
    pub fn read<R: Read + Seek>(&self, source: &mut R, size: u64) -> Result<ItemList> {
        self.scoped(|| read_tags(source, size))
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<ItemList> {
        let file = File::open(path.as_ref())?;
        let size = file.metadata()?.len();
        self.read(&mut BufReader::new(file), size)
    }
}

fn read_tags<R: Read + Seek>(source: &mut R, size: u64) -> Result<ItemList> {
    let mut tags = ItemList::new();

    walk(source, size, |source, info| {
        let Some(id) = info.ilst_data_id() else {
            debug!(path = %info.path, position = info.data_position, size = info.data_size, "box");
            return Ok(ControlFlow::Continue(()));
        };

        let mut payload = vec![0u8; info.data_size as usize];
        source.seek(SeekFrom::Start(info.data_position))?;
        source.read_exact(&mut payload)?;
        tags.set_decoded(id, &payload)?;

        if let Some(value) = tags.get(id) {
            debug!(
                path = %info.path,
                position = info.data_position,
                size = info.data_size,
                value = %value,
                "tag"
            );
        }
        Ok(ControlFlow::Continue(()))
    })?;

    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::ilst::{InternationalText, TagValue};
    use crate::test_utils::{container, sample_file, text_payload};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    fn read(data: &[u8]) -> Result<ItemList> {
        Tagger::new().read(&mut Cursor::new(data), data.len() as u64)
    }

    #[test]
    fn test_read_known_tags() {
        let file = sample_file(
            &[
                ("(c)nam", text_payload("Old Title")),
                ("trkn", TagValue::TrackNumber { number: 3, total: 12 }.encode()),
                ("covr", vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 1, 2]),
            ],
            &[1000],
            false,
        );
        let tags = read(&file).unwrap();
        assert_eq!(tags.len(), 3);
        assert_eq!(
            tags.get("(c)nam"),
            Some(&TagValue::Text(InternationalText::new("Old Title")))
        );
        assert_eq!(
            tags.get("trkn"),
            Some(&TagValue::TrackNumber { number: 3, total: 12 })
        );
        assert!(matches!(tags.get("covr"), Some(TagValue::Binary(data)) if data.len() == 10));
    }

    #[test]
    fn test_unknown_items_are_skipped() {
        let file = sample_file(
            &[("----", vec![0; 20]), ("aART", text_payload("Band"))],
            &[],
            false,
        );
        let tags = read(&file).unwrap();
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("aART"));
    }

    #[test]
    fn test_udta_text_atoms_are_not_tags() {
        // QuickTime user data text outside of ilst
        let udta_text = container("(c)nam", &[]);
        let file = [
            container("moov", &[container("udta", &[udta_text])]),
            container("mdat", &[]),
        ]
        .concat();
        assert!(read(&file).unwrap().is_empty());
    }

    #[test]
    fn test_decode_error_names_tag() {
        let file = sample_file(&[("tmpo", vec![0; 3])], &[], false);
        match read(&file) {
            Err(Error::Decode { id, .. }) => assert_eq!(id, "tmpo"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_events_go_to_configured_dispatch() {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();

        let file = sample_file(&[("covr", vec![7; 16])], &[], false);
        let tagger = Tagger::new().with_dispatch(Dispatch::new(subscriber));
        tagger
            .read(&mut Cursor::new(&file[..]), file.len() as u64)
            .unwrap();

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains(".moov.udta.meta.ilst.covr.data"));
        assert!(output.contains("binary data (skip display)"));
    }
}
