//! Static tag table for the item list
//!
//! Identifiers follow the ExifTool QuickTime ItemList naming; `(c)` stands
//! for the raw `0xA9` byte.

use super::value::ValueKind;

/// One supported item list tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpec {
    /// Identifier as it appears in box paths, e.g. `(c)nam`
    pub id: &'static str,
    /// Human readable field name
    pub name: &'static str,
    pub kind: ValueKind,
}

const fn tag(id: &'static str, name: &'static str, kind: ValueKind) -> TagSpec {
    TagSpec { id, name, kind }
}

/// Every supported tag, in display/serialization order
pub static TAGS: &[TagSpec] = &[
    tag("aART", "AlbumArtist", ValueKind::Text),
    tag("atID", "ArtistID", ValueKind::Int16),
    tag("covr", "CoverArt", ValueKind::Binary),
    tag("cpil", "Compilation", ValueKind::Bool),
    tag("cprt", "Copyright", ValueKind::Text),
    tag("desc", "Description", ValueKind::Text),
    tag("disk", "DiskNumber", ValueKind::DiskNumber),
    tag("gnre", "Genre", ValueKind::Genre),
    tag("pgap", "DisableInsertPlayGap", ValueKind::Bool),
    tag("rldt", "ReleaseDate", ValueKind::Text),
    tag("soaa", "SortAlbumArtist", ValueKind::Text),
    tag("soal", "SortAlbum", ValueKind::Text),
    tag("soar", "SortArtist", ValueKind::Text),
    tag("soco", "SortComposer", ValueKind::Text),
    tag("sonm", "SortName", ValueKind::Text),
    tag("sosn", "SortShow", ValueKind::Text),
    tag("tmpo", "BeatsPerMinute", ValueKind::Int16),
    tag("trkn", "TrackNumber", ValueKind::TrackNumber),
    tag("(c)ART", "Artist", ValueKind::Text),
    tag("(c)alb", "Album", ValueKind::Text),
    tag("(c)ard", "ArtDirector", ValueKind::Text),
    tag("(c)arg", "Arranger", ValueKind::Text),
    tag("(c)aut", "Author", ValueKind::Text),
    tag("(c)cmt", "Comment", ValueKind::Text),
    tag("(c)com", "Composer", ValueKind::Text),
    tag("(c)con", "Conductor", ValueKind::Text),
    tag("(c)cpy", "CopyrightNotice", ValueKind::Text),
    tag("(c)day", "ContentCreateDate", ValueKind::Text),
    tag("(c)des", "DescriptionNote", ValueKind::Text),
    tag("(c)dir", "Director", ValueKind::Text),
    tag("(c)enc", "EncodedBy", ValueKind::Text),
    tag("(c)gen", "GenreName", ValueKind::Text),
    tag("(c)grp", "Grouping", ValueKind::Text),
    tag("(c)lyr", "Lyrics", ValueKind::Text),
    tag("(c)mvn", "MovementName", ValueKind::Text),
    tag("(c)nam", "Title", ValueKind::Text),
    tag("(c)nrt", "Narrator", ValueKind::Text),
    tag("(c)ope", "OriginalArtist", ValueKind::Text),
    tag("(c)prd", "Producer", ValueKind::Text),
    tag("(c)pub", "Publisher", ValueKind::Text),
    tag("(c)sne", "SoundEngineer", ValueKind::Text),
    tag("(c)sol", "Soloist", ValueKind::Text),
    tag("(c)st3", "Subtitle", ValueKind::Text),
    tag("(c)too", "Encoder", ValueKind::Text),
    tag("(c)trk", "Track", ValueKind::Text),
    tag("(c)wrk", "Work", ValueKind::Text),
    tag("(c)wrt", "ComposerWriter", ValueKind::Text),
    tag("(c)xpd", "ExecutiveProducer", ValueKind::Text),
    tag("(c)xyz", "GPSCoordinates", ValueKind::Text),
];

/// Look up a tag by identifier
pub fn find(id: &str) -> Option<&'static TagSpec> {
    TAGS.iter().find(|spec| spec.id == id)
}

/// Position of a tag in [`TAGS`]
pub(crate) fn index_of(id: &str) -> Option<usize> {
    TAGS.iter().position(|spec| spec.id == id)
}

pub fn is_known(id: &str) -> bool {
    find(id).is_some()
}

/// All supported identifiers in schema order
pub fn ids() -> impl Iterator<Item = &'static str> {
    TAGS.iter().map(|spec| spec.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::name_to_raw;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique_box_names() {
        let mut seen = HashSet::new();
        for id in ids() {
            assert!(seen.insert(id), "duplicate id {}", id);
            assert!(name_to_raw(id).is_ok(), "{} is not a 4-byte box name", id);
        }
        assert_eq!(seen.len(), TAGS.len());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(find("trkn").map(|s| s.kind), Some(ValueKind::TrackNumber));
        assert_eq!(find("(c)nam").map(|s| s.name), Some("Title"));
        assert_eq!(index_of("aART"), Some(0));
        assert!(!is_known("----"));
        assert!(!is_known("stik"));
    }
}
