//! Fixed-schema tag collection

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::schema::{self, TagSpec, TAGS};
use super::value::TagValue;
use crate::error::{Error, Result};

/// One optional value per schema tag.
///
/// Slots are positional in [`TAGS`]; only presence and value change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemList {
    slots: Vec<Option<TagValue>>,
}

impl Default for ItemList {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemList {
    pub fn new() -> Self {
        ItemList {
            slots: vec![None; TAGS.len()],
        }
    }

    pub fn get(&self, id: &str) -> Option<&TagValue> {
        schema::index_of(id).and_then(|i| self.slots[i].as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Store `value` under `id`, returning the previous value.
    pub fn set(&mut self, id: &str, value: TagValue) -> Result<Option<TagValue>> {
        let index = schema::index_of(id).ok_or_else(|| Error::UnknownTag(id.to_string()))?;
        let expected = TAGS[index].kind;
        if value.kind() != expected {
            return Err(Error::KindMismatch {
                id: id.to_string(),
                expected,
                actual: value.kind(),
            });
        }
        Ok(self.slots[index].replace(value))
    }

    /// Decode a stored data box payload into the slot for `id`
    pub fn set_decoded(&mut self, id: &str, payload: &[u8]) -> Result<()> {
        let index = schema::index_of(id).ok_or_else(|| Error::UnknownTag(id.to_string()))?;
        let value = TagValue::decode(TAGS[index].kind, payload).map_err(|source| Error::Decode {
            id: id.to_string(),
            source,
        })?;
        self.slots[index] = Some(value);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<TagValue> {
        schema::index_of(id).and_then(|i| self.slots[i].take())
    }

    /// Present tags in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&'static TagSpec, &TagValue)> + '_ {
        TAGS.iter()
            .zip(self.slots.iter())
            .filter_map(|(spec, slot)| slot.as_ref().map(|value| (spec, value)))
    }

    /// Present tags as `(id, data payload)` pairs in schema order
    pub fn encoded(&self) -> impl Iterator<Item = (&'static str, Vec<u8>)> + '_ {
        self.iter().map(|(spec, value)| (spec.id, value.encode()))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

impl Serialize for ItemList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (spec, value) in self.iter() {
            map.serialize_entry(spec.id, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ilst::{InternationalText, ValueError, ValueKind};
    use pretty_assertions::assert_eq;

    fn title(text: &str) -> TagValue {
        TagValue::Text(InternationalText::new(text))
    }

    #[test]
    fn test_set_get_remove() {
        let mut tags = ItemList::new();
        assert!(tags.is_empty());

        assert_eq!(tags.set("(c)nam", title("One")).unwrap(), None);
        assert_eq!(tags.set("(c)nam", title("Two")).unwrap(), Some(title("One")));
        assert_eq!(tags.get("(c)nam"), Some(&title("Two")));
        assert_eq!(tags.len(), 1);

        assert_eq!(tags.remove("(c)nam"), Some(title("Two")));
        assert!(!tags.contains("(c)nam"));
        assert_eq!(tags.remove("(c)nam"), None);
    }

    #[test]
    fn test_set_rejects_unknown_and_mismatched() {
        let mut tags = ItemList::new();
        assert!(matches!(
            tags.set("----", title("x")),
            Err(Error::UnknownTag(id)) if id == "----"
        ));
        assert!(matches!(
            tags.set("trkn", title("x")),
            Err(Error::KindMismatch {
                expected: ValueKind::TrackNumber,
                actual: ValueKind::Text,
                ..
            })
        ));
        assert!(tags.is_empty());
    }

    #[test]
    fn test_set_decoded_attaches_id() {
        let mut tags = ItemList::new();
        tags.set_decoded("tmpo", &[0, 0, 0, 0x15, 0, 0, 0, 0, 0, 90]).unwrap();
        assert_eq!(tags.get("tmpo"), Some(&TagValue::Int16(90)));

        match tags.set_decoded("trkn", &[0; 4]) {
            Err(Error::Decode { id, source }) => {
                assert_eq!(id, "trkn");
                assert!(matches!(source, ValueError::TooShort { min: 14, .. }));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_iteration_follows_schema_order() {
        let mut tags = ItemList::new();
        tags.set("(c)nam", title("Song")).unwrap();
        tags.set("aART", title("Band")).unwrap();
        tags.set("trkn", TagValue::TrackNumber { number: 1, total: 9 }).unwrap();

        let ids: Vec<_> = tags.iter().map(|(spec, _)| spec.id).collect();
        assert_eq!(ids, vec!["aART", "trkn", "(c)nam"]);

        let encoded: Vec<_> = tags.encoded().collect();
        assert_eq!(encoded[1].0, "trkn");
        assert_eq!(encoded[1].1.len(), 14);
    }

    #[test]
    fn test_serialize_as_map() {
        let mut tags = ItemList::new();
        tags.set("gnre", TagValue::Genre(8)).unwrap();
        tags.set("cpil", TagValue::Bool(true)).unwrap();
        assert_eq!(
            serde_json::to_string(&tags).unwrap(),
            r#"{"cpil":true,"gnre":8}"#
        );
    }
}
