//! Value shapes stored in `ilst` data boxes and their byte layouts
//!
//! Every layout is fixed-offset:
//!
//! | kind         | layout                                              |
//! |--------------|-----------------------------------------------------|
//! | text         | `size:i32` `language:i32` `utf-8 text`              |
//! | int16        | `00 00 00 15 00 00 00 00` `value:i16`               |
//! | bool         | `00 00 00 15 00 00 00 00` `value:u8`                |
//! | track number | 10 zero bytes, `number:i16` `total:i16`             |
//! | disk number  | 10 zero bytes, `number:i16` `total:i16` `00 00`     |
//! | genre        | 9 zero bytes, `value:u8`                            |
//! | binary       | raw payload (cover art)                             |

use std::fmt;

use serde::{Serialize, Serializer};

use crate::binary;

/// Header preceding int16 and bool payloads
const FLAG_HEADER: [u8; 8] = [0x00, 0x00, 0x00, 0x15, 0x00, 0x00, 0x00, 0x00];

const NUMBER_PAIR_PADDING: usize = 10;
const GENRE_PADDING: usize = 9;

/// Closed set of value shapes a tag can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Genre,
    Bool,
    Int16,
    TrackNumber,
    DiskNumber,
    Binary,
}

impl ValueKind {
    /// Smallest payload `decode` accepts for this kind
    pub fn min_len(self) -> usize {
        match self {
            ValueKind::Text => 8,
            ValueKind::Genre => GENRE_PADDING + 1,
            ValueKind::Bool => FLAG_HEADER.len() + 1,
            ValueKind::Int16 => FLAG_HEADER.len() + 2,
            ValueKind::TrackNumber | ValueKind::DiskNumber => NUMBER_PAIR_PADDING + 4,
            ValueKind::Binary => 8,
        }
    }

    /// Parse command-line text into a value of this kind.
    ///
    /// Track and disk numbers accept `n` or `n/total`; a zero number becomes
    /// 1 and a zero or missing total becomes the number.
    pub fn parse(self, input: &str) -> Result<TagValue, ValueError> {
        let parse_err = |reason: String| ValueError::Parse {
            kind: self,
            input: input.to_string(),
            reason,
        };

        match self {
            ValueKind::Text => Ok(TagValue::Text(InternationalText::new(input))),
            ValueKind::Bool => match input {
                "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(TagValue::Bool(true)),
                "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(TagValue::Bool(false)),
                _ => Err(parse_err("expected true or false".to_string())),
            },
            ValueKind::Int16 => input
                .parse::<i16>()
                .map(TagValue::Int16)
                .map_err(|e| parse_err(e.to_string())),
            ValueKind::Genre => input
                .parse::<u8>()
                .map(TagValue::Genre)
                .map_err(|e| parse_err(e.to_string())),
            ValueKind::TrackNumber | ValueKind::DiskNumber => {
                let (number, total) = parse_number_pair(input).map_err(parse_err)?;
                let number = if number == 0 { 1 } else { number };
                let total = if total == 0 { number } else { total };
                Ok(if self == ValueKind::TrackNumber {
                    TagValue::TrackNumber { number, total }
                } else {
                    TagValue::DiskNumber { number, total }
                })
            }
            ValueKind::Binary => Err(ValueError::NotTextual(self)),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Text => "text",
            ValueKind::Genre => "genre",
            ValueKind::Bool => "bool",
            ValueKind::Int16 => "int16",
            ValueKind::TrackNumber => "track number",
            ValueKind::DiskNumber => "disk number",
            ValueKind::Binary => "binary",
        };
        f.write_str(name)
    }
}

fn parse_number_pair(input: &str) -> Result<(i16, i16), String> {
    let mut parts = input.splitn(2, '/');
    let number = parts
        .next()
        .unwrap_or_default()
        .trim()
        .parse::<i16>()
        .map_err(|e| e.to_string())?;
    let total = match parts.next() {
        Some(total) => total.trim().parse::<i16>().map_err(|e| e.to_string())?,
        None => 0,
    };
    Ok((number, total))
}

/// Errors from decoding payloads or parsing text into values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("{kind} payload needs at least {min} bytes, got {actual}")]
    TooShort {
        kind: ValueKind,
        min: usize,
        actual: usize,
    },

    #[error("cannot parse {input:?} as {kind}: {reason}")]
    Parse {
        kind: ValueKind,
        input: String,
        reason: String,
    },

    #[error("{0} values cannot be given as text")]
    NotTextual(ValueKind),
}

/// User data text string with language code
///
/// <https://developer.apple.com/documentation/quicktime-file-format/user_data_atoms>
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternationalText {
    /// Leading 32-bit field, written back unchanged
    #[serde(skip)]
    pub size: i32,
    pub text: String,
    pub language_code: i32,
}

impl InternationalText {
    pub fn new(text: impl Into<String>) -> Self {
        InternationalText {
            size: 1,
            text: text.into(),
            language_code: 0,
        }
    }
}

/// A decoded tag value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Text(InternationalText),
    Genre(u8),
    Bool(bool),
    Int16(i16),
    TrackNumber { number: i16, total: i16 },
    DiskNumber { number: i16, total: i16 },
    Binary(#[serde(serialize_with = "serialize_binary")] Vec<u8>),
}

fn serialize_binary<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("binary data ({} bytes)", data.len()))
}

impl TagValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TagValue::Text(_) => ValueKind::Text,
            TagValue::Genre(_) => ValueKind::Genre,
            TagValue::Bool(_) => ValueKind::Bool,
            TagValue::Int16(_) => ValueKind::Int16,
            TagValue::TrackNumber { .. } => ValueKind::TrackNumber,
            TagValue::DiskNumber { .. } => ValueKind::DiskNumber,
            TagValue::Binary(_) => ValueKind::Binary,
        }
    }

    /// Decode a data box payload as `kind`
    pub fn decode(kind: ValueKind, data: &[u8]) -> Result<Self, ValueError> {
        let short = || ValueError::TooShort {
            kind,
            min: kind.min_len(),
            actual: data.len(),
        };
        if data.len() < kind.min_len() {
            return Err(short());
        }

        let value = match kind {
            ValueKind::Text => TagValue::Text(InternationalText {
                size: binary::i32_at(data, 0).ok_or_else(short)?,
                language_code: binary::i32_at(data, 4).ok_or_else(short)?,
                text: String::from_utf8_lossy(&data[8..]).into_owned(),
            }),
            ValueKind::Genre => TagValue::Genre(data[GENRE_PADDING]),
            ValueKind::Bool => TagValue::Bool(data[FLAG_HEADER.len()] != 0),
            ValueKind::Int16 => {
                TagValue::Int16(binary::i16_at(data, FLAG_HEADER.len()).ok_or_else(short)?)
            }
            ValueKind::TrackNumber | ValueKind::DiskNumber => {
                let number = binary::i16_at(data, NUMBER_PAIR_PADDING).ok_or_else(short)?;
                let total = binary::i16_at(data, NUMBER_PAIR_PADDING + 2).ok_or_else(short)?;
                if kind == ValueKind::TrackNumber {
                    TagValue::TrackNumber { number, total }
                } else {
                    TagValue::DiskNumber { number, total }
                }
            }
            ValueKind::Binary => TagValue::Binary(data.to_vec()),
        };
        Ok(value)
    }

    /// Encode into a data box payload
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.kind().min_len() + 2);
        match self {
            TagValue::Text(text) => {
                // a zero size field is never written
                binary::put_i32(&mut out, if text.size == 0 { 1 } else { text.size });
                binary::put_i32(&mut out, text.language_code);
                out.extend_from_slice(text.text.as_bytes());
            }
            TagValue::Genre(genre) => {
                out.resize(GENRE_PADDING, 0);
                out.push(*genre);
            }
            TagValue::Bool(value) => {
                out.extend_from_slice(&FLAG_HEADER);
                out.push(u8::from(*value));
            }
            TagValue::Int16(value) => {
                out.extend_from_slice(&FLAG_HEADER);
                binary::put_i16(&mut out, *value);
            }
            TagValue::TrackNumber { number, total } => {
                out.resize(NUMBER_PAIR_PADDING, 0);
                binary::put_i16(&mut out, *number);
                binary::put_i16(&mut out, *total);
            }
            TagValue::DiskNumber { number, total } => {
                out.resize(NUMBER_PAIR_PADDING, 0);
                binary::put_i16(&mut out, *number);
                binary::put_i16(&mut out, *total);
                out.extend_from_slice(&[0, 0]);
            }
            TagValue::Binary(data) => out.extend_from_slice(data),
        }
        out
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Text(text) => f.write_str(&text.text),
            TagValue::Genre(genre) => write!(f, "{}", genre),
            TagValue::Bool(value) => write!(f, "{}", value),
            TagValue::Int16(value) => write!(f, "{}", value),
            TagValue::TrackNumber { number, total } | TagValue::DiskNumber { number, total } => {
                write!(f, "{}/{}", number, total)
            }
            TagValue::Binary(_) => f.write_str("binary data (skip display)"),
        }
    }
}
