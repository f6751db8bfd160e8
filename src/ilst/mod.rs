//! iTunes-style item list (`moov.udta.meta.ilst`) values

mod item_list;
pub mod schema;
mod value;

pub use item_list::ItemList;
pub use schema::TagSpec;
pub use value::{InternationalText, TagValue, ValueError, ValueKind};
