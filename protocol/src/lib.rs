//! Codecs for the Nord Modular G2 data formats.
//!
//! Everything the synth exchanges is a bit packed record described by a schema in [`schema`].
//! Records are framed into [`sections`], which make up patches and performances, both in USB
//! messages and in `.pch2` / `.prf2` files.

pub mod bits;
pub mod bytes;
pub mod components;
pub mod crc;
pub mod dump;
pub mod entries;
pub mod error;
pub mod field;
pub mod patch;
pub mod performance;
pub mod schema;
pub mod sections;
pub mod values;

pub use bits::BitBuffer;
pub use error::{BitError, EntryError, FieldError, PatchError, SectionError};
pub use field::{DecodeContext, FieldId, Fields};
pub use patch::Patch;
pub use performance::Performance;
pub use sections::Section;
pub use values::{FieldValue, FieldValues, Value};
