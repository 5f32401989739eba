//! Streaming reader and writer for PLY files ("Polygon File Format" or
//! "Stanford Triangle Format").
//!
//! A PLY file consists of an ASCII header that declares a number of element
//! groups (e.g. `vertex` and `face`), each with a record count and a list of
//! typed properties, followed by a body containing all records. The body is
//! either ASCII text (one line per record) or packed binary data in little or
//! big endian byte order.
//!
//! This crate does not know anything about meshes. It only moves values
//! between a PLY file and your data structures:
//!
//! - [`read::Reader`] parses the header and then hands every value of every
//!   record to the [`read::ElementInserter`] you bound to its group.
//! - [`write::Writer`] writes a header for the element groups you defined and
//!   pulls every record from the [`write::ElementSource`] bound to its group.
//!
//! The input is never loaded into memory completely. Lines are read through a
//! fixed size working buffer (see [`read::Config::buffer_size`]) and values
//! are delivered as [`Value`], one variant per PLY scalar type.
//!
//! ```no_run
//! use lox_ply::{Error, PropIndex, read::Reader};
//!
//! # fn main() -> Result<(), Error> {
//! let reader = Reader::open("cube.ply")?;
//! for def in reader.definitions() {
//!     println!("{}: {} records", def.name, def.count);
//! }
//!
//! for group in reader.read_all()? {
//!     if let Some(first) = group.records.first() {
//!         println!("first {}: {:?}", group.def.name, first.get(PropIndex(0)));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod error;

#[cfg(test)]
#[macro_use]
mod test_utils;

pub mod buffer;
mod header;
pub mod parse;
pub mod read;
pub mod schema;
pub mod types;
pub mod write;

pub use self::{
    buffer::ElementBuffer,
    error::{Error, LineNumber},
    schema::{ElementDef, Format, Header, PropIndex, PropertyDef, PropertyType},
    types::{Scalar, ScalarType, Value},
};
