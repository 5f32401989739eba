//! Everything related to writing a PLY file.
//!
//! A [`Writer`] is created from a [`Config`] (which determines the encoding
//! and the header comments). The schema is defined with
//! [`Writer::add_element`] and every non-empty element group needs a source
//! bound with [`Writer::bind`]. [`Writer::write`] then writes the header and
//! pulls every record from its source, in declaration order.
//!
//! For ASCII encoding we simply use the `fmt::Display` impl of all types,
//! which produces the shortest representation that parses back to the same
//! value.
//!
//! ```no_run
//! use lox_ply::{
//!     Error, Format, ScalarType,
//!     schema::{ElementDef, PropertyDef, PropIndex},
//!     write::Writer,
//! };
//!
//! # fn main() -> Result<(), Error> {
//! let positions = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
//!
//! let mut writer = Writer::create("triangle.ply", Format::Ascii)?;
//! writer.add_element(
//!     ElementDef::new("vertex", positions.len() as u64)
//!         .with_property(PropertyDef::scalar("x", ScalarType::Float))
//!         .with_property(PropertyDef::scalar("y", ScalarType::Float))
//!         .with_property(PropertyDef::scalar("z", ScalarType::Float))
//! )?;
//! writer.bind_fn("vertex", |i, buf| {
//!     for (prop, &v) in positions[i as usize].iter().enumerate() {
//!         buf.set(PropIndex(prop as u16), v)?;
//!     }
//!     Ok(())
//! })?;
//! writer.write()?;
//! # Ok(())
//! # }
//! ```

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use log::{debug, warn};

use crate::{
    buffer::ElementBuffer,
    error::Error,
    header::check_name,
    schema::{ElementDef, Format, Header, PropIndex, PropertyType},
    types::{ScalarType, Value},
};




// ===========================================================================
// ===== Config
// ===========================================================================

/// Used to configure and create a [`Writer`].
///
/// This is used to configure basic settings for the file to be written. Most
/// importantly, this is the file encoding. Additionally, you can add comments
/// to the file header.
#[derive(Clone, Debug)]
pub struct Config {
    format: Format,
    comments: Vec<String>,
    obj_infos: Vec<String>,
}

impl Config {
    /// Creates a new configuration with binary encoding (native endianness).
    pub fn binary() -> Self {
        Self::new(Format::binary_native())
    }

    /// Creates a new configuration with ASCII encoding.
    ///
    /// ASCII files are a lot larger and slower to read and write than binary
    /// ones. The header is always ASCII.
    pub fn ascii() -> Self {
        Self::new(Format::Ascii)
    }

    /// Creates a new configuration with the given encoding.
    pub fn new(format: Format) -> Self {
        Self {
            format,
            comments: Vec::new(),
            obj_infos: Vec::new(),
        }
    }

    /// Adds a comment to the file header. Comments must not contain `'\n'`.
    pub fn add_comment(mut self, comment: impl Into<String>) -> Self {
        self.comments.push(comment.into());
        self
    }

    /// Adds an `obj_info` line to the file header.
    pub fn add_obj_info(mut self, obj_info: impl Into<String>) -> Self {
        self.obj_infos.push(obj_info.into());
        self
    }

    /// Creates (or truncates) the file at `path` and returns a writer for it.
    pub fn create<'a>(self, path: impl AsRef<Path>) -> Result<Writer<'a, BufWriter<File>>, Error> {
        Ok(self.into_writer(BufWriter::new(File::create(path)?)))
    }

    /// Creates a writer that writes into the given `io::Write`. You might
    /// want to wrap it into a `BufWriter`.
    pub fn into_writer<'a, W: Write>(self, writer: W) -> Writer<'a, W> {
        let mut header = Header::new(self.format);
        header.comments = self.comments;
        header.obj_infos = self.obj_infos;

        Writer {
            writer,
            header,
            sources: HashMap::new(),
        }
    }
}


// ===========================================================================
// ===== Sources
// ===========================================================================

/// Produces the values of the records of one element group.
///
/// `fill` is called once per record with the index of the record within its
/// group. The same buffer is passed for all records of a group, so it still
/// contains the values of the previous record: all scalars that change have
/// to be set and list properties have to be replaced (`set_list`) or resized
/// (`reset`) before filling them.
pub trait ElementSource {
    fn fill(&mut self, index: u64, buf: &mut ElementBuffer) -> Result<(), Error>;
}

impl<F> ElementSource for F
where
    F: FnMut(u64, &mut ElementBuffer) -> Result<(), Error>,
{
    fn fill(&mut self, index: u64, buf: &mut ElementBuffer) -> Result<(), Error> {
        self(index, buf)
    }
}


// ===========================================================================
// ===== Definition of `Writer`
// ===========================================================================

/// A writer for PLY files.
///
/// The lifetime `'a` is the lifetime of the bound sources.
pub struct Writer<'a, W: Write> {
    writer: W,
    header: Header,
    sources: HashMap<String, Box<dyn ElementSource + 'a>>,
}

impl<'a> Writer<'a, BufWriter<File>> {
    /// Creates the file at `path` and returns a writer using the given
    /// format and no comments.
    pub fn create(path: impl AsRef<Path>, format: Format) -> Result<Self, Error> {
        Config::new(format).create(path)
    }
}

impl<'a, W: Write> Writer<'a, W> {
    /// Creates a writer with the given format and no comments.
    pub fn new(writer: W, format: Format) -> Self {
        Config::new(format).into_writer(writer)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Appends an element group to the schema.
    ///
    /// Returns a schema error if the group or any property has an invalid
    /// name, if there already is a group with that name or if a list property
    /// stores its length as floating point number.
    pub fn add_element(&mut self, def: ElementDef) -> Result<(), Error> {
        check_name(&def.name)?;
        if self.header.element(&def.name).is_some() {
            return Err(schema_error!("duplicate element '{}'", def.name));
        }

        for prop in &def.property_defs {
            check_name(&prop.name)?;
            if def.property_defs.iter().filter(|p| p.name == prop.name).count() > 1 {
                return Err(schema_error!("duplicate property '{}' in '{}'", prop.name, def.name));
            }
            if prop.ty.len_type().map(|ty| ty.is_floating_point()).unwrap_or(false) {
                return Err(schema_error!("list length of '{}' must be an integer", prop.name));
            }
        }
        if def.property_defs.len() > PropIndex::LIMIT {
            return Err(schema_error!("element '{}' has too many properties", def.name));
        }
        if self.header.total_records().checked_add(def.count).is_none() {
            return Err(schema_error!("too many records in element '{}'", def.name));
        }

        self.header.add_element(def);
        Ok(())
    }

    /// Binds `source` to the element group with the given name. A previous
    /// binding for the same group is replaced.
    pub fn bind(&mut self, element: &str, source: impl ElementSource + 'a) -> Result<(), Error> {
        if self.header.element(element).is_none() {
            return Err(schema_error!("no element '{}' was added to the writer", element));
        }

        if self.sources.insert(element.to_string(), Box::new(source)).is_some() {
            warn!("replacing the source bound to PLY element '{}'", element);
        }

        Ok(())
    }

    /// Binds a closure as source to the element group with the given name.
    /// See [`ElementSource`].
    pub fn bind_fn<F>(&mut self, element: &str, fill: F) -> Result<(), Error>
    where
        F: FnMut(u64, &mut ElementBuffer) -> Result<(), Error> + 'a,
    {
        self.bind(element, fill)
    }

    /// Writes the header and all records and flushes the writer.
    pub fn write(self) -> Result<(), Error> {
        let Writer { mut writer, header, sources: mut bound } = self;

        let mut sources = header.elements().iter()
            .map(|def| bound.remove(&def.name))
            .collect::<Vec<_>>();
        for (def, source) in header.elements().iter().zip(&sources) {
            if source.is_none() && def.count > 0 {
                return Err(schema_error!("no source bound to element '{}'", def.name));
            }
        }

        header.write_to(&mut writer)?;

        debug!("writing PLY body ({}, {} records)", header.format, header.total_records());
        match header.format {
            Format::Ascii => {
                write_body(&mut AsciiSerializer::new(&mut writer), &header, &mut sources)?;
            }
            Format::BinaryLittleEndian => {
                write_body(&mut BinaryLeSerializer::new(&mut writer), &header, &mut sources)?;
            }
            Format::BinaryBigEndian => {
                write_body(&mut BinaryBeSerializer::new(&mut writer), &header, &mut sources)?;
            }
        }

        writer.flush()?;
        debug!("finished writing PLY body");

        Ok(())
    }
}


// ===========================================================================
// ===== Body encoding
// ===========================================================================

fn write_body<S: Serializer>(
    ser: &mut S,
    header: &Header,
    sources: &mut [Option<Box<dyn ElementSource + '_>>],
) -> Result<(), Error> {
    for (def, source) in header.elements().iter().zip(sources) {
        let source = match source {
            Some(source) => source,
            None => continue,
        };

        let mut buf = ElementBuffer::new(def);
        for index in 0..def.count {
            source.fill(index, &mut buf)?;
            encode_record(ser, def, &buf)?;
        }
    }

    Ok(())
}

/// Encodes one record. List properties are preceded by their length.
fn encode_record<S: Serializer>(
    ser: &mut S,
    def: &ElementDef,
    buf: &ElementBuffer,
) -> Result<(), Error> {
    for (i, prop_def) in def.property_defs.iter().enumerate() {
        let values = buf.list(PropIndex(i as u16));
        match prop_def.ty {
            PropertyType::Scalar(_) => {
                if values.len() != 1 {
                    return Err(schema_error!(
                        "scalar property '{}' has {} values",
                        prop_def.name,
                        values.len(),
                    ));
                }
                ser.add(values[0])?;
            }
            PropertyType::List { len_type, .. } => {
                ser.add(list_len(values.len(), len_type, &prop_def.name)?)?;
                for &v in values {
                    ser.add(v)?;
                }
            }
        }
    }

    ser.end_element()
}

/// Returns `len` as value of the given (integer) type or an error if it does
/// not fit.
fn list_len(len: usize, ty: ScalarType, prop: &str) -> Result<Value, Error> {
    let max = match ty {
        ScalarType::Char => i8::max_value() as u64,
        ScalarType::UChar => u8::max_value() as u64,
        ScalarType::Short => i16::max_value() as u64,
        ScalarType::UShort => u16::max_value() as u64,
        ScalarType::Int => i32::max_value() as u64,
        ScalarType::UInt | ScalarType::Float | ScalarType::Double => u32::max_value() as u64,
    };

    if len as u64 > max {
        return Err(schema_error!(
            "list '{}' has {} entries, but its length is stored as '{}'",
            prop,
            len,
            ty,
        ));
    }

    Ok(Value::UInt(len as u32).convert(ty))
}


// ===========================================================================
// ===== Definition of ASCII and binary serializers
// ===========================================================================
// These serializers are just used to abstract over the encoding (and things
// like separators and line endings).

trait Serializer {
    fn add(&mut self, v: Value) -> Result<(), Error>;
    fn end_element(&mut self) -> Result<(), Error>;
}

#[derive(Debug)]
struct AsciiSerializer<'a, W: Write> {
    writer: &'a mut W,
    at_start_of_line: bool,
}

impl<'a, W: Write> AsciiSerializer<'a, W> {
    fn new(w: &'a mut W) -> Self {
        Self {
            writer: w,
            at_start_of_line: true,
        }
    }

    fn write_separator(&mut self) -> Result<(), io::Error> {
        if self.at_start_of_line {
            self.at_start_of_line = false;
        } else {
            self.writer.write_all(b" ")?;
        }

        Ok(())
    }
}

impl<W: Write> Serializer for AsciiSerializer<'_, W> {
    fn add(&mut self, v: Value) -> Result<(), Error> {
        self.write_separator()?;
        write!(self.writer, "{}", v)?;
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), Error> {
        self.writer.write_all(b"\n")?;
        self.at_start_of_line = true;
        Ok(())
    }
}

macro_rules! gen_binary_block {
    ($name:ident, $endianness:ident) => {
        #[derive(Debug)]
        struct $name<'a, W: Write> {
            writer: &'a mut W,
        }

        impl<'a, W: Write> $name<'a, W> {
            fn new(w: &'a mut W) -> Self {
                Self {
                    writer: w,
                }
            }
        }

        impl<W: Write> Serializer for $name<'_, W> {
            fn add(&mut self, v: Value) -> Result<(), Error> {
                match v {
                    Value::Char(v) => self.writer.write_i8(v)?,
                    Value::UChar(v) => self.writer.write_u8(v)?,
                    Value::Short(v) => self.writer.write_i16::<$endianness>(v)?,
                    Value::UShort(v) => self.writer.write_u16::<$endianness>(v)?,
                    Value::Int(v) => self.writer.write_i32::<$endianness>(v)?,
                    Value::UInt(v) => self.writer.write_u32::<$endianness>(v)?,
                    Value::Float(v) => self.writer.write_f32::<$endianness>(v)?,
                    Value::Double(v) => self.writer.write_f64::<$endianness>(v)?,
                }

                Ok(())
            }

            fn end_element(&mut self) -> Result<(), Error> {
                // NOOP
                Ok(())
            }
        }
    }
}

gen_binary_block!(BinaryBeSerializer, BigEndian);
gen_binary_block!(BinaryLeSerializer, LittleEndian);
