//! Everything related to reading a PLY file.
//!
//! A [`Reader`] parses the header when it is created. Afterwards, the schema
//! can be inspected and sinks can be bound to element groups by name. Calling
//! [`Reader::read`] then decodes the whole body in one pass, handing every
//! field of every record of a bound group to its sink. Groups without a sink
//! are skipped (but still consumed).
//!
//! ```no_run
//! use lox_ply::{Error, read::Reader};
//!
//! # fn main() -> Result<(), Error> {
//! let mut positions = Vec::new();
//!
//! let mut reader = Reader::open("bunny.ply")?;
//! let x = reader.header().element("vertex").and_then(|e| e.prop_pos("x"));
//! reader.bind_buffer("vertex", move |_, buf| {
//!     if let Some(x) = x {
//!         positions.push(buf.get_as::<f32>(x).unwrap_or(0.0));
//!     }
//!     Ok(())
//! })?;
//! reader.read()?;
//! # Ok(())
//! # }
//! ```

use std::{
    cmp::min,
    collections::HashMap,
    convert::TryFrom,
    fs::File,
    io::Read,
    path::Path,
};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::{debug, warn};

use crate::{
    buffer::ElementBuffer,
    error::Error,
    header::parse_header,
    parse::{
        Tokenizer, Tokens, parse_float, parse_signed, parse_unsigned,
        buf::{DEFAULT_BUFFER_SIZE, LineReader},
    },
    schema::{ElementDef, Format, Header, PropIndex, PropertyType},
    types::{MAX_SCALAR_LEN, ScalarType, Value},
};




// ===========================================================================
// ===== Config
// ===========================================================================

/// Used to configure and create a [`Reader`].
#[derive(Clone, Debug)]
pub struct Config {
    buffer_size: usize,
    strict_header: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Default configuration: 1 MiB working buffer, permissive header.
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            strict_header: false,
        }
    }

    /// Sets the size of the working buffer in bytes. No single line of the
    /// file (header or ASCII body) may be longer than this. Values below 16
    /// are rounded up.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// If `true`, header lines starting with an unknown keyword (and empty
    /// header lines) are a format error. Otherwise (the default) they are
    /// ignored.
    pub fn strict_header(mut self, strict: bool) -> Self {
        self.strict_header = strict;
        self
    }

    /// Opens the file at `path` and parses its header.
    pub fn open<'a>(self, path: impl AsRef<Path>) -> Result<Reader<'a, File>, Error> {
        // No `BufReader` needed: the line reader has its own buffer.
        self.into_reader(File::open(path)?)
    }

    /// Creates a reader from the given `io::Read` and parses the header.
    pub fn into_reader<'a, R: Read>(self, reader: R) -> Result<Reader<'a, R>, Error> {
        let mut lines = LineReader::new(reader, self.buffer_size)?;
        let header = parse_header(&mut lines, self.strict_header)?;
        let data_offset = lines.offset();

        Ok(Reader {
            lines,
            header,
            data_offset,
            inserters: HashMap::new(),
        })
    }
}


// ===========================================================================
// ===== Sinks
// ===========================================================================

/// Receives decoded values of the records of one element group.
///
/// For every record, the decoder walks the properties in declaration order.
/// For each accepted scalar property, `set` is called once with `item == 0`.
/// For each accepted list property, `list_len` is called with the number of
/// entries followed by one `set` call per entry. After all properties,
/// `insert` is called with the index of the record within its group.
///
/// Values always have the type declared in the header; use [`Value::get`] to
/// convert them into the type you store.
pub trait ElementInserter {
    /// Returns whether the values of `prop` should be delivered. Values of
    /// declined properties are consumed from the input without converting
    /// them.
    fn accepts(&self, _prop: PropIndex) -> bool {
        true
    }

    fn list_len(&mut self, _prop: PropIndex, _len: usize) -> Result<(), Error> {
        Ok(())
    }

    fn set(&mut self, prop: PropIndex, item: usize, value: Value) -> Result<(), Error>;

    /// Called after all properties of the record with index `index` have been
    /// delivered.
    fn insert(&mut self, index: u64) -> Result<(), Error>;
}

impl<T: ElementInserter + ?Sized> ElementInserter for &mut T {
    fn accepts(&self, prop: PropIndex) -> bool {
        (**self).accepts(prop)
    }
    fn list_len(&mut self, prop: PropIndex, len: usize) -> Result<(), Error> {
        (**self).list_len(prop, len)
    }
    fn set(&mut self, prop: PropIndex, item: usize, value: Value) -> Result<(), Error> {
        (**self).set(prop, item, value)
    }
    fn insert(&mut self, index: u64) -> Result<(), Error> {
        (**self).insert(index)
    }
}

impl<T: ElementInserter + ?Sized> ElementInserter for Box<T> {
    fn accepts(&self, prop: PropIndex) -> bool {
        (**self).accepts(prop)
    }
    fn list_len(&mut self, prop: PropIndex, len: usize) -> Result<(), Error> {
        (**self).list_len(prop, len)
    }
    fn set(&mut self, prop: PropIndex, item: usize, value: Value) -> Result<(), Error> {
        (**self).set(prop, item, value)
    }
    fn insert(&mut self, index: u64) -> Result<(), Error> {
        (**self).insert(index)
    }
}

/// Collects one record into an [`ElementBuffer`] and passes it to a closure.
struct BufferInserter<F> {
    buf: ElementBuffer,
    on_record: F,
}

impl<F> ElementInserter for BufferInserter<F>
where
    F: FnMut(u64, &ElementBuffer) -> Result<(), Error>,
{
    fn list_len(&mut self, prop: PropIndex, len: usize) -> Result<(), Error> {
        self.buf.reset(prop, len)
    }
    fn set(&mut self, prop: PropIndex, item: usize, value: Value) -> Result<(), Error> {
        self.buf.set_item(prop, item, value);
        Ok(())
    }
    fn insert(&mut self, index: u64) -> Result<(), Error> {
        (self.on_record)(index, &self.buf)
    }
}

/// Keeps a copy of every record. Used by [`Reader::read_all`].
struct Collector {
    buf: ElementBuffer,
    records: Vec<ElementBuffer>,
}

impl ElementInserter for Collector {
    fn list_len(&mut self, prop: PropIndex, len: usize) -> Result<(), Error> {
        self.buf.reset(prop, len)
    }
    fn set(&mut self, prop: PropIndex, item: usize, value: Value) -> Result<(), Error> {
        self.buf.set_item(prop, item, value);
        Ok(())
    }
    fn insert(&mut self, _: u64) -> Result<(), Error> {
        self.records.push(self.buf.clone());
        Ok(())
    }
}

/// Declines everything. Used for groups nobody is interested in.
struct Ignore;

impl ElementInserter for Ignore {
    fn accepts(&self, _: PropIndex) -> bool {
        false
    }
    fn set(&mut self, _: PropIndex, _: usize, _: Value) -> Result<(), Error> {
        Ok(())
    }
    fn insert(&mut self, _: u64) -> Result<(), Error> {
        Ok(())
    }
}

/// All records of one element group, as returned by [`Reader::read_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct ElementGroup {
    pub def: ElementDef,
    pub records: Vec<ElementBuffer>,
}


// ===========================================================================
// ===== Definition of `Reader`
// ===========================================================================

/// A reader for PLY files. The header has already been parsed.
///
/// You can create a reader with [`Reader::open`], [`Reader::new`] or via
/// [`Config`]. The lifetime `'a` is the lifetime of the bound sinks.
pub struct Reader<'a, R: Read> {
    lines: LineReader<R>,
    header: Header,
    data_offset: u64,
    inserters: HashMap<String, Box<dyn ElementInserter + 'a>>,
}

impl<'a> Reader<'a, File> {
    /// Opens the file at `path` with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Config::new().open(path)
    }
}

impl<'a, R: Read> Reader<'a, R> {
    /// Creates a reader with the default configuration from the given
    /// `io::Read` and parses its header.
    ///
    /// If you want to open a file, rather use [`Reader::open`].
    pub fn new(reader: R) -> Result<Self, Error> {
        Config::new().into_reader(reader)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The element groups declared in the header, in order.
    pub fn definitions(&self) -> &[ElementDef] {
        self.header.elements()
    }

    pub fn format(&self) -> Format {
        self.header.format
    }

    pub fn comments(&self) -> &[String] {
        &self.header.comments
    }

    pub fn obj_infos(&self) -> &[String] {
        &self.header.obj_infos
    }

    /// The absolute offset of the first byte after the header.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Binds `inserter` to the element group with the given name. A previous
    /// binding for the same group is replaced.
    ///
    /// Returns a schema error if there is no group with that name.
    pub fn bind(
        &mut self,
        element: &str,
        inserter: impl ElementInserter + 'a,
    ) -> Result<(), Error> {
        if self.header.element(element).is_none() {
            return Err(schema_error!("the file does not contain an element '{}'", element));
        }

        if self.inserters.insert(element.to_string(), Box::new(inserter)).is_some() {
            warn!("replacing the sink bound to PLY element '{}'", element);
        }

        Ok(())
    }

    /// Binds a closure that is called with every record of the given group,
    /// collected in an [`ElementBuffer`]. The buffer is reused for all
    /// records.
    pub fn bind_buffer<F>(&mut self, element: &str, on_record: F) -> Result<(), Error>
    where
        F: FnMut(u64, &ElementBuffer) -> Result<(), Error> + 'a,
    {
        let def = self.header.element(element)
            .ok_or_else(|| schema_error!("the file does not contain an element '{}'", element))?;
        let inserter = BufferInserter {
            buf: ElementBuffer::new(def),
            on_record,
        };

        self.bind(element, inserter)
    }

    /// Reads the whole body, passing all records to the bound sinks.
    pub fn read(self) -> Result<(), Error> {
        let Reader { mut lines, header, mut inserters, .. } = self;
        let mut sinks = header.elements().iter()
            .map(|def| inserters.remove(&def.name))
            .collect::<Vec<_>>();

        read_body(&mut lines, &header, &mut sinks)
    }

    /// Reads the whole body into memory, returning all records of all groups.
    pub fn read_all(mut self) -> Result<Vec<ElementGroup>, Error> {
        let mut sinks = self.header.elements().iter()
            .map(|def| {
                // The count comes from the file, so we don't trust it for
                // preallocation.
                let capacity = min(def.count, 1 << 16) as usize;
                Some(Collector {
                    buf: ElementBuffer::new(def),
                    records: Vec::with_capacity(capacity),
                })
            })
            .collect::<Vec<_>>();

        read_body(&mut self.lines, &self.header, &mut sinks)?;

        let groups = self.header.elements().iter()
            .zip(sinks)
            .map(|(def, sink)| ElementGroup {
                def: def.clone(),
                records: sink.map(|s| s.records).unwrap_or_default(),
            })
            .collect();

        Ok(groups)
    }
}


// ===========================================================================
// ===== Body decoding
// ===========================================================================

/// Decodes all records of all groups. `sinks` has one entry per group.
fn read_body<R: Read, S: ElementInserter>(
    lines: &mut LineReader<R>,
    header: &Header,
    sinks: &mut [Option<S>],
) -> Result<(), Error> {
    debug_assert_eq!(sinks.len(), header.elements().len());

    debug!(
        "reading PLY body ({}, {} records, data offset {})",
        header.format,
        header.total_records(),
        lines.offset(),
    );

    let mut tokenizer = Tokenizer::new(b' ');
    for (def, sink) in header.elements().iter().zip(sinks) {
        if def.count == 0 {
            continue;
        }

        match header.format {
            Format::Ascii => read_ascii_group(lines, &mut tokenizer, def, sink.as_mut())?,
            Format::BinaryLittleEndian => {
                read_binary_group::<LittleEndian, _, _>(lines, def, sink.as_mut())?;
            }
            Format::BinaryBigEndian => {
                read_binary_group::<BigEndian, _, _>(lines, def, sink.as_mut())?;
            }
        }
    }

    if lines.has_remaining()? {
        debug!("ignoring data after the last record of the PLY body (offset {})", lines.offset());
    }
    debug!("finished reading PLY body");

    Ok(())
}

fn read_ascii_group<R: Read, S: ElementInserter>(
    lines: &mut LineReader<R>,
    tokenizer: &mut Tokenizer,
    def: &ElementDef,
    sink: Option<&mut S>,
) -> Result<(), Error> {
    match sink {
        // Skip one line per record without looking at it.
        None => for _ in 0..def.count {
            if lines.getline()?.is_none() {
                return Err(unexpected_end(def));
            }
        }

        Some(sink) => for index in 0..def.count {
            let res = match lines.getline()? {
                Some(line) => decode_ascii(tokenizer.tokenize(line), def, &mut *sink)
                    .and_then(|_| sink.insert(index)),
                None => return Err(unexpected_end(def)),
            };
            res.map_err(|e| e.at_line(lines.line_number()))?;
        }
    }

    Ok(())
}

fn read_binary_group<B: ByteOrder, R: Read, S: ElementInserter>(
    lines: &mut LineReader<R>,
    def: &ElementDef,
    sink: Option<&mut S>,
) -> Result<(), Error> {
    match (sink, def.record_size()) {
        // Fixed size records nobody is interested in can be skipped at once.
        (None, Some(size)) => {
            let len = (size as u64).checked_mul(def.count).ok_or_else(|| invalid_format!(
                "element '{}' ({} records of {} bytes) is larger than any PLY file",
                def.name,
                def.count,
                size,
            ))?;
            lines.skip_bytes(len)
        }
        (None, None) => {
            for _ in 0..def.count {
                decode_binary::<B, _, _>(lines, def, &mut Ignore)?;
            }
            Ok(())
        }
        (Some(sink), _) => {
            for index in 0..def.count {
                decode_binary::<B, _, _>(lines, def, &mut *sink)?;
                sink.insert(index)?;
            }
            Ok(())
        }
    }
}

fn unexpected_end(def: &ElementDef) -> Error {
    invalid_format!(
        "unexpected end of file while reading element '{}' ({} records declared)",
        def.name,
        def.count,
    )
}

/// Decodes one ASCII record (one line, already tokenized) into `sink`.
///
/// Tokens are consumed in property order. A list property consumes its count
/// token followed by that many value tokens.
fn decode_ascii(
    tokens: Tokens<'_>,
    def: &ElementDef,
    sink: &mut impl ElementInserter,
) -> Result<(), Error> {
    let missing = |prop: &str| invalid_format!(
        "too few values in record of element '{}' (missing value for '{}')",
        def.name,
        prop,
    );

    let mut pos = 0;
    for (i, prop_def) in def.property_defs.iter().enumerate() {
        let prop = PropIndex(i as u16);
        let accepted = sink.accepts(prop);

        match prop_def.ty {
            PropertyType::Scalar(ty) => {
                let token = tokens.get(pos).ok_or_else(|| missing(&prop_def.name))?;
                pos += 1;
                if accepted {
                    sink.set(prop, 0, parse_ascii(token, ty)?)?;
                }
            }
            PropertyType::List { len_type, scalar_type } => {
                let token = tokens.get(pos).ok_or_else(|| missing(&prop_def.name))?;
                pos += 1;
                let len = list_len(parse_ascii(token, len_type)?)?;
                if tokens.len() - pos < len {
                    return Err(missing(&prop_def.name));
                }

                if accepted {
                    sink.list_len(prop, len)?;
                    for (item, token) in tokens.iter().skip(pos).take(len).enumerate() {
                        sink.set(prop, item, parse_ascii(token, scalar_type)?)?;
                    }
                }
                pos += len;
            }
        }
    }

    if pos != tokens.len() {
        return Err(invalid_format!(
            "too many values in record of element '{}' (expected {}, found {})",
            def.name,
            pos,
            tokens.len(),
        ));
    }

    Ok(())
}

/// Parses a single ASCII token as value of type `ty`.
fn parse_ascii(token: &[u8], ty: ScalarType) -> Result<Value, Error> {
    let value = match ty {
        ScalarType::Char => parse_signed::<i8>(token).map(Value::Char),
        ScalarType::UChar => parse_unsigned::<u8>(token).map(Value::UChar),
        ScalarType::Short => parse_signed::<i16>(token).map(Value::Short),
        ScalarType::UShort => parse_unsigned::<u16>(token).map(Value::UShort),
        ScalarType::Int => parse_signed::<i32>(token).map(Value::Int),
        ScalarType::UInt => parse_unsigned::<u32>(token).map(Value::UInt),
        // Accumulating in `f64` keeps the error of `float` values below one ulp.
        ScalarType::Float => parse_float::<f64>(token).map(|v| Value::Float(v as f32)),
        ScalarType::Double => parse_float::<f64>(token).map(Value::Double),
    };

    value.ok_or_else(|| invalid_format!(
        "invalid '{}' literal {:?}",
        ty,
        String::from_utf8_lossy(token),
    ))
}

/// Decodes one binary record from `lines` into `sink`. Exactly the bytes of
/// this record are consumed.
fn decode_binary<B: ByteOrder, R: Read, S: ElementInserter>(
    lines: &mut LineReader<R>,
    def: &ElementDef,
    sink: &mut S,
) -> Result<(), Error> {
    for (i, prop_def) in def.property_defs.iter().enumerate() {
        let prop = PropIndex(i as u16);
        let accepted = sink.accepts(prop);

        match prop_def.ty {
            PropertyType::Scalar(ty) if accepted => {
                sink.set(prop, 0, read_binary::<B, _>(lines, ty)?)?;
            }
            PropertyType::Scalar(ty) => lines.skip_bytes(ty.len() as u64)?,

            PropertyType::List { len_type, scalar_type } => {
                let len = list_len(read_binary::<B, _>(lines, len_type)?)?;
                if accepted {
                    sink.list_len(prop, len)?;
                    for item in 0..len {
                        sink.set(prop, item, read_binary::<B, _>(lines, scalar_type)?)?;
                    }
                } else {
                    lines.skip_bytes(len as u64 * scalar_type.len() as u64)?;
                }
            }
        }
    }

    Ok(())
}

/// Reads one value of type `ty` with byte order `B`.
fn read_binary<B: ByteOrder, R: Read>(reader: &mut R, ty: ScalarType) -> Result<Value, Error> {
    let mut scratch = [0; MAX_SCALAR_LEN];
    let bytes = &mut scratch[..ty.len()];
    reader.read_exact(bytes)?;

    Ok(decode_scalar::<B>(bytes, ty))
}

/// Interprets `bytes` (exactly `ty.len()` many) as value of type `ty`.
fn decode_scalar<B: ByteOrder>(bytes: &[u8], ty: ScalarType) -> Value {
    match ty {
        ScalarType::Char => Value::Char(bytes[0] as i8),
        ScalarType::UChar => Value::UChar(bytes[0]),
        ScalarType::Short => Value::Short(B::read_i16(bytes)),
        ScalarType::UShort => Value::UShort(B::read_u16(bytes)),
        ScalarType::Int => Value::Int(B::read_i32(bytes)),
        ScalarType::UInt => Value::UInt(B::read_u32(bytes)),
        ScalarType::Float => Value::Float(B::read_f32(bytes)),
        ScalarType::Double => Value::Double(B::read_f64(bytes)),
    }
}

/// Interprets a decoded list count.
fn list_len(len: Value) -> Result<usize, Error> {
    len.as_integer()
        .and_then(|len| usize::try_from(len).ok())
        .ok_or_else(|| invalid_format!("invalid list length {}", len))
}
