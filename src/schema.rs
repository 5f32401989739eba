//! Data structures describing the header of a PLY file: the encoding and all
//! element groups with their properties.

use std::{
    fmt,
    ops,
};

use derive_more::{Add, AddAssign, From, Sub, SubAssign};

use crate::{
    error::Error,
    types::ScalarType,
};


/// The encoding of the body of a PLY file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl Format {
    /// Returns the binary format with the endianness of the host.
    pub fn binary_native() -> Self {
        #[cfg(target_endian = "big")]
        { Format::BinaryBigEndian }

        #[cfg(target_endian = "little")]
        { Format::BinaryLittleEndian }
    }

    /// Returns `true` for both binary formats.
    pub fn is_binary(&self) -> bool {
        *self != Format::Ascii
    }

    /// The name used in the `format` line of the header.
    pub fn header_name(&self) -> &'static str {
        match self {
            Format::Ascii => "ascii",
            Format::BinaryLittleEndian => "binary_little_endian",
            Format::BinaryBigEndian => "binary_big_endian",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.header_name().fmt(f)
    }
}


// ===========================================================================
// ===== Properties
// ===========================================================================

/// Index of a specific property in the ordered list of properties of one
/// element group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Add, Sub, AddAssign, SubAssign)]
pub struct PropIndex(pub u16);

impl PropIndex {
    /// The largest number of properties a single element can have.
    pub const LIMIT: usize = u16::max_value() as usize + 1;

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PropIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Scalar(ScalarType),
    List {
        /// The type the number of list entries is stored as. Always an
        /// integer type.
        len_type: ScalarType,
        scalar_type: ScalarType,
    }
}

impl PropertyType {
    pub fn len_type(&self) -> Option<ScalarType> {
        match self {
            PropertyType::Scalar(_) => None,
            PropertyType::List { len_type, .. } => Some(*len_type),
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match *self {
            PropertyType::Scalar(scalar_type) => scalar_type,
            PropertyType::List { scalar_type, .. } => scalar_type,
        }
    }

    pub fn is_list(&self) -> bool {
        self.len_type().is_some()
    }
}

/// The header definition of one property of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: String,
    pub ty: PropertyType,
}

impl PropertyDef {
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            ty: PropertyType::Scalar(ty),
        }
    }

    /// Creates a list property. Returns an error if `len_type` is not an
    /// integer type.
    pub fn list(
        name: impl Into<String>,
        len_type: ScalarType,
        scalar_type: ScalarType,
    ) -> Result<Self, Error> {
        let name = name.into();
        if len_type.is_floating_point() {
            return Err(invalid_format!(
                "list lengths must be stored as integers, but property '{}' uses '{}'",
                name,
                len_type,
            ));
        }

        Ok(Self {
            name,
            ty: PropertyType::List { len_type, scalar_type },
        })
    }
}


// ===========================================================================
// ===== Elements
// ===========================================================================

/// The header definition of one element group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDef {
    pub name: String,

    /// Number of elements in this group.
    pub count: u64,

    /// Definitions for all properties of elements in this group, in the order
    /// they appear in each record.
    pub property_defs: Vec<PropertyDef>,

    /// Number of records of all groups declared before this one. Set by
    /// [`Header::add_element`].
    start: u64,
}

impl ElementDef {
    /// Creates an element group without properties.
    pub fn new(name: impl Into<String>, count: u64) -> Self {
        Self {
            name: name.into(),
            count,
            property_defs: Vec::new(),
            start: 0,
        }
    }

    /// Builder-style variant of pushing to `property_defs`.
    pub fn with_property(mut self, prop: PropertyDef) -> Self {
        self.property_defs.push(prop);
        self
    }

    /// Global index of the first record of this group, i.e. the sum of the
    /// counts of all groups before this one.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Global index one past the last record of this group.
    pub fn end(&self) -> u64 {
        self.start + self.count
    }

    pub fn prop_pos(&self, prop_name: &str) -> Option<PropIndex> {
        self.property_defs.iter()
            .position(|p| p.name == prop_name)
            .map(|idx| PropIndex(idx as u16))
    }

    /// Returns `true` if any property of this group is a list.
    pub fn has_list(&self) -> bool {
        self.property_defs.iter().any(|p| p.ty.is_list())
    }

    /// The size of one record in binary encodings, or `None` if the group
    /// has a list property (in which case the size varies).
    pub fn record_size(&self) -> Option<usize> {
        self.property_defs.iter()
            .map(|p| match p.ty {
                PropertyType::Scalar(ty) => Some(ty.len()),
                PropertyType::List { .. } => None,
            })
            .sum()
    }
}

impl ops::Index<PropIndex> for ElementDef {
    type Output = PropertyDef;
    fn index(&self, idx: PropIndex) -> &Self::Output {
        &self.property_defs[idx.as_usize()]
    }
}


// ===========================================================================
// ===== Header
// ===========================================================================

/// Everything declared in the header of a PLY file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub format: Format,

    /// Text of all `comment` lines (without the keyword).
    pub comments: Vec<String>,

    /// Text of all `obj_info` lines (without the keyword).
    pub obj_infos: Vec<String>,

    elements: Vec<ElementDef>,
}

impl Header {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            comments: Vec::new(),
            obj_infos: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// All element groups in declaration order.
    pub fn elements(&self) -> &[ElementDef] {
        &self.elements
    }

    /// Appends an element group. Its start index is set to the number of
    /// records declared before it. The total number of records has to fit
    /// into a `u64` (the header parser and [`Writer::add_element`] check
    /// this).
    ///
    /// [`Writer::add_element`]: crate::write::Writer::add_element
    pub fn add_element(&mut self, mut def: ElementDef) -> &mut ElementDef {
        def.start = self.total_records();
        self.elements.push(def);
        let len = self.elements.len();
        &mut self.elements[len - 1]
    }

    /// The element group declared last. New property declarations are added
    /// to this group.
    pub(crate) fn last_element_mut(&mut self) -> Option<&mut ElementDef> {
        self.elements.last_mut()
    }

    /// Returns the element group with the given name.
    pub fn element(&self, name: &str) -> Option<&ElementDef> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Total number of records in the body (sum of all group counts).
    pub fn total_records(&self) -> u64 {
        self.elements.last().map(|e| e.end()).unwrap_or(0)
    }

    /// Maps a global record index to the index of its element group and the
    /// index of the record inside that group. Returns `None` if `record` is
    /// out of range.
    pub fn locate(&self, record: u64) -> Option<(usize, u64)> {
        self.elements.iter()
            .position(|e| e.start <= record && record < e.end())
            .map(|i| (i, record - self.elements[i].start))
    }
}
