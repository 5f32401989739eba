//! The closed set of PLY scalar types and dynamically typed values thereof.

use std::{
    fmt,
    mem,
    str::FromStr,
};

use derive_more::From;
use num_traits::AsPrimitive;
use static_assertions::const_assert_eq;


/// The number of bytes of the widest scalar type (`double`).
pub const MAX_SCALAR_LEN: usize = 8;

const_assert_eq!(MAX_SCALAR_LEN, mem::size_of::<f64>());


/// A primitive PLY type. There are 8 in total: 2 floating point types, 3
/// signed and 3 unsigned integers.
///
/// This is the type registry of the codec: every type knows its binary width
/// and its name in the header. The ASCII and binary conversions are
/// dispatched on this type in the `read` and `write` modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl ScalarType {
    /// All scalar types in the order of the PLY specification.
    pub const ALL: [ScalarType; 8] = [
        ScalarType::Char,
        ScalarType::UChar,
        ScalarType::Short,
        ScalarType::UShort,
        ScalarType::Int,
        ScalarType::UInt,
        ScalarType::Float,
        ScalarType::Double,
    ];

    /// Returns `true` if and only if the type is either `float` or `double`.
    pub fn is_floating_point(&self) -> bool {
        *self == ScalarType::Float || *self == ScalarType::Double
    }

    /// Returns `true` if and only if the type is one of `uchar`, `ushort` or
    /// `uint`.
    pub fn is_unsigned_integer(&self) -> bool {
        match self {
            ScalarType::UChar | ScalarType::UShort | ScalarType::UInt => true,
            _ => false,
        }
    }

    /// Returns `true` if and only if the type is one of `char`, `short` or
    /// `int`.
    pub fn is_signed_integer(&self) -> bool {
        match self {
            ScalarType::Char | ScalarType::Short | ScalarType::Int => true,
            _ => false,
        }
    }

    /// Returns the number of bytes this type occupies in binary encodings.
    pub fn len(&self) -> usize {
        match self {
            ScalarType::Char | ScalarType::UChar => 1,
            ScalarType::Short | ScalarType::UShort => 2,
            ScalarType::Int | ScalarType::UInt | ScalarType::Float => 4,
            ScalarType::Double => 8,
        }
    }

    /// Returns the type name used in the header (e.g. `short` for `i16`). This
    /// is simply the variant name in lowercase.
    pub fn ply_type_name(&self) -> &'static str {
        match self {
            ScalarType::Char => "char",
            ScalarType::UChar => "uchar",
            ScalarType::Short => "short",
            ScalarType::UShort => "ushort",
            ScalarType::Int => "int",
            ScalarType::UInt => "uint",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.ply_type_name().fmt(f)
    }
}

/// The error emitted when the `FromStr` implementation for `ScalarType` cannot
/// parse the given string.
#[derive(Clone, PartialEq, Eq)]
pub struct ScalarTypeParseError(String);

impl fmt::Display for ScalarTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\" is not a valid PLY scalar type", self.0)
    }
}

impl fmt::Debug for ScalarTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for ScalarType {
    type Err = ScalarTypeParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The sized names are used by some exporters (e.g. VTK).
        match s {
            "char" | "int8" => Ok(ScalarType::Char),
            "uchar" | "uint8" => Ok(ScalarType::UChar),
            "short" | "int16" => Ok(ScalarType::Short),
            "ushort" | "uint16" => Ok(ScalarType::UShort),
            "int" | "int32" => Ok(ScalarType::Int),
            "uint" | "uint32" => Ok(ScalarType::UInt),
            "float" | "float32" => Ok(ScalarType::Float),
            "double" | "float64" => Ok(ScalarType::Double),
            other => Err(ScalarTypeParseError(other.to_string())),
        }
    }
}


// ===========================================================================
// ===== Values
// ===========================================================================

/// One scalar value of some PLY type.
///
/// This is what flows between the codec and the caller: decoded fields are
/// delivered as `Value` carrying the type declared in the header, and values
/// to encode are converted to the declared type before writing. Use
/// [`Value::get`] to obtain the value in the storage type of your choice.
#[derive(Debug, Clone, Copy, PartialEq, From)]
pub enum Value {
    Char(i8),
    UChar(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Float(f32),
    Double(f64),
}

impl Value {
    /// Returns the zero value of the given type.
    pub fn zero(ty: ScalarType) -> Self {
        Value::UChar(0).convert(ty)
    }

    /// Returns the type of this value.
    pub fn ty(&self) -> ScalarType {
        match self {
            Value::Char(_) => ScalarType::Char,
            Value::UChar(_) => ScalarType::UChar,
            Value::Short(_) => ScalarType::Short,
            Value::UShort(_) => ScalarType::UShort,
            Value::Int(_) => ScalarType::Int,
            Value::UInt(_) => ScalarType::UInt,
            Value::Float(_) => ScalarType::Float,
            Value::Double(_) => ScalarType::Double,
        }
    }

    /// Returns the value converted to `T` with the semantics of an `as` cast
    /// (floats are truncated towards zero and saturate, integers wrap).
    pub fn get<T: Scalar>(self) -> T {
        T::from_value(self)
    }

    /// Converts this value to the given type with `as` cast semantics.
    pub fn convert(self, ty: ScalarType) -> Value {
        match ty {
            ScalarType::Char => Value::Char(self.get()),
            ScalarType::UChar => Value::UChar(self.get()),
            ScalarType::Short => Value::Short(self.get()),
            ScalarType::UShort => Value::UShort(self.get()),
            ScalarType::Int => Value::Int(self.get()),
            ScalarType::UInt => Value::UInt(self.get()),
            ScalarType::Float => Value::Float(self.get()),
            ScalarType::Double => Value::Double(self.get()),
        }
    }

    /// Returns the value as integer, or `None` if the value does not have an
    /// integer type.
    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            Value::Char(v) => Some(v.into()),
            Value::UChar(v) => Some(v.into()),
            Value::Short(v) => Some(v.into()),
            Value::UShort(v) => Some(v.into()),
            Value::Int(v) => Some(v.into()),
            Value::UInt(v) => Some(v.into()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Char(v) => v.fmt(f),
            Value::UChar(v) => v.fmt(f),
            Value::Short(v) => v.fmt(f),
            Value::UShort(v) => v.fmt(f),
            Value::Int(v) => v.fmt(f),
            Value::UInt(v) => v.fmt(f),
            Value::Float(v) => v.fmt(f),
            Value::Double(v) => v.fmt(f),
        }
    }
}

mod internal {
    pub trait DoNotImplement {}
}

/// Rust number types a [`Value`] can be converted into.
///
/// This trait is implemented for all primitive integer and float types and
/// is not supposed to be implemented by you (that's why it has a
/// crate-private supertrait).
pub trait Scalar: Copy + internal::DoNotImplement + 'static {
    /// Converts the value with `as` cast semantics.
    fn from_value(v: Value) -> Self;
}

macro_rules! impl_scalar {
    ($($ty:ident),*) => {
        $(
            impl internal::DoNotImplement for $ty {}
            impl Scalar for $ty {
                #[inline(always)]
                fn from_value(v: Value) -> Self {
                    match v {
                        Value::Char(x) => AsPrimitive::<$ty>::as_(x),
                        Value::UChar(x) => AsPrimitive::<$ty>::as_(x),
                        Value::Short(x) => AsPrimitive::<$ty>::as_(x),
                        Value::UShort(x) => AsPrimitive::<$ty>::as_(x),
                        Value::Int(x) => AsPrimitive::<$ty>::as_(x),
                        Value::UInt(x) => AsPrimitive::<$ty>::as_(x),
                        Value::Float(x) => AsPrimitive::<$ty>::as_(x),
                        Value::Double(x) => AsPrimitive::<$ty>::as_(x),
                    }
                }
            }
        )*
    }
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, usize, isize, f32, f64);


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names() {
        for &ty in &ScalarType::ALL {
            assert_eq!(ty.ply_type_name().parse::<ScalarType>(), Ok(ty));
        }
        assert_eq!("float32".parse::<ScalarType>(), Ok(ScalarType::Float));
        assert_eq!("uint8".parse::<ScalarType>(), Ok(ScalarType::UChar));
        assert!("long".parse::<ScalarType>().is_err());
        assert!("Float".parse::<ScalarType>().is_err());
    }

    #[test]
    fn widths() {
        assert_eq!(ScalarType::UChar.len(), 1);
        assert_eq!(ScalarType::Int.len(), 4);
        assert_eq!(ScalarType::Float.len(), 4);
        assert_eq!(ScalarType::Double.len(), 8);
        assert!(ScalarType::ALL.iter().all(|ty| ty.len() <= MAX_SCALAR_LEN));
    }

    #[test]
    fn conversions() {
        assert_eq!(Value::Float(2.75).get::<u32>(), 2);
        assert_eq!(Value::Int(-3).get::<f64>(), -3.0);
        assert_eq!(Value::UChar(200).get::<i32>(), 200);
        assert_eq!(Value::Double(1.5).convert(ScalarType::Float), Value::Float(1.5));
        assert_eq!(Value::zero(ScalarType::Double), Value::Double(0.0));
        assert_eq!(Value::Int(7).ty(), ScalarType::Int);
        assert_eq!(Value::from(3u8), Value::UChar(3));
        assert_eq!(Value::Float(1.0).as_integer(), None);
        assert_eq!(Value::UInt(9).as_integer(), Some(9));
    }
}
