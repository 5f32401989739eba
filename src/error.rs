use std::{fmt, io};

use failure::Fail;


/// Everything that can go wrong while reading or writing a PLY file.
///
/// None of these errors is recoverable: the read or write pass that returned
/// it is aborted and values delivered to sinks before the error must not be
/// treated as a usable partial result.
#[derive(Debug, Fail)]
pub enum Error {
    /// The underlying reader or writer failed. A file that is shorter than
    /// its header promises shows up as `io::ErrorKind::UnexpectedEof`.
    #[fail(display = "IO error: {}", _0)]
    Io(#[cause] io::Error),

    /// The file does not follow the PLY format (bad magic number, bad
    /// `format` line, malformed declarations or malformed body data).
    #[fail(display = "invalid PLY data{}: {}", _0, _1)]
    Format(LineNumber, String),

    /// The caller used the schema incorrectly, e.g. bound a sink to an
    /// element that does not exist.
    #[fail(display = "PLY schema error: {}", _0)]
    Schema(String),

    /// A single line does not fit into the working buffer of the reader.
    #[fail(
        display = "a single line is longer than the working buffer ({} bytes); \
            increase the buffer size of the reader",
        capacity
    )]
    BufferCapacity {
        capacity: usize,
    },
}

impl From<io::Error> for Error {
    fn from(src: io::Error) -> Self {
        Error::Io(src)
    }
}

impl Error {
    /// Returns `true` if this is a [`Error::Format`].
    pub fn is_format(&self) -> bool {
        match self {
            Error::Format(..) => true,
            _ => false,
        }
    }

    /// Attaches a line number to a format error that does not have one yet.
    /// All other errors are returned unchanged.
    pub(crate) fn at_line(self, line: u64) -> Self {
        match self {
            Error::Format(LineNumber(None), msg) => Error::Format(LineNumber(Some(line)), msg),
            other => other,
        }
    }
}

/// The (1-based) line number a format error occured in, if known. Only used
/// for formatting error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber(pub Option<u64>);

impl fmt::Display for LineNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Some(line) => write!(f, " (line {})", line),
            None => Ok(()),
        }
    }
}

/// Creates an `Error::Format` without line information from a format string.
macro_rules! invalid_format {
    ($($t:tt)*) => {
        $crate::error::Error::Format($crate::error::LineNumber(None), format!($($t)*))
    };
}

/// Creates an `Error::Schema` from a format string.
macro_rules! schema_error {
    ($($t:tt)*) => {
        $crate::error::Error::Schema(format!($($t)*))
    };
}
