use std::{
    cmp::min,
    io::{self, Read},
};

use log::trace;

use crate::error::Error;
use super::{Delimiter, find_wordwise};


/// The default size of the working buffer in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// The smallest working buffer we allow. Smaller buffers work, but are
/// pointless.
pub const MIN_BUFFER_SIZE: usize = 16;


/// Reads lines from an `io::Read` through a fixed size working buffer.
///
/// Lines are returned as slices into the working buffer, so no line is ever
/// copied. When the buffer runs out of data, the unconsumed tail is moved to
/// the front of the buffer and the rest is filled from the reader. A line
/// that does not fit into the buffer is an error (the buffer never grows).
///
/// The reader also implements `io::Read` which serves bytes from the working
/// buffer first. This is used to read the binary body of a file right after
/// its header.
pub(crate) struct LineReader<R: Read> {
    reader: R,
    buf: Box<[u8]>,

    /// Valid, unconsumed data is `buf[begin..end]`.
    begin: usize,
    end: usize,

    /// Set when `getline` returned the last line.
    eof: bool,

    /// Number of bytes read from `reader` so far. This is the absolute file
    /// offset of `buf[end]`.
    file_end_pos: u64,

    /// Number of lines returned by `getline` so far.
    lines: u64,
}

impl<R: Read> LineReader<R> {
    /// Creates a line reader with a working buffer of `capacity` bytes and
    /// reads the first chunk of data.
    pub(crate) fn new(reader: R, capacity: usize) -> Result<Self, Error> {
        let mut out = Self {
            reader,
            buf: vec![0; capacity.max(MIN_BUFFER_SIZE)].into_boxed_slice(),
            begin: 0,
            end: 0,
            eof: false,
            file_end_pos: 0,
            lines: 0,
        };
        out.refill()?;

        Ok(out)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if the last line has been returned by `getline`.
    pub(crate) fn eof(&self) -> bool {
        self.eof
    }

    /// The number of lines returned by `getline` so far. Right after calling
    /// `getline`, this is the 1-based line number of the returned line.
    pub(crate) fn line_number(&self) -> u64 {
        self.lines
    }

    /// Returns the absolute offset (in the underlying reader) of the byte at
    /// `buf_idx` in the working buffer.
    fn position(&self, buf_idx: usize) -> u64 {
        debug_assert!(buf_idx <= self.end);
        self.file_end_pos - (self.end - buf_idx) as u64
    }

    /// Returns the absolute offset of the next byte that has not been consumed
    /// yet, e.g. the start of the line `getline` would return next.
    pub(crate) fn offset(&self) -> u64 {
        self.position(self.begin)
    }

    /// Returns the next line without the terminating `'\n'`. The returned
    /// slice is valid until the reader is used again.
    ///
    /// The last line of the input does not need a terminating newline. After
    /// it has been returned, `Ok(None)` is returned.
    pub(crate) fn getline(&mut self) -> Result<Option<&[u8]>, Error> {
        if self.eof() {
            return Ok(None);
        }

        // Bytes before `scan_from` are known to not contain a newline.
        let mut scan_from = self.begin;
        loop {
            let pos = scan_from + find_wordwise(&self.buf[scan_from..self.end], Delimiter::Newline);
            if pos < self.end {
                let line_start = self.begin;
                self.begin = pos + 1;
                self.lines += 1;
                return Ok(Some(&self.buf[line_start..pos]));
            }

            // The rest of the window does not contain a newline. If the window
            // spans the whole buffer, the line cannot fit.
            if self.begin == 0 && self.end == self.capacity() {
                return Err(Error::BufferCapacity { capacity: self.capacity() });
            }

            let scanned = self.end - self.begin;
            if self.refill()? == 0 {
                // The reader is exhausted: whatever is left is the last line.
                self.eof = true;
                if self.begin == self.end {
                    return Ok(None);
                }

                let line_start = self.begin;
                self.begin = self.end;
                self.lines += 1;
                return Ok(Some(&self.buf[line_start..self.end]));
            }
            scan_from = self.begin + scanned;
        }
    }

    /// Consumes exactly `num_bytes` bytes. Returns an `UnexpectedEof` error
    /// if the input ends before that.
    pub(crate) fn skip_bytes(&mut self, mut num_bytes: u64) -> Result<(), Error> {
        loop {
            let available = min((self.end - self.begin) as u64, num_bytes);
            self.begin += available as usize;
            num_bytes -= available;

            if num_bytes == 0 {
                return Ok(());
            }

            if self.refill()? == 0 {
                return Err(unexpected_eof().into());
            }
        }
    }

    /// Returns `true` if there is more data after everything consumed so far.
    pub(crate) fn has_remaining(&mut self) -> Result<bool, Error> {
        if self.begin == self.end {
            self.refill()?;
        }

        Ok(self.begin < self.end)
    }

    /// Moves the unconsumed data to the front of the buffer and fills the rest
    /// of the buffer from the reader. Returns the number of bytes read, which
    /// is 0 only if the reader is exhausted or the buffer is full.
    fn refill(&mut self) -> Result<usize, io::Error> {
        let carried_over = self.end - self.begin;
        self.buf.copy_within(self.begin..self.end, 0);
        self.begin = 0;
        self.end = carried_over;

        // Read until the buffer is full or the reader is exhausted. We ignore
        // `Interrupted` errors and just continue.
        let mut bytes_read = 0;
        while self.end < self.buf.len() {
            match self.reader.read(&mut self.buf[self.end..]) {
                Ok(0) => break,
                Ok(n) => {
                    self.end += n;
                    bytes_read += n;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        self.file_end_pos += bytes_read as u64;
        trace!(
            "refilled working buffer: {} bytes carried over, {} bytes read (file offset {})",
            carried_over,
            bytes_read,
            self.file_end_pos,
        );

        Ok(bytes_read)
    }
}

impl<R: Read> Read for LineReader<R> {
    fn read(&mut self, out: &mut [u8]) -> Result<usize, io::Error> {
        if self.begin == self.end && self.refill()? == 0 {
            return Ok(0);
        }

        let n = min(self.end - self.begin, out.len());
        out[..n].copy_from_slice(&self.buf[self.begin..self.begin + n]);
        self.begin += n;

        Ok(n)
    }
}

fn unexpected_eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of PLY data")
}
