//! Low level building blocks for parsing the text parts of PLY files: finding
//! delimiters, splitting lines into tokens and converting tokens to numbers.
//!
//! Nothing in here allocates per line or per token. Tokens are byte slices
//! into the line they were found in; the borrow checker makes sure they are
//! not used after the line buffer is refilled.

use num_traits::{Float, PrimInt, Signed, Unsigned};


pub(crate) mod buf;

#[cfg(test)]
mod tests;


// ===========================================================================
// ===== Delimiter scanning
// ===========================================================================

const WORD_WIDTH: usize = 8;
const LO_BITS: u64 = 0x0101_0101_0101_0101;
const HI_BITS: u64 = 0x8080_8080_8080_8080;

/// The delimiters that can be searched for a word at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Space,
    Newline,
}

impl Delimiter {
    /// Returns the delimiter for the given byte, or `None` if the word-wise
    /// scan does not support that byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b' ' => Some(Delimiter::Space),
            b'\n' => Some(Delimiter::Newline),
            _ => None,
        }
    }

    pub fn byte(self) -> u8 {
        match self {
            Delimiter::Space => b' ',
            Delimiter::Newline => b'\n',
        }
    }

    /// The delimiter repeated in every byte of a word.
    fn pattern(self) -> u64 {
        LO_BITS * self.byte() as u64
    }
}

/// Returns the index of the first `delimiter` in `haystack` or
/// `haystack.len()` if there is none. Inspects one byte at a time.
pub fn find_bytewise(haystack: &[u8], delimiter: u8) -> usize {
    haystack.iter()
        .position(|&b| b == delimiter)
        .unwrap_or(haystack.len())
}

/// Same as [`find_bytewise`], but inspects eight bytes at a time.
///
/// Each word is XORed with the repeated delimiter so that matching bytes
/// become zero. `(x - 0x01..) & !x & 0x80..` is non-zero if and only if `x`
/// contains a zero byte. Once a word with a match is found, the exact
/// position is determined bytewise. The tail that does not fill a whole word
/// is scanned bytewise, too.
pub fn find_wordwise(haystack: &[u8], delimiter: Delimiter) -> usize {
    let pattern = delimiter.pattern();

    let mut start = 0;
    while haystack.len() - start > WORD_WIDTH {
        let mut word = [0; WORD_WIDTH];
        word.copy_from_slice(&haystack[start..start + WORD_WIDTH]);

        let data = u64::from_ne_bytes(word) ^ pattern;
        if data.wrapping_sub(LO_BITS) & !data & HI_BITS != 0 {
            break;
        }

        start += WORD_WIDTH;
    }

    start + find_bytewise(&haystack[start..], delimiter.byte())
}

/// Returns the index of the first `delimiter` in `haystack` or
/// `haystack.len()` if there is none. Uses the word-wise scan for spaces and
/// newlines.
pub fn find(haystack: &[u8], delimiter: u8) -> usize {
    match Delimiter::from_byte(delimiter) {
        Some(d) => find_wordwise(haystack, d),
        None => find_bytewise(haystack, delimiter),
    }
}


// ===========================================================================
// ===== Tokenizer
// ===========================================================================

/// Splits lines into tokens separated by a single delimiter byte.
///
/// Runs of delimiters count as one separator; empty tokens are never
/// produced. A `'\r'` at the very end of the line is ignored so that files
/// with Windows line endings can be read. The token positions are stored in
/// an internal vector which is reused for every line.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    delimiter: u8,
    spans: Vec<(usize, usize)>,
}

impl Tokenizer {
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            spans: Vec::new(),
        }
    }

    /// Splits `line` into tokens. The result borrows both the line and the
    /// tokenizer.
    pub fn tokenize<'a>(&'a mut self, line: &'a [u8]) -> Tokens<'a> {
        let line = trim_cr(line);

        self.spans.clear();
        let mut begin = 0;
        loop {
            // Skip all delimiters
            while begin < line.len() && line[begin] == self.delimiter {
                begin += 1;
            }
            if begin == line.len() {
                break;
            }

            let end = begin + find(&line[begin..], self.delimiter);
            self.spans.push((begin, end));
            begin = end;
        }

        Tokens {
            line,
            spans: &self.spans,
        }
    }
}

/// The tokens of one line, see [`Tokenizer::tokenize`].
#[derive(Debug, Clone, Copy)]
pub struct Tokens<'a> {
    line: &'a [u8],
    spans: &'a [(usize, usize)],
}

impl<'a> Tokens<'a> {
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&'a [u8]> {
        self.spans.get(idx).map(|&(begin, end)| &self.line[begin..end])
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let line = self.line;
        self.spans.iter().map(move |&(begin, end)| &line[begin..end])
    }

    /// The part of the line starting at the token with index `idx` (including
    /// all following delimiters and tokens). Used for free text like comments.
    pub fn rest_from(&self, idx: usize) -> &'a [u8] {
        match self.spans.get(idx) {
            Some(&(begin, _)) => &self.line[begin..],
            None => &[],
        }
    }
}

/// Removes a single trailing `'\r'`.
pub(crate) fn trim_cr(line: &[u8]) -> &[u8] {
    match line.split_last() {
        Some((b'\r', rest)) => rest,
        _ => line,
    }
}


// ===========================================================================
// ===== Number parsing
// ===========================================================================
//
// These functions are a lot faster than `str::parse` as they don't need to
// validate UTF-8 and don't care about locales or special values. They
// understand the subset of number literals written by PLY exporters: an
// optional sign, decimal digits and (for floats) an optional fraction and
// exponent. `None` is returned for everything else and on integer overflow.

/// Parses an unsigned integer: `+? [0-9]+`.
pub fn parse_unsigned<T: PrimInt + Unsigned>(token: &[u8]) -> Option<T> {
    let digits = match token.split_first() {
        Some((b'+', rest)) => rest,
        _ => token,
    };
    if digits.is_empty() {
        return None;
    }

    let ten = T::from(10)?;
    let mut out = T::zero();
    for &b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        out = out.checked_mul(&ten)?.checked_add(&T::from(b - b'0')?)?;
    }

    Some(out)
}

/// Parses a signed integer: `[+-]? [0-9]+`.
pub fn parse_signed<T: PrimInt + Signed>(token: &[u8]) -> Option<T> {
    let (negative, digits) = match token.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some((b'+', rest)) => (false, rest),
        _ => (false, token),
    };
    if digits.is_empty() {
        return None;
    }

    // Negative numbers are accumulated negatively so that `T::min_value()`
    // can be parsed.
    let ten = T::from(10)?;
    let mut out = T::zero();
    for &b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        let digit = T::from(b - b'0')?;
        out = out.checked_mul(&ten)?;
        out = if negative { out.checked_sub(&digit)? } else { out.checked_add(&digit)? };
    }

    Some(out)
}

/// Significant digits after this many are ignored. 19 decimal digits always
/// fit into a `u64` and the dropped digits change the value by less than one
/// part in 10^18.
const MAX_SIGNIFICANT_DIGITS: u32 = 19;

/// Exponents are clamped to this. Any exponent this large gives zero or
/// infinity anyway.
const MAX_EXPONENT: i64 = 1000;

/// The largest power of ten applied in one step when scaling the mantissa.
/// All powers of ten up to `1e22` are exact in `f64`.
const SCALE_STEP: i64 = 22;

/// Parses a floating point number:
/// `[+-]? [0-9]* ('.' [0-9]*)? ([eE] [+-]? [0-9]*)?` with at least one digit
/// before the exponent.
///
/// All significant digits (integer part and fraction) are accumulated into
/// one integer mantissa while the position of the decimal point is folded
/// into a decimal exponent. The mantissa is then scaled by that exponent in
/// steps of at most `10^22`, so tiny and huge values do not underflow or
/// overflow early. The result can be off by a few ulp compared to a
/// correctly rounded parser.
pub fn parse_float<T: Float>(token: &[u8]) -> Option<T> {
    let mut p = 0;
    let negative = match token.first() {
        Some(b'-') => { p += 1; true }
        Some(b'+') => { p += 1; false }
        _ => false,
    };

    let mut mantissa: u64 = 0;
    let mut significant = 0;
    let mut exp10: i64 = 0;
    let mut num_digits = 0;
    let mut in_fraction = false;
    while p < token.len() {
        let b = token[p];
        if b == b'.' && !in_fraction {
            in_fraction = true;
            p += 1;
            continue;
        }
        if !b.is_ascii_digit() {
            break;
        }

        if mantissa == 0 && b == b'0' {
            // Leading zeros only move the decimal point.
            if in_fraction {
                exp10 -= 1;
            }
        } else if significant < MAX_SIGNIFICANT_DIGITS {
            mantissa = mantissa * 10 + (b - b'0') as u64;
            significant += 1;
            if in_fraction {
                exp10 -= 1;
            }
        } else if !in_fraction {
            exp10 += 1;
        }

        p += 1;
        num_digits += 1;
    }

    if num_digits == 0 {
        return None;
    }

    if p < token.len() && (token[p] == b'e' || token[p] == b'E') {
        p += 1;

        let sign = match token.get(p) {
            Some(b'-') => { p += 1; -1 }
            Some(b'+') => { p += 1; 1 }
            _ => 1,
        };

        // An exponent without digits is treated as zero.
        let mut exponent: i64 = 0;
        while p < token.len() && token[p].is_ascii_digit() {
            exponent = (exponent * 10 + (token[p] - b'0') as i64).min(MAX_EXPONENT);
            p += 1;
        }
        exp10 += sign * exponent;
    }

    if p != token.len() {
        return None;
    }

    // The mantissa has at most 19 digits, so anything beyond this range is
    // zero or infinity.
    let mut exp10 = exp10.max(-2 * MAX_EXPONENT).min(2 * MAX_EXPONENT);
    let ten = T::from(10.0)?;
    let mut real = T::from(mantissa)?;
    if mantissa != 0 {
        while exp10 > 0 {
            let step = exp10.min(SCALE_STEP);
            real = real * ten.powi(step as i32);
            exp10 -= step;
        }
        while exp10 < 0 {
            let step = (-exp10).min(SCALE_STEP);
            real = real / ten.powi(step as i32);
            exp10 += step;
        }
    }

    Some(if negative { -real } else { real })
}
