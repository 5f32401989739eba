use std::io::{self, Read};

use failure::Error as AnyError;

use crate::error::Error;
use super::{
    Delimiter, Tokenizer, find, find_bytewise, find_wordwise,
    parse_float, parse_signed, parse_unsigned,
    buf::LineReader,
};


// ===========================================================================
// ===== Scanner and tokenizer
// ===========================================================================

#[test]
fn wordwise_and_bytewise_scan_agree() {
    for &delim in &[Delimiter::Space, Delimiter::Newline] {
        for len in 0..40 {
            // No delimiter at all
            let haystack = vec![b'a'; len];
            assert_eq!(find_wordwise(&haystack, delim), len);

            // Delimiter at every position, sometimes followed by a second one
            for pos in 0..len {
                let mut haystack = vec![b'x'; len];
                haystack[pos] = delim.byte();
                if pos + 3 < len {
                    haystack[pos + 3] = delim.byte();
                }

                let expected = find_bytewise(&haystack, delim.byte());
                assert_eq!(expected, pos);
                assert_eq!(find_wordwise(&haystack, delim), expected, "len {} pos {}", len, pos);
            }
        }
    }
}

#[test]
fn scan_does_not_confuse_similar_bytes() {
    // Bytes that differ from the delimiter by one bit or have the high bit
    // set must not be reported.
    let haystack = b"\x21\x0b\xa0\x8a\x00\xff!!\x1f\x0a";
    assert_eq!(find_wordwise(haystack, Delimiter::Newline), 9);
    assert_eq!(find_wordwise(haystack, Delimiter::Space), haystack.len());
    assert_eq!(find(haystack, b'\xff'), 5);
    assert_eq!(find(haystack, b'?'), haystack.len());
}

#[test]
fn tokenize() {
    let mut tokenizer = Tokenizer::new(b' ');

    let tokens = tokenizer.tokenize(b"  3 0.5  -1   x ");
    assert_eq!(tokens.iter().collect::<Vec<_>>(), [&b"3"[..], b"0.5", b"-1", b"x"]);
    assert_eq!(tokens.len(), 4);
    assert_eq!(tokens.get(2), Some(&b"-1"[..]));
    assert_eq!(tokens.get(4), None);
    assert_eq!(tokens.rest_from(1), b"0.5  -1   x ");
    assert_eq!(tokens.rest_from(4), b"");

    let tokens = tokenizer.tokenize(b"end_header\r");
    assert_eq!(tokens.iter().collect::<Vec<_>>(), [b"end_header"]);

    assert!(tokenizer.tokenize(b"").is_empty());
    assert!(tokenizer.tokenize(b"    ").is_empty());
    assert!(tokenizer.tokenize(b"\r").is_empty());

    // Long lines use the word-wise scan
    let line = b"1234567890 1234567890123 x 12345678901234567890";
    let tokens = tokenizer.tokenize(line);
    assert_eq!(tokens.len(), 4);
    assert_eq!(tokens.get(3), Some(&b"12345678901234567890"[..]));
}


// ===========================================================================
// ===== Numbers
// ===========================================================================

#[test]
fn unsigned() {
    assert_eq!(parse_unsigned::<u8>(b"0"), Some(0));
    assert_eq!(parse_unsigned::<u8>(b"255"), Some(255));
    assert_eq!(parse_unsigned::<u8>(b"+17"), Some(17));
    assert_eq!(parse_unsigned::<u32>(b"0004294967295"), Some(u32::max_value()));

    assert_eq!(parse_unsigned::<u8>(b"256"), None);
    assert_eq!(parse_unsigned::<u32>(b"4294967296"), None);
    assert_eq!(parse_unsigned::<u8>(b"-1"), None);
    assert_eq!(parse_unsigned::<u8>(b"-0"), None);
    assert_eq!(parse_unsigned::<u8>(b""), None);
    assert_eq!(parse_unsigned::<u8>(b"+"), None);
    assert_eq!(parse_unsigned::<u8>(b"1.0"), None);
    assert_eq!(parse_unsigned::<u16>(b"12a"), None);
}

#[test]
fn signed() {
    assert_eq!(parse_signed::<i8>(b"-128"), Some(-128));
    assert_eq!(parse_signed::<i8>(b"127"), Some(127));
    assert_eq!(parse_signed::<i8>(b"+5"), Some(5));
    assert_eq!(parse_signed::<i32>(b"-2147483648"), Some(i32::min_value()));
    assert_eq!(parse_signed::<i16>(b"-0"), Some(0));

    assert_eq!(parse_signed::<i8>(b"128"), None);
    assert_eq!(parse_signed::<i8>(b"-129"), None);
    assert_eq!(parse_signed::<i8>(b"-"), None);
    assert_eq!(parse_signed::<i8>(b"--1"), None);
    assert_eq!(parse_signed::<i32>(b"1e3"), None);
}

#[test]
fn floats() {
    let cases: &[(&str, f64)] = &[
        ("0", 0.0),
        ("1", 1.0),
        ("-2.5", -2.5),
        ("+2.5", 2.5),
        (".5", 0.5),
        ("5.", 5.0),
        ("-.25", -0.25),
        ("1e3", 1000.0),
        ("1E+3", 1000.0),
        ("2.5e-3", 0.0025),
        ("7e", 7.0),
        ("7e-", 7.0),
        ("0e999999", 0.0),
        ("3.14159265358979", 3.14159265358979),
        ("0.1", 0.1),
        ("123456.789", 123456.789),
        ("1.00000000000000000000000001", 1.0),
        ("0.0000000000000000015", 1.5e-18),
        ("0.000000000000000000025", 2.5e-20),
        ("-0.00000000000000000000000000000000000000123", -1.23e-39),
        ("0.00012345678901234567890123", 1.2345678901234567e-4),
        ("123456789012345678901234567890", 1.2345678901234568e29),
        ("12345678901234567890.5e-10", 1234567890.1234567),
        ("1e-300", 1e-300),
        ("1e300", 1e300),
    ];

    for &(token, expected) in cases {
        let actual = parse_float::<f64>(token.as_bytes())
            .unwrap_or_else(|| panic!("failed to parse {:?}", token));
        let tolerance = expected.abs() * 1e-14;
        assert!(
            (actual - expected).abs() <= tolerance,
            "{:?}: expected {}, got {}",
            token,
            expected,
            actual,
        );
    }

    // Written by `Display` for `1e-301`: no exponent, 300 zeros.
    let tiny = format!("0.{}1", "0".repeat(300));
    let actual = parse_float::<f64>(tiny.as_bytes()).unwrap_or(0.0);
    assert!((actual - 1e-301).abs() <= 1e-301 * 1e-14, "got {}", actual);
    assert_eq!(format!("{}", 1e-301f64), tiny);

    let huge = format!("1{}", "0".repeat(300));
    let actual = parse_float::<f64>(huge.as_bytes()).unwrap_or(0.0);
    assert!((actual - 1e300).abs() <= 1e300 * 1e-14, "got {}", actual);

    assert_eq!(parse_float::<f32>(b"0.75"), Some(0.75));
    assert_eq!(parse_float::<f64>(b"1e400"), Some(std::f64::INFINITY));
    assert_eq!(parse_float::<f64>(b"1e-400"), Some(0.0));
}

#[test]
fn invalid_floats() {
    let invalid = [
        "", "-", "+", ".", "-.", "e5", ".e5", "1.2.3", "1e5e5",
        "nan", "inf", "0x10", "1,5", "1 ", "--1", "1e+-3",
    ];

    for token in &invalid {
        assert_eq!(parse_float::<f64>(token.as_bytes()), None, "{:?}", token);
    }
}


// ===========================================================================
// ===== Line reader
// ===========================================================================

/// A reader that returns at most `chunk` bytes per call (and sometimes
/// `Interrupted`), to exercise all refill paths.
struct Trickle<'a> {
    data: &'a [u8],
    chunk: usize,
    interrupt: bool,
}

impl Read for Trickle<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.interrupt = !self.interrupt;
        if self.interrupt {
            return Err(io::ErrorKind::Interrupted.into());
        }

        let n = self.chunk.min(out.len()).min(self.data.len());
        out[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

fn all_lines<R: Read>(mut lines: LineReader<R>) -> Result<Vec<Vec<u8>>, Error> {
    let mut out = Vec::new();
    while let Some(line) = lines.getline()? {
        out.push(line.to_vec());
    }
    assert!(lines.eof());
    Ok(out)
}

#[test]
fn lines_with_refills() -> Result<(), AnyError> {
    let data = b"ply\nformat ascii 1.0\n\nend_header\n1 2 3 4 5 6\nlast";
    let expected = data.split(|&b| b == b'\n').map(|l| l.to_vec()).collect::<Vec<_>>();

    for capacity in 17..24 {
        for chunk in 1..5 {
            let reader = Trickle { data, chunk, interrupt: false };
            let lines = LineReader::new(reader, capacity)?;
            assert_eq!(lines.capacity(), capacity);
            assert_eq!(all_lines(lines)?, expected);
        }
    }

    Ok(())
}

#[test]
fn trailing_newline_does_not_add_a_line() -> Result<(), AnyError> {
    let lines = LineReader::new(&b"a\nb\n"[..], 16)?;
    assert_eq!(all_lines(lines)?, vec![b"a".to_vec(), b"b".to_vec()]);

    let lines = LineReader::new(&b""[..], 16)?;
    assert!(all_lines(lines)?.is_empty());

    Ok(())
}

#[test]
fn line_numbers_and_offsets() -> Result<(), AnyError> {
    let data = b"first\nsecond line\nthird\n";
    let mut lines = LineReader::new(&data[..], 16)?;
    assert_eq!(lines.offset(), 0);

    assert_eq!(lines.getline()?, Some(&b"first"[..]));
    assert_eq!((lines.line_number(), lines.offset()), (1, 6));
    assert_eq!(lines.getline()?, Some(&b"second line"[..]));
    assert_eq!((lines.line_number(), lines.offset()), (2, 18));
    assert_eq!(lines.getline()?, Some(&b"third"[..]));
    assert_eq!((lines.line_number(), lines.offset()), (3, 24));
    assert_eq!(lines.getline()?, None);

    Ok(())
}

#[test]
fn line_too_long() -> Result<(), AnyError> {
    let data = b"short\nthis line is longer than sixteen bytes\nshort\n";
    let mut lines = LineReader::new(&data[..], 16)?;
    assert_eq!(lines.getline()?, Some(&b"short"[..]));
    match lines.getline() {
        Err(Error::BufferCapacity { capacity: 16 }) => {}
        other => panic!("expected buffer capacity error, got {:?}", other),
    }

    // A line of exactly capacity - 1 bytes plus newline fits
    let data = b"0123456789abcde\nx";
    let lines = LineReader::new(&data[..], 16)?;
    assert_eq!(all_lines(lines)?, vec![b"0123456789abcde".to_vec(), b"x".to_vec()]);

    Ok(())
}

#[test]
fn raw_reads_after_lines() -> Result<(), AnyError> {
    let mut data = b"end_header\n".to_vec();
    data.extend(0..100u8);

    let reader = Trickle { data: &data, chunk: 7, interrupt: false };
    let mut lines = LineReader::new(reader, 16)?;
    assert_eq!(lines.getline()?, Some(&b"end_header"[..]));
    assert_eq!(lines.offset(), 11);

    let mut buf = [0; 10];
    lines.read_exact(&mut buf)?;
    assert_eq!(buf, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);

    lines.skip_bytes(80)?;
    assert_eq!(lines.offset(), 101);
    assert!(lines.has_remaining()?);

    let mut rest = Vec::new();
    lines.read_to_end(&mut rest)?;
    assert_eq!(rest, (90..100u8).collect::<Vec<_>>());
    assert!(!lines.has_remaining()?);

    match lines.skip_bytes(1) {
        Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
        other => panic!("expected unexpected EOF, got {:?}", other),
    }

    Ok(())
}
