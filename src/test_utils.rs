use std::fmt::Write;

use crate::{
    error::Error,
    read::ElementInserter,
    schema::PropIndex,
    types::Value,
};


pub(crate) fn file_failure(actual: &[u8], expected: &[u8], filename: &str) {
    let mut msg = String::new();

    writeln!(msg, "===== Expected data ('{}')", filename).unwrap();
    write_data(&mut msg, expected);
    writeln!(msg).unwrap();

    writeln!(msg, "===== Actual data").unwrap();
    write_data(&mut msg, actual);

    panic!("assertion failed: \n{}", msg);

    fn write_data(msg: &mut String, data: &[u8]) {
        match std::str::from_utf8(data) {
            Ok(s) if !data.contains(&0) => writeln!(msg, "{}", s).unwrap(),
            _ => {
                for chunk in data.chunks(32) {
                    for b in chunk {
                        write!(msg, "{:02x} ", b).unwrap();
                    }
                    writeln!(msg).unwrap();
                }
            }
        }
    }
}

/// Compares the given bytes with the content of a file in `src/test_files`.
macro_rules! assert_eq_file {
    ($actual:expr, $filename:expr) => {
        let actual = $actual as &[u8];
        let expected = include_test_bytes!($filename);
        if actual != expected {
            crate::test_utils::file_failure(actual, expected, $filename);
        }
    }
}

macro_rules! include_test_bytes {
    ($filename:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/src/test_files/", $filename)) as &[u8]
    }
}

/// Returns a file in `src/test_files` as `io::Read`.
macro_rules! include_test_file {
    ($filename:expr) => {
        std::io::Cursor::new(include_test_bytes!($filename))
    }
}


/// One call to an `ElementInserter` method.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    ListLen(PropIndex, usize),
    Set(PropIndex, usize, Value),
    Insert(u64),
}

/// An inserter that records every call.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub(crate) events: Vec<Event>,

    /// Properties that are declined. Empty means "accept all".
    pub(crate) declined: Vec<PropIndex>,
}

impl Recorder {
    /// All values passed to `set` in order.
    pub(crate) fn values(&self) -> Vec<Value> {
        self.events.iter()
            .filter_map(|e| match e {
                Event::Set(_, _, v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn num_inserts(&self) -> usize {
        self.events.iter().filter(|e| matches!(e, Event::Insert(_))).count()
    }
}

impl ElementInserter for Recorder {
    fn accepts(&self, prop: PropIndex) -> bool {
        !self.declined.contains(&prop)
    }
    fn list_len(&mut self, prop: PropIndex, len: usize) -> Result<(), Error> {
        self.events.push(Event::ListLen(prop, len));
        Ok(())
    }
    fn set(&mut self, prop: PropIndex, item: usize, value: Value) -> Result<(), Error> {
        self.events.push(Event::Set(prop, item, value));
        Ok(())
    }
    fn insert(&mut self, index: u64) -> Result<(), Error> {
        self.events.push(Event::Insert(index));
        Ok(())
    }
}
