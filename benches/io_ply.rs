//! Measures PLY read (parse) and write speeds.

use std::io;
use criterion::{
    criterion_group, criterion_main, black_box, Criterion,
};

use lox_ply::{
    Error, Format, PropIndex, ScalarType, Value,
    read::{ElementInserter, Reader},
    schema::{ElementDef, PropertyDef},
    write::Writer,
};


// ===============================================================================================
// ===== Helper utilities
// ===============================================================================================

const GRID: u32 = 200;

/// An inserter that just puts all values into the `black_box`.
struct NullInserter;

impl ElementInserter for NullInserter {
    fn set(&mut self, prop: PropIndex, item: usize, value: Value) -> Result<(), Error> {
        black_box((prop, item, value));
        Ok(())
    }
    fn insert(&mut self, index: u64) -> Result<(), Error> {
        black_box(index);
        Ok(())
    }
}

/// Writes a `GRID` x `GRID` quad grid with positions, normals and face
/// indices into `writer`.
fn write_grid<W: io::Write>(mut writer: Writer<'_, W>) -> Result<(), Error> {
    let num_vertices = GRID * GRID;
    let num_faces = (GRID - 1) * (GRID - 1);

    let mut vertex = ElementDef::new("vertex", num_vertices as u64);
    for &name in &["x", "y", "z", "nx", "ny", "nz"] {
        vertex = vertex.with_property(PropertyDef::scalar(name, ScalarType::Float));
    }
    writer.add_element(vertex)?;
    writer.add_element(
        ElementDef::new("face", num_faces as u64)
            .with_property(PropertyDef::list("vertex_indices", ScalarType::UChar, ScalarType::UInt)?)
    )?;

    writer.bind_fn("vertex", |i, buf| {
        let (x, y) = ((i as u32 % GRID) as f32, (i as u32 / GRID) as f32);
        let z = (x * 0.1).sin() * (y * 0.1).cos();
        for (prop, &v) in [x, y, z, 0.0, 0.0, 1.0].iter().enumerate() {
            buf.set(PropIndex(prop as u16), v)?;
        }
        Ok(())
    })?;
    writer.bind_fn("face", |i, buf| {
        let (x, y) = (i as u32 % (GRID - 1), i as u32 / (GRID - 1));
        let a = y * GRID + x;
        buf.set_list(PropIndex(0), vec![a, a + 1, a + GRID + 1, a + GRID])
    })?;

    writer.write()
}

fn grid_file(format: Format) -> Vec<u8> {
    let mut out = Vec::new();
    write_grid(Writer::new(&mut out, format)).unwrap();
    out
}

fn format_for(encoding: &str) -> Format {
    // We do this string -> format stuff here so that the resulting
    // benchmark names are more useful (`/"ascii"` than `/2`).
    match encoding {
        "ble" => Format::BinaryLittleEndian,
        "bbe" => Format::BinaryBigEndian,
        "ascii" => Format::Ascii,
        _ => unreachable!(),
    }
}


// ===============================================================================================
// ===== Benchmarks
// ===============================================================================================

/// Measures reading the grid with all values delivered to an inserter.
fn read_grid(c: &mut Criterion) {
    c.bench_function_over_inputs(
        "ply_grid_read",
        |b, encoding| {
            let data = grid_file(format_for(encoding));

            b.iter(|| {
                let mut reader = Reader::new(&*data).unwrap();
                reader.bind("vertex", NullInserter).unwrap();
                reader.bind("face", NullInserter).unwrap();
                reader.read().unwrap();
            })
        },
        vec!["ble", "bbe", "ascii"],
    );
}

/// Measures skipping over the body without any bound inserter.
fn skip_grid(c: &mut Criterion) {
    c.bench_function_over_inputs(
        "ply_grid_skip",
        |b, encoding| {
            let data = grid_file(format_for(encoding));
            b.iter(|| Reader::new(&*data).unwrap().read().unwrap())
        },
        vec!["ble", "bbe", "ascii"],
    );
}

/// Measures writing the grid into a sink that discards everything.
fn write_grid_bench(c: &mut Criterion) {
    c.bench_function_over_inputs(
        "ply_grid_write",
        |b, encoding| {
            let format = format_for(encoding);
            b.iter(|| write_grid(Writer::new(io::sink(), format)).unwrap())
        },
        vec!["ble", "bbe", "ascii"],
    );
}


criterion_group!(benches, read_grid, skip_grid, write_grid_bench);
criterion_main!(benches);
