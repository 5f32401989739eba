//! Parsing and writing the header of a PLY file.
//!
//! The header is line based and always ASCII:
//!
//! ```text
//! ply
//! format ascii 1.0
//! comment made by hand
//! element vertex 3
//! property float x
//! property float y
//! property float z
//! element face 1
//! property list uchar int vertex_indices
//! end_header
//! ```
//!
//! The first two lines have to be exactly the magic number and one of the
//! three format declarations. After that, `element` lines open a new element
//! group and `property` lines add properties to the group opened last. Lines
//! starting with any other keyword are ignored unless the reader is configured
//! to be strict.

use std::{
    io::{self, Read, Write},
    str,
};

use log::debug;

use crate::{
    error::Error,
    parse::{
        Tokenizer, Tokens, parse_unsigned, trim_cr,
        buf::LineReader,
    },
    schema::{ElementDef, Format, Header, PropIndex, PropertyDef, PropertyType},
    types::ScalarType,
};




/// Reads and parses all header lines including `end_header`. Afterwards,
/// `lines` is positioned at the first byte of the body.
pub(crate) fn parse_header<R: Read>(
    lines: &mut LineReader<R>,
    strict: bool,
) -> Result<Header, Error> {
    let mut tokenizer = Tokenizer::new(b' ');

    // ===== Magic number and format line ====================================
    // PLY files always start with `ply\n`. This serves as magic number.
    let magic_ok = lines.getline()?.map(|line| trim_cr(line) == b"ply").unwrap_or(false);
    if !magic_ok {
        return Err(invalid_format!("not a PLY file (does not start with \"ply\")").at_line(1));
    }

    let format = match lines.getline()? {
        Some(line) => parse_format_line(tokenizer.tokenize(line)),
        None => Err(invalid_format!("missing \"format\" line")),
    };
    let format = format.map_err(|e| e.at_line(2))?;
    let mut header = Header::new(format);


    // ===== Elements, properties and everything else ========================
    loop {
        let is_end = match lines.getline()? {
            Some(line) => parse_line(&mut header, tokenizer.tokenize(line), strict),
            None => Err(invalid_format!("unexpected end of file in header (no \"end_header\")")),
        };

        if is_end.map_err(|e| e.at_line(lines.line_number()))? {
            break;
        }
    }

    debug!(
        "parsed PLY header: format {}, elements [{}], body starts at offset {}",
        header.format,
        header.elements().iter()
            .map(|e| format!("{} x{}", e.name, e.count))
            .collect::<Vec<_>>()
            .join(", "),
        lines.offset(),
    );

    Ok(header)
}

/// Parses the second line of the file, e.g. `format ascii 1.0`.
fn parse_format_line(tokens: Tokens<'_>) -> Result<Format, Error> {
    let format = match (tokens.get(0), tokens.get(1), tokens.get(2), tokens.len()) {
        (Some(b"format"), Some(format), Some(b"1.0"), 3) => match format {
            b"ascii" => Some(Format::Ascii),
            b"binary_little_endian" => Some(Format::BinaryLittleEndian),
            b"binary_big_endian" => Some(Format::BinaryBigEndian),
            _ => None,
        },
        _ => None,
    };

    format.ok_or_else(|| invalid_format!(
        "expected \"format <ascii|binary_little_endian|binary_big_endian> 1.0\", found {:?}",
        lossy(tokens.rest_from(0)),
    ))
}

/// Interprets one header line after the format line. Returns `true` if it was
/// the `end_header` line.
fn parse_line(header: &mut Header, tokens: Tokens<'_>, strict: bool) -> Result<bool, Error> {
    let keyword = match tokens.get(0) {
        Some(k) => k,
        None if strict => return Err(invalid_format!("empty line in header")),
        None => return Ok(false),
    };

    match keyword {
        b"end_header" => return Ok(true),
        b"comment" => header.comments.push(lossy(tokens.rest_from(1))),
        b"obj_info" => header.obj_infos.push(lossy(tokens.rest_from(1))),

        // Element definition, e.g. `element vertex 8`
        b"element" => {
            let name = ident(tokens.get(1), "element name")?;
            let count = tokens.get(2)
                .ok_or_else(|| invalid_format!("missing count of element '{}'", name))?;
            let count = parse_unsigned::<u64>(count).ok_or_else(|| invalid_format!(
                "invalid count {:?} of element '{}'",
                lossy(count),
                name,
            ))?;
            if header.total_records().checked_add(count).is_none() {
                return Err(invalid_format!(
                    "element '{}' has {} records, which overflows the total record count",
                    name,
                    count,
                ));
            }

            header.add_element(ElementDef::new(name, count));
        }

        // Property definition, e.g. `property float x` or
        // `property list uchar int vertex_indices`
        b"property" => {
            let prop = if tokens.get(1) == Some(&b"list"[..]) {
                let len_type = parse_type(tokens.get(2))?;
                let scalar_type = parse_type(tokens.get(3))?;
                let name = ident(tokens.get(4), "property name")?;
                PropertyDef::list(name, len_type, scalar_type)?
            } else {
                let ty = parse_type(tokens.get(1))?;
                let name = ident(tokens.get(2), "property name")?;
                PropertyDef::scalar(name, ty)
            };

            let elem = header.last_element_mut().ok_or_else(|| invalid_format!(
                "declaration of property '{}' without preceding element declaration",
                prop.name,
            ))?;
            if elem.property_defs.len() == PropIndex::LIMIT {
                return Err(invalid_format!("element '{}' has too many properties", elem.name));
            }

            elem.property_defs.push(prop);
        }

        other if strict => {
            return Err(invalid_format!("unknown header keyword {:?}", lossy(other)));
        }
        other => debug!("ignoring PLY header line starting with {:?}", lossy(other)),
    }

    Ok(false)
}

fn parse_type(token: Option<&[u8]>) -> Result<ScalarType, Error> {
    let token = token.ok_or_else(|| invalid_format!("missing type in property declaration"))?;
    str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid_format!("{:?} is not a valid PLY scalar type", lossy(token)))
}

fn ident(token: Option<&[u8]>, what: &str) -> Result<String, Error> {
    let token = token.ok_or_else(|| invalid_format!("missing {}", what))?;
    str::from_utf8(token)
        .map(|s| s.to_string())
        .map_err(|_| invalid_format!("{} {:?} is not valid UTF-8", what, lossy(token)))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}


// ===========================================================================
// ===== Writing
// ===========================================================================

/// Checks that a name can be written into the header and read back.
pub(crate) fn check_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.contains(|c: char| c.is_ascii_whitespace()) {
        return Err(schema_error!("invalid name {:?} (must be non-empty without whitespace)", name));
    }

    Ok(())
}

impl Header {
    /// Writes the header including the `end_header` line.
    pub fn write_to(&self, w: &mut impl Write) -> Result<(), io::Error> {
        // Magic signature and the line defining the format of the file
        w.write_all(b"ply\n")?;
        writeln!(w, "format {} 1.0", self.format)?;

        for comment in &self.comments {
            writeln!(w, "comment {}", comment)?;
        }
        for obj_info in &self.obj_infos {
            writeln!(w, "obj_info {}", obj_info)?;
        }

        // Define all elements with their properties
        for element_def in self.elements() {
            writeln!(w, "element {} {}", element_def.name, element_def.count)?;
            for prop in &element_def.property_defs {
                match prop.ty {
                    PropertyType::Scalar(ty) => {
                        writeln!(w, "property {} {}", ty, prop.name)?;
                    }
                    PropertyType::List { len_type, scalar_type } => {
                        writeln!(w, "property list {} {} {}", len_type, scalar_type, prop.name)?;
                    }
                }
            }
        }

        w.write_all(b"end_header\n")
    }
}
