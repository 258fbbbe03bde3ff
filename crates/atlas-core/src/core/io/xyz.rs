use crate::core::io::traits::StructureFile;
use crate::core::models::structure::{Structure, StructureAtom};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructureError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Header declares {declared} atoms but {found} atom lines were found")]
    CountMismatch { declared: usize, found: usize },
    #[error("File is empty")]
    Empty,
}

fn parse_error(line: usize, message: impl Into<String>) -> StructureError {
    StructureError::Parse {
        line,
        message: message.into(),
    }
}

/// Plain XYZ: atom count, comment line, then `symbol x y z` per atom.
pub struct XyzFile;

impl StructureFile for XyzFile {
    type Error = StructureError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut lines = reader.lines();

        let header = lines.next().ok_or(StructureError::Empty)??;
        let declared: usize = header
            .trim()
            .parse()
            .map_err(|_| parse_error(1, format!("invalid atom count '{}'", header.trim())))?;

        let comment = lines.next().transpose()?.unwrap_or_default();

        let mut atoms = Vec::with_capacity(declared);
        for (idx, line) in lines.enumerate() {
            let line = line?;
            let line_num = idx + 3;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(parse_error(
                    line_num,
                    "expected 'symbol x y z' with four fields",
                ));
            }

            let mut coords = [0.0; 3];
            for (slot, raw) in coords.iter_mut().zip(&fields[1..4]) {
                *slot = raw
                    .parse()
                    .map_err(|_| parse_error(line_num, format!("invalid coordinate '{raw}'")))?;
            }

            atoms.push(StructureAtom::new(
                fields[0],
                Point3::new(coords[0], coords[1], coords[2]),
            ));
        }

        if atoms.len() != declared {
            return Err(StructureError::CountMismatch {
                declared,
                found: atoms.len(),
            });
        }

        Ok(Structure {
            comment: comment.trim_end().to_string(),
            atoms,
        })
    }

    fn write_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "{}", structure.atoms.len())?;
        writeln!(writer, "{}", structure.comment)?;
        for atom in &structure.atoms {
            writeln!(
                writer,
                "{:<2} {:>14.8} {:>14.8} {:>14.8}",
                atom.element, atom.position.x, atom.position.y, atom.position.z
            )?;
        }
        Ok(())
    }
}
