use crate::core::models::structure::Structure;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Common interface for structure file formats.
///
/// Implementors only provide the reader/writer pair; path-based helpers are derived.
pub trait StructureFile {
    type Error: Error + From<io::Error>;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error>;

    fn write_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Structure, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn write_to_path<P: AsRef<Path>>(structure: &Structure, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(structure, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
