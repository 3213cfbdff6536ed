use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::Result;

use super::record::TermRecord;

/// Saves the normalized record table so later runs can skip re-parsing.
pub fn save_records(records: &[TermRecord], path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, records)?;
    Ok(())
}

/// Loads a record table written by [`save_records`].
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<TermRecord>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let records: Vec<TermRecord> = bincode::deserialize_from(reader)?;
    Ok(records)
}
