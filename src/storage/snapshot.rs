//! Line-oriented snapshot reading shared by every text loader

use crate::{EngineError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Open a snapshot for reading, mapping a missing file to `FileNotFound`
pub(crate) fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EngineError::FileNotFound(path.to_path_buf()),
        _ => EngineError::Io(e),
    })
}

/// Visit every non-blank line with its 1-based line number
pub(crate) fn for_each_record<F>(path: &Path, mut visit: F) -> Result<usize>
where
    F: FnMut(usize, &str) -> Result<()>,
{
    let reader = BufReader::new(open(path)?);
    let mut records = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        visit(idx + 1, line)?;
        records += 1;
    }

    Ok(records)
}

/// Parse a comma-separated list, ignoring empty items
pub(crate) fn parse_list<T: std::str::FromStr>(
    path: &Path,
    line: usize,
    field: &str,
    raw: &str,
) -> Result<Vec<T>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<T>().map_err(|_| {
                EngineError::malformed(path, line, format!("invalid {} value '{}'", field, s))
            })
        })
        .collect()
}

pub(crate) fn parse_field<T: std::str::FromStr>(
    path: &Path,
    line: usize,
    field: &str,
    raw: &str,
) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| EngineError::malformed(path, line, format!("invalid {} '{}'", field, raw)))
}

/// Write a bincode snapshot
pub(crate) fn write_binary<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Read a bincode snapshot
pub(crate) fn read_binary<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(open(path)?);
    bincode::deserialize_from(reader).map_err(|e| {
        EngineError::Corruption(format!("{}: {}", path.display(), e))
    })
}
