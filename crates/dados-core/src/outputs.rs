use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{PipelineError, Result};

/// Writes `target` through a temporary file in the same directory that replaces it only
/// after a successful flush. On failure the temporary file is dropped and `target` is
/// untouched.
pub fn write_atomically<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let (file, staging) = NamedTempFile::new_in(dir)
        .map_err(|err| PipelineError::io(dir, err))?
        .into_parts();
    let mut writer = BufWriter::new(file);

    write(&mut writer)?;
    writer
        .flush()
        .map_err(|err| PipelineError::io(&*staging, err))?;
    drop(writer);

    staging
        .persist(target)
        .map_err(|err| PipelineError::io(target, err.error))
}

/// Appends to `target`, creating it when missing.
pub fn append_to<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(target)
        .map_err(|err| PipelineError::io(target, err))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush().map_err(|err| PipelineError::io(target, err))
}
