use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{PipelineError, Result};

/// Extracts every entry of `archive` under `destination` and returns the paths of
/// the extracted files in archive order. Directory entries are created but not listed.
pub fn extract_archive(archive: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
    let extraction_error = |source: ZipError| PipelineError::Extraction {
        archive: archive.to_path_buf(),
        source,
    };

    let file = File::open(archive).map_err(|err| extraction_error(ZipError::Io(err)))?;
    let mut zip = ZipArchive::new(file).map_err(extraction_error)?;

    let mut extracted = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let entry = zip.by_index(index).map_err(extraction_error)?;
        if entry.is_dir() {
            continue;
        }
        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or(ZipError::InvalidArchive("entry path escapes the destination"))
            .map_err(extraction_error)?;
        extracted.push(destination.join(relative));
    }

    std::fs::create_dir_all(destination).map_err(|err| PipelineError::io(destination, err))?;
    zip.extract(destination).map_err(extraction_error)?;

    for path in &extracted {
        debug!(path = %path.display(), "extracted archive entry");
    }
    info!(
        archive = %archive.display(),
        destination = %destination.display(),
        entries = extracted.len(),
        "archive extracted"
    );

    Ok(extracted)
}
