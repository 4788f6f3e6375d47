//! Output file handling.
//!
//! Outputs are staged next to their final location and renamed into place,
//! so a failed conversion never leaves a truncated file at the output path.
//! Output directories are never created.

use crate::error::{ConversionError, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::debug;

const STAGING_PREFIX: &str = ".kommverter-";

/// Directory the output will be written to. It must already exist.
pub(crate) fn output_dir(output: &Path) -> Result<PathBuf> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !dir.is_dir() {
        return Err(ConversionError::filesystem(
            dir,
            io::Error::new(io::ErrorKind::NotFound, "output directory does not exist"),
        ));
    }
    Ok(dir)
}

/// Refuse an output path that names the source file itself.
pub(crate) fn ensure_not_source(source: &Path, output: &Path) -> Result<()> {
    let same = match (fs::canonicalize(source), fs::canonicalize(output)) {
        (Ok(source), Ok(output)) => source == output,
        _ => source == output,
    };

    if same {
        return Err(ConversionError::filesystem(
            output,
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "output path is the source file",
            ),
        ));
    }
    Ok(())
}

/// Write `data` to `output`, replacing any existing file.
pub(crate) fn write_atomic(data: &[u8], output: &Path) -> Result<u64> {
    let dir = output_dir(output)?;

    let mut staged = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(".part")
        .tempfile_in(&dir)
        .map_err(|e| ConversionError::filesystem(&dir, e))?;

    staged
        .write_all(data)
        .and_then(|_| staged.flush())
        .map_err(|e| ConversionError::filesystem(staged.path(), e))?;

    persist(staged, output)?;
    Ok(data.len() as u64)
}

fn persist(staged: NamedTempFile, output: &Path) -> Result<()> {
    staged
        .persist(output)
        .map_err(|e| ConversionError::filesystem(output, e.error))?;
    debug!("Wrote {:?}", output);
    Ok(())
}

/// Scratch directory beside `output` for tools that choose their own file names.
pub(crate) fn staging_dir(output: &Path) -> Result<TempDir> {
    let dir = output_dir(output)?;
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(&dir)
        .map_err(|e| ConversionError::filesystem(&dir, e))
}

/// Move a file produced inside a staging directory onto `output`.
pub(crate) fn publish(staged: &Path, output: &Path) -> Result<u64> {
    fs::rename(staged, output).map_err(|e| ConversionError::filesystem(output, e))?;
    let bytes = fs::metadata(output)
        .map_err(|e| ConversionError::filesystem(output, e))?
        .len();
    debug!("Published {:?} ({} bytes)", output, bytes);
    Ok(bytes)
}
