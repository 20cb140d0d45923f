use std::fs;
use std::io;
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::MycoError;

/// Decompresses the whole file into a sink; a truncated or non-gzip download fails here.
pub fn validate_gzip(path: &Path) -> Result<(), MycoError> {
    let file = fs::File::open(path)
        .map_err(|err| MycoError::Filesystem(format!("open {}: {err}", path.display())))?;
    let mut decoder = MultiGzDecoder::new(io::BufReader::new(file));
    io::copy(&mut decoder, &mut io::sink())
        .map_err(|_| MycoError::CorruptDownload(path.to_path_buf()))?;
    Ok(())
}

/// Copies `source` next to `dest` under a temporary name, then renames it into place.
pub fn copy_file_atomic(source: &Path, dest: &Path) -> Result<(), MycoError> {
    let parent = dest
        .parent()
        .ok_or_else(|| MycoError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent).map_err(|err| MycoError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix("mycocosm-file")
        .tempfile_in(parent)
        .map_err(|err| MycoError::Filesystem(err.to_string()))?;
    fs::copy(source, temp.path()).map_err(|err| {
        MycoError::Filesystem(format!("copy {}: {err}", source.display()))
    })?;
    if dest.exists() {
        fs::remove_file(dest).map_err(|err| MycoError::Filesystem(err.to_string()))?;
    }
    temp.persist(dest)
        .map_err(|err| MycoError::Filesystem(err.to_string()))?;
    Ok(())
}
