//! Files fetched by earlier runs, and the decision of whether a selected file
//! still needs a transfer.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use csv::ReaderBuilder;

use crate::domain::{CandidateFile, PortalId};
use crate::error::MycoError;

#[derive(Debug, Clone, Default)]
pub struct PreviousDownloads {
    // portal -> filename -> directory holding it
    entries: BTreeMap<String, BTreeMap<String, Utf8PathBuf>>,
}

impl PreviousDownloads {
    /// Reads `filename<TAB>directory` lines. The portal is the directory's
    /// last component, which is how the output tree is laid out.
    pub fn load(path: &Path) -> Result<Self, MycoError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_path(path)
            .map_err(|_| MycoError::InputRead(path.to_path_buf()))?;

        let mut previous = Self::default();
        for record in reader.records() {
            let record = record.map_err(|err| MycoError::InputParse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
            let (Some(filename), Some(directory)) = (record.get(0), record.get(1)) else {
                tracing::warn!(?record, "ignoring short line in previous-downloads file");
                continue;
            };
            previous.insert(filename.trim(), Utf8PathBuf::from(directory.trim()));
        }
        Ok(previous)
    }

    pub fn insert(&mut self, filename: &str, directory: Utf8PathBuf) {
        let Some(portal) = directory.file_name().map(str::to_string) else {
            tracing::warn!(%filename, %directory, "cannot infer portal from directory");
            return;
        };
        self.entries
            .entry(portal)
            .or_default()
            .insert(filename.to_string(), directory);
    }

    pub fn contains(&self, portal: &PortalId, filename: &str) -> bool {
        self.location(portal, filename).is_some()
    }

    pub fn location(&self, portal: &PortalId, filename: &str) -> Option<&Utf8Path> {
        self.entries
            .get(portal.as_str())
            .and_then(|files| files.get(filename))
            .map(Utf8PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Already at its destination.
    PreExisting,
    /// Fetched by an earlier run; copy from this directory.
    Previous(Utf8PathBuf),
    Download,
}

/// Decides how `file` reaches `portal_dir`. A destination file counts as
/// present once it holds at least 90% of the listed size.
pub fn reconcile(
    portal: &PortalId,
    file: &CandidateFile,
    portal_dir: &Utf8Path,
    previous: &PreviousDownloads,
) -> Reconciliation {
    let destination = portal_dir.join(&file.filename);
    if let Ok(meta) = fs::metadata(destination.as_std_path()) {
        if meta.is_file() && meta.len() as f64 > 0.9 * file.size as f64 {
            return Reconciliation::PreExisting;
        }
    }
    match previous.location(portal, &file.filename) {
        Some(location) => Reconciliation::Previous(location.to_path_buf()),
        None => Reconciliation::Download,
    }
}

/// Collects every `*.gz` under `base` as `(filename, directory)`, sorted.
pub fn scan_previous(base: &Path) -> Result<Vec<(String, PathBuf)>, MycoError> {
    if !base.is_dir() {
        return Err(MycoError::Filesystem(format!(
            "not a directory: {}",
            base.display()
        )));
    }
    let mut found = Vec::new();
    let mut stack = vec![base.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(&dir).map_err(|err| MycoError::Filesystem(err.to_string()))?;
        for entry in entries {
            let path = entry
                .map_err(|err| MycoError::Filesystem(err.to_string()))?
                .path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let is_gz = path.extension().map(|ext| ext == "gz").unwrap_or(false);
            if let (true, Some(name)) = (is_gz, path.file_name()) {
                found.push((name.to_string_lossy().into_owned(), dir.clone()));
            }
        }
    }
    found.sort();
    Ok(found)
}

pub fn write_previous(path: &Path, entries: &[(String, PathBuf)]) -> Result<(), MycoError> {
    let mut file =
        fs::File::create(path).map_err(|err| MycoError::Filesystem(err.to_string()))?;
    for (filename, directory) in entries {
        writeln!(file, "{filename}\t{}", directory.display())
            .map_err(|err| MycoError::Filesystem(err.to_string()))?;
    }
    Ok(())
}
