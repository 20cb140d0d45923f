//! Taxonomy-shaped output layout and the manifest that describes it.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use csv::WriterBuilder;
use serde::Serialize;

use crate::domain::{CandidateFile, Lineage, Portal, PortalId};
use crate::error::MycoError;
use crate::selector::PortalSelection;

/// Relative directory for a portal: one level per lineage rank, then the
/// portal short name.
pub fn build_path(lineage: &Lineage, portal: &PortalId) -> Utf8PathBuf {
    let mut path = Utf8PathBuf::new();
    for rank in lineage.ranks() {
        path.push(sanitize_component(rank));
    }
    // PortalId only admits a filesystem-safe alphabet
    path.push(portal.as_str());
    path
}

/// Makes a rank name safe to use as a single directory name.
///
/// Spaces become `_`; ASCII alphanumerics, `-` and non-leading `.` pass
/// through; every other byte (including `_` and `%` themselves) is written as
/// `%XX`. The mapping is injective, so distinct rank names never share a
/// directory.
pub fn sanitize_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (index, ch) in raw.char_indices() {
        match ch {
            ' ' => out.push('_'),
            '.' if index == 0 => out.push_str("%2E"),
            '.' | '-' => out.push(ch),
            ch if ch.is_ascii_alphanumeric() => out.push(ch),
            ch => {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    out
}

/// Creates `root/relative` and every missing parent. Safe to call again.
pub fn ensure_dir(root: &Utf8Path, relative: &Utf8Path) -> Result<Utf8PathBuf, MycoError> {
    let full = root.join(relative);
    fs::create_dir_all(full.as_std_path())
        .map_err(|err| MycoError::Filesystem(format!("create {full}: {err}")))?;
    Ok(full)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestRow {
    #[serde(rename = "Short name")]
    pub short_name: String,
    #[serde(rename = "Accession")]
    pub accession: String,
    #[serde(rename = "TaxId")]
    pub taxid: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Assembly file")]
    pub assembly_file: String,
    #[serde(rename = "GFF file")]
    pub annotation_file: String,
    #[serde(rename = "lineage")]
    pub lineage: String,
}

pub fn record(portal: &Portal, selection: &PortalSelection) -> ManifestRow {
    let filename = |file: Option<&CandidateFile>| {
        file.map(|file| file.filename.clone()).unwrap_or_default()
    };
    ManifestRow {
        short_name: portal.id.to_string(),
        accession: portal.accession.clone(),
        taxid: portal.taxid.clone(),
        name: portal.name.clone(),
        path: build_path(&portal.lineage, &portal.id).to_string(),
        assembly_file: filename(selection.assembly.as_ref()),
        annotation_file: filename(selection.annotation.as_ref()),
        lineage: portal.lineage.to_string(),
    }
}

/// Tab-separated manifest, header first, rows in the order they are appended.
pub struct ManifestWriter<W: io::Write> {
    inner: csv::Writer<W>,
}

impl<W: io::Write> ManifestWriter<W> {
    pub fn from_writer(writer: W) -> Self {
        let inner = WriterBuilder::new().delimiter(b'\t').from_writer(writer);
        Self { inner }
    }

    pub fn append(&mut self, row: &ManifestRow) -> Result<(), MycoError> {
        self.inner
            .serialize(row)
            .map_err(|err| MycoError::Filesystem(err.to_string()))
    }

    pub fn finish(self) -> Result<W, MycoError> {
        self.inner
            .into_inner()
            .map_err(|err| MycoError::Filesystem(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lineage(value: &str) -> Lineage {
        value.parse().unwrap()
    }

    #[test]
    fn path_follows_lineage_then_portal() {
        let portal: PortalId = "Trire2".parse().unwrap();
        let path = build_path(
            &lineage("cellular organisms,Eukaryota,Fungi,Dikarya,Ascomycota"),
            &portal,
        );
        assert_eq!(
            path.as_str(),
            "cellular_organisms/Eukaryota/Fungi/Dikarya/Ascomycota/Trire2"
        );
    }

    #[test]
    fn sanitizing_is_injective_on_lookalikes() {
        let names = ["a b", "a_b", "a/b", "a%2Fb", "a%5Fb", ".hidden", "%2Ehidden", "a.b"];
        let mut seen = std::collections::BTreeSet::new();
        for name in names {
            let safe = sanitize_component(name);
            assert!(!safe.contains('/'), "{safe}");
            assert!(seen.insert(safe), "collision for {name}");
        }
        assert_eq!(sanitize_component("a/b"), "a%2Fb");
        assert_eq!(sanitize_component(".."), "%2E.");
    }

    #[test]
    fn non_ascii_is_escaped() {
        assert_eq!(sanitize_component("Přilba"), "P%C5%99ilba");
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let relative = build_path(&lineage("Fungi,Dikarya"), &"Trire2".parse().unwrap());
        let first = ensure_dir(&root, &relative).unwrap();
        let second = ensure_dir(&root, &relative).unwrap();
        assert_eq!(first, second);
        assert!(first.as_std_path().is_dir());
    }
}
