use std::collections::BTreeMap;
use std::path::Path;

use csv::ReaderBuilder;
use serde::Deserialize;

use crate::domain::{CandidateFile, Category, PortalId, parse_timestamp, unknown_timestamp};
use crate::error::MycoError;

#[derive(Debug, Deserialize)]
struct RawListingRow {
    portal: String,
    category: String,
    filename: String,
    timestamp: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    masked: Option<String>,
}

impl RawListingRow {
    fn into_candidate(self) -> Result<(PortalId, CandidateFile), MycoError> {
        let portal: PortalId = self.portal.parse()?;
        let category: Category = self.category.parse()?;
        let filename = self.filename.trim().to_string();
        if filename.is_empty() {
            return Err(MycoError::MalformedListing(format!("{portal}: empty filename")));
        }
        // a bad date only costs the file its recency, never its candidacy
        let timestamp = parse_timestamp(&self.timestamp).unwrap_or_else(|err| {
            tracing::warn!(%portal, %filename, error = %err, "unreadable date, treating file as oldest");
            unknown_timestamp()
        });
        let url = self
            .url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| format!("/portal/{portal}/download/{filename}"));
        let masked = self
            .masked
            .map(|value| {
                matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "y" | "yes" | "true" | "1"
                )
            })
            .unwrap_or(false);
        Ok((
            portal,
            CandidateFile {
                filename,
                category,
                timestamp,
                size: self.size.unwrap_or(0),
                url,
                masked,
            },
        ))
    }
}

/// Candidate files of one portal, split by folder, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortalFiles {
    pub assemblies: Vec<CandidateFile>,
    pub annotations: Vec<CandidateFile>,
}

impl PortalFiles {
    pub fn get(&self, category: Category) -> &[CandidateFile] {
        match category {
            Category::Assembly => &self.assemblies,
            Category::Annotation => &self.annotations,
        }
    }

    fn push(&mut self, file: CandidateFile) {
        match file.category {
            Category::Assembly => self.assemblies.push(file),
            Category::Annotation => self.annotations.push(file),
        }
    }
}

/// Flattened per-portal file listing, one TSV row per downloadable file.
#[derive(Debug, Clone, Default)]
pub struct FileListing {
    portals: BTreeMap<PortalId, PortalFiles>,
    pub skipped_rows: usize,
}

impl FileListing {
    pub fn load(path: &Path) -> Result<Self, MycoError> {
        let reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::Fields)
            .from_path(path)
            .map_err(|_| MycoError::InputRead(path.to_path_buf()))?;
        Self::from_reader(reader)
    }

    pub fn parse(content: &str) -> Result<Self, MycoError> {
        let reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::Fields)
            .from_reader(content.as_bytes());
        Self::from_reader(reader)
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, MycoError> {
        let mut listing = FileListing::default();
        for (index, row) in reader.deserialize::<RawListingRow>().enumerate() {
            let parsed = row
                .map_err(|err| MycoError::MalformedListing(err.to_string()))
                .and_then(RawListingRow::into_candidate);
            match parsed {
                Ok((portal, file)) => listing.portals.entry(portal).or_default().push(file),
                Err(err) => {
                    tracing::warn!(line = index + 2, error = %err, "skipping file listing row");
                    listing.skipped_rows += 1;
                }
            }
        }
        Ok(listing)
    }

    pub fn files(&self, portal: &PortalId) -> Option<&PortalFiles> {
        self.portals.get(portal)
    }

    pub fn portal_ids(&self) -> impl Iterator<Item = &PortalId> {
        self.portals.keys()
    }
}
