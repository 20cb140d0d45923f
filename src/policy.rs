//! Policy data for the selector: skip-lists, exclusion substrings, excluded
//! portals and the curated annotation override table.
//!
//! Nothing in here decides anything; [`crate::selector`] reads these tables.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use csv::ReaderBuilder;

use crate::domain::{Category, PortalId};
use crate::error::MycoError;

/// Assemblies that are not the nuclear genome, are superseded, or belong to
/// metagenome samples.
const SKIP_ASSEMBLIES: &[&str] = &[
    "1034997.Tuber_borchii_Tbo3840.standard.main.scaffolds.fasta.gz",
    "Spofi1.draft.mito.scaffolds.fasta.gz",
    "Patat1.draft.mito.scaffolds.fasta.gz",
    "PleosPC9_1_Assembly_scaffolds.fasta.gz",
    "Neuhi1_PlasmidAssemblyScaffolds.fasta.gz",
    "CocheC5_1_assembly_scaffolds.fasta.gz",
    "Alternaria_brassicicola_masked_assembly.fasta.gz",
    "Aciri1_meta_AssemblyScaffolds.fasta.gz",
    "Rhoto_IFO0880_2_AssemblyScaffolds.fasta.gz",
    "StenotrophomonasSp_AssemblyScaffolds.fasta.gz",
    "PseudomonasSp_AssemblyScaffolds.fasta.gz",
    "EurotioJF034F_1_RiboAssemblyScaffolds.fasta.gz",
];

/// Gene catalogs that look like the real thing but are not.
const SKIP_ANNOTATIONS: &[&str] = &[
    "Aciri1_meta_GeneCatalog_genes_20111216.gff.gz",
    "Exoaq1_GeneCatalog_20160901.gff3.gz",
    "Exoaq1_GeneCatalog_20160828.gff3.gz",
    "Fonpe1_GeneCatalog_20160901.gff3.gz",
    "Copmic2_FM1_removed_alleles.gff.gz",
];

const ASSEMBLY_EXCLUDE_SUBSTRINGS: &[&str] = &[
    "MitoAssembly",
    "MitoScaffolds",
    "PrimaryAssemblyScaffolds",
    "SecondaryAssemblyScaffolds",
];

// matched against the lowercased filename
const ANNOTATION_EXCLUDE_SUBSTRINGS: &[&str] =
    &["proteins", "secondary_alleles", "promoter_regions"];

/// Metaprojects and superseded versions.
const EXCLUDED_PORTALS: &[&str] = &["Rhoto_IFO0880_2", "Aciri1_meta", "Pospl1"];

#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    skip_assemblies: BTreeSet<String>,
    skip_annotations: BTreeSet<String>,
    assembly_substrings: Vec<String>,
    annotation_substrings: Vec<String>,
    excluded_portals: BTreeSet<String>,
    overrides: BTreeMap<String, String>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            skip_assemblies: to_set(SKIP_ASSEMBLIES),
            skip_annotations: to_set(SKIP_ANNOTATIONS),
            assembly_substrings: to_vec(ASSEMBLY_EXCLUDE_SUBSTRINGS),
            annotation_substrings: to_vec(ANNOTATION_EXCLUDE_SUBSTRINGS),
            excluded_portals: to_set(EXCLUDED_PORTALS),
            overrides: BTreeMap::new(),
        }
    }
}

impl SelectionPolicy {
    /// A policy with no tables at all. Mostly useful in tests.
    pub fn empty() -> Self {
        Self {
            skip_assemblies: BTreeSet::new(),
            skip_annotations: BTreeSet::new(),
            assembly_substrings: Vec::new(),
            annotation_substrings: Vec::new(),
            excluded_portals: BTreeSet::new(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    pub fn with_skipped_files<I>(mut self, category: Category, filenames: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        match category {
            Category::Assembly => self.skip_assemblies.extend(filenames),
            Category::Annotation => self.skip_annotations.extend(filenames),
        }
        self
    }

    pub fn with_excluded_portals<I>(mut self, portals: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.excluded_portals.extend(portals);
        self
    }

    pub fn override_for(&self, portal: &PortalId) -> Option<&str> {
        self.overrides.get(portal.as_str()).map(String::as_str)
    }

    pub fn is_excluded_portal(&self, portal: &PortalId) -> bool {
        self.excluded_portals.contains(portal.as_str())
    }

    pub fn is_skipped_file(&self, category: Category, filename: &str) -> bool {
        match category {
            Category::Assembly => self.skip_assemblies.contains(filename),
            Category::Annotation => self.skip_annotations.contains(filename),
        }
    }

    /// First exclusion substring found in `filename`, if any.
    pub fn excluded_substring(&self, category: Category, filename: &str) -> Option<&str> {
        match category {
            Category::Assembly => self
                .assembly_substrings
                .iter()
                .find(|needle| filename.contains(needle.as_str()))
                .map(String::as_str),
            Category::Annotation => {
                let lowered = filename.to_lowercase();
                self.annotation_substrings
                    .iter()
                    .find(|needle| lowered.contains(needle.as_str()))
                    .map(String::as_str)
            }
        }
    }
}

/// Reads the curated `portal<TAB>filename` override table.
pub fn load_overrides(path: &Path) -> Result<BTreeMap<String, String>, MycoError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_path(path)
        .map_err(|_| MycoError::InputRead(path.to_path_buf()))?;

    let mut overrides = BTreeMap::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|err| MycoError::InputParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let (Some(portal), Some(filename)) = (record.get(0), record.get(1)) else {
            return Err(MycoError::InputParse {
                path: path.to_path_buf(),
                message: format!("line {} needs two tab-separated columns", index + 1),
            });
        };
        let portal = portal.trim();
        let filename = filename.trim();
        if portal.is_empty() || filename.is_empty() {
            continue;
        }
        overrides.insert(portal.to_string(), filename.to_string());
    }
    Ok(overrides)
}

/// Reads a user exclude-list: first token of each non-comment line.
pub fn load_exclude_list(path: &Path) -> Result<BTreeSet<String>, MycoError> {
    let content =
        fs::read_to_string(path).map_err(|_| MycoError::InputRead(path.to_path_buf()))?;
    Ok(content
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect())
}

fn to_set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn to_vec(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn annotation_substrings_ignore_case() {
        let policy = SelectionPolicy::default();
        assert_eq!(
            policy.excluded_substring(Category::Annotation, "Aspzo1_Proteins.gff3.gz"),
            Some("proteins")
        );
        assert_eq!(
            policy.excluded_substring(Category::Assembly, "Trire2_mitoassembly.fasta.gz"),
            None
        );
    }

    #[test]
    fn builtin_portal_exclusions() {
        let policy = SelectionPolicy::default();
        assert!(policy.is_excluded_portal(&"Pospl1".parse().unwrap()));
        assert!(!policy.is_excluded_portal(&"Trire2".parse().unwrap()));
    }

    #[test]
    fn read_override_table_skips_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# portal\tfile").unwrap();
        writeln!(file, "Trire2\tTrire2_custom.gff.gz").unwrap();
        writeln!(file, "Aspnid1\t Aspnid1_GeneCatalog.gff3.gz ").unwrap();

        let overrides = load_overrides(file.path()).unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides["Aspnid1"], "Aspnid1_GeneCatalog.gff3.gz");
    }

    #[test]
    fn read_exclude_list_takes_first_token() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "#comment").unwrap();
        writeln!(file, "Trire2 superseded").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "Aspnid1").unwrap();

        let excluded = load_exclude_list(file.path()).unwrap();
        assert_eq!(excluded.len(), 2);
        assert!(excluded.contains("Trire2"));
    }
}
