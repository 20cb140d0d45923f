//! Picks at most one assembly and one annotation file per portal.
//!
//! Candidates flow through an ordered list of pure stages. Each stage keeps
//! some candidates and rejects the rest with a [`Rejection`]; the newest
//! survivor wins. The curated override table short-circuits everything for
//! annotations.

use std::fmt;

use crate::domain::{CandidateFile, Category, PortalId};
use crate::error::MycoError;
use crate::policy::SelectionPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Overridden,
    SkipList,
    ExcludedSubstring(String),
    WrongExtension,
    SupersededByGff3,
    Older,
    MaskedNotNeeded,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Overridden => write!(f, "override table names another file"),
            Rejection::SkipList => write!(f, "on skip-list"),
            Rejection::ExcludedSubstring(needle) => write!(f, "name contains {needle:?}"),
            Rejection::WrongExtension => write!(f, "unsupported extension"),
            Rejection::SupersededByGff3 => write!(f, "gff3 variant available"),
            Rejection::Older => write!(f, "newer candidate available"),
            Rejection::MaskedNotNeeded => write!(f, "unmasked assembly available"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub filename: String,
    pub reason: Rejection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionReport {
    pub chosen: Option<CandidateFile>,
    pub rejected: Vec<RejectedFile>,
}

impl SelectionReport {
    pub fn is_rejected(&self, filename: &str) -> bool {
        self.rejected.iter().any(|item| item.filename == filename)
    }
}

/// The files chosen for one portal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortalSelection {
    pub assembly: Option<CandidateFile>,
    pub annotation: Option<CandidateFile>,
}

impl PortalSelection {
    pub fn get(&self, category: Category) -> Option<&CandidateFile> {
        match category {
            Category::Assembly => self.assembly.as_ref(),
            Category::Annotation => self.annotation.as_ref(),
        }
    }
}

/// Survivors and casualties of one stage.
#[derive(Debug, Default)]
pub struct Partition {
    pub kept: Vec<CandidateFile>,
    pub rejected: Vec<RejectedFile>,
}

type Stage = fn(Category, &SelectionPolicy, Vec<CandidateFile>) -> Partition;

const ASSEMBLY_STAGES: &[Stage] = &[exclusion_stage, extension_stage];
const ANNOTATION_STAGES: &[Stage] = &[exclusion_stage, extension_stage, format_stage];

pub fn select(
    category: Category,
    candidates: &[CandidateFile],
    portal: &PortalId,
    policy: &SelectionPolicy,
) -> Result<Option<CandidateFile>, MycoError> {
    explain(category, candidates, portal, policy).map(|report| report.chosen)
}

/// Like [`select`], but also reports why every other candidate lost.
pub fn explain(
    category: Category,
    candidates: &[CandidateFile],
    portal: &PortalId,
    policy: &SelectionPolicy,
) -> Result<SelectionReport, MycoError> {
    match category {
        Category::Annotation => {
            if let Some(forced) = policy.override_for(portal) {
                return apply_override(portal, forced, candidates);
            }
            Ok(run_stages(
                Category::Annotation,
                ANNOTATION_STAGES,
                policy,
                candidates.to_vec(),
            ))
        }
        Category::Assembly => {
            let (masked, unmasked): (Vec<_>, Vec<_>) =
                candidates.iter().cloned().partition(|file| file.masked);
            let mut report = run_stages(Category::Assembly, ASSEMBLY_STAGES, policy, unmasked);
            if report.chosen.is_some() {
                report.rejected.extend(masked.into_iter().map(|file| RejectedFile {
                    filename: file.filename,
                    reason: Rejection::MaskedNotNeeded,
                }));
                return Ok(report);
            }
            let fallback = run_stages(Category::Assembly, ASSEMBLY_STAGES, policy, masked);
            report.chosen = fallback.chosen;
            report.rejected.extend(fallback.rejected);
            Ok(report)
        }
    }
}

fn apply_override(
    portal: &PortalId,
    forced: &str,
    candidates: &[CandidateFile],
) -> Result<SelectionReport, MycoError> {
    let chosen = candidates
        .iter()
        .find(|file| file.filename == forced)
        .cloned()
        .ok_or_else(|| MycoError::OverrideMissing {
            portal: portal.to_string(),
            filename: forced.to_string(),
        })?;
    let rejected = candidates
        .iter()
        .filter(|file| file.filename != forced)
        .map(|file| RejectedFile {
            filename: file.filename.clone(),
            reason: Rejection::Overridden,
        })
        .collect();
    Ok(SelectionReport {
        chosen: Some(chosen),
        rejected,
    })
}

fn run_stages(
    category: Category,
    stages: &[Stage],
    policy: &SelectionPolicy,
    candidates: Vec<CandidateFile>,
) -> SelectionReport {
    let mut remaining = candidates;
    let mut rejected = Vec::new();
    for stage in stages {
        let partition = stage(category, policy, remaining);
        rejected.extend(partition.rejected);
        remaining = partition.kept;
    }
    let partition = newest(remaining);
    rejected.extend(partition.rejected);
    SelectionReport {
        chosen: partition.kept.into_iter().next(),
        rejected,
    }
}

fn split<F>(candidates: Vec<CandidateFile>, mut verdict: F) -> Partition
where
    F: FnMut(&CandidateFile) -> Option<Rejection>,
{
    let mut partition = Partition::default();
    for file in candidates {
        match verdict(&file) {
            Some(reason) => partition.rejected.push(RejectedFile {
                filename: file.filename,
                reason,
            }),
            None => partition.kept.push(file),
        }
    }
    partition
}

/// Drops skip-listed files and files whose name carries an exclusion substring.
pub fn exclusion_stage(
    category: Category,
    policy: &SelectionPolicy,
    candidates: Vec<CandidateFile>,
) -> Partition {
    split(candidates, |file| {
        if policy.is_skipped_file(category, &file.filename) {
            return Some(Rejection::SkipList);
        }
        policy
            .excluded_substring(category, &file.filename)
            .map(|needle| Rejection::ExcludedSubstring(needle.to_string()))
    })
}

/// Keeps compressed files only; annotations also lose `gtf.gz` and `tgz`.
pub fn extension_stage(
    category: Category,
    _policy: &SelectionPolicy,
    candidates: Vec<CandidateFile>,
) -> Partition {
    split(candidates, |file| {
        let name = file.filename.as_str();
        let acceptable = match category {
            Category::Assembly => name.ends_with("gz"),
            Category::Annotation => {
                name.ends_with("gz") && !name.ends_with("gtf.gz") && !name.ends_with("tgz")
            }
        };
        (!acceptable).then_some(Rejection::WrongExtension)
    })
}

/// Any `gff3.gz` survivor knocks out every plain `gff.gz` one, whatever the dates.
pub fn format_stage(
    category: Category,
    _policy: &SelectionPolicy,
    candidates: Vec<CandidateFile>,
) -> Partition {
    if category != Category::Annotation
        || !candidates.iter().any(|file| file.filename.ends_with("gff3.gz"))
    {
        return Partition {
            kept: candidates,
            rejected: Vec::new(),
        };
    }
    split(candidates, |file| {
        file.filename
            .ends_with(".gff.gz")
            .then_some(Rejection::SupersededByGff3)
    })
}

/// Newest timestamp wins; equal timestamps fall back to the greatest filename.
pub fn newest(candidates: Vec<CandidateFile>) -> Partition {
    let winner = candidates
        .iter()
        .max_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.filename.cmp(&b.filename))
        })
        .map(|file| file.filename.clone());
    let Some(winner) = winner else {
        return Partition::default();
    };
    split(candidates, |file| {
        (file.filename != winner).then_some(Rejection::Older)
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::parse_timestamp;

    fn file(category: Category, name: &str, date: &str) -> CandidateFile {
        CandidateFile {
            filename: name.to_string(),
            category,
            timestamp: parse_timestamp(date).unwrap(),
            size: 100,
            url: format!("/portal/X/download/{name}"),
            masked: false,
        }
    }

    fn gff(name: &str, date: &str) -> CandidateFile {
        file(Category::Annotation, name, date)
    }

    fn portal() -> PortalId {
        "X".parse().unwrap()
    }

    #[test]
    fn gff3_beats_newer_gff() {
        let candidates = vec![
            gff("X_v1.gff.gz", "2019-01-01"),
            gff("X_v2.gff3.gz", "2018-01-01"),
            gff("X_v3.gff.gz", "2020-01-01"),
        ];
        let chosen = select(
            Category::Annotation,
            &candidates,
            &portal(),
            &SelectionPolicy::default(),
        )
        .unwrap();
        assert_eq!(chosen.unwrap().filename, "X_v2.gff3.gz");
    }

    #[test]
    fn newest_gff3_wins() {
        let candidates = vec![
            gff("X_v1.gff3.gz", "2019-01-01"),
            gff("X_v2.gff3.gz", "2020-01-01"),
        ];
        let chosen = select(
            Category::Annotation,
            &candidates,
            &portal(),
            &SelectionPolicy::default(),
        )
        .unwrap();
        assert_eq!(chosen.unwrap().filename, "X_v2.gff3.gz");
    }

    #[test]
    fn equal_dates_fall_back_to_greatest_name() {
        let candidates = vec![
            gff("X_b.gff3.gz", "2020-01-01"),
            gff("X_c.gff3.gz", "2020-01-01"),
            gff("X_a.gff3.gz", "2020-01-01"),
        ];
        let chosen = select(
            Category::Annotation,
            &candidates,
            &portal(),
            &SelectionPolicy::empty(),
        )
        .unwrap();
        assert_eq!(chosen.unwrap().filename, "X_c.gff3.gz");
    }

    #[test]
    fn only_gtf_yields_nothing() {
        let candidates = vec![
            gff("X_genes.gtf.gz", "2019-01-01"),
            gff("X_bundle.tgz", "2020-01-01"),
            gff("X_genes.gff", "2020-01-01"),
        ];
        let report = explain(
            Category::Annotation,
            &candidates,
            &portal(),
            &SelectionPolicy::default(),
        )
        .unwrap();
        assert!(report.chosen.is_none());
        assert_eq!(report.rejected.len(), 3);
        assert!(
            report
                .rejected
                .iter()
                .all(|item| item.reason == Rejection::WrongExtension)
        );
    }

    #[test]
    fn override_wins_unconditionally() {
        let candidates = vec![
            gff("P_custom.gff.gz", "2010-01-01"),
            gff("P_GeneCatalog.gff3.gz", "2020-01-01"),
        ];
        let mut overrides = BTreeMap::new();
        overrides.insert("P".to_string(), "P_custom.gff.gz".to_string());
        let policy = SelectionPolicy::default().with_overrides(overrides);
        let portal: PortalId = "P".parse().unwrap();

        let report = explain(Category::Annotation, &candidates, &portal, &policy).unwrap();
        assert_eq!(report.chosen.unwrap().filename, "P_custom.gff.gz");
        assert_eq!(report.rejected[0].reason, Rejection::Overridden);
    }

    #[test]
    fn override_naming_absent_file_is_an_error() {
        let candidates = vec![gff("P_GeneCatalog.gff3.gz", "2020-01-01")];
        let mut overrides = BTreeMap::new();
        overrides.insert("P".to_string(), "P_custom.gff.gz".to_string());
        let policy = SelectionPolicy::default().with_overrides(overrides);
        let portal: PortalId = "P".parse().unwrap();

        let err = select(Category::Annotation, &candidates, &portal, &policy).unwrap_err();
        assert_matches!(err, MycoError::OverrideMissing { .. });
    }

    #[test]
    fn override_does_not_touch_assemblies() {
        let candidates = vec![file(Category::Assembly, "P_AssemblyScaffolds.fasta.gz", "2020-01-01")];
        let mut overrides = BTreeMap::new();
        overrides.insert("P".to_string(), "P_custom.gff.gz".to_string());
        let policy = SelectionPolicy::default().with_overrides(overrides);
        let portal: PortalId = "P".parse().unwrap();

        let chosen = select(Category::Assembly, &candidates, &portal, &policy).unwrap();
        assert_eq!(chosen.unwrap().filename, "P_AssemblyScaffolds.fasta.gz");
    }

    #[test]
    fn assembly_exclusions() {
        let candidates = vec![
            file(Category::Assembly, "X_MitoAssembly.fasta.gz", "2021-01-01"),
            file(Category::Assembly, "X_PrimaryAssemblyScaffolds.fasta.gz", "2021-01-01"),
            file(Category::Assembly, "X_AssemblyScaffolds.fasta.gz", "2015-01-01"),
            file(Category::Assembly, "X_README.txt", "2022-01-01"),
        ];
        let report = explain(
            Category::Assembly,
            &candidates,
            &portal(),
            &SelectionPolicy::default(),
        )
        .unwrap();
        assert_eq!(report.chosen.unwrap().filename, "X_AssemblyScaffolds.fasta.gz");
        assert_eq!(report.rejected.len(), 3);
    }

    #[test]
    fn masked_assembly_is_a_fallback() {
        let mut masked = file(Category::Assembly, "X_masked.fasta.gz", "2022-01-01");
        masked.masked = true;
        let unmasked = file(Category::Assembly, "X_AssemblyScaffolds.fasta.gz", "2015-01-01");

        let policy = SelectionPolicy::default();
        let both = vec![masked.clone(), unmasked];
        let chosen = select(Category::Assembly, &both, &portal(), &policy).unwrap();
        assert_eq!(chosen.unwrap().filename, "X_AssemblyScaffolds.fasta.gz");

        let only_masked = vec![masked];
        let chosen = select(Category::Assembly, &only_masked, &portal(), &policy).unwrap();
        assert_eq!(chosen.unwrap().filename, "X_masked.fasta.gz");
    }

    #[test]
    fn format_stage_leaves_assemblies_alone() {
        let candidates = vec![
            file(Category::Assembly, "X.gff.gz", "2019-01-01"),
            file(Category::Assembly, "X.gff3.gz", "2019-01-01"),
        ];
        let partition = format_stage(Category::Assembly, &SelectionPolicy::empty(), candidates);
        assert_eq!(partition.kept.len(), 2);
    }

    #[test]
    fn annotation_exclusions_and_skip_list() {
        let candidates = vec![
            gff("Exoaq1_GeneCatalog_20160901.gff3.gz", "2021-01-01"),
            gff("Exoaq1_secondary_alleles.gff3.gz", "2021-01-01"),
            gff("Exoaq1_GeneCatalog_20150101.gff3.gz", "2015-01-01"),
        ];
        let portal: PortalId = "Exoaq1".parse().unwrap();
        let report = explain(
            Category::Annotation,
            &candidates,
            &portal,
            &SelectionPolicy::default(),
        )
        .unwrap();
        assert_eq!(
            report.chosen.unwrap().filename,
            "Exoaq1_GeneCatalog_20150101.gff3.gz"
        );
        assert_eq!(report.rejected[0].reason, Rejection::SkipList);
        assert_matches!(report.rejected[1].reason, Rejection::ExcludedSubstring(_));
    }

    #[test]
    fn empty_input_yields_nothing() {
        let chosen = select(
            Category::Annotation,
            &[],
            &portal(),
            &SelectionPolicy::default(),
        )
        .unwrap();
        assert!(chosen.is_none());
    }
}
