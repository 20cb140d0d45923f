use std::collections::BTreeSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::domain::{CandidateFile, Category, Portal, PortalId, Timestamp, unknown_timestamp};
use crate::error::MycoError;
use crate::fs_util;
use crate::jgi::Transfer;
use crate::listing::FileListing;
use crate::policy::SelectionPolicy;
use crate::previous::{PreviousDownloads, Reconciliation, reconcile};
use crate::projects::ProjectList;
use crate::selector::{self, PortalSelection, SelectionReport};
use crate::tree::{self, ManifestWriter};

pub const MANIFEST_FILE: &str = "taxonomy.tsv";
pub const DOWNLOAD_LIST_FILE: &str = "download_list.txt";
pub const CANDIDATES_FILE: &str = "annotation_candidates.txt";

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_folder: Utf8PathBuf,
    pub simulate: bool,
    pub use_restricted: bool,
}

/// What to fetch for one portal and where to put it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadInstruction {
    pub portal: String,
    pub relative_path: String,
    pub assembly: Option<String>,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferAction {
    PreExisting,
    InPrevious,
    Copied,
    Downloaded,
    Simulated,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferRecord {
    pub portal: String,
    pub category: Category,
    pub filename: String,
    pub action: TransferAction,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub portals: usize,
    pub manifest_rows: usize,
    pub files_needed: usize,
    pub copied: usize,
    pub downloaded: usize,
    pub pre_existing: usize,
    pub in_previous: usize,
    pub simulated: usize,
    pub failed: usize,
    pub skipped_listing_rows: usize,
    pub skipped_projects: Vec<String>,
    pub excluded: Vec<String>,
    pub missing: Vec<String>,
    pub config_errors: Vec<String>,
    pub instructions: Vec<DownloadInstruction>,
    pub transfers: Vec<TransferRecord>,
}

impl RunSummary {
    pub fn total_got(&self) -> usize {
        self.copied + self.downloaded + self.pre_existing + self.in_previous
    }

    fn count(&mut self, action: TransferAction) {
        match action {
            TransferAction::PreExisting => self.pre_existing += 1,
            TransferAction::InPrevious => self.in_previous += 1,
            TransferAction::Copied => self.copied += 1,
            TransferAction::Downloaded => self.downloaded += 1,
            TransferAction::Simulated => self.simulated += 1,
            TransferAction::Failed => self.failed += 1,
        }
    }
}

/// Selection outcome for one portal, computed before anything touches disk.
#[derive(Debug, Clone)]
pub struct PlannedPortal {
    pub portal: Portal,
    pub relative_path: Utf8PathBuf,
    pub selection: PortalSelection,
    pub annotation_report: SelectionReport,
}

#[derive(Debug, Default)]
pub struct Plan {
    pub portals: Vec<PlannedPortal>,
    pub excluded: Vec<PortalId>,
    pub config_errors: Vec<(PortalId, String)>,
}

pub struct App<T: Transfer> {
    transfer: T,
    policy: SelectionPolicy,
    previous: PreviousDownloads,
}

impl<T: Transfer> App<T> {
    pub fn new(transfer: T, policy: SelectionPolicy, previous: PreviousDownloads) -> Self {
        Self {
            transfer,
            policy,
            previous,
        }
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    /// Runs the selector over every portal. Pure: no filesystem or network.
    pub fn plan(&self, projects: &ProjectList, listing: &FileListing, options: &RunOptions) -> Plan {
        let mut plan = Plan::default();
        let known = projects
            .portals
            .iter()
            .map(|portal| &portal.id)
            .collect::<BTreeSet<_>>();
        for id in listing.portal_ids().filter(|id| !known.contains(id)) {
            tracing::warn!(portal = %id, "portal from file listing not found in project list");
        }

        for portal in &projects.portals {
            if self.policy.is_excluded_portal(&portal.id) {
                plan.excluded.push(portal.id.clone());
                continue;
            }
            if portal.restricted && !options.use_restricted {
                tracing::debug!(portal = %portal.id, "skipping restricted portal");
                plan.excluded.push(portal.id.clone());
                continue;
            }

            let files = listing.files(&portal.id).cloned().unwrap_or_else(|| {
                tracing::warn!(portal = %portal.id, "no files listed for portal");
                Default::default()
            });

            let assembly = selector::select(
                Category::Assembly,
                files.get(Category::Assembly),
                &portal.id,
                &self.policy,
            );
            let annotation = selector::explain(
                Category::Annotation,
                files.get(Category::Annotation),
                &portal.id,
                &self.policy,
            );
            let (assembly, annotation_report) = match (assembly, annotation) {
                (Ok(assembly), Ok(report)) => (assembly, report),
                (Err(err), _) | (_, Err(err)) => {
                    tracing::error!(portal = %portal.id, error = %err, "selection aborted");
                    plan.config_errors.push((portal.id.clone(), err.to_string()));
                    continue;
                }
            };

            plan.portals.push(PlannedPortal {
                portal: portal.clone(),
                relative_path: tree::build_path(&portal.lineage, &portal.id),
                selection: PortalSelection {
                    assembly,
                    annotation: annotation_report.chosen.clone(),
                },
                annotation_report,
            });
        }
        plan
    }

    pub fn run(
        &self,
        projects: &ProjectList,
        listing: &FileListing,
        options: &RunOptions,
    ) -> Result<RunSummary, MycoError> {
        let plan = self.plan(projects, listing, options);
        let mut summary = self.execute(&plan, listing, options)?;
        summary.skipped_projects = projects.skipped.clone();
        Ok(summary)
    }

    /// Writes the manifest and audit files, creates the tree and moves files.
    ///
    /// Outside simulation the sign-on happens before anything is written, and
    /// the manifest only appears once every portal has been processed.
    pub fn execute(
        &self,
        plan: &Plan,
        listing: &FileListing,
        options: &RunOptions,
    ) -> Result<RunSummary, MycoError> {
        if !options.simulate {
            self.transfer.login()?;
        }

        let root = &options.output_folder;
        fs::create_dir_all(root.as_std_path())
            .map_err(|err| MycoError::Filesystem(format!("create {root}: {err}")))?;

        let mut summary = RunSummary {
            portals: plan.portals.len() + plan.excluded.len() + plan.config_errors.len(),
            excluded: plan.excluded.iter().map(ToString::to_string).collect(),
            config_errors: plan
                .config_errors
                .iter()
                .map(|(portal, err)| format!("{portal}: {err}"))
                .collect(),
            skipped_listing_rows: listing.skipped_rows,
            ..RunSummary::default()
        };

        write_text(&root.join(DOWNLOAD_LIST_FILE), &render_download_list(plan))?;
        write_text(&root.join(CANDIDATES_FILE), &render_candidates(plan, listing))?;

        if options.simulate {
            tracing::info!("beginning simulation");
        } else {
            tracing::info!("beginning file download");
        }

        let temp = tempfile::Builder::new()
            .prefix("mycocosm-manifest")
            .tempfile_in(root.as_std_path())
            .map_err(|err| MycoError::Filesystem(err.to_string()))?;
        let mut manifest = ManifestWriter::from_writer(temp);
        for planned in plan.portals.iter() {
            let id = &planned.portal.id;
            manifest.append(&tree::record(&planned.portal, &planned.selection))?;
            summary.manifest_rows += 1;
            summary.instructions.push(DownloadInstruction {
                portal: id.to_string(),
                relative_path: planned.relative_path.to_string(),
                assembly: planned.selection.assembly.as_ref().map(|f| f.filename.clone()),
                annotation: planned
                    .selection
                    .annotation
                    .as_ref()
                    .map(|f| f.filename.clone()),
            });

            let missing = missing_categories(&planned.selection);
            if !missing.is_empty() {
                tracing::warn!(portal = %id, missing = %missing, "no eligible file");
                summary.missing.push(format!("{id} ({missing})"));
            }

            let portal_dir = if options.simulate {
                root.join(&planned.relative_path)
            } else {
                tree::ensure_dir(root, &planned.relative_path)?
            };

            for category in [Category::Assembly, Category::Annotation] {
                let Some(file) = planned.selection.get(category) else {
                    continue;
                };
                summary.files_needed += 1;
                let action = self.fetch_one(id, file, &portal_dir, options.simulate)?;
                summary.count(action);
                summary.transfers.push(TransferRecord {
                    portal: id.to_string(),
                    category,
                    filename: file.filename.clone(),
                    action,
                });
            }
        }
        let manifest_path = root.join(MANIFEST_FILE);
        manifest
            .finish()?
            .persist(manifest_path.as_std_path())
            .map_err(|err| MycoError::Filesystem(format!("write {manifest_path}: {err}")))?;

        tracing::info!(
            portals = summary.portals,
            needed = summary.files_needed,
            copied = summary.copied,
            downloaded = summary.downloaded,
            pre_existing = summary.pre_existing,
            in_previous = summary.in_previous,
            failed = summary.failed,
            "done"
        );
        Ok(summary)
    }

    fn fetch_one(
        &self,
        portal: &PortalId,
        file: &CandidateFile,
        portal_dir: &Utf8Path,
        simulate: bool,
    ) -> Result<TransferAction, MycoError> {
        let destination = portal_dir.join(&file.filename);
        let action = match reconcile(portal, file, portal_dir, &self.previous) {
            Reconciliation::PreExisting => TransferAction::PreExisting,
            Reconciliation::Previous(_) if simulate => TransferAction::InPrevious,
            Reconciliation::Previous(location) => {
                let source = location.join(&file.filename);
                fs_util::copy_file_atomic(source.as_std_path(), destination.as_std_path())?;
                tracing::debug!(%source, %destination, "copied from previous run");
                TransferAction::Copied
            }
            Reconciliation::Download if simulate => TransferAction::Simulated,
            Reconciliation::Download => {
                match self.transfer.download(&file.url, destination.as_std_path()) {
                    Ok(bytes) => {
                        tracing::info!(%portal, file = %file.filename, bytes, "downloaded");
                        TransferAction::Downloaded
                    }
                    Err(err) => {
                        tracing::warn!(%portal, file = %file.filename, error = %err, "could not download");
                        TransferAction::Failed
                    }
                }
            }
        };
        Ok(action)
    }
}

fn missing_categories(selection: &PortalSelection) -> String {
    match (&selection.assembly, &selection.annotation) {
        (None, None) => "assembly and gff".to_string(),
        (None, Some(_)) => "assembly".to_string(),
        (Some(_), None) => "gff".to_string(),
        (Some(_), Some(_)) => String::new(),
    }
}

fn render_download_list(plan: &Plan) -> String {
    let mut out = String::new();
    for planned in &plan.portals {
        out.push_str(&format!("{} ({})\n", planned.portal.id, planned.portal.name));
        out.push_str(&format!(
            "Assembly:\t{}\n",
            filename_or_blank(&planned.selection.assembly)
        ));
        out.push_str(&format!(
            "GFF:\t\t{}\n\n",
            filename_or_blank(&planned.selection.annotation)
        ));
    }
    out
}

fn filename_or_blank(file: &Option<CandidateFile>) -> &str {
    file.as_ref().map(|file| file.filename.as_str()).unwrap_or("")
}

fn render_date(timestamp: Timestamp) -> String {
    if timestamp == unknown_timestamp() {
        "unknown".to_string()
    } else {
        timestamp.format("%Y-%m-%d").to_string()
    }
}

/// Every annotation file seen per portal, sorted by portal; `(SKIPPED)` marks
/// rejected files and `*` the chosen one.
fn render_candidates(plan: &Plan, listing: &FileListing) -> String {
    let mut planned = plan.portals.iter().collect::<Vec<_>>();
    planned.sort_by(|a, b| a.portal.id.cmp(&b.portal.id));

    let mut out = String::new();
    for item in planned {
        let Some(files) = listing.files(&item.portal.id) else {
            continue;
        };
        if files.annotations.is_empty() {
            continue;
        }
        out.push_str(&format!("{} ({})\n", item.portal.id, item.portal.name));
        out.push_str(&format!("\t{}\n", item.relative_path));
        let chosen = item
            .selection
            .annotation
            .as_ref()
            .map(|file| file.filename.as_str());
        for file in &files.annotations {
            out.push_str(&format!(
                "\t{}\t{}",
                render_date(file.timestamp),
                file.filename
            ));
            if item.annotation_report.is_rejected(&file.filename) {
                out.push_str(" (SKIPPED)");
            }
            if chosen == Some(file.filename.as_str()) {
                out.push_str(" *");
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

fn write_text(path: &Utf8Path, content: &str) -> Result<(), MycoError> {
    fs::write(path.as_std_path(), content)
        .map_err(|err| MycoError::Filesystem(format!("write {path}: {err}")))
}
