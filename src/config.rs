use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::Category;
use crate::error::MycoError;
use crate::policy::{SelectionPolicy, load_overrides};

pub const DEFAULT_CONFIG_FILE: &str = "mycocosm.json";
pub const DEFAULT_BASE_URL: &str = "https://genome.jgi.doe.gov";
pub const DEFAULT_SIGNON_URL: &str = "https://signon.jgi.doe.gov/signon/create";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub output_folder: Option<String>,
    #[serde(default)]
    pub use_restricted: Option<bool>,
    #[serde(default)]
    pub simulate: Option<bool>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub signon_url: Option<String>,
    #[serde(default)]
    pub transfer: Option<TransferEntry>,
    #[serde(default)]
    pub skip_files: Option<SkipFiles>,
    #[serde(default)]
    pub exclude_portals: Vec<String>,
    #[serde(default)]
    pub overrides: Option<OverrideEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TransferEntry {
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SkipFiles {
    #[serde(default)]
    pub assembly: Vec<String>,
    #[serde(default)]
    pub annotation: Vec<String>,
}

/// Either a path to a `portal<TAB>filename` table or the table itself.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OverrideEntry {
    Path(String),
    Inline(BTreeMap<String, String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSettings {
    pub retries: u32,
    pub timeout: Duration,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            retries: 5,
            timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub output_folder: Utf8PathBuf,
    pub use_restricted: bool,
    pub simulate: bool,
    pub base_url: String,
    pub signon_url: String,
    pub transfer: TransferSettings,
    pub skip_assemblies: Vec<String>,
    pub skip_annotations: Vec<String>,
    pub exclude_portals: Vec<String>,
    pub overrides: BTreeMap<String, String>,
}

impl ResolvedConfig {
    /// Built-in policy tables extended with everything configured here.
    pub fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::default()
            .with_skipped_files(Category::Assembly, self.skip_assemblies.iter().cloned())
            .with_skipped_files(Category::Annotation, self.skip_annotations.iter().cloned())
            .with_excluded_portals(self.exclude_portals.iter().cloned())
            .with_overrides(self.overrides.clone())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `mycocosm.json` from the working directory when it
    /// exists. No config file at all means defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, MycoError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default(), Path::new("."));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| MycoError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| MycoError::ConfigParse(err.to_string()))?;

        let base_dir = config_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Self::resolve_config(config, base_dir)
    }

    /// Relative override-table paths are taken relative to `base_dir`.
    pub fn resolve_config(config: Config, base_dir: &Path) -> Result<ResolvedConfig, MycoError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let transfer = config.transfer.unwrap_or_default();
        let defaults = TransferSettings::default();
        let skip_files = config.skip_files.unwrap_or_default();

        let overrides = match config.overrides {
            None => BTreeMap::new(),
            Some(OverrideEntry::Inline(table)) => table,
            Some(OverrideEntry::Path(path)) => load_overrides(&base_dir.join(path))?,
        };

        Ok(ResolvedConfig {
            schema_version,
            output_folder: Utf8PathBuf::from(
                config.output_folder.unwrap_or_else(|| "output".to_string()),
            ),
            use_restricted: config.use_restricted.unwrap_or(false),
            simulate: config.simulate.unwrap_or(false),
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            signon_url: config
                .signon_url
                .unwrap_or_else(|| DEFAULT_SIGNON_URL.to_string()),
            transfer: TransferSettings {
                retries: transfer.retries.unwrap_or(defaults.retries),
                timeout: transfer
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeout),
            },
            skip_assemblies: skip_files.assembly,
            skip_annotations: skip_files.annotation,
            exclude_portals: config.exclude_portals,
            overrides,
        })
    }
}
