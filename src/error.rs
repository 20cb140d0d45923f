use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MycoError {
    #[error("invalid portal id: {0:?}")]
    InvalidPortalId(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("malformed portal record: {0}")]
    MalformedPortal(String),

    #[error("malformed file listing row: {0}")]
    MalformedListing(String),

    #[error("override for portal {portal} names {filename}, which is not among its annotation files")]
    #[diagnostic(help("fix or remove the entry in the override table"))]
    OverrideMissing { portal: String, filename: String },

    #[error("{0} portal(s) skipped because of configuration errors")]
    ConfigurationErrors(usize),

    #[error("failed to read input file at {0}")]
    InputRead(PathBuf),

    #[error("failed to parse {path}: {message}")]
    InputParse { path: PathBuf, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("missing JGI credentials: set JGI_USERNAME and JGI_PASSWORD")]
    MissingCredentials,

    #[error("JGI sign-on failed: {0}")]
    Login(String),

    #[error("JGI request failed: {0}")]
    JgiHttp(String),

    #[error("JGI returned status {status}: {message}")]
    JgiStatus { status: u16, message: String },

    #[error("downloaded file is not a valid gzip stream: {0}")]
    CorruptDownload(PathBuf),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
