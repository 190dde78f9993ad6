use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AfError {
    #[error("invalid UniProt identifier: {0:?}")]
    InvalidSourceId(String),

    #[error("missing config file kira-af.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("accession database unavailable: {0}")]
    #[diagnostic(help("check `store.path`, `store.table` and `store.key_column` in the run config"))]
    StoreUnavailable(String),

    #[error("output already exists: {0}")]
    #[diagnostic(help("remove the file, pick another run name, or pass --overwrite"))]
    OutputAlreadyExists(PathBuf),

    #[error("malformed version for {external_id}: {value:?}")]
    MalformedVersion { external_id: String, value: String },

    #[error("AlphaFold request failed: {0}")]
    AlphaFoldHttp(String),

    #[error("AlphaFold returned status {status} for {url}")]
    AlphaFoldStatus { status: u16, url: String },

    #[error("fetch of {url} failed: {message}")]
    FetchFailed { url: String, message: String },

    #[error("failed to read identifiers from {path}: {message}")]
    InputRead { path: PathBuf, message: String },

    #[error("identifier column {column:?} not found in {path}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("failed to write table {path}: {message}")]
    TableWrite { path: PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
