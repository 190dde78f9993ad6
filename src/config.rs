use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use camino::Utf8PathBuf;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AfError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-af.json";
pub const DEFAULT_REMOTE_BASE_URL: &str = "https://alphafold.ebi.ac.uk/files/";
pub const DEFAULT_ID_COLUMN: &str = "uniprot_id";
pub const DEFAULT_TABLE: &str = "accession_ids";
pub const DEFAULT_KEY_COLUMN: &str = "UniProtAccessionID";
pub const DEFAULT_GUESS_VERSION: u32 = 4;

static SQL_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"));

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub run_name: String,
    pub output_dir: String,
    #[serde(default)]
    pub input_csv: Option<String>,
    #[serde(default)]
    pub id_column: Option<String>,
    #[serde(default)]
    pub store: Option<StoreEntry>,
    #[serde(default)]
    pub remote_base_url: Option<String>,
    #[serde(default)]
    pub local_pdb_dirs: Vec<String>,
    #[serde(default)]
    pub guess_version: Option<u32>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreEntry {
    pub path: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub key_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub path: Utf8PathBuf,
    pub table: String,
    pub key_column: String,
}

/// Validated run configuration. Built once per run and only read afterwards.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub run_name: String,
    pub output_dir: Utf8PathBuf,
    pub input_csv: Option<Utf8PathBuf>,
    pub id_column: String,
    pub store: Option<StoreConfig>,
    pub remote_base_url: String,
    pub local_pdb_dirs: Vec<Utf8PathBuf>,
    pub guess_version: u32,
    pub request_timeout: Option<Duration>,
}

impl RunConfig {
    pub fn require_input(&self) -> Result<&Utf8PathBuf, AfError> {
        self.input_csv.as_ref().ok_or_else(|| AfError::InvalidConfig {
            key: "input_csv".to_string(),
            message: "required for this command".to_string(),
        })
    }

    pub fn require_store(&self) -> Result<&StoreConfig, AfError> {
        self.store.as_ref().ok_or_else(|| AfError::InvalidConfig {
            key: "store".to_string(),
            message: "required for this command".to_string(),
        })
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<RunConfig, AfError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(AfError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| AfError::ConfigRead(config_path.clone()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|err| AfError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<RunConfig, AfError> {
        let run_name = config.run_name.trim().to_string();
        if run_name.is_empty() || run_name.contains(['/', '\\']) {
            return Err(invalid("run_name", "must be a non-empty plain name"));
        }
        if config.output_dir.trim().is_empty() {
            return Err(invalid("output_dir", "must not be empty"));
        }

        let id_column = config
            .id_column
            .unwrap_or_else(|| DEFAULT_ID_COLUMN.to_string());
        if id_column.trim().is_empty() {
            return Err(invalid("id_column", "must not be empty"));
        }

        let store = config.store.map(resolve_store).transpose()?;

        let mut remote_base_url = config
            .remote_base_url
            .unwrap_or_else(|| DEFAULT_REMOTE_BASE_URL.to_string());
        if !(remote_base_url.starts_with("http://") || remote_base_url.starts_with("https://")) {
            return Err(invalid("remote_base_url", "must be an http(s) URL"));
        }
        if !remote_base_url.ends_with('/') {
            remote_base_url.push('/');
        }

        let request_timeout = match config.request_timeout_secs {
            Some(0) => return Err(invalid("request_timeout_secs", "must be positive")),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(RunConfig {
            run_name,
            output_dir: Utf8PathBuf::from(config.output_dir),
            input_csv: config.input_csv.map(Utf8PathBuf::from),
            id_column,
            store,
            remote_base_url,
            local_pdb_dirs: config
                .local_pdb_dirs
                .into_iter()
                .map(Utf8PathBuf::from)
                .collect(),
            guess_version: config.guess_version.unwrap_or(DEFAULT_GUESS_VERSION),
            request_timeout,
        })
    }
}

fn resolve_store(entry: StoreEntry) -> Result<StoreConfig, AfError> {
    let table = entry.table.unwrap_or_else(|| DEFAULT_TABLE.to_string());
    let key_column = entry
        .key_column
        .unwrap_or_else(|| DEFAULT_KEY_COLUMN.to_string());
    if !SQL_IDENT.is_match(&table) {
        return Err(invalid("store.table", "must be a plain SQL identifier"));
    }
    if !SQL_IDENT.is_match(&key_column) {
        return Err(invalid("store.key_column", "must be a plain SQL identifier"));
    }
    Ok(StoreConfig {
        path: Utf8PathBuf::from(entry.path),
        table,
        key_column,
    })
}

fn invalid(key: &str, message: &str) -> AfError {
    AfError::InvalidConfig {
        key: key.to_string(),
        message: message.to_string(),
    }
}
