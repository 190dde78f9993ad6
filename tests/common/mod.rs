#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use rusqlite::Connection;

use kira_alphafold::alphafold::AlphaFoldClient;
use kira_alphafold::app::{ProgressEvent, ProgressSink};
use kira_alphafold::error::AfError;

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Default)]
pub struct CollectSink {
    pub messages: Mutex<Vec<String>>,
}

impl ProgressSink for CollectSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

/// In-memory AlphaFold host counting every request it receives.
#[derive(Default)]
pub struct MockAlphaFold {
    pub files: HashMap<String, Vec<u8>>,
    pub fail_transfers: bool,
    pub fail_existence_checks: bool,
    pub head_calls: Mutex<usize>,
    pub get_calls: Mutex<usize>,
}

impl MockAlphaFold {
    pub fn with_files(names: &[&str]) -> Self {
        Self {
            files: names
                .iter()
                .map(|name| (name.to_string(), format!("MODEL {name}\n").into_bytes()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn network_calls(&self) -> usize {
        *self.head_calls.lock().unwrap() + *self.get_calls.lock().unwrap()
    }
}

impl AlphaFoldClient for MockAlphaFold {
    fn structure_url(&self, file_name: &str) -> String {
        format!("https://alphafold.test/files/{file_name}")
    }

    fn structure_exists(&self, file_name: &str) -> Result<bool, AfError> {
        *self.head_calls.lock().unwrap() += 1;
        if self.fail_existence_checks {
            return Err(AfError::FetchFailed {
                url: self.structure_url(file_name),
                message: "dns error".to_string(),
            });
        }
        Ok(self.files.contains_key(file_name))
    }

    fn download_structure(
        &self,
        file_name: &str,
        destination: &mut dyn Write,
    ) -> Result<u64, AfError> {
        *self.get_calls.lock().unwrap() += 1;
        if self.fail_transfers {
            return Err(AfError::FetchFailed {
                url: self.structure_url(file_name),
                message: "connection reset".to_string(),
            });
        }
        let body = self
            .files
            .get(file_name)
            .ok_or_else(|| AfError::AlphaFoldStatus {
                status: 404,
                url: self.structure_url(file_name),
            })?;
        destination
            .write_all(body)
            .map_err(|err| AfError::Filesystem(err.to_string()))?;
        Ok(body.len() as u64)
    }
}

pub fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

/// Writes an accession database shaped like AlphaFold's `accession_ids` export.
pub fn write_accession_db(path: &Utf8PathBuf, rows: &[(&str, i64, i64, &str, i64)]) {
    let conn = Connection::open(path.as_std_path()).unwrap();
    conn.execute_batch(
        "CREATE TABLE accession_ids (
            UniProtAccessionID TEXT PRIMARY KEY,
            firstResidueIndex INTEGER,
            lastResidueIndex INTEGER,
            AlphaFoldDBID TEXT,
            latestVersion INTEGER)",
    )
    .unwrap();
    for (key, first, last, af_id, version) in rows {
        conn.execute(
            "INSERT INTO accession_ids VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![key, first, last, af_id, version],
        )
        .unwrap();
    }
}
