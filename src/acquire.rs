use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::alphafold::{AlphaFoldClient, download_to_path};
use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::ResolvedRecord;
use crate::error::AfError;
use crate::layout::{copy_file_atomic, ensure_dir, list_files};
use crate::table;

/// Which tier satisfied a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AcquireAction {
    /// Canonical file already in the target directory.
    Present,
    /// Copied from a local cache directory.
    Cache,
    /// Fetched from the remote host.
    Download,
    /// Remote existence check did not succeed.
    Missing,
    /// No AlphaFold id for this record.
    NoMatch,
    /// Per-record error; see the log.
    Failed,
}

#[derive(Debug, Clone)]
pub struct AcquiredRecord {
    pub record: ResolvedRecord,
    pub file_path: Option<Utf8PathBuf>,
    pub action: AcquireAction,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcquireOptions {
    pub verbose: bool,
}

/// File listing of the local cache directories, taken once per acquisition pass.
#[derive(Debug, Clone, Default)]
pub struct CacheIndex {
    files: Vec<Utf8PathBuf>,
}

impl CacheIndex {
    /// Directories are kept in the given order; files within one are sorted.
    pub fn scan(dirs: &[Utf8PathBuf]) -> Result<Self, AfError> {
        let mut files = Vec::new();
        for dir in dirs {
            files.extend(list_files(dir)?);
        }
        Ok(Self { files })
    }

    /// First cached file whose name contains `file_name`.
    ///
    /// This is a substring match so compressed or prefixed copies are found.
    /// It can also pick an unrelated file that happens to embed the name.
    pub fn find(&self, file_name: &str) -> Option<&Utf8Path> {
        self.files
            .iter()
            .find(|path| path.file_name().is_some_and(|name| name.contains(file_name)))
            .map(Utf8PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Makes each matched record's structure available in `target_dir`: reuse a
/// file already there, else copy from the cache, else fetch it remotely after
/// an existence check. Per-record failures leave `file_path` empty.
pub fn acquire<C: AlphaFoldClient + ?Sized>(
    records: Vec<ResolvedRecord>,
    target_dir: &Utf8Path,
    cache_dirs: &[Utf8PathBuf],
    client: &C,
    options: AcquireOptions,
    sink: &dyn ProgressSink,
) -> Result<Vec<AcquiredRecord>, AfError> {
    ensure_dir(target_dir)?;
    let cache = CacheIndex::scan(cache_dirs)?;
    tracing::debug!(cached_files = cache.len(), "scanned local structure caches");

    let acquirer = Acquirer {
        target_dir,
        cache: &cache,
        client,
        options,
        sink,
    };
    Ok(records
        .into_iter()
        .map(|record| acquirer.acquire_one(record))
        .collect())
}

/// Runs [`acquire`] and, when `output` is given, writes the final table there.
pub fn acquire_and_save<C: AlphaFoldClient + ?Sized>(
    records: Vec<ResolvedRecord>,
    target_dir: &Utf8Path,
    cache_dirs: &[Utf8PathBuf],
    client: &C,
    options: AcquireOptions,
    sink: &dyn ProgressSink,
    output: Option<&Utf8Path>,
) -> Result<Vec<AcquiredRecord>, AfError> {
    let acquired = acquire(records, target_dir, cache_dirs, client, options, sink)?;
    if let Some(output) = output {
        table::write_acquired(output, &acquired)?;
    }
    Ok(acquired)
}

struct Acquirer<'a, C: AlphaFoldClient + ?Sized> {
    target_dir: &'a Utf8Path,
    cache: &'a CacheIndex,
    client: &'a C,
    options: AcquireOptions,
    sink: &'a dyn ProgressSink,
}

impl<C: AlphaFoldClient + ?Sized> Acquirer<'_, C> {
    fn acquire_one(&self, record: ResolvedRecord) -> AcquiredRecord {
        let source = record.source_id().clone();
        let file_name = match record.file_name() {
            None => {
                self.note(format!("{source} has no AlphaFold match"));
                return done(record, None, AcquireAction::NoMatch);
            }
            Some(Err(err)) => {
                tracing::warn!(%source, error = %err, "skipping record");
                return done(record, None, AcquireAction::Failed);
            }
            Some(Ok(file_name)) => file_name,
        };
        let target = self.target_dir.join(&file_name);

        if target.as_std_path().is_file() {
            self.note(format!(
                "{source} (AF: {file_name}) already present in {}, skipping",
                self.target_dir
            ));
            return done(record, Some(target), AcquireAction::Present);
        }

        if let Some(cached) = self.cache.find(&file_name) {
            self.note(format!(
                "{source} (AF: {file_name}) found locally, copying {cached} to {target}"
            ));
            return match copy_file_atomic(cached, &target) {
                Ok(()) => done(record, Some(target), AcquireAction::Cache),
                Err(err) => {
                    tracing::warn!(%source, error = %err, "cache copy failed");
                    done(record, None, AcquireAction::Failed)
                }
            };
        }

        self.note(format!(
            "{source} (AF: {file_name}) not found locally, checking {}",
            self.client.structure_url(&file_name)
        ));
        match self.fetch(&file_name, &target) {
            Ok(true) => done(record, Some(target), AcquireAction::Download),
            Ok(false) => {
                self.note(format!("{source} (AF: {file_name}) not available remotely"));
                done(record, None, AcquireAction::Missing)
            }
            Err(err) => {
                tracing::warn!(%source, error = %err, "remote fetch failed");
                done(record, None, AcquireAction::Failed)
            }
        }
    }

    fn fetch(&self, file_name: &str, target: &Utf8Path) -> Result<bool, AfError> {
        if !self.client.structure_exists(file_name)? {
            return Ok(false);
        }
        let start = Instant::now();
        let bytes = download_to_path(self.client, file_name, target.as_std_path())?;
        self.note_timed(
            format!("alphafold.response file={file_name} bytes={bytes}"),
            Some(start.elapsed()),
        );
        Ok(true)
    }

    fn note(&self, message: String) {
        self.note_timed(message, None);
    }

    /// Per-record lines are only emitted in verbose mode.
    fn note_timed(&self, message: String, elapsed: Option<Duration>) {
        if self.options.verbose {
            self.sink.event(ProgressEvent { message, elapsed });
        }
    }
}

fn done(
    record: ResolvedRecord,
    file_path: Option<Utf8PathBuf>,
    action: AcquireAction,
) -> AcquiredRecord {
    AcquiredRecord {
        record,
        file_path,
        action,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn cache_lookup_is_substring_and_ordered() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let first = root.join("first");
        let second = root.join("second");
        fs::create_dir_all(first.as_std_path()).unwrap();
        fs::create_dir_all(second.as_std_path()).unwrap();
        fs::write(second.join("AF-P1-F1-model_v4.pdb").as_std_path(), b"b").unwrap();
        fs::write(first.join("AF-P1-F1-model_v4.pdb.gz").as_std_path(), b"a").unwrap();

        let index = CacheIndex::scan(&[first.clone(), second]).unwrap();
        assert_eq!(index.len(), 2);
        let hit = index.find("AF-P1-F1-model_v4.pdb").unwrap();
        assert_eq!(hit, first.join("AF-P1-F1-model_v4.pdb.gz"));
        assert!(index.find("AF-P2-F1-model_v4.pdb").is_none());
    }

    #[test]
    fn missing_cache_dir_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        assert!(CacheIndex::scan(&[root.join("absent")]).is_err());
    }
}
