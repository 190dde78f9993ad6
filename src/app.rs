use std::time::{Duration, Instant};

use serde::Serialize;

use crate::accession_db::AccessionStore;
use crate::acquire::{self, AcquireAction, AcquireOptions, AcquiredRecord};
use crate::alphafold::AlphaFoldClient;
use crate::config::RunConfig;
use crate::domain::{AccessionRow, ResolvedRecord, SourceId};
use crate::error::AfError;
use crate::layout::{RunLayout, ensure_absent};
use crate::resolver::{self, ResolveOptions};
use crate::table;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Per-record diagnostic lines through the progress sink.
    pub verbose: bool,
    /// Allow replacing an existing resolver table.
    pub overwrite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Verified,
    Guess,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionCounts {
    pub present: usize,
    pub cache: usize,
    pub download: usize,
    pub missing: usize,
    pub no_match: usize,
    pub failed: usize,
}

impl ActionCounts {
    fn tally(items: &[AcquiredRecord]) -> Self {
        let mut counts = Self::default();
        for item in items {
            let slot = match item.action {
                AcquireAction::Present => &mut counts.present,
                AcquireAction::Cache => &mut counts.cache,
                AcquireAction::Download => &mut counts.download,
                AcquireAction::Missing => &mut counts.missing,
                AcquireAction::NoMatch => &mut counts.no_match,
                AcquireAction::Failed => &mut counts.failed,
            };
            *slot += 1;
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: RunMode,
    pub run_name: String,
    pub identifiers: usize,
    /// `None` in guess mode, where the store is never consulted.
    pub store_matches: Option<usize>,
    pub no_match: Option<usize>,
    pub files_found: usize,
    pub files_missing: usize,
    pub actions: ActionCounts,
    pub resolver_table: Option<String>,
    pub final_table: String,
    pub pdb_dir: String,
    pub finished_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchOneResult {
    pub uniprot_id: String,
    pub af_db_id: String,
    pub action: AcquireAction,
    pub pdb_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Runs the resolve-then-acquire pipeline for one run configuration.
pub struct App<C: AlphaFoldClient> {
    config: RunConfig,
    layout: RunLayout,
    client: C,
}

impl<C: AlphaFoldClient> App<C> {
    pub fn new(config: RunConfig, client: C) -> Self {
        let layout = RunLayout::new(&config);
        Self {
            config,
            layout,
            client,
        }
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Verified mode: look every identifier up in the accession database,
    /// then acquire the matched structures.
    ///
    /// `open_store` is only called once the output precondition holds, and the
    /// handle is dropped before acquisition starts.
    pub fn run_verified<S, F>(
        &self,
        open_store: F,
        options: RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, AfError>
    where
        S: AccessionStore,
        F: FnOnce() -> Result<S, AfError>,
    {
        let resolver_csv = self.layout.resolver_csv();
        if !options.overwrite {
            ensure_absent(&resolver_csv)?;
        }
        let ids = table::read_source_ids(self.config.require_input()?, &self.config.id_column)?;

        sink.event(ProgressEvent {
            message: format!("phase=Resolve; {} identifiers", ids.len()),
            elapsed: None,
        });
        let start = Instant::now();
        let records = {
            let store = open_store()?;
            resolver::resolve(
                &ids,
                &store,
                ResolveOptions {
                    verbose: options.verbose,
                },
                sink,
            )?
        };
        let matches = records.iter().filter(|record| record.is_match()).count();
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; run={} matches={} no_match={}",
                records.len(),
                matches,
                records.len() - matches
            ),
            elapsed: Some(start.elapsed()),
        });

        self.layout.ensure_run_dir()?;
        table::write_resolved(&resolver_csv, &records)?;

        let final_csv = self.layout.final_csv();
        let acquired = self.acquire_phase(records, options, sink, |items| {
            table::write_acquired(&final_csv, items)
        })?;

        Ok(self.summarize(
            RunMode::Verified,
            &acquired,
            Some(matches),
            Some(resolver_csv.to_string()),
            final_csv.to_string(),
        ))
    }

    /// Guess mode: assume `AF-{id}-F1` at the configured version for every
    /// identifier and let the remote existence check decide.
    pub fn run_guess(
        &self,
        options: RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, AfError> {
        let ids = table::read_source_ids(self.config.require_input()?, &self.config.id_column)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Guess; {} identifiers at version {}",
                ids.len(),
                self.config.guess_version
            ),
            elapsed: None,
        });
        let records = ids
            .into_iter()
            .map(|id| ResolvedRecord::guessed(id, self.config.guess_version))
            .collect::<Vec<_>>();

        self.layout.ensure_run_dir()?;
        let guess_csv = self.layout.guess_csv();
        let acquired = self.acquire_phase(records, options, sink, |items| {
            table::write_guessed(&guess_csv, items)
        })?;

        Ok(self.summarize(
            RunMode::Guess,
            &acquired,
            None,
            None,
            guess_csv.to_string(),
        ))
    }

    /// Acquire a single structure whose AlphaFold id and version are known.
    pub fn fetch_one(
        &self,
        uniprot_id: SourceId,
        af_db_id: &str,
        version: u32,
        options: RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchOneResult, AfError> {
        let row = AccessionRow {
            key: uniprot_id.as_str().to_string(),
            range_start: None,
            range_end: None,
            external_id: af_db_id.to_string(),
            version: Some(version.to_string()),
        };
        let record = ResolvedRecord::matched(uniprot_id, &row);
        let mut acquired = acquire::acquire(
            vec![record],
            &self.layout.pdb_dir(),
            &self.config.local_pdb_dirs,
            &self.client,
            AcquireOptions {
                verbose: options.verbose,
            },
            sink,
        )?;
        let item = acquired
            .pop()
            .ok_or_else(|| AfError::Filesystem("acquisition returned no record".to_string()))?;
        Ok(FetchOneResult {
            uniprot_id: item.record.source_id().to_string(),
            af_db_id: af_db_id.to_string(),
            action: item.action,
            pdb_path: item.file_path.map(|path| path.to_string()),
        })
    }

    fn acquire_phase<W>(
        &self,
        records: Vec<ResolvedRecord>,
        options: RunOptions,
        sink: &dyn ProgressSink,
        write_table: W,
    ) -> Result<Vec<AcquiredRecord>, AfError>
    where
        W: FnOnce(&[AcquiredRecord]) -> Result<(), AfError>,
    {
        sink.event(ProgressEvent {
            message: format!("phase=Acquire; {} records", records.len()),
            elapsed: None,
        });
        let start = Instant::now();
        let acquired = acquire::acquire(
            records,
            &self.layout.pdb_dir(),
            &self.config.local_pdb_dirs,
            &self.client,
            AcquireOptions {
                verbose: options.verbose,
            },
            sink,
        )?;
        write_table(&acquired)?;

        let (found, missing) = found_and_missing(&acquired);
        sink.event(ProgressEvent {
            message: format!("phase=Acquire; files_found={found} files_missing={missing}"),
            elapsed: Some(start.elapsed()),
        });
        Ok(acquired)
    }

    fn summarize(
        &self,
        mode: RunMode,
        acquired: &[AcquiredRecord],
        store_matches: Option<usize>,
        resolver_table: Option<String>,
        final_table: String,
    ) -> RunSummary {
        let (files_found, files_missing) = found_and_missing(acquired);
        RunSummary {
            mode,
            run_name: self.config.run_name.clone(),
            identifiers: acquired.len(),
            store_matches,
            no_match: store_matches.map(|matches| acquired.len() - matches),
            files_found,
            files_missing,
            actions: ActionCounts::tally(acquired),
            resolver_table,
            final_table,
            pdb_dir: self.layout.pdb_dir().to_string(),
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Files on disk vs. matched records left without one.
fn found_and_missing(acquired: &[AcquiredRecord]) -> (usize, usize) {
    let found = acquired
        .iter()
        .filter(|item| item.file_path.is_some())
        .count();
    let missing = acquired
        .iter()
        .filter(|item| item.file_path.is_none() && item.record.is_match())
        .count();
    (found, missing)
}
