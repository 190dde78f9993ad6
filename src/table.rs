use std::collections::HashSet;

use camino::Utf8Path;
use serde::Serialize;

use crate::acquire::AcquiredRecord;
use crate::domain::{ResolvedRecord, SourceId};
use crate::error::AfError;

/// Reads the `column` values of a CSV file, de-duplicated in first-seen order.
/// Blank cells are skipped, malformed ones are logged and skipped.
pub fn read_source_ids(path: &Utf8Path, column: &str) -> Result<Vec<SourceId>, AfError> {
    let read_err = |message: String| AfError::InputRead {
        path: path.as_std_path().to_path_buf(),
        message,
    };
    let mut reader = csv::Reader::from_path(path.as_std_path())
        .map_err(|err| read_err(err.to_string()))?;
    let index = reader
        .headers()
        .map_err(|err| read_err(err.to_string()))?
        .iter()
        .position(|header| header.trim() == column)
        .ok_or_else(|| AfError::MissingColumn {
            path: path.as_std_path().to_path_buf(),
            column: column.to_string(),
        })?;

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| read_err(err.to_string()))?;
        let Some(cell) = record.get(index) else {
            continue;
        };
        if cell.trim().is_empty() {
            continue;
        }
        let id: SourceId = match cell.parse() {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(
                    %path,
                    line = record.position().map(|pos| pos.line()),
                    error = %err,
                    "skipping malformed identifier"
                );
                continue;
            }
        };
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }
    Ok(ids)
}

#[derive(Debug, Serialize)]
struct ResolvedRow<'a> {
    uniprot_id_source: &'a str,
    uniprot_id_match: Option<&'a str>,
    af_db_id: Option<&'a str>,
    first_residue_index: Option<i64>,
    last_residue_index: Option<i64>,
    latest_version: Option<&'a str>,
}

impl<'a> From<&'a ResolvedRecord> for ResolvedRow<'a> {
    fn from(record: &'a ResolvedRecord) -> Self {
        Self {
            uniprot_id_source: record.source_id().as_str(),
            uniprot_id_match: record.matched_id(),
            af_db_id: record.external_id(),
            first_residue_index: record.range_start(),
            last_residue_index: record.range_end(),
            latest_version: record.version(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AcquiredRow<'a> {
    uniprot_id_source: &'a str,
    uniprot_id_match: Option<&'a str>,
    af_db_id: Option<&'a str>,
    first_residue_index: Option<i64>,
    last_residue_index: Option<i64>,
    latest_version: Option<&'a str>,
    pdb_path: Option<&'a str>,
}

impl<'a> From<&'a AcquiredRecord> for AcquiredRow<'a> {
    fn from(item: &'a AcquiredRecord) -> Self {
        let resolved = ResolvedRow::from(&item.record);
        Self {
            uniprot_id_source: resolved.uniprot_id_source,
            uniprot_id_match: resolved.uniprot_id_match,
            af_db_id: resolved.af_db_id,
            first_residue_index: resolved.first_residue_index,
            last_residue_index: resolved.last_residue_index,
            latest_version: resolved.latest_version,
            pdb_path: item.file_path.as_deref().map(Utf8Path::as_str),
        }
    }
}

#[derive(Debug, Serialize)]
struct GuessedRow<'a> {
    uniprot_id_source: &'a str,
    af_db_id_guess: Option<&'a str>,
    latest_version_guess: Option<&'a str>,
    pdb_path: Option<&'a str>,
}

/// Resolver output: source, match, AlphaFold id, residue range, version.
pub fn write_resolved(path: &Utf8Path, records: &[ResolvedRecord]) -> Result<(), AfError> {
    write_rows(path, records.iter().map(ResolvedRow::from))
}

/// Final output: resolver columns plus the acquired file path.
pub fn write_acquired(path: &Utf8Path, records: &[AcquiredRecord]) -> Result<(), AfError> {
    write_rows(path, records.iter().map(AcquiredRow::from))
}

/// Guess-mode output; the AlphaFold id column is named as a guess.
pub fn write_guessed(path: &Utf8Path, records: &[AcquiredRecord]) -> Result<(), AfError> {
    write_rows(
        path,
        records.iter().map(|item| GuessedRow {
            uniprot_id_source: item.record.source_id().as_str(),
            af_db_id_guess: item.record.external_id(),
            latest_version_guess: item.record.version(),
            pdb_path: item.file_path.as_deref().map(Utf8Path::as_str),
        }),
    )
}

fn write_rows<T: Serialize>(
    path: &Utf8Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), AfError> {
    let write_err = |message: String| AfError::TableWrite {
        path: path.as_std_path().to_path_buf(),
        message,
    };
    let mut writer =
        csv::Writer::from_path(path.as_std_path()).map_err(|err| write_err(err.to_string()))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| write_err(err.to_string()))?;
    }
    writer.flush().map_err(|err| write_err(err.to_string()))?;
    Ok(())
}
