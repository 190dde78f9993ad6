use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AfError;

const ISOFORM_SEPARATOR: char = '-';

/// UniProt accession exactly as the caller supplied it, isoform suffix included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accession without its `-N` isoform suffix, if it has one.
    pub fn normalized(&self) -> Option<&str> {
        normalize(&self.0)
    }

    /// AlphaFold DB naming convention for the first fragment of a UniProt entry.
    pub fn guess_external_id(&self) -> String {
        format!("AF-{}-F1", self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SourceId {
    type Err = AfError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(AfError::InvalidSourceId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Substring before the first `-`, or `None` when the id carries no suffix.
pub fn normalize(id: &str) -> Option<&str> {
    id.split_once(ISOFORM_SEPARATOR).map(|(head, _)| head)
}

/// One row of the accession database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessionRow {
    pub key: String,
    pub range_start: Option<i64>,
    pub range_end: Option<i64>,
    pub external_id: String,
    pub version: Option<String>,
}

/// Outcome of looking one source id up in the accession database.
///
/// `matched_id` and `external_id` are either both set or both empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    source_id: SourceId,
    matched_id: Option<String>,
    external_id: Option<String>,
    range_start: Option<i64>,
    range_end: Option<i64>,
    version: Option<String>,
}

impl ResolvedRecord {
    pub fn unmatched(source_id: SourceId) -> Self {
        Self {
            source_id,
            matched_id: None,
            external_id: None,
            range_start: None,
            range_end: None,
            version: None,
        }
    }

    pub fn matched(source_id: SourceId, row: &AccessionRow) -> Self {
        Self {
            source_id,
            matched_id: Some(row.key.clone()),
            external_id: Some(row.external_id.clone()),
            range_start: row.range_start,
            range_end: row.range_end,
            version: row.version.clone(),
        }
    }

    /// Record synthesized without a database lookup. The source id doubles as
    /// the matched id so the match/external-id pairing still holds.
    pub fn guessed(source_id: SourceId, version: u32) -> Self {
        Self {
            matched_id: Some(source_id.as_str().to_string()),
            external_id: Some(source_id.guess_external_id()),
            range_start: None,
            range_end: None,
            version: Some(version.to_string()),
            source_id,
        }
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    pub fn matched_id(&self) -> Option<&str> {
        self.matched_id.as_deref()
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn range_start(&self) -> Option<i64> {
        self.range_start
    }

    pub fn range_end(&self) -> Option<i64> {
        self.range_end
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn is_match(&self) -> bool {
        self.external_id.is_some()
    }

    /// Canonical structure file name, `None` when there is no match.
    pub fn file_name(&self) -> Option<Result<String, AfError>> {
        let external_id = self.external_id.as_deref()?;
        let version = self.version.as_deref().unwrap_or_default();
        Some(canonical_file_name(external_id, version))
    }

    /// Comma-joined field dump with `NA` for empty fields.
    pub fn diagnostic_line(&self) -> String {
        let fields = [
            Some(self.source_id.as_str().to_string()),
            self.matched_id.clone(),
            self.external_id.clone(),
            self.range_start.map(|value| value.to_string()),
            self.range_end.map(|value| value.to_string()),
            self.version.clone(),
        ];
        fields
            .into_iter()
            .map(|field| field.unwrap_or_else(|| "NA".to_string()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `{external_id}-model_v{version}.pdb`, with the version coerced to an integer.
pub fn canonical_file_name(external_id: &str, version: &str) -> Result<String, AfError> {
    let version = parse_version(version).ok_or_else(|| AfError::MalformedVersion {
        external_id: external_id.to_string(),
        value: version.to_string(),
    })?;
    Ok(format!("{external_id}-model_v{version}.pdb"))
}

/// Accepts integral values, including float renderings such as `4.0`.
pub fn parse_version(value: &str) -> Option<u32> {
    let trimmed = value.trim();
    if let Ok(version) = trimmed.parse::<u32>() {
        return Some(version);
    }
    let float = trimmed.parse::<f64>().ok()?;
    let is_integral = float.is_finite() && float.fract() == 0.0 && float >= 0.0;
    (is_integral && float <= f64::from(u32::MAX)).then(|| float as u32)
}
