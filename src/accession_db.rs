use std::rc::Rc;

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Row};

use crate::config::StoreConfig;
use crate::domain::AccessionRow;
use crate::error::AfError;

/// Key-value view of the AlphaFold accession database.
pub trait AccessionStore {
    /// Every row whose key is in `keys`, fetched in a single round trip.
    fn lookup_many(&self, keys: &[String]) -> Result<Vec<AccessionRow>, AfError>;
}

/// Read-only handle on the SQLite accession table shipped by AlphaFold DB
/// (`accession_ids.csv` imported as `(key, first, last, af_id, version)`).
pub struct SqliteAccessionStore {
    conn: Connection,
    query: String,
}

impl SqliteAccessionStore {
    pub fn open(config: &StoreConfig) -> Result<Self, AfError> {
        if !config.path.as_std_path().is_file() {
            return Err(AfError::StoreUnavailable(format!(
                "database file not found: {}",
                config.path
            )));
        }
        let conn = Connection::open_with_flags(
            config.path.as_std_path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(store_err)?;
        Self::from_connection(conn, &config.table, &config.key_column)
    }

    /// Table and column names must already be validated identifiers.
    pub fn from_connection(
        conn: Connection,
        table: &str,
        key_column: &str,
    ) -> Result<Self, AfError> {
        rusqlite::vtab::array::load_module(&conn).map_err(store_err)?;
        Ok(Self {
            conn,
            query: format!(r#"SELECT * FROM "{table}" WHERE "{key_column}" IN rarray(?1)"#),
        })
    }
}

impl AccessionStore for SqliteAccessionStore {
    fn lookup_many(&self, keys: &[String]) -> Result<Vec<AccessionRow>, AfError> {
        let values: Rc<Vec<Value>> = Rc::new(keys.iter().cloned().map(Value::from).collect());
        let mut stmt = self.conn.prepare(&self.query).map_err(store_err)?;
        let rows = stmt
            .query_map([values], read_row)
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                if row.is_none() {
                    tracing::warn!("skipping accession row without an AlphaFold id");
                }
                row
            })
            .collect())
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<Option<AccessionRow>> {
    let key = text_value(row.get::<_, Value>(0)?);
    let external_id = text_value(row.get::<_, Value>(3)?);
    let (Some(key), Some(external_id)) = (key, external_id) else {
        return Ok(None);
    };
    Ok(Some(AccessionRow {
        key,
        range_start: int_value(row.get::<_, Value>(1)?),
        range_end: int_value(row.get::<_, Value>(2)?),
        external_id,
        version: text_value(row.get::<_, Value>(4)?),
    }))
}

fn text_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(v) => Some(v.to_string()),
        Value::Real(v) => Some(v.to_string()),
        Value::Text(v) => Some(v),
        Value::Blob(v) => String::from_utf8(v).ok(),
    }
}

fn int_value(value: Value) -> Option<i64> {
    match value {
        Value::Integer(v) => Some(v),
        Value::Real(v) if v.fract() == 0.0 => Some(v as i64),
        Value::Text(v) => v.trim().parse().ok(),
        _ => None,
    }
}

fn store_err(err: rusqlite::Error) -> AfError {
    AfError::StoreUnavailable(err.to_string())
}
