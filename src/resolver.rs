use std::collections::{BTreeSet, HashMap};

use crate::accession_db::AccessionStore;
use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{AccessionRow, ResolvedRecord, SourceId};
use crate::error::AfError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Emit one diagnostic line per record through the progress sink.
    pub verbose: bool,
}

/// Looks every source id up with a single store query, falling back to the
/// isoform-stripped accession for suffixed ids. Output order matches input.
pub fn resolve<S: AccessionStore + ?Sized>(
    source_ids: &[SourceId],
    store: &S,
    options: ResolveOptions,
    sink: &dyn ProgressSink,
) -> Result<Vec<ResolvedRecord>, AfError> {
    let keys = extended_keys(source_ids);
    let rows = store.lookup_many(&keys)?;
    // Long proteins have one row per fragment; the first row (F1) wins.
    let mut by_key: HashMap<&str, &AccessionRow> = HashMap::with_capacity(rows.len());
    for row in &rows {
        by_key.entry(row.key.as_str()).or_insert(row);
    }

    let records = source_ids
        .iter()
        .map(|id| {
            let hit = by_key
                .get(id.as_str())
                .or_else(|| id.normalized().and_then(|reduced| by_key.get(reduced)));
            match hit {
                Some(row) => ResolvedRecord::matched(id.clone(), row),
                None => ResolvedRecord::unmatched(id.clone()),
            }
        })
        .collect::<Vec<_>>();

    if options.verbose {
        for record in &records {
            sink.event(ProgressEvent {
                message: record.diagnostic_line(),
                elapsed: None,
            });
        }
    }

    Ok(records)
}

/// Source ids plus the reduced form of every suffixed id, de-duplicated.
pub fn extended_keys(source_ids: &[SourceId]) -> Vec<String> {
    source_ids
        .iter()
        .flat_map(|id| std::iter::once(id.as_str()).chain(id.normalized()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct MemoryStore {
        rows: Vec<AccessionRow>,
        queries: Mutex<Vec<Vec<String>>>,
    }

    impl MemoryStore {
        fn with_keys(keys: &[&str]) -> Self {
            let rows = keys
                .iter()
                .map(|key| AccessionRow {
                    key: key.to_string(),
                    range_start: Some(1),
                    range_end: Some(100),
                    external_id: format!("AF-{key}-F1"),
                    version: Some("4".to_string()),
                })
                .collect();
            Self {
                rows,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    impl AccessionStore for MemoryStore {
        fn lookup_many(&self, keys: &[String]) -> Result<Vec<AccessionRow>, AfError> {
            self.queries.lock().unwrap().push(keys.to_vec());
            Ok(self
                .rows
                .iter()
                .filter(|row| keys.contains(&row.key))
                .cloned()
                .collect())
        }
    }

    struct Collect(Mutex<Vec<String>>);

    impl ProgressSink for Collect {
        fn event(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event.message);
        }
    }

    fn ids(values: &[&str]) -> Vec<SourceId> {
        values.iter().map(|value| value.parse().unwrap()).collect()
    }

    #[test]
    fn exact_and_fallback_matches() {
        let store = MemoryStore::with_keys(&["P1", "P2"]);
        let sink = Collect(Mutex::new(Vec::new()));
        let records = resolve(
            &ids(&["P1", "P2-3"]),
            &store,
            ResolveOptions::default(),
            &sink,
        )
        .unwrap();

        assert_eq!(records[0].matched_id(), Some("P1"));
        assert_eq!(records[1].source_id().as_str(), "P2-3");
        assert_eq!(records[1].matched_id(), Some("P2"));
        assert_eq!(records[1].external_id(), Some("AF-P2-F1"));
    }

    #[test]
    fn suffixed_id_prefers_its_own_row() {
        let store = MemoryStore::with_keys(&["P2", "P2-3"]);
        let sink = Collect(Mutex::new(Vec::new()));
        let records =
            resolve(&ids(&["P2-3"]), &store, ResolveOptions::default(), &sink).unwrap();
        assert_eq!(records[0].matched_id(), Some("P2-3"));
    }

    #[test]
    fn single_query_with_extended_keys() {
        let store = MemoryStore::with_keys(&["P1"]);
        let sink = Collect(Mutex::new(Vec::new()));
        resolve(
            &ids(&["P1", "Q5-2", "Q5-4"]),
            &store,
            ResolveOptions::default(),
            &sink,
        )
        .unwrap();

        let queries = store.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0], vec!["P1", "Q5", "Q5-2", "Q5-4"]);
    }

    #[test]
    fn unknown_ids_and_duplicates_keep_order() {
        let store = MemoryStore::with_keys(&["P1"]);
        let sink = Collect(Mutex::new(Vec::new()));
        let records = resolve(
            &ids(&["X9", "P1", "X9"]),
            &store,
            ResolveOptions { verbose: true },
            &sink,
        )
        .unwrap();

        assert_eq!(records.len(), 3);
        assert!(!records[0].is_match());
        assert_eq!(records[0].range_start(), None);
        assert_eq!(records[0].version(), None);
        assert!(records[1].is_match());
        assert_eq!(records[2].source_id().as_str(), "X9");

        let lines = sink.0.lock().unwrap();
        assert_eq!(lines[0], "X9, NA, NA, NA, NA, NA");
        assert_eq!(lines[1], "P1, P1, AF-P1-F1, 1, 100, 4");
    }

    #[test]
    fn first_fragment_row_wins() {
        let store = MemoryStore {
            rows: ["AF-Q8WZ42-F1", "AF-Q8WZ42-F2", "AF-Q8WZ42-F3"]
                .iter()
                .map(|af_id| AccessionRow {
                    key: "Q8WZ42".to_string(),
                    range_start: Some(1),
                    range_end: Some(1400),
                    external_id: af_id.to_string(),
                    version: Some("4".to_string()),
                })
                .collect(),
            queries: Mutex::new(Vec::new()),
        };
        let sink = Collect(Mutex::new(Vec::new()));
        let records = resolve(
            &ids(&["Q8WZ42", "Q8WZ42-2"]),
            &store,
            ResolveOptions::default(),
            &sink,
        )
        .unwrap();

        assert_eq!(records[0].external_id(), Some("AF-Q8WZ42-F1"));
        assert_eq!(records[1].external_id(), Some("AF-Q8WZ42-F1"));
    }

    #[test]
    fn quiet_mode_emits_nothing() {
        let store = MemoryStore::with_keys(&["P1"]);
        let sink = Collect(Mutex::new(Vec::new()));
        resolve(&ids(&["P1"]), &store, ResolveOptions::default(), &sink).unwrap();
        assert!(sink.0.lock().unwrap().is_empty());
    }
}
