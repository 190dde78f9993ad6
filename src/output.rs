use std::io::{self, Write};

use serde::Serialize;

use crate::app::{FetchOneResult, ProgressEvent, ProgressSink, RunSummary};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(result: &RunSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_fetch_one(result: &FetchOneResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// Progress goes to the log so stdout stays pure JSON.
impl ProgressSink for JsonOutput {
    fn event(&self, event: ProgressEvent) {
        tracing::info!(elapsed_ms = event.elapsed.map(|d| d.as_millis() as u64), "{}", event.message);
    }
}

/// Plain-text progress on stderr and a short summary on stdout.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_summary(result: &RunSummary) {
        println!("run: {} ({:?})", result.run_name, result.mode);
        println!("  identifiers:   {}", result.identifiers);
        if let (Some(matches), Some(no_match)) = (result.store_matches, result.no_match) {
            println!("  store matches: {matches}");
            println!("  no match:      {no_match}");
        }
        println!("  files found:   {}", result.files_found);
        println!("  files missing: {}", result.files_missing);
        println!(
            "    present={} cache={} download={} missing={} failed={}",
            result.actions.present,
            result.actions.cache,
            result.actions.download,
            result.actions.missing,
            result.actions.failed
        );
        if let Some(path) = &result.resolver_table {
            println!("  resolver table: {path}");
        }
        println!("  final table:    {}", result.final_table);
        println!("  structures:     {}", result.pdb_dir);
    }

    pub fn print_fetch_one(result: &FetchOneResult) {
        match &result.pdb_path {
            Some(path) => println!("{} ({}) -> {path}", result.uniprot_id, result.af_db_id),
            None => println!(
                "{} ({}) not available ({:?})",
                result.uniprot_id, result.af_db_id, result.action
            ),
        }
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({} ms)", event.message, elapsed.as_millis()),
            None => eprintln!("{}", event.message),
        }
    }
}
