use std::io::{self, Write};

use serde::Serialize;

use crate::pipeline::{ProgressEvent, ProgressSink, SearchSummary};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        let cyan = "\x1b[36m";
        let reset = "\x1b[0m";
        match event.elapsed {
            Some(elapsed) => eprintln!(
                "{cyan}[{:>6.1}s]{reset} {}",
                elapsed.as_secs_f64(),
                event.message
            ),
            None => eprintln!("{cyan}[   ...]{reset} {}", event.message),
        }
    }
}

impl ConsoleOutput {
    pub fn print_search_summary(summary: &SearchSummary) {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let reset = "\x1b[0m";

        println!("{cyan}KIRA-FS search summary{reset}");
        println!("{green}ticket: {} ({}){reset}", summary.ticket, summary.mode);
        println!("{green}results: {}{reset}", summary.archive_path);
        println!(
            "{green}uncharacterized entries: {} -> {}{reset}",
            summary.hit_count, summary.hits_path
        );
        match (&summary.seed_accession, &summary.seed_path) {
            (Some(seed), Some(path)) => println!("{green}seed accession: {seed} -> {path}{reset}"),
            _ => println!("{yellow}warning: no UniProt accessions extracted for seed{reset}"),
        }
    }

    pub fn print_value<T: Serialize>(label: &str, value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        println!("\x1b[36m{label}\x1b[0m\n{json}");
        Ok(())
    }
}
