use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::KiraError;

const UNCHARACTERIZED_MARKER: &str = "uncharacterized";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitCounts {
    pub characterized: usize,
    pub uncharacterized: usize,
}

pub fn split_by_header<R: BufRead, C: Write, U: Write>(
    reader: R,
    characterized: &mut C,
    uncharacterized: &mut U,
) -> Result<SplitCounts, KiraError> {
    let mut counts = SplitCounts::default();
    let mut record = String::new();
    let mut is_characterized = false;

    for line in reader.lines() {
        let line = line.map_err(|err| KiraError::Filesystem(err.to_string()))?;
        if line.starts_with('>') {
            flush_record(&record, is_characterized, characterized, uncharacterized)?;
            record.clear();
            is_characterized = !line.to_lowercase().contains(UNCHARACTERIZED_MARKER);
            if is_characterized {
                counts.characterized += 1;
            } else {
                counts.uncharacterized += 1;
            }
        }
        record.push_str(&line);
        record.push('\n');
    }
    flush_record(&record, is_characterized, characterized, uncharacterized)?;

    Ok(counts)
}

pub fn split_fasta_file(
    input: &Path,
    characterized: &Path,
    uncharacterized: &Path,
) -> Result<SplitCounts, KiraError> {
    let reader = File::open(input)
        .map(BufReader::new)
        .map_err(|err| KiraError::Filesystem(format!("open {}: {err}", input.display())))?;
    let mut char_out = create_writer(characterized)?;
    let mut unchar_out = create_writer(uncharacterized)?;
    let counts = split_by_header(reader, &mut char_out, &mut unchar_out)?;
    char_out
        .flush()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    unchar_out
        .flush()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    tracing::info!(
        characterized = counts.characterized,
        uncharacterized = counts.uncharacterized,
        "split FASTA records"
    );
    Ok(counts)
}

fn create_writer(path: &Path) -> Result<BufWriter<File>, KiraError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|err| KiraError::Filesystem(format!("create {}: {err}", path.display())))
}

fn flush_record<C: Write, U: Write>(
    record: &str,
    is_characterized: bool,
    characterized: &mut C,
    uncharacterized: &mut U,
) -> Result<(), KiraError> {
    if record.is_empty() {
        return Ok(());
    }
    let result = if is_characterized {
        characterized.write_all(record.as_bytes())
    } else {
        uncharacterized.write_all(record.as_bytes())
    };
    result.map_err(|err| KiraError::Filesystem(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_routed_by_header() {
        let input = ">sp|P1|A Uncharacterized protein YbaB\nMKV\nLLA\n>sp|P2|B Serine kinase\nMAA\n";
        let mut characterized = Vec::new();
        let mut uncharacterized = Vec::new();
        let counts =
            split_by_header(input.as_bytes(), &mut characterized, &mut uncharacterized).unwrap();

        assert_eq!(
            counts,
            SplitCounts {
                characterized: 1,
                uncharacterized: 1
            }
        );
        assert_eq!(
            String::from_utf8(uncharacterized).unwrap(),
            ">sp|P1|A Uncharacterized protein YbaB\nMKV\nLLA\n"
        );
        assert_eq!(
            String::from_utf8(characterized).unwrap(),
            ">sp|P2|B Serine kinase\nMAA\n"
        );
    }
}
