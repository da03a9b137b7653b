use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use serde::Serialize;

use crate::error::KiraError;

pub const ACCESSION_COLUMN: &str = "Accession";
pub const P_VALUE_COLUMN: &str = "P value";
pub const RATIO_COLUMN: &str = "Ratio(log2)";

pub const SIGNIFICANT_FILE: &str = "all_significant_accessions.txt";
pub const UPREGULATED_FILE: &str = "upregulated_accessions.txt";
pub const DOWNREGULATED_FILE: &str = "downregulated_accessions.txt";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub p_value: f64,
    pub up_log2: f64,
    pub down_log2: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            p_value: 0.05,
            up_log2: 1.0,
            down_log2: -1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Partition {
    pub significant: Vec<String>,
    pub upregulated: Vec<String>,
    pub downregulated: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionResult {
    pub significant: usize,
    pub upregulated: usize,
    pub downregulated: usize,
    pub files: Vec<String>,
}

#[derive(Default)]
struct UniqueList {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl UniqueList {
    fn push(&mut self, value: &str) {
        if self.seen.insert(value.to_string()) {
            self.items.push(value.to_string());
        }
    }
}

pub fn partition<R: Read>(
    reader: R,
    source: &str,
    thresholds: &Thresholds,
) -> Result<Partition, KiraError> {
    let mut csv_reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader
        .headers()
        .map_err(|err| KiraError::Csv(err.to_string()))?
        .clone();
    let column = |name: &str| -> Result<usize, KiraError> {
        headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| KiraError::MissingColumn {
                file: source.to_string(),
                column: name.to_string(),
            })
    };
    let accession_idx = column(ACCESSION_COLUMN)?;
    let p_idx = column(P_VALUE_COLUMN)?;
    let ratio_idx = column(RATIO_COLUMN)?;

    let mut significant = UniqueList::default();
    let mut upregulated = UniqueList::default();
    let mut downregulated = UniqueList::default();

    for record in csv_reader.records() {
        let record = record.map_err(|err| KiraError::Csv(err.to_string()))?;
        let accession = match record.get(accession_idx) {
            Some(value) if !value.is_empty() => value,
            _ => continue,
        };
        let p_value = record.get(p_idx).and_then(|v| v.parse::<f64>().ok());
        let ratio = record.get(ratio_idx).and_then(|v| v.parse::<f64>().ok());
        let (Some(p_value), Some(ratio)) = (p_value, ratio) else {
            continue;
        };
        if p_value >= thresholds.p_value {
            continue;
        }
        significant.push(accession);
        if ratio > thresholds.up_log2 {
            upregulated.push(accession);
        } else if ratio < thresholds.down_log2 {
            downregulated.push(accession);
        }
    }

    Ok(Partition {
        significant: significant.items,
        upregulated: upregulated.items,
        downregulated: downregulated.items,
    })
}

pub fn partition_file(
    input: &Path,
    output_dir: &Path,
    thresholds: &Thresholds,
) -> Result<PartitionResult, KiraError> {
    let file = fs::File::open(input)
        .map_err(|err| KiraError::Filesystem(format!("open {}: {err}", input.display())))?;
    let partition = partition(file, &input.display().to_string(), thresholds)?;
    fs::create_dir_all(output_dir).map_err(|err| KiraError::Filesystem(err.to_string()))?;

    let mut files = Vec::new();
    for (name, list) in [
        (SIGNIFICANT_FILE, &partition.significant),
        (UPREGULATED_FILE, &partition.upregulated),
        (DOWNREGULATED_FILE, &partition.downregulated),
    ] {
        let path = output_dir.join(name);
        write_accession_list(&path, list)?;
        tracing::info!(path = %path.display(), count = list.len(), "saved accession list");
        files.push(path.display().to_string());
    }

    Ok(PartitionResult {
        significant: partition.significant.len(),
        upregulated: partition.upregulated.len(),
        downregulated: partition.downregulated.len(),
        files,
    })
}

pub fn write_accession_list(path: &Path, accessions: &[String]) -> Result<(), KiraError> {
    let mut content = String::new();
    for accession in accessions {
        content.push_str(accession.trim());
        content.push('\n');
    }
    fs::write(path, content)
        .map_err(|err| KiraError::Filesystem(format!("write {}: {err}", path.display())))
}

pub fn default_list_paths(dir: &Path) -> [PathBuf; 3] {
    [
        dir.join(UPREGULATED_FILE),
        dir.join(DOWNREGULATED_FILE),
        dir.join(SIGNIFICANT_FILE),
    ]
}
