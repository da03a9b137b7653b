use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

static ALPHAFOLD_ACCESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"AF-([A-Z0-9]+)-").expect("valid accession pattern"));

// Web archives carry a prob column before the e-value; easy-search output does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnLayout {
    pub query: usize,
    pub target: usize,
    pub identity: Option<usize>,
    pub query_start: Option<usize>,
    pub query_end: Option<usize>,
    pub target_start: Option<usize>,
    pub target_end: Option<usize>,
    pub evalue: Option<usize>,
    pub bitscore: Option<usize>,
}

impl ColumnLayout {
    pub fn easy_search() -> Self {
        Self {
            query: 0,
            target: 1,
            identity: Some(2),
            query_start: Some(6),
            query_end: Some(7),
            target_start: Some(8),
            target_end: Some(9),
            evalue: Some(10),
            bitscore: Some(11),
        }
    }

    pub fn web_archive() -> Self {
        Self {
            query: 0,
            target: 1,
            identity: Some(2),
            query_start: Some(6),
            query_end: Some(7),
            target_start: Some(8),
            target_end: Some(9),
            evalue: Some(11),
            bitscore: Some(12),
        }
    }

    pub fn min_columns(&self) -> usize {
        [
            Some(self.query),
            Some(self.target),
            self.identity,
            self.query_start,
            self.query_end,
            self.target_start,
            self.target_end,
            self.evalue,
            self.bitscore,
        ]
        .into_iter()
        .flatten()
        .max()
        .map(|max| max + 1)
        .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutKind {
    EasySearch,
    WebArchive,
}

impl LayoutKind {
    pub fn layout(&self) -> ColumnLayout {
        match self {
            LayoutKind::EasySearch => ColumnLayout::easy_search(),
            LayoutKind::WebArchive => ColumnLayout::web_archive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitRecord {
    pub source_db: String,
    pub raw_line: String,
    pub query: String,
    pub target: String,
    pub identity: Option<f64>,
    pub evalue: Option<f64>,
    pub bitscore: Option<f64>,
    pub query_start: Option<u64>,
    pub query_end: Option<u64>,
    pub target_start: Option<u64>,
    pub target_end: Option<u64>,
}

impl HitRecord {
    pub fn parse(line: &str, source_db: &str, layout: &ColumnLayout) -> Result<Self, KiraError> {
        let raw_line = line.trim().to_string();
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
        let query = fields
            .get(layout.query)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| KiraError::MalformedHit(raw_line.clone()))?
            .to_string();
        let target = fields
            .get(layout.target)
            .map(|value| value.trim().to_string())
            .unwrap_or_default();

        let number = |column: Option<usize>| -> Option<f64> {
            column
                .and_then(|idx| fields.get(idx))
                .and_then(|value| value.trim().parse::<f64>().ok())
        };
        let position = |column: Option<usize>| -> Option<u64> {
            column
                .and_then(|idx| fields.get(idx))
                .and_then(|value| value.trim().parse::<u64>().ok())
        };

        Ok(Self {
            source_db: source_db.to_string(),
            query,
            target,
            identity: number(layout.identity),
            evalue: number(layout.evalue),
            bitscore: number(layout.bitscore),
            query_start: position(layout.query_start),
            query_end: position(layout.query_end),
            target_start: position(layout.target_start),
            target_end: position(layout.target_end),
            raw_line,
        })
    }

    pub fn unparsed(line: &str, source_db: &str) -> Self {
        let raw_line = line.trim().to_string();
        let target = line
            .trim_end_matches(['\r', '\n'])
            .split('\t')
            .nth(1)
            .map(|value| value.trim().to_string())
            .unwrap_or_default();
        Self {
            source_db: source_db.to_string(),
            raw_line,
            query: String::new(),
            target,
            identity: None,
            evalue: None,
            bitscore: None,
            query_start: None,
            query_end: None,
            target_start: None,
            target_end: None,
        }
    }

    pub fn query_accession(&self) -> &str {
        normalize_query_id(&self.query)
    }

    pub fn alphafold_accession(&self) -> Option<String> {
        extract_accession(&self.raw_line)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredHit {
    pub hit: HitRecord,
    pub label: String,
    pub accession: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HitFilter {
    needle: String,
    label: String,
}

impl HitFilter {
    pub const UNCHARACTERIZED: &'static str = "uncharacterized protein";

    pub fn contains(needle: &str) -> Self {
        Self {
            needle: needle.to_lowercase(),
            label: needle.to_lowercase(),
        }
    }

    pub fn uncharacterized() -> Self {
        Self::contains(Self::UNCHARACTERIZED)
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn matches(&self, line: &str) -> bool {
        line.to_lowercase().contains(&self.needle)
    }
}

pub fn extract_accession(line: &str) -> Option<String> {
    ALPHAFOLD_ACCESSION
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn normalize_query_id(query: &str) -> &str {
    let mut parts = query.split('|');
    match (parts.next(), parts.next()) {
        (Some(_), Some(accession)) if !accession.is_empty() => accession,
        _ => query,
    }
}

pub fn hit_files_in(dir: &Path) -> Result<Vec<PathBuf>, KiraError> {
    let entries = fs::read_dir(dir)
        .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", dir.display())))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|err| KiraError::Filesystem(err.to_string()))?
            .path();
        if path.is_file() && path.extension().map(|ext| ext == "m8").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn accession_from_alphafold_token() {
        let line = "query\tAF-A0A0E9XQA6-F1-model_v4 Uncharacterized protein\t0.41";
        assert_eq!(extract_accession(line).as_deref(), Some("A0A0E9XQA6"));
    }

    #[test]
    fn no_accession_without_alphafold_token() {
        assert_eq!(extract_accession("query\t1abc_A\tkinase"), None);
        assert_eq!(extract_accession("AF-lowercase-F1"), None);
    }

    #[test]
    fn filter_is_case_insensitive() {
        let filter = HitFilter::uncharacterized();
        assert!(filter.matches("q\tAF-X1-F1 Uncharacterized Protein"));
        assert!(filter.matches("q\tAF-X1-F1 uncharacterized protein"));
        assert!(!filter.matches("q\tAF-X1-F1 serine kinase"));
    }

    #[test]
    fn column_eleven_differs_between_layouts() {
        let line = "q1\tAF-P1-F1-model_v4\t0.5\t100\t10\t0\t1\t100\t1\t100\t0.99\t1e-5\t250";
        let web = HitRecord::parse(line, "afdb50", &ColumnLayout::web_archive()).unwrap();
        assert_eq!(web.evalue, Some(1e-5));
        assert_eq!(web.bitscore, Some(250.0));

        let easy = HitRecord::parse(line, "afdb50", &ColumnLayout::easy_search()).unwrap();
        assert_eq!(easy.evalue, Some(0.99));
        assert_eq!(easy.bitscore, Some(1e-5));
    }

    #[test]
    fn parse_keeps_raw_line_and_source() {
        let line = "  sp|P69905|HBA_HUMAN\tAF-Q1-F1\t0.3  \n";
        let hit = HitRecord::parse(line, "afdb-proteome", &ColumnLayout::easy_search()).unwrap();
        assert_eq!(hit.raw_line, "sp|P69905|HBA_HUMAN\tAF-Q1-F1\t0.3");
        assert_eq!(hit.source_db, "afdb-proteome");
        assert_eq!(hit.query_accession(), "P69905");
        assert_eq!(hit.bitscore, None);
    }

    #[test]
    fn parse_rejects_missing_query() {
        let err = HitRecord::parse("\tAF-Q1-F1", "db", &ColumnLayout::easy_search()).unwrap_err();
        assert_matches!(err, KiraError::MalformedHit(_));
    }

    #[test]
    fn min_columns_covers_last_field() {
        assert_eq!(ColumnLayout::easy_search().min_columns(), 12);
        assert_eq!(ColumnLayout::web_archive().min_columns(), 13);
    }
}
