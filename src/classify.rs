use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::KiraError;
use crate::hits::{ColumnLayout, FilteredHit, HitRecord, normalize_query_id};

pub const HITS_ALL_FILE: &str = "hits_all.txt";
pub const HITS_UPREGULATED_FILE: &str = "hits_upregulated.txt";
pub const HITS_DOWNREGULATED_FILE: &str = "hits_downregulated.txt";
pub const HITS_SIGNIFICANT_FILE: &str = "hits_significant.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Upregulated,
    Downregulated,
    Significant,
    Uncategorized,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Upregulated => "Upregulated",
            Category::Downregulated => "Downregulated",
            Category::Significant => "Significant",
            Category::Uncategorized => "Uncategorized",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdentifierSets {
    pub upregulated: HashSet<String>,
    pub downregulated: HashSet<String>,
    pub significant: HashSet<String>,
}

impl IdentifierSets {
    pub fn new(
        upregulated: impl IntoIterator<Item = String>,
        downregulated: impl IntoIterator<Item = String>,
        significant: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            upregulated: upregulated.into_iter().collect(),
            downregulated: downregulated.into_iter().collect(),
            significant: significant.into_iter().collect(),
        }
    }

    pub fn category_of(&self, query: &str) -> Category {
        let query = normalize_query_id(query);
        if self.upregulated.contains(query) {
            Category::Upregulated
        } else if self.downregulated.contains(query) {
            Category::Downregulated
        } else if self.significant.contains(query) {
            Category::Significant
        } else {
            Category::Uncategorized
        }
    }

    pub fn memberships(&self, query: &str) -> Vec<Category> {
        let query = normalize_query_id(query);
        [
            (Category::Upregulated, &self.upregulated),
            (Category::Downregulated, &self.downregulated),
            (Category::Significant, &self.significant),
        ]
        .into_iter()
        .filter(|(_, set)| set.contains(query))
        .map(|(category, _)| category)
        .collect()
    }
}

pub fn classify(sets: &IdentifierSets, hit: &HitRecord) -> Category {
    sets.category_of(&hit.query)
}

pub fn classify_lines<'a>(
    sets: &IdentifierSets,
    lines: impl IntoIterator<Item = &'a str>,
    source_db: &str,
    layout: &ColumnLayout,
) -> Vec<FilteredHit> {
    let mut classified = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let hit = match HitRecord::parse(line, source_db, layout) {
            Ok(hit) => hit,
            Err(err) => {
                tracing::warn!(source = source_db, "skipping hit: {err}");
                continue;
            }
        };
        let category = classify(sets, &hit);
        let accession = hit.alphafold_accession();
        classified.push(FilteredHit {
            hit,
            label: category.to_string(),
            accession,
        });
    }
    classified
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BucketResult {
    pub all: usize,
    pub upregulated: usize,
    pub downregulated: usize,
    pub significant: usize,
    pub files: Vec<String>,
}

#[derive(Default)]
struct HitBuckets {
    all: Vec<String>,
    upregulated: Vec<String>,
    downregulated: Vec<String>,
    significant: Vec<String>,
}

impl HitBuckets {
    fn push(&mut self, sets: &IdentifierSets, hit: &HitRecord) {
        self.all.push(hit.raw_line.clone());
        for category in sets.memberships(&hit.query) {
            let bucket = match category {
                Category::Upregulated => &mut self.upregulated,
                Category::Downregulated => &mut self.downregulated,
                Category::Significant => &mut self.significant,
                Category::Uncategorized => continue,
            };
            bucket.push(hit.raw_line.clone());
        }
    }
}

pub fn bucket_hit_files(
    files: &[PathBuf],
    layout: &ColumnLayout,
    sets: &IdentifierSets,
    output_dir: &Path,
) -> Result<BucketResult, KiraError> {
    let mut buckets = HitBuckets::default();
    for path in files {
        let content = fs::read_to_string(path)
            .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", path.display())))?;
        let source_db = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        for classified in classify_lines(sets, content.lines(), &source_db, layout) {
            buckets.push(sets, &classified.hit);
        }
    }

    fs::create_dir_all(output_dir).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let mut written = Vec::new();
    for (name, lines) in [
        (HITS_ALL_FILE, &buckets.all),
        (HITS_UPREGULATED_FILE, &buckets.upregulated),
        (HITS_DOWNREGULATED_FILE, &buckets.downregulated),
        (HITS_SIGNIFICANT_FILE, &buckets.significant),
    ] {
        let path = output_dir.join(name);
        write_lines(&path, lines)?;
        tracing::info!(path = %path.display(), count = lines.len(), "saved hit list");
        written.push(path.display().to_string());
    }

    Ok(BucketResult {
        all: buckets.all.len(),
        upregulated: buckets.upregulated.len(),
        downregulated: buckets.downregulated.len(),
        significant: buckets.significant.len(),
        files: written,
    })
}

fn write_lines(path: &Path, lines: &[String]) -> Result<(), KiraError> {
    let mut content = String::new();
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(path, content)
        .map_err(|err| KiraError::Filesystem(format!("write {}: {err}", path.display())))
}

pub fn load_accessions(path: &Path) -> Result<Vec<String>, KiraError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "accession list not found, using empty list");
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)
        .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", path.display())))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn load_query_ids(path: &Path) -> Result<Vec<String>, KiraError> {
    let content = fs::read_to_string(path)
        .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", path.display())))?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| line.split('\t').next())
        .map(|query| query.trim().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets() -> IdentifierSets {
        IdentifierSets::new(
            vec!["P11111".to_string()],
            vec!["P22222".to_string()],
            vec!["P11111".to_string(), "P22222".to_string(), "P33333".to_string()],
        )
    }

    #[test]
    fn upregulated_wins_over_significant() {
        assert_eq!(sets().category_of("P11111"), Category::Upregulated);
    }

    #[test]
    fn precedence_falls_through() {
        let sets = sets();
        assert_eq!(sets.category_of("P22222"), Category::Downregulated);
        assert_eq!(sets.category_of("P33333"), Category::Significant);
        assert_eq!(sets.category_of("P44444"), Category::Uncategorized);
    }

    #[test]
    fn pipe_delimited_query_is_normalized() {
        assert_eq!(sets().category_of("tr|P33333|P33333_ECOLI"), Category::Significant);
    }

    #[test]
    fn memberships_are_not_exclusive() {
        let sets = sets();
        assert_eq!(
            sets.memberships("sp|P11111|KIN_HUMAN"),
            vec![Category::Upregulated, Category::Significant]
        );
        assert!(sets.memberships("P44444").is_empty());
    }

    #[test]
    fn lines_without_query_are_skipped() {
        let lines = ["\tAF-P1-F1", "P11111\tAF-P2-F1-model_v4", ""];
        let classified = classify_lines(&sets(), lines, "hits.m8", &ColumnLayout::easy_search());
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].label, "Upregulated");
        assert_eq!(classified[0].accession.as_deref(), Some("P2"));
    }
}
