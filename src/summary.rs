use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::classify::{Category, IdentifierSets};
use crate::error::KiraError;
use crate::hits::ColumnLayout;
use crate::top_hits::load_hits;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub query_id: String,
    pub target_id: String,
    pub bitscore: f64,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarizeResult {
    pub downloaded_models: usize,
    pub rows: usize,
    pub output_path: Option<String>,
}

pub fn downloaded_targets(dir: &Path) -> Result<HashSet<String>, KiraError> {
    let entries = fs::read_dir(dir)
        .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", dir.display())))?;
    let mut targets = HashSet::new();
    for entry in entries {
        let entry = entry.map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(stem) = name.strip_suffix(".pdb") else {
            continue;
        };
        targets.insert(strip_rank_prefix(stem).to_string());
    }
    Ok(targets)
}

fn strip_rank_prefix(stem: &str) -> &str {
    match stem.split_once('_') {
        Some((rank, rest)) if !rank.is_empty() && rank.chars().all(|c| c.is_ascii_digit()) => rest,
        _ => stem,
    }
}

pub fn build_rows(
    hit_files: &[PathBuf],
    layout: &ColumnLayout,
    targets: &HashSet<String>,
    sets: &IdentifierSets,
) -> Result<Vec<SummaryRow>, KiraError> {
    let mut rows: Vec<SummaryRow> = load_hits(hit_files, layout)?
        .into_iter()
        .filter(|hit| targets.contains(&hit.target))
        .filter_map(|hit| {
            let bitscore = hit.bitscore?;
            Some(SummaryRow {
                category: sets.category_of(&hit.query),
                query_id: hit.query,
                target_id: hit.target,
                bitscore,
            })
        })
        .collect();
    rows.sort_by(|a, b| b.bitscore.partial_cmp(&a.bitscore).unwrap_or(Ordering::Equal));
    Ok(rows)
}

pub fn summarize(
    hit_files: &[PathBuf],
    layout: &ColumnLayout,
    models_dir: &Path,
    sets: &IdentifierSets,
    output: &Path,
) -> Result<SummarizeResult, KiraError> {
    let targets = downloaded_targets(models_dir)?;
    tracing::info!("detected {} downloaded structures", targets.len());
    let rows = build_rows(hit_files, layout, &targets, sets)?;

    if rows.is_empty() {
        tracing::warn!("no matches between hit files and downloaded structures");
        return Ok(SummarizeResult {
            downloaded_models: targets.len(),
            rows: 0,
            output_path: None,
        });
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    }
    let mut writer =
        csv::Writer::from_path(output).map_err(|err| KiraError::Csv(err.to_string()))?;
    for row in &rows {
        writer
            .serialize(row)
            .map_err(|err| KiraError::Csv(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    tracing::info!(path = %output.display(), rows = rows.len(), "summary written");

    Ok(SummarizeResult {
        downloaded_models: targets.len(),
        rows: rows.len(),
        output_path: Some(output.display().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_prefix_is_stripped() {
        assert_eq!(strip_rank_prefix("01_AF-P1-F1-model_v4"), "AF-P1-F1-model_v4");
        assert_eq!(strip_rank_prefix("AF-P1-F1-model_v4"), "AF-P1-F1-model_v4");
        assert_eq!(strip_rank_prefix("1abc"), "1abc");
    }
}
