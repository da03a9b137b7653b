use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::alphafold::{MODEL_PREFIX, ModelClient, canonical_model_id};
use crate::domain::ProteinId;
use crate::error::KiraError;
use crate::hits::{ColumnLayout, HitRecord};
use crate::structure::StructureClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelNaming {
    #[default]
    Plain,
    Ranked,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadedModel {
    #[serde(rename = "Query UniProt ID")]
    pub query_id: String,
    #[serde(rename = "AlphaFold Target Model")]
    pub target_model: String,
    #[serde(rename = "E-value")]
    pub evalue: Option<f64>,
    #[serde(rename = "Bitscore")]
    pub bitscore: Option<f64>,
    #[serde(rename = "Source Database")]
    pub source_db: String,
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopHitsResult {
    pub loaded: usize,
    pub selected: usize,
    pub downloaded: usize,
    pub summary_path: Option<String>,
}

pub fn load_hits(paths: &[PathBuf], layout: &ColumnLayout) -> Result<Vec<HitRecord>, KiraError> {
    let mut hits = Vec::new();
    for path in paths {
        tracing::info!(path = %path.display(), "loading hits");
        let content = fs::read_to_string(path)
            .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", path.display())))?;
        let source_db = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            let columns = line.split('\t').count();
            if columns < layout.min_columns() {
                tracing::warn!(
                    source = %source_db,
                    columns,
                    expected = layout.min_columns(),
                    "short hit line, missing statistics stay empty"
                );
            }
            match HitRecord::parse(line, &source_db, layout) {
                Ok(hit) => hits.push(hit),
                Err(err) => tracing::warn!(source = %source_db, "skipping hit: {err}"),
            }
        }
    }
    Ok(hits)
}

fn by_bitscore_desc(a: &HitRecord, b: &HitRecord) -> Ordering {
    let a = a.bitscore.unwrap_or(f64::NEG_INFINITY);
    let b = b.bitscore.unwrap_or(f64::NEG_INFINITY);
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

pub fn select_top_hits(hits: &[HitRecord], evalue_cutoff: f64) -> Vec<HitRecord> {
    let mut passing: Vec<HitRecord> = hits
        .iter()
        .filter(|hit| hit.evalue.is_some_and(|evalue| evalue < evalue_cutoff))
        .cloned()
        .collect();
    passing.sort_by(by_bitscore_desc);

    let mut seen = HashSet::new();
    passing
        .into_iter()
        .filter(|hit| seen.insert(hit.query.clone()))
        .filter(|hit| hit.target.starts_with(MODEL_PREFIX))
        .collect()
}

pub fn top_n_by_bitscore(hits: &[HitRecord], n: usize) -> Vec<HitRecord> {
    let mut sorted = hits.to_vec();
    sorted.sort_by(by_bitscore_desc);
    sorted.truncate(n);
    sorted
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Alphafold(String),
    Pdb(ProteinId),
}

impl ModelSource {
    pub fn for_target(target: &str) -> Option<Self> {
        if let Some(model_id) = canonical_model_id(target) {
            return Some(ModelSource::Alphafold(model_id));
        }
        if target.len() == 4 && target.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return target.parse().ok().map(ModelSource::Pdb);
        }
        None
    }
}

pub fn download_models<M: ModelClient, S: StructureClient>(
    models: &M,
    structures: &S,
    hits: &[HitRecord],
    output_dir: &Path,
    naming: ModelNaming,
) -> Result<Vec<DownloadedModel>, KiraError> {
    fs::create_dir_all(output_dir).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let mut downloaded = Vec::new();

    for (idx, hit) in hits.iter().enumerate() {
        let (source, file_name) = match naming {
            ModelNaming::Plain => (
                ModelSource::Alphafold(hit.target.clone()),
                format!("{}.pdb", hit.target),
            ),
            ModelNaming::Ranked => match ModelSource::for_target(&hit.target) {
                Some(source) => (source, format!("{:02}_{}.pdb", idx + 1, hit.target)),
                None => {
                    tracing::warn!("[{}] skipping unknown target format: {}", idx + 1, hit.target);
                    continue;
                }
            },
        };
        let path = output_dir.join(&file_name);
        let record = DownloadedModel {
            query_id: hit.query.clone(),
            target_model: hit.target.clone(),
            evalue: hit.evalue,
            bitscore: hit.bitscore,
            source_db: hit.source_db.clone(),
            path: path.clone(),
        };

        if path.exists() {
            tracing::info!("already exists: {}", hit.target);
            downloaded.push(record);
            continue;
        }

        let fetched = match &source {
            ModelSource::Alphafold(model_id) => models.download_model(model_id, &path),
            ModelSource::Pdb(id) => structures.download_structure(id, &path),
        };
        match fetched {
            Ok(()) => {
                tracing::info!("downloaded: {}", hit.target);
                downloaded.push(record);
            }
            Err(err) => {
                tracing::warn!("failed to download {}: {err}", hit.target);
                if path.exists() {
                    let _ = fs::remove_file(&path);
                }
            }
        }
    }

    Ok(downloaded)
}

pub fn write_model_summary(path: &Path, models: &[DownloadedModel]) -> Result<(), KiraError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|err| KiraError::Csv(err.to_string()))?;
    if models.is_empty() {
        writer
            .write_record([
                "Query UniProt ID",
                "AlphaFold Target Model",
                "E-value",
                "Bitscore",
                "Source Database",
            ])
            .map_err(|err| KiraError::Csv(err.to_string()))?;
    }
    for model in models {
        writer
            .serialize(model)
            .map_err(|err| KiraError::Csv(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| KiraError::Filesystem(err.to_string()))
}

pub fn run_top_hits<M: ModelClient, S: StructureClient>(
    models: &M,
    structures: &S,
    hit_files: &[PathBuf],
    layout: &ColumnLayout,
    evalue_cutoff: f64,
    output_dir: &Path,
    summary_path: &Path,
) -> Result<TopHitsResult, KiraError> {
    let hits = load_hits(hit_files, layout)?;
    let selected = select_top_hits(&hits, evalue_cutoff);
    tracing::info!("found {} AlphaFold hits to download", selected.len());
    let models = download_models(models, structures, &selected, output_dir, ModelNaming::Plain)?;
    write_model_summary(summary_path, &models)?;
    tracing::info!(path = %summary_path.display(), "summary written");

    Ok(TopHitsResult {
        loaded: hits.len(),
        selected: selected.len(),
        downloaded: models.len(),
        summary_path: Some(summary_path.display().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(query: &str, target: &str, evalue: f64, bitscore: f64) -> HitRecord {
        let line = format!("{query}\t{target}\t0.5\t100\t100\t0\t1\t90\t1\t90\t{evalue}\t{bitscore}");
        HitRecord::parse(&line, "results_afdb50.m8", &ColumnLayout::easy_search()).unwrap()
    }

    #[test]
    fn best_hit_per_query_after_cutoff() {
        let hits = vec![
            hit("q1", "AF-P1-F1-model_v4", 1e-5, 120.0),
            hit("q1", "AF-P2-F1-model_v4", 1e-9, 300.0),
            hit("q2", "AF-P3-F1-model_v4", 0.5, 900.0),
            hit("q3", "1abc_A", 1e-10, 500.0),
            hit("q4", "AF-P4-F1-model_v4", 1e-3, 80.0),
        ];
        let selected = select_top_hits(&hits, 1e-2);
        let targets: Vec<_> = selected.iter().map(|h| h.target.as_str()).collect();
        assert_eq!(targets, vec!["AF-P2-F1-model_v4", "AF-P4-F1-model_v4"]);
    }

    #[test]
    fn top_n_orders_by_bitscore() {
        let hits = vec![
            hit("q1", "a", 1e-5, 10.0),
            hit("q2", "b", 1e-5, 30.0),
            hit("q3", "c", 1e-5, 20.0),
        ];
        let top = top_n_by_bitscore(&hits, 2);
        assert_eq!(top[0].target, "b");
        assert_eq!(top[1].target, "c");
    }

    #[test]
    fn ranked_targets_pick_their_source() {
        assert_eq!(
            ModelSource::for_target("AF-P1-F1-model_v3"),
            Some(ModelSource::Alphafold("AF-P1-F1-model_v4".to_string()))
        );
        assert_eq!(
            ModelSource::for_target("2jvx"),
            Some(ModelSource::Pdb("2JVX".parse().unwrap()))
        );
        assert_eq!(ModelSource::for_target("1abc_A"), None);
        assert_eq!(ModelSource::for_target("7x-z"), None);
    }
}
