use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::archive::{Extraction, extract_filtered};
use crate::config::ResolvedConfig;
use crate::domain::{AlignmentMode, ProteinId, StructureInput};
use crate::error::KiraError;
use crate::foldseek::{FoldseekClient, SearchPayload};
use crate::hits::{ColumnLayout, HitFilter};
use crate::poller::{JobPoller, Sleeper};
use crate::structure::StructureClient;

pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub input: String,
    pub output: String,
    pub mode: Option<AlignmentMode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
    pub ticket: String,
    pub mode: AlignmentMode,
    pub structure_path: String,
    pub archive_path: String,
    pub archive_bytes: u64,
    pub hits_path: String,
    pub seed_path: Option<String>,
    pub hit_count: usize,
    pub accession_count: usize,
    pub seed_accession: Option<String>,
    pub polls: u32,
    pub started_at: String,
    pub finished_at: String,
}

impl SearchSummary {
    pub fn has_seed(&self) -> bool {
        self.seed_accession.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct Pipeline<F: FoldseekClient, T: StructureClient, S: Sleeper> {
    poller: JobPoller<F, S>,
    structures: T,
    config: ResolvedConfig,
}

impl<F: FoldseekClient, T: StructureClient, S: Sleeper> Pipeline<F, T, S> {
    pub fn new(foldseek: F, structures: T, sleeper: S, config: ResolvedConfig) -> Self {
        Self {
            poller: JobPoller::new(foldseek, sleeper),
            structures,
            config,
        }
    }

    pub fn foldseek(&self) -> &F {
        self.poller.client()
    }

    pub fn structures(&self) -> &T {
        &self.structures
    }

    pub fn run(
        &self,
        request: &SearchRequest,
        sink: &dyn ProgressSink,
    ) -> Result<SearchSummary, KiraError> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let clock = Instant::now();

        sink.event(ProgressEvent {
            message: format!("phase=Resolve; input {}", request.input),
            elapsed: None,
        });
        let input = StructureInput::parse(&request.input)?;
        if input.needs_mapping() {
            sink.event(ProgressEvent {
                message: format!("phase=Map; {} to a PDB structure", request.input.trim()),
                elapsed: Some(clock.elapsed()),
            });
        }
        let structure_path = self.resolve_structure(&input)?;
        if !structure_path.is_file() {
            return Err(KiraError::InputNotFound(structure_path));
        }
        let structure = fs::read_to_string(&structure_path).map_err(|err| {
            KiraError::Filesystem(format!("read {}: {err}", structure_path.display()))
        })?;

        let mode = request.mode.unwrap_or(self.config.mode);
        let payload = SearchPayload::new(structure, self.config.databases.clone(), mode);
        sink.event(ProgressEvent {
            message: format!(
                "phase=Submit; {} databases, mode {mode}",
                payload.databases.len()
            ),
            elapsed: Some(clock.elapsed()),
        });
        let job = self.poller.submit(payload)?;

        sink.event(ProgressEvent {
            message: format!("phase=Poll; ticket {}", job.ticket),
            elapsed: Some(clock.elapsed()),
        });
        let job = self.poller.await_completion(
            job,
            self.config.poll_interval,
            self.config.max_poll_attempts,
        )?;

        let archive_path = normalize_archive_path(&request.output);
        sink.event(ProgressEvent {
            message: format!("phase=Download; {archive_path}"),
            elapsed: Some(clock.elapsed()),
        });
        let archive_bytes = self
            .poller
            .client()
            .download_result(&job.ticket, archive_path.as_std_path())?;
        tracing::info!(path = %archive_path, bytes = archive_bytes, "results saved");

        sink.event(ProgressEvent {
            message: "phase=Extract; filtering uncharacterized hits".to_string(),
            elapsed: Some(clock.elapsed()),
        });
        let extraction = extract_filtered(
            archive_path.as_std_path(),
            &HitFilter::uncharacterized(),
            &ColumnLayout::web_archive(),
        )?;

        let output_dir = archive_path
            .parent()
            .map(|parent| parent.as_std_path().to_path_buf())
            .unwrap_or_default();
        let hits_path = output_dir.join(&self.config.hits_file);
        write_hit_lines(&hits_path, &extraction)?;
        tracing::info!(
            path = %hits_path.display(),
            count = extraction.hits.len(),
            "filtered entries saved"
        );

        let seed_accession = extraction.seed_accession().map(str::to_string);
        let seed_path = match &seed_accession {
            Some(accession) => {
                let path = output_dir.join(&self.config.seed_file);
                fs::write(&path, accession).map_err(|err| {
                    KiraError::Filesystem(format!("write {}: {err}", path.display()))
                })?;
                tracing::info!(path = %path.display(), accession = %accession, "seed accession saved");
                Some(path.display().to_string())
            }
            None => {
                tracing::warn!("no UniProt accessions extracted for seed");
                None
            }
        };

        sink.event(ProgressEvent {
            message: format!("phase=Done; {} hits", extraction.hits.len()),
            elapsed: Some(clock.elapsed()),
        });

        Ok(SearchSummary {
            ticket: job.ticket,
            mode,
            structure_path: structure_path.display().to_string(),
            archive_path: archive_path.to_string(),
            archive_bytes,
            hits_path: hits_path.display().to_string(),
            seed_path,
            hit_count: extraction.hits.len(),
            accession_count: extraction.accessions.len(),
            seed_accession,
            polls: job.polls,
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn resolve_structure(&self, input: &StructureInput) -> Result<PathBuf, KiraError> {
        let id = match input {
            StructureInput::LocalFile(path) => return Ok(path.clone()),
            StructureInput::Pdb(id) => id.clone(),
            StructureInput::Uniprot(accession) => self.structures.map_to_pdb(accession)?,
        };
        self.fetch_structure(&id)
    }

    fn fetch_structure(&self, id: &ProteinId) -> Result<PathBuf, KiraError> {
        fs::create_dir_all(&self.config.work_dir)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let destination = self.config.work_dir.join(format!("{id}.pdb"));
        self.structures.download_structure(id, &destination)?;
        tracing::info!(path = %destination.display(), "downloaded PDB file");
        Ok(destination)
    }
}

pub fn normalize_archive_path(output: &str) -> Utf8PathBuf {
    let trimmed = output.trim();
    if trimmed.ends_with(ARCHIVE_EXTENSION) {
        Utf8PathBuf::from(trimmed)
    } else {
        Utf8PathBuf::from(format!("{trimmed}{ARCHIVE_EXTENSION}"))
    }
}

fn write_hit_lines(path: &Path, extraction: &Extraction) -> Result<(), KiraError> {
    let mut content = String::new();
    for hit in &extraction.hits {
        content.push_str(&hit.hit.raw_line);
        content.push('\n');
    }
    fs::write(path, content)
        .map_err(|err| KiraError::Filesystem(format!("write {}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_suffix_is_appended_once() {
        assert_eq!(normalize_archive_path("results"), "results.tar.gz");
        assert_eq!(normalize_archive_path("out/results.tar.gz"), "out/results.tar.gz");
        assert_eq!(normalize_archive_path("results.tar"), "results.tar.tar.gz");
    }
}
