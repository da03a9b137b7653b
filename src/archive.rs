use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Serialize;
use tar::Archive;
use tempfile::{Builder, TempDir};

use crate::error::KiraError;
use crate::hits::{ColumnLayout, FilteredHit, HitFilter, HitRecord};

pub const HIT_FILE_SUFFIX: &str = ".m8";

#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    pub hits: Vec<FilteredHit>,
    pub accessions: Vec<String>,
}

impl Extraction {
    pub fn seed_accession(&self) -> Option<&str> {
        self.accessions.first().map(String::as_str)
    }
}

struct HitFile {
    path: PathBuf,
    source_db: String,
}

struct OpenHitFile {
    source_db: String,
    lines: Lines<BufReader<File>>,
}

// Dropping the stream removes the unpacked workspace.
pub struct HitStream {
    workspace: TempDir,
    pending: VecDeque<HitFile>,
    current: Option<OpenHitFile>,
    filter: HitFilter,
    layout: ColumnLayout,
    failed: bool,
}

impl HitStream {
    pub fn open(
        archive_path: &Path,
        filter: HitFilter,
        layout: ColumnLayout,
        workspace_root: Option<&Path>,
    ) -> Result<Self, KiraError> {
        let file = File::open(archive_path).map_err(|err| {
            KiraError::Filesystem(format!("open archive {}: {err}", archive_path.display()))
        })?;
        Self::from_reader(file, filter, layout, workspace_root)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        filter: HitFilter,
        layout: ColumnLayout,
        workspace_root: Option<&Path>,
    ) -> Result<Self, KiraError> {
        let mut builder = Builder::new();
        builder.prefix("kira-fs-extract");
        let workspace = match workspace_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;

        let pending = unpack_hit_files(reader, workspace.path())?;
        tracing::debug!(
            workspace = %workspace.path().display(),
            files = pending.len(),
            "unpacked result archive"
        );

        Ok(Self {
            workspace,
            pending,
            current: None,
            filter,
            layout,
            failed: false,
        })
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    fn next_line(&mut self) -> Option<Result<(String, String), KiraError>> {
        loop {
            if let Some(open) = self.current.as_mut() {
                match open.lines.next() {
                    Some(Ok(line)) => return Some(Ok((open.source_db.clone(), line))),
                    Some(Err(err)) => {
                        return Some(Err(KiraError::ArchiveFormat(format!(
                            "reading {}: {err}",
                            open.source_db
                        ))));
                    }
                    None => self.current = None,
                }
            }

            let next = self.pending.pop_front()?;
            let file = match File::open(&next.path) {
                Ok(file) => file,
                Err(err) => {
                    return Some(Err(KiraError::Filesystem(format!(
                        "open {}: {err}",
                        next.path.display()
                    ))));
                }
            };
            self.current = Some(OpenHitFile {
                source_db: next.source_db,
                lines: BufReader::new(file).lines(),
            });
        }
    }
}

impl Iterator for HitStream {
    type Item = Result<FilteredHit, KiraError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let (source_db, line) = match self.next_line()? {
                Ok(item) => item,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            };
            if line.trim().is_empty() || !self.filter.matches(&line) {
                continue;
            }
            let hit = match HitRecord::parse(&line, &source_db, &self.layout) {
                Ok(hit) => hit,
                Err(err) => {
                    tracing::warn!(source = %source_db, "keeping unparsed hit: {err}");
                    HitRecord::unparsed(&line, &source_db)
                }
            };
            let accession = hit.alphafold_accession();
            return Some(Ok(FilteredHit {
                hit,
                label: self.filter.label().to_string(),
                accession,
            }));
        }
    }
}

pub fn extract_filtered(
    archive_path: &Path,
    filter: &HitFilter,
    layout: &ColumnLayout,
) -> Result<Extraction, KiraError> {
    extract_filtered_in(archive_path, filter, layout, None)
}

pub fn extract_filtered_in(
    archive_path: &Path,
    filter: &HitFilter,
    layout: &ColumnLayout,
    workspace_root: Option<&Path>,
) -> Result<Extraction, KiraError> {
    let stream = HitStream::open(archive_path, filter.clone(), *layout, workspace_root)?;
    let mut extraction = Extraction::default();
    for item in stream {
        let hit = item?;
        if let Some(accession) = hit.accession.clone() {
            extraction.accessions.push(accession);
        }
        extraction.hits.push(hit);
    }
    tracing::info!(
        hits = extraction.hits.len(),
        accessions = extraction.accessions.len(),
        filter = filter.label(),
        "filtered result archive"
    );
    Ok(extraction)
}

fn unpack_hit_files<R: Read>(reader: R, target_dir: &Path) -> Result<VecDeque<HitFile>, KiraError> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    let entries = archive
        .entries()
        .map_err(|err| KiraError::ArchiveFormat(err.to_string()))?;

    let mut files = VecDeque::new();
    for entry in entries {
        let mut entry = entry.map_err(|err| KiraError::ArchiveFormat(err.to_string()))?;
        let relative = entry
            .path()
            .map_err(|err| KiraError::ArchiveFormat(err.to_string()))?
            .into_owned();
        let is_file = entry.header().entry_type().is_file();

        let unpacked = entry
            .unpack_in(target_dir)
            .map_err(|err| KiraError::ArchiveFormat(err.to_string()))?;
        if !unpacked {
            return Err(KiraError::ArchiveFormat(format!(
                "entry escapes extraction directory: {}",
                relative.display()
            )));
        }

        let name = relative
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        if is_file && name.ends_with(HIT_FILE_SUFFIX) {
            files.push_back(HitFile {
                path: target_dir.join(&relative),
                source_db: name,
            });
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn write_archive(dir: &Path, bytes: &[u8]) -> PathBuf {
        let path = dir.join("result.tar.gz");
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn stream_skips_non_hit_files() {
        let bytes = build_archive(&[
            ("notes.txt", b"q\tAF-P11111-F1-model_v4 uncharacterized protein\n"),
            ("alis_afdb50.m8", b"q\tAF-P22222-F1-model_v4 uncharacterized protein\n"),
        ]);
        let stream = HitStream::from_reader(
            bytes.as_slice(),
            HitFilter::uncharacterized(),
            ColumnLayout::web_archive(),
            None,
        )
        .unwrap();
        let hits: Vec<_> = stream.collect::<Result<_, _>>().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].hit.source_db, "alis_afdb50.m8");
        assert_eq!(hits[0].accession.as_deref(), Some("P22222"));
    }

    #[test]
    fn dropping_stream_removes_workspace() {
        let temp = tempfile::tempdir().unwrap();
        let bytes = build_archive(&[("a.m8", b"q\tAF-P1-F1 Uncharacterized protein\n")]);
        let mut stream = HitStream::from_reader(
            bytes.as_slice(),
            HitFilter::uncharacterized(),
            ColumnLayout::web_archive(),
            Some(temp.path()),
        )
        .unwrap();
        let workspace = stream.workspace().to_path_buf();
        assert!(workspace.join("a.m8").exists());
        assert!(stream.next().is_some());
        drop(stream);
        assert!(!workspace.exists());
    }

    #[test]
    fn garbage_is_an_archive_format_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = write_archive(temp.path(), b"definitely not gzip");
        let err = extract_filtered(
            &path,
            &HitFilter::uncharacterized(),
            &ColumnLayout::web_archive(),
        )
        .unwrap_err();
        assert_matches!(err, KiraError::ArchiveFormat(_));
    }
}
