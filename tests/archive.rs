use std::fs;
use std::path::Path;

use assert_matches::assert_matches;
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

use kira_foldseek::archive::{HitStream, extract_filtered, extract_filtered_in};
use kira_foldseek::error::KiraError;
use kira_foldseek::hits::{ColumnLayout, HitFilter};

const AFDB50: &str = "Q9Y6K9\tAF-A0A0E9XQA6-F1-model_v4 Uncharacterized protein\t0.41\t120\t60\t2\t1\t120\t3\t118\t1.0\t2.1e-12\t210\n\
Q9Y6K9\tAF-P69905-F1-model_v4 Hemoglobin subunit alpha\t0.30\t100\t70\t3\t5\t100\t1\t96\t0.9\t1.0e-5\t80\n";
const PDB100: &str = "Q9Y6K9\t7XYZ_A UNCHARACTERIZED PROTEIN YqeY\t0.25\t90\t70\t4\t10\t100\t2\t92\t0.8\t3.0e-4\t55\n\
\n\
Q9Y6K9\tAF-B2RXH2-F1-model_v4 uncharacterized protein C1orf112\t0.22\t80\t60\t3\t11\t91\t4\t84\t0.7\t5.0e-3\t41\n";

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

fn write_archive(dir: &Path, entries: &[(&str, &[u8])]) -> std::path::PathBuf {
    let path = dir.join("results.tar.gz");
    fs::write(&path, build_archive(entries)).unwrap();
    path
}

fn sample_archive(dir: &Path) -> std::path::PathBuf {
    write_archive(
        dir,
        &[
            ("alis_afdb50.m8", AFDB50.as_bytes()),
            ("report.html", b"<html>uncharacterized protein</html>"),
            ("alis_pdb100.m8", PDB100.as_bytes()),
        ],
    )
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir).unwrap().next().is_none()
}

#[test]
fn filters_hits_case_insensitively_in_archive_order() {
    let temp = TempDir::new().unwrap();
    let archive = sample_archive(temp.path());

    let extraction = extract_filtered(
        &archive,
        &HitFilter::uncharacterized(),
        &ColumnLayout::web_archive(),
    )
    .unwrap();

    let sources: Vec<&str> = extraction
        .hits
        .iter()
        .map(|hit| hit.hit.source_db.as_str())
        .collect();
    assert_eq!(sources, vec!["alis_afdb50.m8", "alis_pdb100.m8", "alis_pdb100.m8"]);
    assert_eq!(extraction.accessions, vec!["A0A0E9XQA6", "B2RXH2"]);
    assert_eq!(extraction.seed_accession(), Some("A0A0E9XQA6"));

    let first = &extraction.hits[0];
    assert_eq!(first.label, "uncharacterized protein");
    assert_eq!(first.hit.evalue, Some(2.1e-12));
    assert_eq!(first.hit.bitscore, Some(210.0));
    assert!(extraction.hits[1].accession.is_none());
}

#[test]
fn extraction_is_repeatable() {
    let temp = TempDir::new().unwrap();
    let archive = sample_archive(temp.path());
    let filter = HitFilter::uncharacterized();
    let layout = ColumnLayout::web_archive();

    let first = extract_filtered(&archive, &filter, &layout).unwrap();
    let second = extract_filtered(&archive, &filter, &layout).unwrap();
    assert_eq!(first.hits, second.hits);
    assert_eq!(first.accessions, second.accessions);
}

#[test]
fn archive_without_hit_files_yields_nothing() {
    let temp = TempDir::new().unwrap();
    let archive = write_archive(temp.path(), &[("README", b"uncharacterized protein")]);

    let extraction = extract_filtered(
        &archive,
        &HitFilter::uncharacterized(),
        &ColumnLayout::web_archive(),
    )
    .unwrap();
    assert!(extraction.hits.is_empty());
    assert_eq!(extraction.seed_accession(), None);
}

#[test]
fn workspace_is_removed_after_success() {
    let temp = TempDir::new().unwrap();
    let archive = sample_archive(temp.path());
    let scratch = TempDir::new().unwrap();

    let extraction = extract_filtered_in(
        &archive,
        &HitFilter::uncharacterized(),
        &ColumnLayout::web_archive(),
        Some(scratch.path()),
    )
    .unwrap();
    assert_eq!(extraction.hits.len(), 3);
    assert!(is_empty_dir(scratch.path()));
}

#[test]
fn workspace_is_removed_after_unreadable_hit_file() {
    let temp = TempDir::new().unwrap();
    let archive = write_archive(
        temp.path(),
        &[
            ("alis_afdb50.m8", AFDB50.as_bytes()),
            ("alis_broken.m8", &[0xff, 0xfe, b'\n']),
        ],
    );
    let scratch = TempDir::new().unwrap();

    let result = extract_filtered_in(
        &archive,
        &HitFilter::uncharacterized(),
        &ColumnLayout::web_archive(),
        Some(scratch.path()),
    );
    assert_matches!(result, Err(KiraError::ArchiveFormat(_)));
    assert!(is_empty_dir(scratch.path()));
}

#[test]
fn entries_escaping_the_workspace_are_rejected() {
    let temp = TempDir::new().unwrap();
    let data = AFDB50.as_bytes();
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_old();
    header.as_old_mut().name[..11].copy_from_slice(b"../evil.m8\0");
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    builder.append(&header, data).unwrap();
    let bytes = builder.into_inner().unwrap().finish().unwrap();
    let archive = temp.path().join("evil.tar.gz");
    fs::write(&archive, bytes).unwrap();
    let scratch = TempDir::new().unwrap();

    let result = extract_filtered_in(
        &archive,
        &HitFilter::uncharacterized(),
        &ColumnLayout::web_archive(),
        Some(scratch.path()),
    );
    assert_matches!(result, Err(KiraError::ArchiveFormat(_)));
    assert!(is_empty_dir(scratch.path()));
}

#[test]
fn stream_stops_after_first_error() {
    let bytes = build_archive(&[
        ("a_broken.m8", &[0xff, 0xfe, b'\n']),
        ("b_afdb50.m8", AFDB50.as_bytes()),
    ]);
    let stream = HitStream::from_reader(
        bytes.as_slice(),
        HitFilter::uncharacterized(),
        ColumnLayout::web_archive(),
        None,
    )
    .unwrap();

    let items: Vec<_> = stream.collect();
    assert_eq!(items.len(), 1);
    assert_matches!(items[0], Err(KiraError::ArchiveFormat(_)));
}

#[test]
fn custom_filter_selects_other_hits() {
    let temp = TempDir::new().unwrap();
    let archive = sample_archive(temp.path());

    let extraction = extract_filtered(
        &archive,
        &HitFilter::contains("Hemoglobin").with_label("globin"),
        &ColumnLayout::web_archive(),
    )
    .unwrap();
    assert_eq!(extraction.hits.len(), 1);
    assert_eq!(extraction.hits[0].label, "globin");
    assert_eq!(extraction.accessions, vec!["P69905"]);
}

#[test]
fn matching_line_without_query_is_kept() {
    let temp = TempDir::new().unwrap();
    let archive = write_archive(
        temp.path(),
        &[(
            "alis_afdb50.m8",
            "\tAF-B2RXH2-F1-model_v4 uncharacterized protein\t0.2\n\
Q9Y6K9\tAF-A0A0E9XQA6-F1-model_v4 Uncharacterized protein\t0.41\t120\t60\t2\t1\t120\t3\t118\t1.0\t2.1e-12\t210\n"
                .as_bytes(),
        )],
    );

    let extraction = extract_filtered(
        &archive,
        &HitFilter::uncharacterized(),
        &ColumnLayout::web_archive(),
    )
    .unwrap();

    assert_eq!(extraction.hits.len(), 2);
    let kept = &extraction.hits[0];
    assert_eq!(
        kept.hit.raw_line,
        "AF-B2RXH2-F1-model_v4 uncharacterized protein\t0.2"
    );
    assert_eq!(kept.hit.query, "");
    assert_eq!(kept.hit.target, "AF-B2RXH2-F1-model_v4 uncharacterized protein");
    assert_eq!(kept.hit.bitscore, None);
    assert_eq!(kept.hit.source_db, "alis_afdb50.m8");
    assert_eq!(extraction.accessions, vec!["B2RXH2", "A0A0E9XQA6"]);
    assert_eq!(extraction.hits[1].hit.bitscore, Some(210.0));
}
