use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use assert_matches::assert_matches;
use tempfile::TempDir;

use kira_foldseek::config::{Config, ConfigLoader, EndpointsEntry};
use kira_foldseek::domain::{AlignmentMode, TargetDatabase};
use kira_foldseek::error::KiraError;

#[test]
fn config_file_overrides_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("kira-fs.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "poll_interval_secs": 5,
            "max_poll_attempts": 3,
            "databases": ["afdb50", "pdb100"],
            "mode": "tmalign",
            "work_dir": "structures",
            "endpoints": { "foldseek": "http://localhost:8080/api" }
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(resolved.poll_interval, Duration::from_secs(5));
    assert_eq!(resolved.max_poll_attempts, 3);
    assert_eq!(
        resolved.databases,
        vec![TargetDatabase::Afdb50, TargetDatabase::Pdb100]
    );
    assert_eq!(resolved.mode, AlignmentMode::TmAlign);
    assert_eq!(resolved.work_dir, PathBuf::from("structures"));
    assert_eq!(resolved.endpoints.foldseek, "http://localhost:8080/api");
    assert_eq!(resolved.endpoints.rcsb, "https://files.rcsb.org");
    assert_eq!(resolved.hits_file, "uncharacterized_hits.txt");
}

#[test]
fn explicit_missing_config_is_an_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("absent.json");
    let result = ConfigLoader::resolve(Some(path.to_str().unwrap()));
    assert_matches!(result, Err(KiraError::ConfigRead(_)));
}

#[test]
fn malformed_config_is_a_parse_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.json");
    fs::write(&path, "{ \"databases\": ").unwrap();
    let result = ConfigLoader::resolve(Some(path.to_str().unwrap()));
    assert_matches!(result, Err(KiraError::ConfigParse(_)));
}

#[test]
fn empty_mode_and_database_list_fall_back_to_defaults() {
    let config = Config {
        mode: Some(String::new()),
        databases: Some(Vec::new()),
        endpoints: Some(EndpointsEntry::default()),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.mode, AlignmentMode::ThreeDiAa);
    assert_eq!(resolved.databases, TargetDatabase::ALL.to_vec());
    assert_eq!(resolved.endpoints.uniprot, "https://rest.uniprot.org/uniprotkb");
}

#[test]
fn unknown_mode_is_rejected() {
    let config = Config {
        mode: Some("blastp".to_string()),
        ..Config::default()
    };
    let result = ConfigLoader::resolve_config(config);
    assert_matches!(result, Err(KiraError::InvalidMode(ref mode)) if mode == "blastp");
}
