use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{AlignmentMode, TargetDatabase};
use crate::error::KiraError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-fs.json";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 10;
pub const DEFAULT_EVALUE_CUTOFF: f64 = 1e-2;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,
    #[serde(default)]
    pub databases: Option<Vec<String>>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default)]
    pub hits_file: Option<String>,
    #[serde(default)]
    pub seed_file: Option<String>,
    #[serde(default)]
    pub evalue_cutoff: Option<f64>,
    #[serde(default)]
    pub endpoints: Option<EndpointsEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EndpointsEntry {
    #[serde(default)]
    pub foldseek: Option<String>,
    #[serde(default)]
    pub pdbe: Option<String>,
    #[serde(default)]
    pub rcsb: Option<String>,
    #[serde(default)]
    pub alphafold: Option<String>,
    #[serde(default)]
    pub uniprot: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub foldseek: String,
    pub pdbe: String,
    pub rcsb: String,
    pub alphafold: String,
    pub uniprot: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            foldseek: "https://search.foldseek.com/api".to_string(),
            pdbe: "https://www.ebi.ac.uk/pdbe/api".to_string(),
            rcsb: "https://files.rcsb.org".to_string(),
            alphafold: "https://alphafold.ebi.ac.uk/files".to_string(),
            uniprot: "https://rest.uniprot.org/uniprotkb".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub databases: Vec<TargetDatabase>,
    pub mode: AlignmentMode,
    pub work_dir: PathBuf,
    pub hits_file: String,
    pub seed_file: String,
    pub evalue_cutoff: f64,
    pub endpoints: Endpoints,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            databases: TargetDatabase::ALL.to_vec(),
            mode: AlignmentMode::default(),
            work_dir: PathBuf::from("."),
            hits_file: "uncharacterized_hits.txt".to_string(),
            seed_file: "query_seed_accession.txt".to_string(),
            evalue_cutoff: DEFAULT_EVALUE_CUTOFF,
            endpoints: Endpoints::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let defaults = ResolvedConfig::default();

        let databases = match config.databases {
            Some(values) if !values.is_empty() => values
                .iter()
                .map(|value| value.parse())
                .collect::<Result<Vec<TargetDatabase>, KiraError>>()?,
            _ => defaults.databases,
        };
        let mode = match config.mode {
            Some(value) => value.parse()?,
            None => defaults.mode,
        };

        let endpoints = match config.endpoints {
            Some(entry) => Endpoints {
                foldseek: entry.foldseek.unwrap_or(defaults.endpoints.foldseek),
                pdbe: entry.pdbe.unwrap_or(defaults.endpoints.pdbe),
                rcsb: entry.rcsb.unwrap_or(defaults.endpoints.rcsb),
                alphafold: entry.alphafold.unwrap_or(defaults.endpoints.alphafold),
                uniprot: entry.uniprot.unwrap_or(defaults.endpoints.uniprot),
            },
            None => defaults.endpoints,
        };

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            poll_interval: config
                .poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            max_poll_attempts: config
                .max_poll_attempts
                .unwrap_or(defaults.max_poll_attempts),
            databases,
            mode,
            work_dir: config.work_dir.unwrap_or(defaults.work_dir),
            hits_file: config.hits_file.unwrap_or(defaults.hits_file),
            seed_file: config.seed_file.unwrap_or(defaults.seed_file),
            evalue_cutoff: config.evalue_cutoff.unwrap_or(defaults.evalue_cutoff),
            endpoints,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.poll_interval, Duration::from_secs(30));
        assert_eq!(resolved.max_poll_attempts, 10);
        assert_eq!(resolved.databases.len(), 6);
        assert_eq!(resolved.mode, AlignmentMode::ThreeDiAa);
    }

    #[test]
    fn unknown_database_is_rejected() {
        let config = Config {
            databases: Some(vec!["afdb50".to_string(), "nr".to_string()]),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, KiraError::InvalidDatabase(ref db) if db == "nr");
    }
}
