use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

const STRUCTURE_SUFFIXES: [&str; 3] = [".pdb", ".cif", ".ent"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum AlignmentMode {
    #[default]
    #[serde(rename = "3diaa")]
    #[value(name = "3diaa")]
    ThreeDiAa,
    #[serde(rename = "tmalign")]
    #[value(name = "tmalign")]
    TmAlign,
}

impl AlignmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlignmentMode::ThreeDiAa => "3diaa",
            AlignmentMode::TmAlign => "tmalign",
        }
    }
}

impl fmt::Display for AlignmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlignmentMode {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "" | "3diaa" => Ok(AlignmentMode::ThreeDiAa),
            "tmalign" => Ok(AlignmentMode::TmAlign),
            _ => Err(KiraError::InvalidMode(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetDatabase {
    #[serde(rename = "afdb50")]
    Afdb50,
    #[serde(rename = "afdb-swissprot")]
    AfdbSwissprot,
    #[serde(rename = "afdb-proteome")]
    AfdbProteome,
    #[serde(rename = "mgnify_esm30")]
    MgnifyEsm30,
    #[serde(rename = "pdb100")]
    Pdb100,
    #[serde(rename = "gmgcl_id")]
    GmgclId,
}

impl TargetDatabase {
    pub const ALL: [TargetDatabase; 6] = [
        TargetDatabase::Afdb50,
        TargetDatabase::AfdbSwissprot,
        TargetDatabase::AfdbProteome,
        TargetDatabase::MgnifyEsm30,
        TargetDatabase::Pdb100,
        TargetDatabase::GmgclId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetDatabase::Afdb50 => "afdb50",
            TargetDatabase::AfdbSwissprot => "afdb-swissprot",
            TargetDatabase::AfdbProteome => "afdb-proteome",
            TargetDatabase::MgnifyEsm30 => "mgnify_esm30",
            TargetDatabase::Pdb100 => "pdb100",
            TargetDatabase::GmgclId => "gmgcl_id",
        }
    }
}

impl fmt::Display for TargetDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetDatabase {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        TargetDatabase::ALL
            .into_iter()
            .find(|db| db.as_str() == trimmed)
            .ok_or_else(|| KiraError::InvalidDatabase(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProteinId(String);

impl ProteinId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProteinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProteinId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let is_valid = !normalized.is_empty()
            && normalized.len() <= 4
            && normalized.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(KiraError::InvalidStructureId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniprotId(String);

impl UniprotId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniprotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UniprotId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = trimmed.len() > 4
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !is_valid {
            return Err(KiraError::InvalidStructureId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureInput {
    LocalFile(PathBuf),
    Pdb(ProteinId),
    Uniprot(UniprotId),
}

impl StructureInput {
    pub fn parse(value: &str) -> Result<Self, KiraError> {
        let trimmed = value.trim();
        if has_structure_suffix(trimmed) || Path::new(trimmed).is_file() {
            return Ok(StructureInput::LocalFile(PathBuf::from(trimmed)));
        }
        if trimmed.chars().count() > 4 {
            Ok(StructureInput::Uniprot(trimmed.parse()?))
        } else {
            Ok(StructureInput::Pdb(trimmed.parse()?))
        }
    }

    pub fn needs_mapping(&self) -> bool {
        matches!(self, StructureInput::Uniprot(_))
    }
}

fn has_structure_suffix(value: &str) -> bool {
    let lower = value.to_lowercase();
    STRUCTURE_SUFFIXES
        .iter()
        .any(|suffix| lower.ends_with(suffix))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Submitted,
    Running,
    Complete,
    Error,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Error | JobStatus::TimedOut
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::Running => "RUNNING",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Error => "ERROR",
            JobStatus::TimedOut => "TIMED_OUT",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Complete,
    Error,
    Pending(String),
}

impl RemoteStatus {
    pub fn from_wire(value: &str) -> Self {
        match value.trim() {
            "COMPLETE" => RemoteStatus::Complete,
            "ERROR" => RemoteStatus::Error,
            other => RemoteStatus::Pending(other.to_string()),
        }
    }
}
