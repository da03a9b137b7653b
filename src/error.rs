use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("input structure not found: {0}")]
    InputNotFound(PathBuf),

    #[error("invalid structure identifier: {0}")]
    InvalidStructureId(String),

    #[error("invalid alignment mode: {0}")]
    InvalidMode(String),

    #[error("unknown target database: {0}")]
    InvalidDatabase(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("Foldseek request failed: {0}")]
    FoldseekHttp(String),

    #[error("Foldseek rejected the search job: {0}")]
    Submission(String),

    #[error("Foldseek reported an error for ticket {ticket}")]
    RemoteJob { ticket: String },

    #[error("ticket {ticket} did not complete after {attempts} status checks")]
    PollTimeout { ticket: String, attempts: u32 },

    #[error("result download returned status {status}: {message}")]
    DownloadStatus { status: u16, message: String },

    #[error("result archive is not a readable tar.gz: {0}")]
    ArchiveFormat(String),

    #[error("PDBe request failed: {0}")]
    PdbeHttp(String),

    #[error("PDBe returned status {status}: {message}")]
    PdbeStatus { status: u16, message: String },

    #[error("no PDB structure found for UniProt accession {0}")]
    NoMappedStructure(String),

    #[error("RCSB request failed: {0}")]
    RcsbHttp(String),

    #[error("RCSB returned status {status}: {message}")]
    RcsbStatus { status: u16, message: String },

    #[error("AlphaFold request failed: {0}")]
    AlphafoldHttp(String),

    #[error("AlphaFold returned status {status}: {message}")]
    AlphafoldStatus { status: u16, message: String },

    #[error("uniprot request failed: {0}")]
    UniprotHttp(String),

    #[error("uniprot returned status {status}: {message}")]
    UniprotStatus { status: u16, message: String },

    #[error("malformed hit line: {0}")]
    MalformedHit(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("missing column in {file}: {column}")]
    MissingColumn { file: String, column: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
