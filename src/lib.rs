pub mod alphafold;
pub mod archive;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod expression;
pub mod fasta;
pub mod foldseek;
pub mod hits;
pub mod output;
pub mod pipeline;
pub mod poller;
pub mod structure;
pub mod summary;
pub mod top_hits;
pub mod uniprot;
