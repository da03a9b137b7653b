use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;

use crate::error::KiraError;
use crate::poller::Sleeper;

pub const REQUEST_DELAY: Duration = Duration::from_millis(500);

pub trait UniprotClient: Send + Sync {
    fn fetch_fasta(&self, accession: &str) -> Result<String, KiraError>;
}

#[derive(Clone)]
pub struct UniprotHttpClient {
    client: Client,
    base_url: String,
}

impl UniprotHttpClient {
    pub fn new(base_url: &str) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-fs/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| KiraError::UniprotHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn fasta_url(&self, accession: &str) -> String {
        format!("{}/{}.fasta", self.base_url, accession)
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, KiraError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "UniProt request failed".to_string());
        Err(KiraError::UniprotStatus { status, message })
    }
}

impl UniprotClient for UniprotHttpClient {
    fn fetch_fasta(&self, accession: &str) -> Result<String, KiraError> {
        let response = self
            .client
            .get(self.fasta_url(accession))
            .send()
            .map_err(|err| KiraError::UniprotHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        response
            .text()
            .map_err(|err| KiraError::UniprotHttp(err.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FastaBatchResult {
    pub requested: usize,
    pub downloaded: usize,
    pub failed: Vec<String>,
    pub output_path: String,
}

pub fn download_fasta_batch<C: UniprotClient, S: Sleeper>(
    client: &C,
    sleeper: &S,
    accessions: &[String],
    output: &Path,
    delay: Duration,
) -> Result<FastaBatchResult, KiraError> {
    let mut file = File::create(output)
        .map_err(|err| KiraError::Filesystem(format!("create {}: {err}", output.display())))?;
    let total = accessions.len();
    let mut downloaded = 0usize;
    let mut failed = Vec::new();

    for (idx, accession) in accessions.iter().enumerate() {
        match client.fetch_fasta(accession) {
            Ok(fasta) => {
                file.write_all(fasta.as_bytes())
                    .map_err(|err| KiraError::Filesystem(err.to_string()))?;
                if !fasta.ends_with('\n') {
                    file.write_all(b"\n")
                        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
                }
                downloaded += 1;
                tracing::info!("[{}/{total}] downloaded {accession}", idx + 1);
            }
            Err(err) => {
                tracing::warn!("[{}/{total}] failed {accession}: {err}", idx + 1);
                failed.push(accession.clone());
            }
        }
        if idx + 1 < total {
            sleeper.sleep(delay);
        }
    }

    Ok(FastaBatchResult {
        requested: total,
        downloaded,
        failed,
        output_path: output.display().to_string(),
    })
}
