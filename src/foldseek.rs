use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{AlignmentMode, RemoteStatus, TargetDatabase};
use crate::error::KiraError;

#[derive(Debug, Clone, Serialize)]
pub struct SearchPayload {
    #[serde(skip)]
    pub structure: String,
    pub databases: Vec<TargetDatabase>,
    pub mode: AlignmentMode,
}

impl SearchPayload {
    pub fn new(structure: String, databases: Vec<TargetDatabase>, mode: AlignmentMode) -> Self {
        Self {
            structure,
            databases,
            mode,
        }
    }

    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::with_capacity(self.databases.len() + 2);
        fields.push(("q", self.structure.clone()));
        for db in &self.databases {
            fields.push(("database[]", db.as_str().to_string()));
        }
        fields.push(("mode", self.mode.as_str().to_string()));
        fields
    }
}

#[derive(Debug, Clone)]
pub struct TicketResponse {
    pub id: Option<String>,
    pub raw_json: Value,
}

pub trait FoldseekClient: Send + Sync {
    fn submit(&self, payload: &SearchPayload) -> Result<TicketResponse, KiraError>;
    fn ticket_status(&self, ticket: &str) -> Result<RemoteStatus, KiraError>;
    fn download_result(&self, ticket: &str, destination: &Path) -> Result<u64, KiraError>;
}

#[derive(Clone)]
pub struct FoldseekHttpClient {
    client: Client,
    download_client: Client,
    base_url: String,
}

impl FoldseekHttpClient {
    pub fn new(base_url: &str) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-fs/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers.clone())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| KiraError::FoldseekHttp(err.to_string()))?;
        let download_client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| KiraError::FoldseekHttp(err.to_string()))?;
        Ok(Self {
            client,
            download_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn ticket_url(&self) -> String {
        format!("{}/ticket", self.base_url)
    }

    fn status_url(&self, ticket: &str) -> String {
        format!("{}/ticket/{ticket}", self.base_url)
    }

    fn download_url(&self, ticket: &str) -> String {
        format!("{}/result/download/{ticket}", self.base_url)
    }
}

impl FoldseekClient for FoldseekHttpClient {
    fn submit(&self, payload: &SearchPayload) -> Result<TicketResponse, KiraError> {
        let response = self
            .client
            .post(self.ticket_url())
            .form(&payload.form_fields())
            .send()
            .map_err(|err| KiraError::FoldseekHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "ticket request failed".to_string());
            return Err(KiraError::Submission(format!("status {status}: {message}")));
        }
        let raw_json: Value = response
            .json()
            .map_err(|err| KiraError::Submission(err.to_string()))?;
        let id = raw_json
            .get("id")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string());
        Ok(TicketResponse { id, raw_json })
    }

    fn ticket_status(&self, ticket: &str) -> Result<RemoteStatus, KiraError> {
        let response = self
            .client
            .get(self.status_url(ticket))
            .send()
            .map_err(|err| KiraError::FoldseekHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(KiraError::FoldseekHttp(format!(
                "status check for {ticket} returned {status}"
            )));
        }
        let raw_json: Value = response
            .json()
            .map_err(|err| KiraError::FoldseekHttp(err.to_string()))?;
        let status = raw_json
            .get("status")
            .and_then(|value| value.as_str())
            .unwrap_or("UNKNOWN");
        Ok(RemoteStatus::from_wire(status))
    }

    fn download_result(&self, ticket: &str, destination: &Path) -> Result<u64, KiraError> {
        let mut response = self
            .download_client
            .get(self.download_url(ticket))
            .send()
            .map_err(|err| KiraError::FoldseekHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "result download failed".to_string());
            return Err(KiraError::DownloadStatus { status, message });
        }
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        }
        let mut file =
            File::create(destination).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_repeats_database_field() {
        let payload = SearchPayload::new(
            "ATOM".to_string(),
            vec![TargetDatabase::Afdb50, TargetDatabase::Pdb100],
            AlignmentMode::TmAlign,
        );
        let fields = payload.form_fields();
        assert_eq!(fields[0], ("q", "ATOM".to_string()));
        assert_eq!(fields[1], ("database[]", "afdb50".to_string()));
        assert_eq!(fields[2], ("database[]", "pdb100".to_string()));
        assert_eq!(fields[3], ("mode", "tmalign".to_string()));
    }
}
