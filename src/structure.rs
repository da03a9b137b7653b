use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::domain::{ProteinId, UniprotId};
use crate::error::KiraError;

pub trait StructureClient: Send + Sync {
    fn map_to_pdb(&self, accession: &UniprotId) -> Result<ProteinId, KiraError>;
    fn download_structure(&self, id: &ProteinId, destination: &Path) -> Result<(), KiraError>;
}

#[derive(Clone)]
pub struct StructureHttpClient {
    client: Client,
    pdbe_base: String,
    rcsb_base: String,
}

impl StructureHttpClient {
    pub fn new(pdbe_base: &str, rcsb_base: &str) -> Result<Self, KiraError> {
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
            .map_err(|err| KiraError::RcsbHttp(err.to_string()))?;
        Ok(Self {
            client,
            pdbe_base: pdbe_base.trim_end_matches('/').to_string(),
            rcsb_base: rcsb_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn structure_url(&self, id: &ProteinId) -> String {
        format!("{}/download/{}.pdb", self.rcsb_base, id.as_str())
    }

    fn mapping_url(&self, accession: &UniprotId) -> String {
        format!(
            "{}/mappings/best_structures/{}",
            self.pdbe_base,
            accession.as_str()
        )
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
            .unwrap_or_else(|_| "RCSB request failed".to_string());
        Err(KiraError::RcsbStatus { status, message })
    }
}

impl StructureClient for StructureHttpClient {
    fn map_to_pdb(&self, accession: &UniprotId) -> Result<ProteinId, KiraError> {
        let response = self
            .client
            .get(self.mapping_url(accession))
            .send()
            .map_err(|err| KiraError::PdbeHttp(err.to_string()))?;
        let status = response.status().as_u16();
        if status == 404 {
            return Err(KiraError::NoMappedStructure(accession.to_string()));
        }
        if !response.status().is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "PDBe request failed".to_string());
            return Err(KiraError::PdbeStatus { status, message });
        }
        let raw_json: Value = response
            .json()
            .map_err(|err| KiraError::PdbeHttp(err.to_string()))?;
        let pdb_id = best_structure_id(&raw_json, accession)
            .ok_or_else(|| KiraError::NoMappedStructure(accession.to_string()))?;
        tracing::info!(accession = %accession, pdb_id = %pdb_id, "found associated PDB entry");
        pdb_id.parse()
    }

    fn download_structure(&self, id: &ProteinId, destination: &Path) -> Result<(), KiraError> {
        let response = self
            .client
            .get(self.structure_url(id))
            .send()
            .map_err(|err| KiraError::RcsbHttp(err.to_string()))?;
        let mut response = Self::handle_status(response)?;
        let mut file =
            File::create(destination).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

pub fn best_structure_id(raw: &Value, accession: &UniprotId) -> Option<String> {
    raw.get(accession.as_str())
        .and_then(|value| value.as_array())
        .and_then(|array| array.first())
        .and_then(|value| value.get("pdb_id"))
        .and_then(|value| value.as_str())
        .map(|value| value.to_string())
}
