use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::KiraError;

pub const MODEL_PREFIX: &str = "AF-";

pub trait ModelClient: Send + Sync {
    fn download_model(&self, model_id: &str, destination: &Path) -> Result<(), KiraError>;
}

#[derive(Clone)]
pub struct AlphafoldHttpClient {
    client: Client,
    base_url: String,
}

impl AlphafoldHttpClient {
    pub fn new(base_url: &str) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-fs/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| KiraError::AlphafoldHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model_url(&self, model_id: &str) -> String {
        format!("{}/{model_id}.pdb", self.base_url)
    }
}

impl ModelClient for AlphafoldHttpClient {
    fn download_model(&self, model_id: &str, destination: &Path) -> Result<(), KiraError> {
        let mut response = self
            .client
            .get(self.model_url(model_id))
            .send()
            .map_err(|err| KiraError::AlphafoldHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "AlphaFold request failed".to_string());
            return Err(KiraError::AlphafoldStatus { status, message });
        }
        let mut file =
            File::create(destination).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

pub fn canonical_model_id(target: &str) -> Option<String> {
    if !target.to_uppercase().starts_with(MODEL_PREFIX) {
        return None;
    }
    let accession = target.split('-').nth(1).filter(|acc| !acc.is_empty())?;
    Some(format!("AF-{accession}-F1-model_v4"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_model_from_target() {
        assert_eq!(
            canonical_model_id("AF-A0A0E9XQA6-F1-model_v3").as_deref(),
            Some("AF-A0A0E9XQA6-F1-model_v4")
        );
        assert_eq!(canonical_model_id("1abc_A"), None);
        assert_eq!(canonical_model_id("AF-"), None);
    }
}
