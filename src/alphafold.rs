use std::io::Write;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::AfError;

/// Remote AlphaFold structure host.
///
/// Existence checks and transfers are separate calls so that a missing
/// prediction costs one HEAD request and never a body transfer.
pub trait AlphaFoldClient {
    fn structure_url(&self, file_name: &str) -> String;

    /// `Ok(false)` for any non-success status.
    fn structure_exists(&self, file_name: &str) -> Result<bool, AfError>;

    fn download_structure(&self, file_name: &str, destination: &mut dyn Write)
    -> Result<u64, AfError>;
}

#[derive(Clone)]
pub struct AlphaFoldHttpClient {
    client: Client,
    base_url: String,
}

impl AlphaFoldHttpClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, AfError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-af/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AfError::AlphaFoldHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| AfError::AlphaFoldHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, AfError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(AfError::AlphaFoldStatus {
            status: response.status().as_u16(),
            url: response.url().to_string(),
        })
    }
}

impl AlphaFoldClient for AlphaFoldHttpClient {
    fn structure_url(&self, file_name: &str) -> String {
        format!("{}{}", self.base_url, file_name)
    }

    fn structure_exists(&self, file_name: &str) -> Result<bool, AfError> {
        let url = self.structure_url(file_name);
        let response = self
            .client
            .head(&url)
            .send()
            .map_err(|err| AfError::FetchFailed {
                url: url.clone(),
                message: err.to_string(),
            })?;
        tracing::debug!(%url, status = response.status().as_u16(), "existence check");
        Ok(response.status().is_success())
    }

    fn download_structure(
        &self,
        file_name: &str,
        destination: &mut dyn Write,
    ) -> Result<u64, AfError> {
        let url = self.structure_url(file_name);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| AfError::FetchFailed {
                url: url.clone(),
                message: err.to_string(),
            })?;
        let mut response = Self::handle_status(response)?;
        response
            .copy_to(destination)
            .map_err(|err| AfError::FetchFailed {
                url,
                message: err.to_string(),
            })
    }
}

/// Writes `file_name` from the remote host into `path` via a sibling temp file.
pub fn download_to_path<C: AlphaFoldClient + ?Sized>(
    client: &C,
    file_name: &str,
    path: &Path,
) -> Result<u64, AfError> {
    let parent = path
        .parent()
        .ok_or_else(|| AfError::Filesystem("invalid destination path".to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("kira-af-download")
        .tempfile_in(parent)
        .map_err(|err| AfError::Filesystem(err.to_string()))?;
    let bytes = client.download_structure(file_name, temp.as_file_mut())?;
    temp.as_file_mut()
        .flush()
        .map_err(|err| AfError::Filesystem(err.to_string()))?;
    temp.persist(path)
        .map_err(|err| AfError::Filesystem(err.to_string()))?;
    Ok(bytes)
}
