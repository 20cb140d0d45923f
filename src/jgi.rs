use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::config::TransferSettings;
use crate::error::MycoError;
use crate::fs_util;

/// Moves bytes from the portal to local disk. Everything the pipeline needs
/// from the network goes through here.
pub trait Transfer: Send + Sync {
    fn login(&self) -> Result<(), MycoError>;
    /// Fetches `url` (absolute, or relative to the portal host) into `destination`.
    fn download(&self, url: &str, destination: &Path) -> Result<u64, MycoError>;
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self, MycoError> {
        let username = std::env::var("JGI_USERNAME").unwrap_or_default();
        let password = std::env::var("JGI_PASSWORD").unwrap_or_default();
        if username.trim().is_empty() || password.is_empty() {
            return Err(MycoError::MissingCredentials);
        }
        Ok(Self {
            username: username.trim().to_string(),
            password,
        })
    }
}

#[derive(Clone)]
pub struct JgiHttpClient {
    client: Client,
    base_url: String,
    signon_url: String,
    credentials: Option<Credentials>,
    retries: u32,
}

impl JgiHttpClient {
    pub fn new(
        base_url: &str,
        signon_url: &str,
        settings: TransferSettings,
        credentials: Option<Credentials>,
    ) -> Result<Self, MycoError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("mycocosm-dl/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MycoError::JgiHttp(err.to_string()))?,
        );

        // the sign-on session lives in a cookie
        let client = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(settings.timeout)
            .build()
            .map_err(|err| MycoError::JgiHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            signon_url: signon_url.to_string(),
            credentials,
            retries: settings.retries,
        })
    }

    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{url}", self.base_url)
        } else {
            format!("{}/{url}", self.base_url)
        }
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, MycoError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 1000;
        let mut attempt = 0u32;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.retries && is_retryable_status(status) {
                        tracing::debug!(status, attempt, "retrying JGI request");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.retries && is_retryable_error(&err) {
                        tracing::debug!(error = %err, attempt, "retrying JGI request");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(MycoError::JgiHttp(err.to_string()));
                }
            }
        }
    }
}

impl Transfer for JgiHttpClient {
    fn login(&self) -> Result<(), MycoError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(MycoError::MissingCredentials)?;
        let response = self.send_with_retries(|| {
            self.client.post(&self.signon_url).form(&[
                ("login", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
        })?;
        if !response.status().is_success() {
            return Err(MycoError::Login(format!(
                "sign-on returned status {}",
                response.status().as_u16()
            )));
        }
        tracing::info!(user = %credentials.username, "signed on to JGI");
        Ok(())
    }

    fn download(&self, url: &str, destination: &Path) -> Result<u64, MycoError> {
        let url = self.resolve_url(url);
        let mut response = self.send_with_retries(|| self.client.get(&url))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "JGI request failed".to_string());
            return Err(MycoError::JgiStatus { status, message });
        }

        let parent = destination
            .parent()
            .ok_or_else(|| MycoError::Filesystem("invalid destination path".to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix("mycocosm-download")
            .tempfile_in(parent)
            .map_err(|err| MycoError::Filesystem(err.to_string()))?;
        let written = std::io::copy(&mut response, temp.as_file_mut())
            .map_err(|err| MycoError::JgiHttp(format!("{url}: {err}")))?;
        fs_util::validate_gzip(temp.path())?;
        temp.persist(destination)
            .map_err(|err| MycoError::Filesystem(err.to_string()))?;
        Ok(written)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
