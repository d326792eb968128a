//! Shared HTTP Plumbing
//!
//! One [`ApiClient`] per adapter, wrapping a pooled `reqwest` client with
//! the crate user agent and the configured timeout. Status mapping is
//! uniform across platforms: 401 and 403 become repository
//! authentication/access errors, 404 becomes repository-not-found, any
//! other non-success status becomes a [`PlatformApiError`] carrying the
//! platform name and HTTP status. Transport failures use status 0.

use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::scm::error::{PlatformApiError, RepositoryError, ScmError, ScmResult};

const BODY_SNIPPET_LIMIT: usize = 300;

/// Credential applied to outgoing requests
#[derive(Debug, Clone)]
pub enum Auth {
    None,
    /// `Authorization: Bearer <token>` (GitHub, Bitbucket Server)
    Bearer(String),
    /// HTTP basic auth (Bitbucket Cloud app passwords, Azure PATs)
    Basic { username: String, password: String },
    /// GitLab's `PRIVATE-TOKEN` header
    PrivateToken(String),
}

pub struct ApiClient {
    http: reqwest::Client,
    platform: &'static str,
}

impl ApiClient {
    pub fn new(platform: &'static str, timeout_secs: u64) -> ScmResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("scmscan/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ScmError::Configuration {
                message: format!("Failed to build HTTP client for {}: {}", platform, e),
            })?;
        Ok(Self { http, platform })
    }

    pub fn platform(&self) -> &'static str {
        self.platform
    }

    /// GET a JSON document
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        auth: &Auth,
        repository: &str,
    ) -> ScmResult<T> {
        let response = self.execute(url, auth, repository).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| self.decode_error(&e))
    }

    /// GET a JSON document plus the response headers
    ///
    /// GitLab communicates pagination and rate limit state through headers.
    pub async fn get_json_with_headers<T: DeserializeOwned>(
        &self,
        url: &str,
        auth: &Auth,
        repository: &str,
    ) -> ScmResult<(T, HeaderMap)> {
        let response = self.execute(url, auth, repository).await?;
        let headers = response.headers().clone();
        let body = response
            .json::<T>()
            .await
            .map_err(|e| self.decode_error(&e))?;
        Ok((body, headers))
    }

    /// GET a raw text body (diff endpoints)
    pub async fn get_text(&self, url: &str, auth: &Auth, repository: &str) -> ScmResult<String> {
        let response = self.execute(url, auth, repository).await?;
        response.text().await.map_err(|e| self.decode_error(&e))
    }

    async fn execute(&self, url: &str, auth: &Auth, repository: &str) -> ScmResult<Response> {
        log::debug!("{} GET {}", self.platform, url);
        let request = apply_auth(self.http.get(url), auth);
        let response = request.send().await.map_err(|e| {
            ScmError::PlatformApi(PlatformApiError {
                platform: self.platform.to_string(),
                status: 0,
                message: e.to_string(),
            })
        })?;
        self.check_status(response, repository).await
    }

    async fn check_status(&self, response: Response, repository: &str) -> ScmResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(match status {
            StatusCode::UNAUTHORIZED => {
                ScmError::Repository(RepositoryError::AuthenticationFailed {
                    repository: repository.to_string(),
                })
            }
            StatusCode::FORBIDDEN => ScmError::Repository(RepositoryError::AccessDenied {
                repository: repository.to_string(),
            }),
            StatusCode::NOT_FOUND => ScmError::Repository(RepositoryError::NotFound {
                repository: repository.to_string(),
            }),
            other => {
                let body = response.text().await.unwrap_or_default();
                ScmError::PlatformApi(PlatformApiError {
                    platform: self.platform.to_string(),
                    status: other.as_u16(),
                    message: snippet(&body),
                })
            }
        })
    }

    fn decode_error(&self, e: &reqwest::Error) -> ScmError {
        ScmError::PlatformApi(PlatformApiError {
            platform: self.platform.to_string(),
            status: 0,
            message: format!("Failed to decode response: {}", e),
        })
    }
}

fn apply_auth(request: reqwest::RequestBuilder, auth: &Auth) -> reqwest::RequestBuilder {
    match auth {
        Auth::None => request,
        Auth::Bearer(token) => request.bearer_auth(token),
        Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
        Auth::PrivateToken(token) => request.header("PRIVATE-TOKEN", token.as_str()),
    }
}

/// Collapse an [`ScmError`] into the probe error shape used by rate limit
/// monitors
pub(crate) fn probe_error(platform: &'static str, err: ScmError) -> PlatformApiError {
    match err {
        ScmError::PlatformApi(e) => e,
        other => PlatformApiError {
            platform: platform.to_string(),
            status: 0,
            message: other.to_string(),
        },
    }
}

fn snippet(body: &str) -> String {
    if body.chars().count() <= BODY_SNIPPET_LIMIT {
        body.to_string()
    } else {
        let prefix: String = body.chars().take(BODY_SNIPPET_LIMIT).collect();
        format!("{}...", prefix)
    }
}
