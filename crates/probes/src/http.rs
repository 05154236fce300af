//! HTTP probe for directory enumeration and subdomain discovery

use crate::common::ProbeError;
use crate::constants::DEFAULT_HTTP_TIMEOUT;

use probeforge_core::{classify_http_status, Candidate, Outcome, Probe, USER_AGENT};
use reqwest::{header, redirect, Client};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// How a candidate becomes a request URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlMode {
    /// Join the candidate onto a base URL, e.g. `http://t/` + `admin`
    Join(Url),
    /// Use the candidate as the host, e.g. `http://www.example.com/`
    Host { scheme: String },
}

impl UrlMode {
    /// Join mode; the base always ends with `/` so the candidate is appended
    /// rather than replacing the last path segment
    pub fn join(base: &str) -> Result<Self, ProbeError> {
        let mut base = base.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let url = Url::parse(&base).map_err(|e| ProbeError::InvalidTarget(format!("{base}: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(ProbeError::InvalidTarget(base));
        }
        Ok(UrlMode::Join(url))
    }

    pub fn host(scheme: &str) -> Result<Self, ProbeError> {
        match scheme {
            "http" | "https" => Ok(UrlMode::Host {
                scheme: scheme.to_string(),
            }),
            other => Err(ProbeError::Unsupported(format!("scheme {other}"))),
        }
    }

    /// Request URL for one candidate
    pub fn target_url(&self, candidate: &str) -> Result<Url, ProbeError> {
        let invalid = |e: url::ParseError| ProbeError::InvalidTarget(format!("{candidate}: {e}"));
        match self {
            UrlMode::Join(base) => base.join(candidate).map_err(invalid),
            UrlMode::Host { scheme } => Url::parse(&format!("{scheme}://{candidate}/")).map_err(invalid),
        }
    }
}

/// HTTP GET probe; redirects are reported, never followed
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    mode: UrlMode,
}

impl HttpProbe {
    pub fn new(mode: UrlMode, timeout: Option<Duration>) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT))
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| ProbeError::Internal(format!("HTTP client: {e}")))?;

        debug!(mode = ?mode, "HTTP probe ready");
        Ok(Self { client, mode })
    }

    pub fn mode(&self) -> &UrlMode {
        &self.mode
    }

    async fn fetch(&self, candidate: &Candidate, timeout: Option<Duration>) -> Result<Outcome, ProbeError> {
        let url = self.mode.target_url(candidate.value())?;

        let mut request = self.client.get(url.clone());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(request_error)?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok());

        trace!(url = %url, status, "HTTP response");
        Ok(classify_http_status(url.as_str(), status, location))
    }
}

impl Probe for HttpProbe {
    async fn probe(&self, candidate: &Candidate, timeout: Option<Duration>) -> Outcome {
        self.fetch(candidate, timeout)
            .await
            .unwrap_or_else(ProbeError::into_outcome)
    }
}

fn request_error(e: reqwest::Error) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout
    } else if e.is_connect() {
        ProbeError::IoError(format!("connect: {e}"))
    } else if e.is_builder() {
        ProbeError::InvalidTarget(e.to_string())
    } else {
        ProbeError::Protocol(e.to_string())
    }
}
