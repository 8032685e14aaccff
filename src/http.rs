use std::collections::HashMap;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::error;

use crate::config::HarvestConfig;
use crate::error::{HarvestError, RequestFailure, RequestFailureKind};

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

pub trait Fetcher: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, RequestFailure>;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn get(&self, url: &str) -> Result<HttpResponse, RequestFailure> {
        (**self).get(url)
    }
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HarvestConfig) -> Result<Self, HarvestError> {
        Self::with_headers(config.timeout, &config.headers)
    }

    pub fn with_headers(
        timeout: Duration,
        extra: &[(String, String)],
    ) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        for (name, value) in extra {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| HarvestError::InvalidConfig(format!("header {name}: {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| HarvestError::InvalidConfig(format!("header {name}: {err}")))?;
            headers.insert(name, value);
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| HarvestError::HttpClient(err.to_string()))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str) -> Result<HttpResponse, RequestFailure> {
        let parsed = Url::parse(url)
            .map_err(|err| RequestFailure::new(RequestFailureKind::MalformedUrl, url, err.to_string()))?;
        let response = self
            .client
            .get(parsed)
            .send()
            .map_err(|err| RequestFailure::new(classify(&err), url, err.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect::<HashMap<_, _>>();
        let body = response
            .bytes()
            .map_err(|err| RequestFailure::new(classify(&err), url, err.to_string()))?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
            headers,
        })
    }
}

fn classify(err: &reqwest::Error) -> RequestFailureKind {
    if err.is_timeout() {
        RequestFailureKind::Timeout
    } else if err.is_connect() {
        RequestFailureKind::Connection
    } else if err.is_builder() {
        RequestFailureKind::MalformedUrl
    } else {
        RequestFailureKind::Transport
    }
}

/// Sends one GET and logs any transport failure with `context`.
pub fn request<F: Fetcher + ?Sized>(fetcher: &F, url: &str, context: &str) -> Option<HttpResponse> {
    match fetcher.get(url) {
        Ok(response) => Some(response),
        Err(failure) => {
            error!(kind = %failure.kind, url, reason = %failure.message, "{} {context}", failure.kind);
            None
        }
    }
}
