use std::time::Duration;

use camino::Utf8PathBuf;
use reqwest::Url;

use crate::error::HarvestError;

pub const DEFAULT_API_ROOT: &str = "https://xkcd.com";
pub const DEFAULT_DIRECTORY: &str = "comics";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_WORKERS: usize = 8;

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub api_root: String,
    pub directory: Utf8PathBuf,
    pub timeout: Duration,
    pub workers: usize,
    pub headers: Vec<(String, String)>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            directory: Utf8PathBuf::from(DEFAULT_DIRECTORY),
            timeout: DEFAULT_TIMEOUT,
            workers: DEFAULT_WORKERS,
            headers: Vec::new(),
        }
    }
}

impl HarvestConfig {
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case("user-agent"));
        self.headers
            .push(("user-agent".to_string(), user_agent.to_string()));
        self
    }

    pub fn validate(self) -> Result<Self, HarvestError> {
        let api_root = self.api_root.trim().trim_end_matches('/').to_string();
        let url = Url::parse(&api_root)
            .map_err(|err| HarvestError::InvalidConfig(format!("api root {api_root}: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HarvestError::InvalidConfig(format!(
                "api root must be http(s): {api_root}"
            )));
        }
        if self.timeout.is_zero() {
            return Err(HarvestError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.directory.as_str().trim().is_empty() {
            return Err(HarvestError::InvalidConfig(
                "storage directory must not be empty".to_string(),
            ));
        }
        Ok(Self { api_root, ..self })
    }
}
