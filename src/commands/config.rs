use crate::Result;
use crate::harvest::FetchSettings;
use camino::Utf8Path;
use core::time::Duration;
use ohno::{EnrichableExt, IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use url::Url;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "awesome-rank.toml";

/// Longest accepted `rate_limit_backoff` or `request_timeout`.
const MAX_DURATION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Maximum number of API requests in flight at once
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Wait applied after a rate-limit reply
    #[serde(default = "default_rate_limit_backoff", with = "humantime_serde")]
    pub rate_limit_backoff: Duration,

    /// Time budget for each request
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_raw_base_url")]
    pub raw_base_url: String,

    /// Host whose links are collected from the awesome list
    #[serde(default = "default_link_host")]
    pub link_host: String,
}

const fn default_max_concurrent_requests() -> usize {
    8
}

const fn default_rate_limit_backoff() -> Duration {
    Duration::from_secs(60)
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_raw_base_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_link_host() -> String {
    crate::harvest::DEFAULT_LINK_HOST.to_string()
}

impl Config {
    /// Load configuration from `config_path`, or from `awesome-rank.toml` in `base_dir` if present,
    /// falling back to defaults.
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8Path>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.to_path_buf(), text)
        } else {
            let path = base_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!(target: "    config", "No '{path}' found, using the default configuration");
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        Self::parse(&text).map_err(|e| e.enrich_with(|| format!("loading configuration file '{final_path}'")))
    }

    fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).into_app_err("parsing configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default configuration to `output_path`.
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))
    }

    /// The fetcher settings this configuration describes.
    #[must_use]
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            api_base_url: self.api_base_url.clone(),
            max_concurrent_requests: self.max_concurrent_requests,
            rate_limit_backoff: self.rate_limit_backoff,
            request_timeout: self.request_timeout,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent_requests == 0 {
            return Err(app_err!("max_concurrent_requests must be at least 1"));
        }

        if self.max_concurrent_requests > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(app_err!(
                "max_concurrent_requests must be at most {}",
                tokio::sync::Semaphore::MAX_PERMITS
            ));
        }

        for (key, value) in [("rate_limit_backoff", self.rate_limit_backoff), ("request_timeout", self.request_timeout)] {
            if value.is_zero() {
                return Err(app_err!("{key} must be greater than zero"));
            }
            if value > MAX_DURATION {
                return Err(app_err!("{key} must be at most {}s", MAX_DURATION.as_secs()));
            }
        }

        for (key, value) in [("api_base_url", &self.api_base_url), ("raw_base_url", &self.raw_base_url)] {
            let url = Url::parse(value).into_app_err_with(|| format!("{key} '{value}' is not a valid URL"))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(app_err!("{key} '{value}' must use http or https"));
            }
        }

        if self.link_host.is_empty() || self.link_host.contains(['/', ' ']) {
            return Err(app_err!("link_host '{}' must be a bare host name", self.link_host));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}
