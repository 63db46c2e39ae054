use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use prompt_search_client::{parse_base_url, ClientConfig};
use serde::{Deserialize, Serialize};

use crate::fetcher::FetcherOptions;
use crate::session::SessionOptions;

pub const ENV_PREFIX: &str = "PROMPT_SEARCH";
const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Runtime settings, layered as defaults < settings file < `PROMPT_SEARCH_*` environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub base_url: String,
    pub suggestion_page_size: usize,
    pub result_page_size: usize,
    pub min_query_len: usize,
    pub debounce_ms: u64,
    pub request_timeout_ms: u64,
    pub suggestion_cache_capacity: usize,
    pub suggestion_cache_ttl_secs: u64,
    pub keep_results_on_error: bool,
    pub user_agent: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            base_url: client.base_url,
            suggestion_page_size: 8,
            result_page_size: 20,
            min_query_len: 2,
            debounce_ms: 300,
            request_timeout_ms: 10_000,
            suggestion_cache_capacity: client.suggestion_cache_capacity,
            suggestion_cache_ttl_secs: 300,
            keep_results_on_error: false,
            user_agent: client.user_agent,
        }
    }
}

impl SearchSettings {
    /// Loads settings from `path` when given (must exist), otherwise from the
    /// per-user config directory if a file is present there.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (file, required) = match path {
            Some(path) => (Some(path.to_path_buf()), true),
            None => (default_settings_path(), false),
        };
        Self::load_layers(file.as_deref(), required, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_layers(file: Option<&Path>, required: bool, environment: Environment) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("base_url", defaults.base_url.clone())?
            .set_default("suggestion_page_size", to_i64(defaults.suggestion_page_size))?
            .set_default("result_page_size", to_i64(defaults.result_page_size))?
            .set_default("min_query_len", to_i64(defaults.min_query_len))?
            .set_default("debounce_ms", to_i64(defaults.debounce_ms))?
            .set_default("request_timeout_ms", to_i64(defaults.request_timeout_ms))?
            .set_default(
                "suggestion_cache_capacity",
                to_i64(defaults.suggestion_cache_capacity),
            )?
            .set_default(
                "suggestion_cache_ttl_secs",
                to_i64(defaults.suggestion_cache_ttl_secs),
            )?
            .set_default("keep_results_on_error", defaults.keep_results_on_error)?
            .set_default("user_agent", defaults.user_agent.clone())?;

        if let Some(file) = file {
            builder = builder.add_source(
                File::from(file)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        let settings: Self = builder
            .add_source(environment.try_parsing(true))
            .build()
            .context("failed to assemble settings")?
            .try_deserialize()
            .context("invalid settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            bail!("base_url must not be empty");
        }
        parse_base_url(&self.base_url).context("invalid base_url")?;
        if self.suggestion_page_size == 0 || self.result_page_size == 0 {
            bail!("page sizes must be at least 1");
        }
        if self.min_query_len == 0 {
            bail!("min_query_len must be at least 1");
        }
        if self.request_timeout_ms == 0 {
            bail!("request_timeout_ms must be at least 1");
        }
        Ok(())
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            timeout: self.request_timeout(),
            user_agent: self.user_agent.clone(),
            suggestion_cache_ttl: time_duration_secs(self.suggestion_cache_ttl_secs),
            suggestion_cache_capacity: self.suggestion_cache_capacity,
        }
    }

    pub fn fetcher_options(&self) -> FetcherOptions {
        FetcherOptions {
            min_query_len: self.min_query_len,
            page_size: self.suggestion_page_size,
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            page_size: self.result_page_size,
            timeout: self.request_timeout(),
            keep_results_on_error: self.keep_results_on_error,
        }
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "PromptSearch", "prompt-search")
        .map(|dirs| dirs.config_dir().join(SETTINGS_FILE_NAME))
}

fn to_i64<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

fn time_duration_secs(secs: u64) -> time::Duration {
    time::Duration::seconds(to_i64(secs))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn isolated_env(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(source))
    }

    #[test]
    fn defaults_match_service_contract() {
        let settings = SearchSettings::load_layers(None, false, isolated_env(&[])).unwrap();
        assert_eq!(settings, SearchSettings::default());
        assert_eq!(settings.suggestion_page_size, 8);
        assert_eq!(settings.result_page_size, 20);
        assert_eq!(settings.min_query_len, 2);
        assert_eq!(settings.debounce_ms, 300);
        assert!(!settings.keep_results_on_error);
    }

    #[test]
    fn file_then_environment_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "base_url = \"http://search.internal:9200\"\ndebounce_ms = 150\nkeep_results_on_error = true"
        )
        .unwrap();

        let settings = SearchSettings::load_layers(
            Some(file.path()),
            true,
            isolated_env(&[("PROMPT_SEARCH_DEBOUNCE_MS", "75")]),
        )
        .unwrap();

        assert_eq!(settings.base_url, "http://search.internal:9200");
        assert_eq!(settings.debounce_ms, 75);
        assert!(settings.keep_results_on_error);
        assert_eq!(settings.result_page_size, 20);
        assert_eq!(settings.fetcher_options().debounce, Duration::from_millis(75));
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(SearchSettings::load_layers(Some(&missing), true, isolated_env(&[])).is_err());
        assert!(SearchSettings::load_layers(Some(&missing), false, isolated_env(&[])).is_ok());
    }

    #[test]
    fn rejects_unusable_base_url() {
        for base_url in ["not a url", "ftp://search.internal", "/relative/path"] {
            let settings = SearchSettings::default().with_base_url(base_url);
            assert!(settings.validate().is_err(), "{base_url} accepted");
        }
        let result = SearchSettings::load_layers(
            None,
            false,
            isolated_env(&[("PROMPT_SEARCH_BASE_URL", "localhost:8000 extra")]),
        );
        assert!(result.is_err());
        assert!(SearchSettings::default()
            .with_base_url("https://search.internal:9200/")
            .validate()
            .is_ok());
    }

    #[test]
    fn client_config_carries_cache_ttl_and_timeout() {
        let settings = SearchSettings::load_layers(
            None,
            false,
            isolated_env(&[
                ("PROMPT_SEARCH_SUGGESTION_CACHE_TTL_SECS", "90"),
                ("PROMPT_SEARCH_REQUEST_TIMEOUT_MS", "2500"),
            ]),
        )
        .unwrap();
        let client = settings.client_config();
        assert_eq!(client.suggestion_cache_ttl, time::Duration::seconds(90));
        assert_eq!(client.timeout, Duration::from_millis(2500));
        assert_eq!(settings.session_options().timeout, Duration::from_millis(2500));
    }

    #[test]
    fn rejects_zero_page_size() {
        let result = SearchSettings::load_layers(
            None,
            false,
            isolated_env(&[("PROMPT_SEARCH_RESULT_PAGE_SIZE", "0")]),
        );
        assert!(result.is_err());
    }
}
