use crate::core::search_controller::{SearchSettings, DEFAULT_RESULT_LIMIT};
use crate::core::selection::{SelectionConfig, DEFAULT_MAX_ITEMS, DEFAULT_STORAGE_KEY};
use crate::utils::error::{CatalogError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub selection: SelectionSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub endpoint: Option<String>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionSection {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_watch_storage")]
    pub watch_storage: bool,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_result_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

fn default_storage_dir() -> String {
    "./.catalog-compare".to_string()
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

fn default_watch_storage() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            debounce_ms: default_debounce_ms(),
            result_limit: default_result_limit(),
            timeout_seconds: None,
            headers: None,
        }
    }
}

impl Default for SelectionSection {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            storage_key: default_storage_key(),
            max_items: default_max_items(),
            watch_storage: default_watch_storage(),
        }
    }
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| CatalogError::ConfigValidation {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` references with environment values.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| CatalogError::Config {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(endpoint) = &self.search.endpoint {
            validation::validate_url("search.endpoint", endpoint)?;
        }
        validation::validate_range("search.debounce_ms", self.search.debounce_ms, 0, 10_000)?;
        validation::validate_positive_number("search.result_limit", self.search.result_limit, 1)?;
        if let Some(timeout) = self.search.timeout_seconds {
            validation::validate_range("search.timeout_seconds", timeout, 1, 300)?;
        }

        validation::validate_path("selection.storage_dir", &self.selection.storage_dir)?;
        validation::validate_storage_key("selection.storage_key", &self.selection.storage_key)?;
        validation::validate_range("selection.max_items", self.selection.max_items, 1, 16)?;

        Ok(())
    }

    /// Endpoint for remote search; required only by commands that search.
    pub fn endpoint(&self) -> Result<&str> {
        self.search
            .endpoint
            .as_deref()
            .ok_or_else(|| CatalogError::MissingConfig {
                field: "search.endpoint".to_string(),
            })
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            debounce: Duration::from_millis(self.search.debounce_ms),
            result_limit: self.search.result_limit,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.search.timeout_seconds.map(Duration::from_secs)
    }

    pub fn selection_config(&self) -> SelectionConfig {
        SelectionConfig {
            storage_key: self.selection.storage_key.clone(),
            max_items: self.selection.max_items,
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::search_controller::MAX_RESULT_LIMIT;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[search]
endpoint = "https://shop.example.com/api/products/search"
debounce_ms = 250
result_limit = 12
timeout_seconds = 8

[search.headers]
x-api-key = "abc"

[selection]
storage_dir = "/tmp/compare"
storage_key = "compare-v2"
max_items = 3
watch_storage = false
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(
            config.endpoint().unwrap(),
            "https://shop.example.com/api/products/search"
        );
        assert_eq!(config.search_settings().debounce, Duration::from_millis(250));
        assert_eq!(config.search_settings().limit(), 12);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(8)));
        assert_eq!(config.selection_config().storage_key, "compare-v2");
        assert_eq!(config.selection_config().max_items, 3);
        assert!(!config.selection.watch_storage);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_apply_to_empty_file() {
        let config = TomlConfig::from_toml_str("").unwrap();

        assert!(config.search.endpoint.is_none());
        assert_eq!(config.search_settings().debounce, Duration::from_millis(300));
        assert_eq!(config.selection_config(), SelectionConfig::default());
        assert!(config.selection.watch_storage);
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.endpoint(),
            Err(CatalogError::MissingConfig { .. })
        ));
    }

    #[test]
    fn test_result_limit_is_capped() {
        let config = TomlConfig::from_toml_str("[search]\nresult_limit = 1000\n").unwrap();
        assert_eq!(config.search_settings().limit(), MAX_RESULT_LIMIT);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CATALOG_TEST_ENDPOINT", "https://test.api.com/search");

        let toml_content = r#"
[search]
endpoint = "${CATALOG_TEST_ENDPOINT}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.endpoint().unwrap(), "https://test.api.com/search");

        std::env::remove_var("CATALOG_TEST_ENDPOINT");
    }

    #[test]
    fn test_config_validation() {
        let bad_url = TomlConfig::from_toml_str("[search]\nendpoint = \"invalid-url\"\n").unwrap();
        assert!(bad_url.validate().is_err());

        let too_many = TomlConfig::from_toml_str("[selection]\nmax_items = 0\n").unwrap();
        assert!(too_many.validate().is_err());

        let bad_key =
            TomlConfig::from_toml_str("[selection]\nstorage_key = \"../etc\"\n").unwrap();
        assert!(bad_key.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[selection]\nstorage_key = \"from-file\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.selection.storage_key, "from-file");
    }
}
