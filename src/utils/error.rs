use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search endpoint {url} answered with status {status}")]
    RemoteStatus { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("Comparison set is full ({max} items)")]
    CapacityExceeded { max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Storage,
    Configuration,
    Selection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CatalogError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CatalogError::Http(_) | CatalogError::RemoteStatus { .. } => ErrorCategory::Network,
            CatalogError::Io(_) | CatalogError::Serialization(_) | CatalogError::Watch(_) => {
                ErrorCategory::Storage
            }
            CatalogError::Config { .. }
            | CatalogError::ConfigValidation { .. }
            | CatalogError::InvalidConfigValue { .. }
            | CatalogError::MissingConfig { .. } => ErrorCategory::Configuration,
            CatalogError::CapacityExceeded { .. } => ErrorCategory::Selection,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CatalogError::CapacityExceeded { .. } => ErrorSeverity::Low,
            CatalogError::Http(_) | CatalogError::RemoteStatus { .. } => ErrorSeverity::Medium,
            CatalogError::Serialization(_) | CatalogError::Watch(_) => ErrorSeverity::High,
            CatalogError::Io(_)
            | CatalogError::Config { .. }
            | CatalogError::ConfigValidation { .. }
            | CatalogError::InvalidConfigValue { .. }
            | CatalogError::MissingConfig { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            CatalogError::Http(_) | CatalogError::RemoteStatus { .. } => {
                "Check that the search endpoint is reachable, then retry".to_string()
            }
            CatalogError::Io(_) => {
                "Check that the storage directory exists and is writable".to_string()
            }
            CatalogError::Serialization(_) => {
                "Remove or repair the stored file; it will be recreated".to_string()
            }
            CatalogError::Watch(_) => {
                "Disable selection.watch_storage or raise the file watch limit".to_string()
            }
            CatalogError::Config { .. }
            | CatalogError::ConfigValidation { .. }
            | CatalogError::InvalidConfigValue { .. } => {
                "Fix the configuration file and run again".to_string()
            }
            CatalogError::MissingConfig { field } => {
                format!("Add '{}' to the configuration file", field)
            }
            CatalogError::CapacityExceeded { .. } => {
                "Remove an item from the comparison set before adding another".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CatalogError::CapacityExceeded { max } => {
                format!("You can compare at most {} items at a time", max)
            }
            CatalogError::Http(_) | CatalogError::RemoteStatus { .. } => {
                "The catalog search service is unavailable".to_string()
            }
            CatalogError::MissingConfig { field } => {
                format!("Configuration is missing '{}'", field)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_the_low_severity_user_notice() {
        let err = CatalogError::CapacityExceeded { max: 4 };
        assert_eq!(err.category(), ErrorCategory::Selection);
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert_eq!(
            err.user_friendly_message(),
            "You can compare at most 4 items at a time"
        );
    }

    #[test]
    fn config_errors_are_critical() {
        let err = CatalogError::MissingConfig {
            field: "search.endpoint".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.recovery_suggestion().contains("search.endpoint"));
    }
}
