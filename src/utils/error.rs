use thiserror::Error;

#[derive(Error, Debug)]
pub enum AntaError {
    #[error("eAPI request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Invalid regular expression: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid usage: {message}")]
    UsageError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Inventory error: {message}")]
    InventoryError { message: String },

    #[error("Test catalog is invalid: {message}")]
    CatalogError { message: String },

    #[error("{test} test inputs are not valid: {message}")]
    InvalidInputs { test: String, message: String },

    #[error("eAPI error {code}: {message}")]
    EapiError {
        code: i64,
        message: String,
        errors: Vec<String>,
    },

    #[error("Cannot render template '{template}': missing parameter '{key}'")]
    TemplateRenderError { template: String, key: String },

    #[error("Missing parameter: {message}")]
    MissingParamError { message: String },

    #[error("Unexpected command output: {message}")]
    UnexpectedOutput { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Usage,
    Configuration,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl AntaError {
    pub fn inventory(message: impl Into<String>) -> Self {
        Self::InventoryError {
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::UsageError {
            message: message.into(),
        }
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        Self::CatalogError {
            message: message.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) | Self::EapiError { .. } => ErrorCategory::Network,
            Self::UsageError { .. } | Self::MissingConfigError { .. } => ErrorCategory::Usage,
            Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InventoryError { .. }
            | Self::CatalogError { .. }
            | Self::InvalidInputs { .. }
            | Self::UrlError(_) => ErrorCategory::Configuration,
            Self::CsvError(_)
            | Self::SerializationError(_)
            | Self::TemplateRenderError { .. }
            | Self::MissingParamError { .. }
            | Self::UnexpectedOutput { .. }
            | Self::RegexError(_) => ErrorCategory::Data,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Usage => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ApiError(_) => {
                "Check that the device is reachable and eAPI is enabled (management api http-commands)"
            }
            Self::EapiError { .. } => "Check the command syntax and the user privileges on the device",
            Self::InventoryError { .. } => "Check the inventory file structure and that device names are unique",
            Self::CatalogError { .. } | Self::InvalidInputs { .. } => {
                "Run `anta check catalog` and fix the reported test definitions"
            }
            Self::UsageError { .. } => "Run the command with --help to see its options",
            Self::MissingConfigError { .. } => {
                "Provide the missing option on the command line or through its ANTA_* environment variable"
            }
            Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. }
            | Self::UrlError(_) => "Review the configuration values",
            Self::IoError(_) => "Check that the file exists and that permissions allow access",
            Self::TemplateRenderError { .. } | Self::MissingParamError { .. } => {
                "Provide every parameter used by the command template"
            }
            Self::UnexpectedOutput { .. } => "The device returned an output this test does not understand; check the EOS version",
            Self::CsvError(_) | Self::SerializationError(_) | Self::RegexError(_) => {
                "Report this issue with the debug logs (--log-level debug)"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not talk to the device: {}", self),
            ErrorCategory::Usage => format!("Invalid command line: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Data => format!("Could not process data: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    /// Process exit code: 2 for command line mistakes, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self.category() {
            ErrorCategory::Usage => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, AntaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = AntaError::inventory("duplicate device name 'leaf1'");
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().starts_with("Invalid configuration"));

        let err = AntaError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "x"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_usage_errors_exit_with_two() {
        let err = AntaError::MissingConfigError {
            field: "inventory".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Usage);
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.user_friendly_message().starts_with("Invalid command line"));
        assert_eq!(AntaError::usage("timeout must be at least 1").exit_code(), 2);
        assert_eq!(AntaError::catalog("empty").exit_code(), 1);
    }

    #[test]
    fn test_invalid_inputs_message() {
        let err = AntaError::InvalidInputs {
            test: "VerifySTPMode".to_string(),
            message: "missing field `vlans`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "VerifySTPMode test inputs are not valid: missing field `vlans`"
        );
    }
}
