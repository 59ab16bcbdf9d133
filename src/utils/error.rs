use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Input CSV '{path}' not found")]
    InputNotFound { path: String },

    #[error("Table '{path}' is missing required column '{column}'")]
    MissingColumnError { path: String, column: String },

    #[error("{provider} returned an error: {message}")]
    ProviderError { provider: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Provider,
    Data,
    Storage,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::ProviderError { .. } => ErrorCategory::Provider,
            EtlError::CsvError(_) | EtlError::MissingColumnError { .. } => ErrorCategory::Data,
            EtlError::IoError(_) | EtlError::InputNotFound { .. } => ErrorCategory::Storage,
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Provider => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::ApiError(_) => {
                "Check your network connection and the provider endpoints".to_string()
            }
            EtlError::ProviderError { provider, .. } => {
                format!("Verify the {} API key and quota", provider)
            }
            EtlError::CsvError(_) => "Make sure the CSV files are well formed".to_string(),
            EtlError::IoError(_) => {
                "Check file permissions and available disk space".to_string()
            }
            EtlError::InputNotFound { .. } => {
                "Pass the correct path with --input-csv".to_string()
            }
            EtlError::MissingColumnError { column, .. } => {
                format!("Add a '{}' column to the table header", column)
            }
            EtlError::MissingConfigError { field } => {
                format!("Provide a value for {}", field)
            }
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => {
                "Review the command line flags and the TOML config file".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Provider => format!("Provider problem: {}", self),
            ErrorCategory::Data => format!("Data problem: {}", self),
            ErrorCategory::Storage => format!("Storage problem: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
