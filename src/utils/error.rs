use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SumoError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field '{field}'")]
    MissingConfigError { field: String },

    #[error("could not find default SUMO executable `{command}`, ensure that the `sumo` command can be run from the shell")]
    ExecutableNotFound { command: String },

    #[error("SUMO instance '{name}' already exists")]
    InstanceExists { name: String },

    #[error("SUMO instance '{name}' has not been created")]
    InstanceNotCreated { name: String },

    #[error("SUMO instance '{name}' does not exist")]
    InstanceNotFound { name: String },

    #[error("SUMO instance '{name}' is a {found} instance, not {expected}")]
    InstanceKindMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("no free port left to assign after {last}")]
    PortsExhausted { last: u16 },

    #[error("SUMO status error: {message}")]
    StatusError { message: String },

    #[error("SUMO process error: {message}")]
    ProcessError {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("SUMO socket error on {address}: {source}")]
    SocketError {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("SUMO connection error: {message}")]
    ConnectionError { message: String },

    #[error("SUMO library error: {message}")]
    LibraryError { message: String },

    #[error("'{operation}' is not supported by the {backend} backend")]
    Unsupported { operation: String, backend: String },

    #[error("SUMO package '{package}' could not be found: {reason}")]
    PackageNotFound { package: String, reason: String },

    #[error("Environment error: {message}")]
    EnvironmentError { message: String },
}

pub type Result<T> = std::result::Result<T, SumoError>;

/// Broad area an error originates from, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Registry,
    Simulation,
    Network,
    Environment,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SumoError {
    pub fn status(message: impl Into<String>) -> Self {
        Self::StatusError {
            message: message.into(),
        }
    }

    pub fn library(message: impl Into<String>) -> Self {
        Self::LibraryError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::InstanceExists { .. }
            | Self::InstanceNotCreated { .. }
            | Self::InstanceNotFound { .. }
            | Self::InstanceKindMismatch { .. }
            | Self::PortsExhausted { .. } => ErrorCategory::Registry,
            Self::StatusError { .. }
            | Self::ProcessError { .. }
            | Self::LibraryError { .. }
            | Self::Unsupported { .. } => ErrorCategory::Simulation,
            Self::SocketError { .. } | Self::ConnectionError { .. } => ErrorCategory::Network,
            Self::ExecutableNotFound { .. }
            | Self::PackageNotFound { .. }
            | Self::EnvironmentError { .. } => ErrorCategory::Environment,
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::Critical,
            _ => match self {
                Self::Unsupported { .. } => ErrorSeverity::Low,
                _ => ErrorSeverity::High,
            },
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::ExecutableNotFound { .. } => {
                "Install SUMO and make sure `sumo` is on PATH, or set `executable` for the instance".to_string()
            }
            Self::PackageNotFound { .. } => {
                "Set SUMO_HOME to the SUMO installation directory containing `tools/`, or install the packages for the selected Python".to_string()
            }
            Self::SocketError { .. } | Self::ConnectionError { .. } => {
                "Check that SUMO started correctly and the port is free, then retry".to_string()
            }
            Self::InstanceExists { .. } => {
                "Choose another instance name or destroy the existing instance first".to_string()
            }
            Self::InstanceNotCreated { .. } | Self::InstanceNotFound { .. } => {
                "Create the instance before using it".to_string()
            }
            Self::LibraryError { .. } => {
                "Stop the running library simulation or use the tcp backend".to_string()
            }
            _ => match self.category() {
                ErrorCategory::Configuration => {
                    "Review the configuration file against the documented format".to_string()
                }
                ErrorCategory::System => "Check file permissions and available resources".to_string(),
                _ => "Inspect the logs with --verbose for more detail".to_string(),
            },
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Registry => format!("Instance problem: {}", self),
            ErrorCategory::Simulation => format!("Simulation problem: {}", self),
            ErrorCategory::Network => format!("Could not talk to SUMO: {}", self),
            ErrorCategory::Environment => format!("SUMO environment problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}
