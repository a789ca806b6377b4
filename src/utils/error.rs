use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Capacity exceeded for group {group}: capacity {capacity}, requested {requested}")]
    CapacityExceeded {
        group: String,
        capacity: usize,
        requested: usize,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Ingest failed at row {row} after {processed} rows: {message}")]
    Ingest {
        row: usize,
        processed: usize,
        message: String,
    },

    #[error("Store error: {message}")]
    StoreError { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Capacity,
    Lookup,
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

impl RosterError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } | Self::Ingest { .. } | Self::CsvError(_) => {
                ErrorCategory::Input
            }
            Self::CapacityExceeded { .. } => ErrorCategory::Capacity,
            Self::NotFound { .. } => ErrorCategory::Lookup,
            Self::StoreError { .. } | Self::IoError(_) | Self::SerializationError(_) => {
                ErrorCategory::Storage
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Capacity | ErrorCategory::Lookup => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "Check the program, week and capacity arguments",
            Self::CapacityExceeded { .. } => {
                "Pick a group with free places or raise the group capacity"
            }
            Self::NotFound { .. } => "List the program's groups and participants to find a valid id",
            Self::Ingest { .. } => "Fix the reported row and upload the file again",
            Self::CsvError(_) => "Make sure the roster file is a valid CSV with a header row",
            Self::StoreError { .. } => "Restart the process; in-memory state may be inconsistent",
            Self::IoError(_) => "Check that the data directory exists and is writable",
            Self::SerializationError(_) => "The snapshot file is corrupt; restore it from a backup",
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => "Review roster.toml and the command line flags",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Validation { message } => message.clone(),
            Self::CapacityExceeded {
                group, capacity, ..
            } => format!("Group {} is full ({} places)", group, capacity),
            Self::NotFound { kind, id } => format!("No {} with id '{}'", kind, id),
            Self::Ingest {
                row,
                processed,
                message,
            } => format!(
                "Upload rejected at row {} ({} rows were valid before it): {}",
                row, processed, message
            ),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_are_distinguishable() {
        let not_found = RosterError::not_found("group", "g-1");
        let invalid = RosterError::validation("capacity must be positive");

        assert_eq!(not_found.category(), ErrorCategory::Lookup);
        assert_eq!(invalid.category(), ErrorCategory::Input);
        assert!(matches!(not_found, RosterError::NotFound { kind: "group", .. }));
    }

    #[test]
    fn test_ingest_message_carries_processed_count() {
        let err = RosterError::Ingest {
            row: 4,
            processed: 3,
            message: "missing name".to_string(),
        };
        assert!(err.user_friendly_message().contains("3 rows"));
        assert_eq!(err.severity(), ErrorSeverity::High);
    }
}
