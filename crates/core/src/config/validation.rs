use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Unknown placeholder '{placeholder}' in naming template '{template}'")]
    UnknownPlaceholder {
        template: String,
        placeholder: String,
    },

    #[error("Naming template '{template}' needs '{argument}' which was not provided")]
    MissingNamingArgument { template: String, argument: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// Create a missing required field error
    pub fn missing_required(field: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }
}

/// Trait for validating configuration values
pub trait ConfigValidator<T> {
    /// Validate a configuration value
    fn validate(&self, value: &T) -> Result<(), ConfigError>;
}

/// Validates SQL identifiers used for the version table and its schema
pub struct IdentifierValidator {
    field: &'static str,
}

impl IdentifierValidator {
    pub fn new(field: &'static str) -> Self {
        Self { field }
    }
}

impl ConfigValidator<String> for IdentifierValidator {
    fn validate(&self, value: &String) -> Result<(), ConfigError> {
        let mut chars = value.chars();
        let valid_start = chars
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');

        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::invalid_value(
                self.field,
                value.clone(),
                "an identifier made of letters, digits and underscores",
            ));
        }
        Ok(())
    }
}
