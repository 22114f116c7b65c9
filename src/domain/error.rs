use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Whether this error must stop the cache from being wired in
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let error = DomainError::configuration("dimension mismatch");
        assert_eq!(error.to_string(), "Configuration error: dimension mismatch");
        assert!(error.is_configuration());
    }

    #[test]
    fn test_provider_error() {
        let error = DomainError::provider("openai", "HTTP 401");
        assert_eq!(error.to_string(), "Provider error: openai - HTTP 401");
        assert!(!error.is_configuration());
    }

    #[test]
    fn test_timeout_error() {
        let error = DomainError::timeout("embedding took longer than 2000ms");
        assert_eq!(
            error.to_string(),
            "Timeout: embedding took longer than 2000ms"
        );
    }
}
