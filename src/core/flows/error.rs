use crate::core::schema::SchemaViolation;

/// Why a generation request produced no data. Every variant is terminal for
/// the call that raised it.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("invalid generation request '{identifier}': {reason}")]
    InvalidRequest { identifier: String, reason: String },

    #[error("provider call failed for '{identifier}': {source:#}")]
    ProviderCall {
        identifier: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("provider returned invalid shape for '{identifier}': {violation}")]
    SchemaValidation {
        identifier: String,
        violation: SchemaViolation,
    },

    #[error("provider returned no output for '{identifier}'")]
    EmptyOutput { identifier: String },
}

impl GenerationError {
    /// Stable machine-readable reason, used in API responses.
    pub fn reason(&self) -> &'static str {
        match self {
            GenerationError::InvalidRequest { .. } => "invalid_request",
            GenerationError::ProviderCall { .. } => "provider_call_failed",
            GenerationError::SchemaValidation { .. } => "invalid_shape",
            GenerationError::EmptyOutput { .. } => "empty_output",
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            GenerationError::InvalidRequest { identifier, .. }
            | GenerationError::ProviderCall { identifier, .. }
            | GenerationError::SchemaValidation { identifier, .. }
            | GenerationError::EmptyOutput { identifier } => identifier,
        }
    }
}
