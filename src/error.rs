/// Configuration problems. Any of these aborts the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum CompilationError {
    #[error("Must specify parse regexps at least")]
    MissingParsePatterns,

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid template '{name}': {message}")]
    InvalidTemplate { name: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid rule for gate '{gate}': {message}")]
    InvalidRule { gate: String, message: String },
}

/// Per-record failures. These are logged and the record is dropped.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Record {namespace} does not carry a text payload")]
    NonTextPayload { namespace: String },

    #[error("Template '{template}' failed: {source}")]
    TemplateError {
        template: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<serde_json::Error> for CompilationError {
    fn from(err: serde_json::Error) -> Self {
        CompilationError::InvalidConfig(err.to_string())
    }
}

impl From<serde_yaml::Error> for CompilationError {
    fn from(err: serde_yaml::Error) -> Self {
        CompilationError::InvalidConfig(err.to_string())
    }
}
