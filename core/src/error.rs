use thiserror::Error;

/// Failures turning case-reference text into a `CaseReference`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("case reference is empty")]
    Empty,

    #[error("required field '{label}' is missing")]
    MissingField { label: &'static str },
}

/// A record relation could not be consulted at all.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{source_name} source unavailable: {reason}")]
    Unavailable {
        source_name: &'static str,
        reason: String,
    },

    #[error("{source_name} source query failed: {error}")]
    Query {
        source_name: &'static str,
        #[source]
        error: rusqlite::Error,
    },
}

/// Failure of one call to the reasoning capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Network trouble, rate limiting, timeouts. Worth another attempt.
    #[error("transient: {0}")]
    Transient(String),

    /// Auth failures, malformed requests. Retrying cannot help.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CallError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CallError::Transient(_))
    }
}

/// The model reply could not be shaped into a `CaseReport`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("no numeric suspicion score found in model output")]
    MissingScore,

    #[error("section '{section}' is empty or missing")]
    EmptySection { section: &'static str },
}

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Record source error: {0}")]
    Source(#[from] SourceError),

    #[error("Reasoning call failed: {0}")]
    Call(CallError),

    #[error("Reasoning call failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type TriageResult<T> = Result<T, TriageError>;
