use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Model and embedding provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether this error is the distinct cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled)
    }
}

/// Tool invocation errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Tool invocation failed: {message}")]
    Invoke { message: String },

    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Tool invocation cancelled")]
    Cancelled,
}

/// Tool-call parsing errors
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed tool-call wrapper: {line}")]
    MalformedWrapper { line: String },

    #[error("Tool call has an empty name")]
    EmptyName,

    #[error("Invalid JSON arguments: {message}")]
    InvalidJson { message: String },
}

/// Data-source loading errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to load from source '{label}': {message}")]
    Load { label: String, message: String },

    #[error("Source load cancelled")]
    Cancelled,
}

/// Reasoning stage failures.
///
/// Each variant names the stage that failed, so a short-circuited
/// pipeline surfaces a single human-readable string describing which
/// stage broke and why.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Draft stage failed: {0}")]
    Draft(ProviderError),

    #[error("Critique stage failed: {0}")]
    Critique(ProviderError),

    #[error("Improve stage failed: {0}")]
    Improve(ProviderError),

    #[error("Nothing to critique: no draft or final spec in branch history")]
    NothingToCritique,

    #[error("Nothing to improve: no draft or final spec in branch history")]
    MissingDraft,

    #[error("Nothing to improve against: no critique in branch history")]
    MissingCritique,

    #[error("Pipeline cancelled")]
    Cancelled,
}

impl StageError {
    /// Whether this error is the distinct cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StageError::Cancelled)
    }
}

/// Branch merge errors
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Failed to embed merge query: {0}")]
    Embedding(#[from] ProviderError),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type alias for tool invocations
pub type ToolResult<T> = Result<T, ToolError>;

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type alias for reasoning stages
pub type StageResult<T> = Result<T, StageError>;
