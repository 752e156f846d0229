//! Error types for gql-weave.
//!
//! Every failure the pipeline can produce is one of the sub-enums below,
//! lifted into [`WeaveError`] with `?`. Pattern and configuration errors are
//! startup failures; everything else is local to a single regeneration round.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gql-weave operations.
pub type WeaveResult<T> = Result<T, WeaveError>;

/// Main error type.
#[derive(Debug, Error)]
pub enum WeaveError {
    /// Pattern set could not be resolved.
    #[error("Failed to resolve schema patterns: {0}")]
    Pattern(#[from] PatternError),

    /// A matched schema fragment could not be read.
    #[error("Failed to read schema fragment: {0}")]
    Read(#[from] ReadError),

    /// The merged schema document is not valid schema syntax.
    #[error("Failed to parse merged schema: {0}")]
    SchemaParse(#[from] SchemaParseError),

    /// The schema could not be mapped to target types.
    #[error("Failed to generate types: {0}")]
    Codegen(#[from] CodegenError),

    /// Error loading configuration.
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    /// Error writing output files.
    #[error("Failed to write output: {0}")]
    Write(#[from] WriteError),

    /// Error during file watching.
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// Generated artifacts on disk are stale.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// PatternResolutionFailure: the pattern set itself is unusable.
#[derive(Debug, Error)]
pub enum PatternError {
    /// No patterns were configured.
    #[error("schema pattern set is empty")]
    Empty,

    /// A pattern is not valid glob syntax.
    #[error("Invalid schema pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// ReadFailure: a resolved fragment disappeared or is unreadable.
#[derive(Debug, Error)]
#[error("Failed to read {path}: {source}")]
pub struct ReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// SchemaParseFailure: the merged document does not parse.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SchemaParseError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

/// CodegenFailure: the schema parses but cannot be mapped.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// The same type name is declared more than once.
    #[error("Type '{name}' is declared more than once")]
    DuplicateType { name: String },

    /// A field, argument or union member names a type nobody declares.
    #[error("Type '{owner}' references unknown type '{name}'")]
    UnknownType { owner: String, name: String },

    /// A field, argument, enum value or union member appears twice in one type.
    #[error("'{owner}' declares '{name}' more than once")]
    DuplicateMember { owner: String, name: String },

    /// A schema type would shadow an identifier the generator emits.
    #[error("Type name '{name}' collides with a generated declaration")]
    ReservedName { name: String },

    /// An `extend` targets a type that is never declared.
    #[error("Cannot extend undeclared type '{name}'")]
    OrphanExtension { name: String },

    /// A construct the mapper has no translation for.
    #[error("Unsupported construct in '{owner}': {message}")]
    Unsupported { owner: String, message: String },
}

/// Error loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid TOML syntax.
    #[error("Invalid TOML in {path}: {message}")]
    InvalidToml { path: PathBuf, message: String },

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// IO error reading config.
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error writing output files.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to create directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write file.
    #[error("Failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error during file watching.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize watcher.
    #[error("Failed to initialize file watcher: {0}")]
    Init(String),

    /// Error from notify crate.
    #[error("Watch notification error: {0}")]
    Notify(String),
}

impl WeaveError {
    /// Whether this error prevents the system from ever reaching a servable state.
    pub fn is_startup(&self) -> bool {
        matches!(self, WeaveError::Pattern(_) | WeaveError::Config(_))
    }

    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            WeaveError::Pattern(_) => "pattern_resolution",
            WeaveError::Read(_) => "read",
            WeaveError::SchemaParse(_) => "schema_parse",
            WeaveError::Codegen(_) => "codegen",
            WeaveError::Config(_) => "config",
            WeaveError::Write(_) => "write",
            WeaveError::Watch(_) => "watch",
            WeaveError::Validation(_) => "validation",
            WeaveError::Io(_) => "io",
        }
    }
}

impl PatternError {
    /// Create an invalid pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}

impl ReadError {
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

impl SchemaParseError {
    /// Build from a parser message, picking up a trailing `line:column`
    /// position when the message carries one.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let (line, column) = extract_position(&message).unzip();
        Self {
            message,
            line,
            column,
        }
    }
}

impl CodegenError {
    pub fn unknown_type(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownType {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn duplicate_member(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DuplicateMember {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn unsupported(owner: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unsupported {
            owner: owner.into(),
            message: message.into(),
        }
    }
}

impl ConfigError {
    /// Create an invalid TOML error.
    pub fn invalid_toml(path: PathBuf, message: impl Into<String>) -> Self {
        Self::InvalidToml {
            path,
            message: message.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Find the first `line:column` pair in a parser message, e.g.
/// `"Parse error at 3:14\nUnexpected ..."`.
fn extract_position(message: &str) -> Option<(usize, usize)> {
    message.split_whitespace().find_map(|token| {
        let (line, column) = token.split_once(':')?;
        let column = column.trim_end_matches(|c: char| !c.is_ascii_digit());
        Some((line.parse().ok()?, column.parse().ok()?))
    })
}
