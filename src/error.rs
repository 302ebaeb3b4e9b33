//! Error types for the mathjax-config library.

use thiserror::Error;

/// Result type alias for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in the configuration record or in macro expansion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Macro \\{name} declares {declared} argument(s) but its template uses {found}")]
    ArityMismatch {
        name: String,
        declared: usize,
        found: usize,
    },

    #[error("Macro \\{name} references #{index} but takes only {arity} argument(s)")]
    PlaceholderOutOfRange {
        name: String,
        index: usize,
        arity: usize,
    },

    #[error("Invalid macro name: {0:?}")]
    InvalidMacroName(String),

    #[error("Unknown macro: \\{0}")]
    UnknownMacro(String),

    #[error("Macro \\{name} expects {expected} argument(s), got {found}")]
    WrongArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Missing or unbalanced argument for macro \\{0}")]
    MissingArgument(String),

    #[error("Recursive macro expansion: \\{0}")]
    RecursiveMacro(String),

    #[error("Delimiter pair has an empty token")]
    EmptyDelimiter,

    #[error("Delimiter pair {open:?}..{close:?} is used for both inline and display math")]
    OverlappingDelimiter { open: String, close: String },

    #[error("Invalid class pattern {pattern:?}: {message}")]
    InvalidClassPattern { pattern: String, message: String },

    #[error("Invalid TOML: {0}")]
    Toml(String),
}

/// Errors raised by the typesetting engine and script emission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Typesetter used before initialization")]
    NotInitialized,

    #[error("Math rendering error: {0}")]
    Math(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Typeset task failed: {0}")]
    Task(String),
}
