//! Error types for configuration, routing and rendering.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required config file '{0}' not found")]
    Missing(PathBuf),

    #[error("Cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Router config has no routes")]
    NoRoutes,

    #[error("Invalid route pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Error route '{0}' does not resolve to a registered controller action")]
    ErrorRoute(String),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

impl ConfigError {
    pub fn pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            source,
        }
    }

    pub fn invalid_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Template errors raised while parsing or evaluating a view.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to read template '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template syntax error in {path}: {message}")]
    Syntax { path: PathBuf, message: String },

    #[error("{0}")]
    Render(String),
}

impl TemplateError {
    pub fn syntax(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Syntax {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<String> for TemplateError {
    fn from(message: String) -> Self {
        Self::Render(message)
    }
}

/// A unified error type for the CLI and server entry points.
#[derive(Debug, Error)]
pub enum WallabyError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
