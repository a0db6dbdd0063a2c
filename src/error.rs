// Errors raised while loading parameters, building models and integrating them

use std::path::PathBuf;

/// Every failure in the pipeline. None of these are retried: they all stop
/// the run before (or, for `Integration`/`Output`, instead of) producing a result.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("cannot access {what} at {}: {reason}", .path.display())]
    Access {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("malformed input in {source_name}: {reason}")]
    MalformedInput { source_name: String, reason: String },

    #[error("division by zero: {subject} has {field} = 0")]
    DivisionByZero { subject: String, field: &'static str },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("integration failed for {environment} at t = {t}: {reason}")]
    Integration {
        environment: String,
        t: f64,
        reason: String,
    },

    #[error("failed to write {}: {reason}", .path.display())]
    Output { path: PathBuf, reason: String },
}

impl ModelError {
    pub(crate) fn malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::MalformedInput {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn output(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        ModelError::Output {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}
