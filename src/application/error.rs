use std::error::Error as StdError;

use thiserror::Error;

use crate::{application::repos::RepoError, infra::error::InfraError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Message for the operator, followed by every underlying cause.
    pub fn report(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = self.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        messages
    }

    /// Short description of what went wrong, without internal detail.
    pub fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Repo(RepoError::NotFound) => "Record not found",
            AppError::Repo(RepoError::Duplicate { .. })
            | AppError::Repo(RepoError::InvalidInput { .. })
            | AppError::Validation(_) => "Request could not be processed",
            AppError::Repo(RepoError::Timeout) => "Data store timed out",
            AppError::Repo(RepoError::Persistence(_)) | AppError::Repo(RepoError::Decode(_)) => {
                "Data store unavailable"
            }
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Http { .. }) => "Data store client could not start",
            AppError::Infra(InfraError::Io(_)) => "I/O failure",
            AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_errors_surface_verbatim() {
        let error = AppError::from(RepoError::Timeout);
        assert_eq!(error.to_string(), "remote store timeout");
        assert_eq!(error.presentation_message(), "Data store timed out");
    }

    #[test]
    fn report_walks_sources() {
        let io = std::io::Error::other("disk full");
        let error = AppError::from(InfraError::from(io));
        let report = error.report();
        assert_eq!(report[0], "io error: disk full");
        assert_eq!(report.last().map(String::as_str), Some("disk full"));
    }
}
