//! Hosting API error type.

use thiserror::Error;

/// A failed call to the code-hosting API.
///
/// None of these are retried: the bot reports the failure and moves on,
/// except inside the status poller, which treats any fetch error as "still
/// pending" until its deadline.
#[derive(Debug, Error)]
pub enum HostingError {
    /// The HTTP request failed or GitHub returned an error status.
    #[error("GitHub API call {operation} failed: {source}")]
    Api {
        operation: &'static str,
        #[source]
        source: octocrab::Error,
    },

    /// GitHub answered, but with data the bot can't use.
    #[error("GitHub API call {operation} returned invalid data: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },
}

impl HostingError {
    pub(crate) fn api(operation: &'static str) -> impl FnOnce(octocrab::Error) -> Self {
        move |source| HostingError::Api { operation, source }
    }

    pub(crate) fn invalid(operation: &'static str, message: impl Into<String>) -> Self {
        HostingError::InvalidResponse {
            operation,
            message: message.into(),
        }
    }
}
