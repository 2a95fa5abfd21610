//! Error types for GitLab operations

use std::time::Duration;

use thiserror::Error;

/// Result type for GitLab operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the GitLab API
#[derive(Error, Debug)]
pub enum Error {
    /// No response within the configured timeout
    #[error(
        "Couldn't send request to or receive response from GitLab API within {} seconds.",
        .0.as_secs_f64()
    )]
    Timeout(Duration),

    /// The server could not be reached
    #[error("Couldn't connect to GitLab API.")]
    Connection(#[source] reqwest::Error),

    /// The server answered with something other than 200
    #[error("Group project list API returned with the following code: {0}")]
    Status(u16),

    /// The response body was not what the API documents
    #[error("Failed to decode GitLab response: {0}")]
    Decode(String),

    /// Base URL and postfix do not form a usable URL
    #[error("Invalid GitLab URL: {0}")]
    Url(String),

    /// Any other transport error
    #[error("GitLab API call failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl Error {
    /// Classify a reqwest error into timeout, connection or other failure
    pub(crate) fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Error::Timeout(timeout)
        } else if err.is_connect() {
            Error::Connection(err)
        } else if err.is_decode() {
            Error::Decode(err.to_string())
        } else {
            Error::Request(err)
        }
    }
}
