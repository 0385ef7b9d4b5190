//! Error type for the HTTP client.

use thiserror::Error;
use wasisock_common::SocketError;

/// Errors that can occur while performing an HTTP request.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The URL could not be parsed.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Only plain `http` is spoken over the provider.
    #[error("unsupported URL scheme '{scheme}'")]
    UnsupportedScheme { scheme: String },

    /// The URL has no host component.
    #[error("URL '{url}' has no host")]
    MissingHost { url: String },

    /// The underlying socket failed.
    #[error(transparent)]
    Socket(#[from] SocketError),

    /// The peer sent something that is not an HTTP/1.x response.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// The response exceeded the configured size limit.
    #[error("response larger than {limit} bytes")]
    BodyTooLarge { limit: usize },
}

impl HttpError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the failure happened at the socket layer.
    pub fn is_socket(&self) -> bool {
        matches!(self, Self::Socket(_))
    }
}
