//! Error types for configuration and the HTTP layer.

use axum::extract::rejection::PathRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytesize::ByteSize;
use minio_service::ServiceError;
use thiserror::Error;

use crate::units::SizeParseError;

/// A fatal startup error caused by invalid configuration or command line arguments.
///
/// None of these are retried. They are reported before any listener starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The memory limit is not a valid size literal.
    #[error("invalid memory size `{value}`: {source}")]
    InvalidSize {
        /// The offending literal.
        value: String,
        /// Why it could not be parsed.
        source: SizeParseError,
    },

    /// The memory limit is below the supported minimum.
    #[error("invalid memory size `{value}`: must be at least {minimum}")]
    CapacityTooSmall {
        /// The offending literal.
        value: String,
        /// The smallest accepted capacity.
        minimum: ByteSize,
    },

    /// The expiration is not a valid duration literal.
    #[error("invalid expiration time `{value}`: {source}")]
    InvalidDuration {
        /// The offending literal.
        value: String,
        /// Why it could not be parsed.
        source: humantime::DurationError,
    },

    /// An explicit expiration of zero was given.
    #[error("expiration time must be positive, omit `expire` to keep objects forever")]
    ZeroExpiration,

    /// A keyword was given more than once.
    #[error("`{0}` must be given only once")]
    Duplicate(&'static str),

    /// A keyword was given without its value.
    #[error("`{0}` requires a value")]
    MissingValue(&'static str),

    /// The memory mode was started without a limit.
    #[error("memory limit must be set")]
    MissingLimit,

    /// An argument that is not part of the mode syntax.
    #[error("unexpected argument `{0}`")]
    UnexpectedArgument(String),

    /// Only one half of the TLS material was provided.
    #[error("both certificate and key are required to enable https")]
    TlsMismatch,
}

impl ConfigError {
    /// Returns `true` if the command usage should be printed along with this error.
    pub fn shows_usage(&self) -> bool {
        matches!(
            self,
            Self::MissingValue(_) | Self::UnexpectedArgument(_) | Self::MissingLimit
        )
    }
}

/// Error type for API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request path could not be parsed.
    #[error("bad request: {0}")]
    Path(#[from] PathRejection),

    /// Errors from the service layer.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Path(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(ServiceError::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            ApiError::Service(ServiceError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Service(err) => {
                tracing::error!(
                    error = err as &dyn std::error::Error,
                    "service error handling request"
                );
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        tracing::debug!("rejected request: {self}");
        (status, self.to_string()).into_response()
    }
}
