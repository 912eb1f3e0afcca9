//! Failure classification for gateway calls

use crate::response::{ApiResponse, STATUS_INTERNAL_ERROR, STATUS_SERVICE_UNAVAILABLE};
use statekit_core::status::message_keys;
use thiserror::Error;

/// Reasons a call did not produce a server response
///
/// These never escape the gateway: [`GatewayError::into_response`] turns each
/// one into the [`ApiResponse`] callers receive.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The target could not be turned into a URL
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL that was attempted
        url: String,
        /// Parser message
        reason: String,
    },

    /// A header name or value was rejected
    #[error("Invalid header '{0}'")]
    InvalidHeader(String),

    /// The HTTP client refused to build the request
    #[error("Request could not be built: {0}")]
    BuildFailed(String),

    /// The request was sent but no response arrived (connect error, timeout)
    #[error("No response received: {0}")]
    NoResponse(String),

    /// The response body could not be read
    #[error("Response body could not be read: {0}")]
    BodyUnreadable(String),
}

impl GatewayError {
    /// Whether the request reached the network
    #[must_use]
    pub const fn was_sent(&self) -> bool {
        matches!(self, Self::NoResponse(_) | Self::BodyUnreadable(_))
    }

    /// The normalized response for this failure
    #[must_use]
    pub fn into_response(self) -> ApiResponse {
        if self.was_sent() {
            ApiResponse::failure(STATUS_SERVICE_UNAVAILABLE, message_keys::SERVICE_UNAVAILABLE)
        } else {
            ApiResponse::failure(STATUS_INTERNAL_ERROR, message_keys::INTERNAL_ERROR)
        }
    }
}

impl From<GatewayError> for ApiResponse {
    fn from(error: GatewayError) -> Self {
        error.into_response()
    }
}
