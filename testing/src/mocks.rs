//! Scripted stand-ins for the environment's I/O

use statekit_core::status::message_keys;
use statekit_gateway::response::STATUS_SERVICE_UNAVAILABLE;
use statekit_gateway::{ApiResponse, HttpGateway, RequestParams};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub use statekit_gateway::InMemoryCredentialStore;

/// Gateway answering from a script instead of the network
///
/// Responses are handed out in order; once the script is exhausted every call
/// gets the fallback (a 503 unless set otherwise). Every request is recorded
/// before the optional delay, so a call cancelled mid-flight is still visible.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use statekit_gateway::{ApiResponse, HttpGateway, RequestParams};
/// use statekit_testing::mocks::MockGateway;
///
/// # tokio_test::block_on(async {
/// let gateway = MockGateway::new().respond_with(ApiResponse::success(200, json!({ "payload": [] })));
///
/// let first = gateway.request(RequestParams::endpoint("/users")).await;
/// let second = gateway.request(RequestParams::endpoint("/users")).await;
///
/// assert!(first.ok);
/// assert_eq!(second.status, 503);
/// assert_eq!(gateway.calls(), 2);
/// # });
/// ```
#[derive(Debug)]
pub struct MockGateway {
    script: Mutex<VecDeque<ApiResponse>>,
    fallback: ApiResponse,
    requests: Mutex<Vec<RequestParams>>,
    delay: Option<Duration>,
}

impl MockGateway {
    /// A gateway with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: ApiResponse::failure(
                STATUS_SERVICE_UNAVAILABLE,
                message_keys::SERVICE_UNAVAILABLE,
            ),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Builder: Append a response to the script
    #[must_use]
    pub fn respond_with(self, response: ApiResponse) -> Self {
        self.push(response);
        self
    }

    /// Builder: Answer with `response` once the script is exhausted
    #[must_use]
    pub fn with_fallback(mut self, response: ApiResponse) -> Self {
        self.fallback = response;
        self
    }

    /// Builder: Wait before answering
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Append a response to the script
    pub fn push(&self, response: ApiResponse) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Every request received so far
    #[must_use]
    pub fn requests(&self) -> Vec<RequestParams> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests received so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next_response(&self) -> ApiResponse {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpGateway for MockGateway {
    fn request(&self, params: RequestParams) -> Pin<Box<dyn Future<Output = ApiResponse> + Send + '_>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(params);

        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.next_response()
        })
    }
}
