//! HTTP gateway implementation over `reqwest`

use crate::{
    config::GatewayConfig,
    credentials::CredentialStore,
    error::GatewayError,
    request::RequestParams,
    response::ApiResponse,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Anything that can turn [`RequestParams`] into an [`ApiResponse`]
///
/// Implementations never fail: every problem is reported through the
/// response's `status` and `messageKey`.
pub trait HttpGateway: Send + Sync {
    /// Perform one call
    fn request(&self, params: RequestParams) -> Pin<Box<dyn Future<Output = ApiResponse> + Send + '_>>;
}

/// The production gateway
///
/// Attaches `Content-Type: application/json` and, when a token is stored,
/// `Authorization: Bearer <token>`; caller headers override both.
#[derive(Clone)]
pub struct RequestGateway {
    client: Client,
    config: GatewayConfig,
    credentials: Arc<dyn CredentialStore>,
}

impl RequestGateway {
    /// Create a gateway for `config` reading tokens from `credentials`
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::BuildFailed` if the HTTP client cannot be built
    pub fn new(
        config: GatewayConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::BuildFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    /// The configuration this gateway was built with
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Perform one call and normalize the outcome
    #[tracing::instrument(skip(self, params), fields(target = %params.target()), name = "gateway_request")]
    pub async fn call(&self, params: RequestParams) -> ApiResponse {
        let start = Instant::now();
        let response = match self.execute(&params).await {
            Ok(response) => response,
            Err(error) => {
                if error.was_sent() {
                    tracing::warn!(%error, "Request was sent but no response was received");
                } else {
                    tracing::error!(%error, "Request could not be built");
                }
                error.into_response()
            },
        };

        if response.is_unauthorized() {
            tracing::warn!("Server answered 401 Unauthorized");
            metrics::counter!("gateway.unauthorized").increment(1);
        }

        let outcome = if response.ok { "ok" } else { "error" };
        metrics::counter!("gateway.requests.total", "outcome" => outcome).increment(1);
        metrics::histogram!("gateway.request.duration_seconds").record(start.elapsed().as_secs_f64());
        tracing::debug!(status = response.status, ok = response.ok, "Request completed");

        response
    }

    async fn execute(&self, params: &RequestParams) -> Result<ApiResponse, GatewayError> {
        let url = resolve_url(&self.config.api_root, params.target())?;
        let headers = self.headers(params).await?;
        let method = params.resolved_method();
        tracing::trace!(%method, %url, "Sending request");

        let mut builder = self.client.request(method, url).headers(headers);

        let query = params.query_pairs();
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(data) = params.data.as_ref().filter(|data| !data.is_null()) {
            builder = builder.json(data);
        }

        let request = builder
            .build()
            .map_err(|e| GatewayError::BuildFailed(e.to_string()))?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| GatewayError::NoResponse(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::BodyUnreadable(e.to_string()))?;
        let body = parse_body(&bytes);

        if status.is_success() {
            Ok(ApiResponse::success(status.as_u16(), body))
        } else {
            Ok(ApiResponse::server_error(status.as_u16(), body))
        }
    }

    async fn headers(&self, params: &RequestParams) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !params.no_auth {
            if let Some(token) = self.credentials.get(&self.config.token_key).await {
                let value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| GatewayError::InvalidHeader(AUTHORIZATION.to_string()))?;
                headers.insert(AUTHORIZATION, value);
            }
        }

        for (name, value) in &params.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| GatewayError::InvalidHeader(name.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| GatewayError::InvalidHeader(name.clone()))?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }
}

impl HttpGateway for RequestGateway {
    fn request(&self, params: RequestParams) -> Pin<Box<dyn Future<Output = ApiResponse> + Send + '_>> {
        Box::pin(self.call(params))
    }
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Resolve a request target against the API root
///
/// Absolute targets are used as is; relative ones are appended to the root
/// with exactly one `/` between them.
///
/// # Errors
///
/// Returns `GatewayError::InvalidUrl` if the result is not a valid URL
pub fn resolve_url(api_root: &str, target: &str) -> Result<Url, GatewayError> {
    if let Ok(absolute) = Url::parse(target) {
        if absolute.has_host() {
            return Ok(absolute);
        }
    }

    let combined = if target.is_empty() {
        api_root.to_string()
    } else {
        format!(
            "{}/{}",
            api_root.trim_end_matches('/'),
            target.trim_start_matches('/')
        )
    };

    Url::parse(&combined).map_err(|e| GatewayError::InvalidUrl {
        url: combined.clone(),
        reason: e.to_string(),
    })
}

// Empty bodies are null; non-JSON bodies are kept as text.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
