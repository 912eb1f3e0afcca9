//! HTTP request gateway for statekit
//!
//! Wraps outbound JSON calls, attaches bearer-token auth and normalizes every
//! outcome into one [`ApiResponse`] shape. The gateway never returns an error:
//!
//! | Outcome                                  | `status` | `messageKey`          |
//! |------------------------------------------|----------|-----------------------|
//! | 2xx                                      | server   | from body, if any     |
//! | non-2xx                                  | server   | `SERVER_ERROR` or body|
//! | sent, no response (connect, timeout)     | 503      | `SERVICE_UNAVAILABLE` |
//! | request could not be built               | 418      | `INTERNAL_ERROR`      |
//!
//! # Example
//!
//! ```no_run
//! use statekit_gateway::{
//!     GatewayConfig, InMemoryCredentialStore, RequestGateway, RequestParams,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), statekit_gateway::GatewayError> {
//! let gateway = RequestGateway::new(
//!     GatewayConfig::new("https://api.example.com/v1"),
//!     Arc::new(InMemoryCredentialStore::new()),
//! )?;
//!
//! let response = gateway
//!     .call(RequestParams::endpoint("/users").with_param("ids", serde_json::json!([1, 2])))
//!     .await;
//!
//! if response.ok {
//!     println!("{}", response.payload);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod request;
pub mod response;

pub use client::{HttpGateway, RequestGateway, resolve_url};
pub use config::{GatewayConfig, GatewayConfigError};
pub use credentials::{CredentialStore, InMemoryCredentialStore};
pub use error::GatewayError;
pub use request::RequestParams;
pub use response::ApiResponse;
pub use reqwest::Method;
