//! Persistent key-value storage for credentials

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::RwLock;

/// Asynchronous string storage the gateway reads the bearer token from
///
/// Dyn-compatible so an application can hand out `Arc<dyn CredentialStore>`.
pub trait CredentialStore: Send + Sync {
    /// The value stored under `key`
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

    /// Store `value` under `key`
    fn set<'a>(&'a self, key: &'a str, value: String) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

    /// Forget `key`
    fn remove<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Process-local credential store
///
/// # Example
///
/// ```
/// use statekit_gateway::{CredentialStore, InMemoryCredentialStore};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryCredentialStore::with_entry("token", "abc");
/// assert_eq!(store.get("token").await.as_deref(), Some("abc"));
///
/// store.remove("token").await;
/// assert_eq!(store.get("token").await, None);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryCredentialStore {
    /// An empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with one entry
    #[must_use]
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = HashMap::new();
        values.insert(key.into(), value.into());
        Self {
            values: RwLock::new(values),
        }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move { self.values.read().await.get(key).cloned() })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.values.write().await.insert(key.to_string(), value);
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.values.write().await.remove(key);
        })
    }
}
