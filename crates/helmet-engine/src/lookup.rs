//! Cluster lookup collaborator used by the `lookup` template function
//!
//! The engine bundles no cluster client. Callers hand a [`ClientProvider`]
//! to [`Engine::render_with_client_provider`](crate::Engine::render_with_client_provider)
//! and `lookup` delegates to it synchronously.

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// Errors reported by a lookup collaborator
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// The object does not exist; `lookup` turns this into an empty result
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: String, name: String },

    /// Any other failure, propagated to the render
    #[error("{0}")]
    Client(String),
}

impl LookupError {
    pub fn client(message: impl Into<String>) -> Self {
        LookupError::Client(message.into())
    }
}

/// Query handle for one resource type
pub trait ResourceClient {
    /// Fetch a single object; `namespace` is `None` for cluster-scoped queries
    fn get(&self, namespace: Option<&str>, name: &str) -> Result<JsonValue, LookupError>;

    /// List objects; `namespace` is `None` to list across all namespaces
    fn list(&self, namespace: Option<&str>) -> Result<Vec<JsonValue>, LookupError>;
}

/// Resolves a resource type to a query handle
pub trait ClientProvider: Send + Sync {
    /// Returns the handle and whether the resource is namespaced
    fn get_client_for(
        &self,
        api_version: &str,
        kind: &str,
    ) -> Result<(Box<dyn ResourceClient + '_>, bool), LookupError>;
}

/// Run one lookup against a provider
///
/// A named lookup returns the object; an unnamed one returns the list under
/// an `items` key. Not-found yields an empty map.
pub fn lookup(
    provider: &dyn ClientProvider,
    api_version: &str,
    kind: &str,
    namespace: &str,
    name: &str,
) -> Result<JsonValue, LookupError> {
    let (client, namespaced) = provider.get_client_for(api_version, kind)?;
    let namespace = (namespaced && !namespace.is_empty()).then_some(namespace);

    let result = if name.is_empty() {
        client.list(namespace).map(|items| {
            let mut map = Map::new();
            map.insert("items".to_string(), JsonValue::Array(items));
            JsonValue::Object(map)
        })
    } else {
        client.get(namespace, name)
    };

    match result {
        Ok(value) => Ok(value),
        Err(LookupError::NotFound { .. }) => Ok(JsonValue::Object(Map::new())),
        Err(err) => Err(err),
    }
}
