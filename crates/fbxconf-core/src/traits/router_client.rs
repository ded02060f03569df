// # Router Client Trait
//
// Defines the interface the reconciler uses to read and write router state.
//
// ## Implementations
//
// - Freebox OS HTTP API: `fbxconf-freebox` crate
// - In-memory: `fbxconf_core::router::MemoryRouter`
//
// ## Usage
//
// ```rust,ignore
// use fbxconf_core::traits::RouterClient;
// use fbxconf_core::resource::StaticLease;
//
// async fn show(client: &dyn RouterClient<StaticLease>) -> fbxconf_core::Result<()> {
//     for entry in client.list().await? {
//         println!("{} -> {}", entry.resource.mac(), entry.resource.ip());
//     }
//     Ok(())
// }
// ```

use crate::error::Result;
use crate::resource::{ResourceId, RouterResource};
use async_trait::async_trait;

/// A resource as it currently exists on the router
#[derive(Debug, Clone, PartialEq)]
pub struct Current<R> {
    /// Router-assigned identifier
    pub id: ResourceId,
    /// The resource, decoded into the validated model
    pub resource: R,
    /// Router-only fields (hostname, host details...), surfaced in reports
    pub extra: serde_json::Value,
}

impl<R> Current<R> {
    /// Create a current-state entry without extra fields
    pub fn new(id: ResourceId, resource: R) -> Self {
        Self {
            id,
            resource,
            extra: serde_json::Value::Null,
        }
    }
}

/// Capability set over one resource kind on the router
///
/// Implementations are the only code that talks to the router. They receive
/// an already-authenticated session at construction time and must not
/// retry: every error is returned as-is and treated as authoritative by the
/// reconciler.
///
/// # Errors
///
/// - `Error::Transport`: network or session failure
/// - `Error::Protocol`: response does not decode into `R`
/// - `Error::Conflict`: `create` of a resource the router already has
/// - `Error::Validation`: the router rejected the payload
/// - `Error::NotFound`: `get`/`update`/`delete` on an id that does not exist
#[async_trait]
pub trait RouterClient<R: RouterResource>: Send + Sync {
    /// List every resource of this kind
    async fn list(&self) -> Result<Vec<Current<R>>>;

    /// Fetch one resource by id
    async fn get(&self, id: &ResourceId) -> Result<Current<R>>;

    /// Create a resource
    ///
    /// # Returns
    ///
    /// The resource as stored by the router, with its new id
    async fn create(&self, desired: &R) -> Result<Current<R>>;

    /// Replace the attributes of an existing resource
    async fn update(&self, id: &ResourceId, desired: &R) -> Result<Current<R>>;

    /// Delete a resource
    ///
    /// Strict: returns `Error::NotFound` if `id` does not exist. Callers
    /// that want "ensure absent" semantics treat that as success.
    async fn delete(&self, id: &ResourceId) -> Result<()>;

    /// Client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}
