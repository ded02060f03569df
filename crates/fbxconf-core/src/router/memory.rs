// # Memory Router
//
// In-memory implementation of RouterClient.
//
// ## Purpose
//
// Behaves like a router table for one resource kind: one entry per identity
// key, router-assigned ids, Conflict on a duplicate create and NotFound on a
// stale id. Every call is counted so callers can assert exactly which
// operations a reconciliation issued.
//
// ## When to Use
//
// - Tests
// - Rehearsing a desired-state file without a router

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::resource::{ResourceId, RouterResource};
use crate::traits::{Current, RouterClient};

/// Number of calls made per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub get: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl CallCounts {
    /// Number of mutating calls (create, update, delete)
    pub const fn writes(&self) -> usize {
        self.create + self.update + self.delete
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    list: AtomicUsize,
    get: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
}

/// In-memory router table for one resource kind
///
/// Clones share the same table and counters.
///
/// # Example
///
/// ```rust,no_run
/// use fbxconf_core::resource::StaticLease;
/// use fbxconf_core::router::MemoryRouter;
/// use fbxconf_core::traits::RouterClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let router: MemoryRouter<StaticLease> = MemoryRouter::new();
///     router.seed(StaticLease::new("00:11:22:33:44:55", "192.168.1.100")?).await;
///
///     let leases = router.list().await?;
///     assert_eq!(leases.len(), 1);
///     assert_eq!(router.calls().list, 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRouter<R> {
    table: Arc<RwLock<Vec<Current<R>>>>,
    next_id: Arc<AtomicU64>,
    calls: Arc<CallCounters>,
}

impl<R: RouterResource> MemoryRouter<R> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            calls: Arc::new(CallCounters::default()),
        }
    }

    /// Insert an entry directly, without counting a call
    ///
    /// Does not check for an existing entry with the same identity key, so
    /// tests can build router states that break the usual invariant.
    pub async fn seed(&self, resource: R) -> ResourceId {
        let id = self.allocate_id();
        self.table
            .write()
            .await
            .push(Current::new(id.clone(), resource));
        id
    }

    /// Snapshot of the table
    pub async fn entries(&self) -> Vec<Current<R>> {
        self.table.read().await.clone()
    }

    /// Number of entries in the table
    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    /// Check if the table is empty
    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }

    /// Calls made so far
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list: self.calls.list.load(Ordering::SeqCst),
            get: self.calls.get.load(Ordering::SeqCst),
            create: self.calls.create.load(Ordering::SeqCst),
            update: self.calls.update.load(Ordering::SeqCst),
            delete: self.calls.delete.load(Ordering::SeqCst),
        }
    }

    fn allocate_id(&self) -> ResourceId {
        ResourceId::from(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl<R: RouterResource> Default for MemoryRouter<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: RouterResource> RouterClient<R> for MemoryRouter<R> {
    async fn list(&self) -> Result<Vec<Current<R>>> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        Ok(self.table.read().await.clone())
    }

    async fn get(&self, id: &ResourceId) -> Result<Current<R>> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        self.table
            .read()
            .await
            .iter()
            .find(|entry| entry.id == *id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("{} {id}", R::KIND)))
    }

    async fn create(&self, desired: &R) -> Result<Current<R>> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);

        let key = desired.identity_key();
        let mut table = self.table.write().await;
        if table.iter().any(|entry| entry.resource.identity_key() == key) {
            return Err(Error::conflict(format!("{} {key} already exists", R::KIND)));
        }

        let created = Current::new(self.allocate_id(), desired.clone());
        table.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: &ResourceId, desired: &R) -> Result<Current<R>> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);

        let key = desired.identity_key();
        let mut table = self.table.write().await;
        if table
            .iter()
            .any(|entry| entry.id != *id && entry.resource.identity_key() == key)
        {
            return Err(Error::conflict(format!("{} {key} already exists", R::KIND)));
        }

        let entry = table
            .iter_mut()
            .find(|entry| entry.id == *id)
            .ok_or_else(|| Error::not_found(format!("{} {id}", R::KIND)))?;
        entry.resource = desired.clone();
        Ok(entry.clone())
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);

        let mut table = self.table.write().await;
        let position = table
            .iter()
            .position(|entry| entry.id == *id)
            .ok_or_else(|| Error::not_found(format!("{} {id}", R::KIND)))?;
        table.remove(position);
        Ok(())
    }

    fn client_name(&self) -> &'static str {
        "memory"
    }
}
