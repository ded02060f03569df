//! Reconciler
//!
//! The Reconciler is responsible for:
//! - Reading current state from the router (one `list` per call)
//! - Matching the desired resource by identity key
//! - Deciding between create, update, delete and no-op
//! - Issuing at most one mutating call
//! - Turning the result into an [`Outcome`]
//!
//! ## Architecture
//!
//! ```text
//!   desired Resource
//!          │
//!          ▼
//!   ┌──────────────┐   list()    ┌──────────────┐
//!   │  Reconciler  │────────────▶│ RouterClient │
//!   │              │◀────────────│   <R>        │
//!   │  match key   │             │              │
//!   │  diff attrs  │ create() /  │              │
//!   │              │ update() /  │              │
//!   │              │ delete()    │              │
//!   │              │────────────▶│              │
//!   └──────────────┘             └──────────────┘
//!          │
//!          ▼
//!       Outcome ──▶ Report
//! ```
//!
//! ## Guarantees
//!
//! - Idempotence: once the router matches, further calls issue no writes
//! - No retries: client errors are returned unchanged inside the outcome
//! - No caching: every call reads fresh router state
//! - Cancellation is only honoured before `list`; once router state has
//!   been read, the decision is always carried out

use crate::config::{DesiredState, ResourceEntry};
use crate::error::{Error, Result};
use crate::resource::{
    NatRule, Resource, ResourceId, ResourceParams, RouterResource, StaticLease,
};
use crate::traits::{Current, RouterClient};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What a reconciliation did (or, in dry-run mode, would have done)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// The resource did not exist and was created
    Created,
    /// The resource existed with different mutable attributes and was updated
    Updated,
    /// The resource existed and was deleted
    Deleted,
    /// The router already matched; nothing was written
    Unchanged,
    /// The reconciliation failed; nothing was written
    Failed,
}

impl Action {
    /// Whether this action writes to the router
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }
}

/// Result of one reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Action taken
    pub action: Action,
    /// The parameters the caller asked for
    pub requested: ResourceParams,
    /// Whether the caller asked for the resource to exist or not
    pub state: DesiredState,
    /// Router id of the resource, when one is known
    pub id: Option<ResourceId>,
    /// Mutable attributes that differed (updates only)
    pub changed_fields: Vec<&'static str>,
    /// Router-only fields of the matched entry (hostname, host details...)
    pub router_details: Option<Value>,
    /// Whether the reconciler ran in check mode
    pub dry_run: bool,
    /// The failure, for `Action::Failed`
    pub error: Option<Error>,
}

impl Outcome {
    fn failed(requested: ResourceParams, state: DesiredState, error: Error, dry_run: bool) -> Self {
        Self {
            action: Action::Failed,
            requested,
            state,
            id: None,
            changed_fields: Vec::new(),
            router_details: None,
            dry_run,
            error: Some(error),
        }
    }

    /// Whether the router was (or, in dry-run mode, would be) modified
    pub const fn changed(&self) -> bool {
        self.action.is_write()
    }
}

/// The decision made for one resource
struct Decision {
    action: Action,
    id: Option<ResourceId>,
    changed_fields: Vec<&'static str>,
    router_details: Option<Value>,
}

impl Decision {
    fn new(action: Action, id: Option<ResourceId>) -> Self {
        Self {
            action,
            id,
            changed_fields: Vec::new(),
            router_details: None,
        }
    }

    /// Decision about an entry the router returned
    fn about<R>(action: Action, entry: Current<R>) -> Self {
        let router_details = match entry.extra {
            Value::Object(fields) if !fields.is_empty() => Some(Value::Object(fields)),
            _ => None,
        };
        Self {
            action,
            id: Some(entry.id),
            changed_fields: Vec::new(),
            router_details,
        }
    }
}

/// Reconciles desired resources against the router
///
/// ## Threading
///
/// A `Reconciler` holds no mutable state and may be shared. Concurrent
/// calls for the same identity key are not serialized; a host that accepts
/// concurrent requests must lock per key itself.
pub struct Reconciler {
    /// Client for static DHCP leases
    leases: Arc<dyn RouterClient<StaticLease>>,

    /// Client for NAT rules
    nat_rules: Arc<dyn RouterClient<NatRule>>,

    /// Check mode: decide but never write
    dry_run: bool,

    /// Set to `true` to stop starting new reconciliations
    cancel: Option<watch::Receiver<bool>>,
}

impl Reconciler {
    /// Create a reconciler over one client per resource kind
    pub fn new(
        leases: Arc<dyn RouterClient<StaticLease>>,
        nat_rules: Arc<dyn RouterClient<NatRule>>,
    ) -> Self {
        Self {
            leases,
            nat_rules,
            dry_run: false,
            cancel: None,
        }
    }

    /// Create a reconciler over a client that handles both resource kinds
    pub fn with_client<C>(client: Arc<C>) -> Self
    where
        C: RouterClient<StaticLease> + RouterClient<NatRule> + 'static,
    {
        let leases: Arc<dyn RouterClient<StaticLease>> = client.clone();
        let nat_rules: Arc<dyn RouterClient<NatRule>> = client;
        Self::new(leases, nat_rules)
    }

    /// Enable or disable check mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Attach a cancellation flag
    ///
    /// Once the flag reads `true`, reconciliations that have not yet read
    /// router state fail with `Error::Cancelled`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Ensure `desired` exists on the router with exactly its attributes
    pub async fn reconcile(&self, desired: &Resource) -> Outcome {
        let result = match desired {
            Resource::StaticLease(lease) => self.ensure_present(self.leases.as_ref(), lease).await,
            Resource::NatRule(rule) => self.ensure_present(self.nat_rules.as_ref(), rule).await,
        };
        self.outcome(desired, DesiredState::Present, result)
    }

    /// Ensure no resource with `desired`'s identity key exists on the router
    ///
    /// Never called by [`Reconciler::reconcile`]; deletion only happens on
    /// explicit request.
    pub async fn remove(&self, desired: &Resource) -> Outcome {
        let result = match desired {
            Resource::StaticLease(lease) => self.ensure_absent(self.leases.as_ref(), lease).await,
            Resource::NatRule(rule) => self.ensure_absent(self.nat_rules.as_ref(), rule).await,
        };
        self.outcome(desired, DesiredState::Absent, result)
    }

    /// Validate raw input and reconcile it towards its desired state
    ///
    /// Invalid input fails with `Error::Validation` before the router is
    /// contacted. The outcome echoes the parameters exactly as given.
    pub async fn apply(&self, entry: &ResourceEntry) -> Outcome {
        let resource = match Resource::try_from(entry.params.clone()) {
            Ok(resource) => resource,
            Err(e) => {
                warn!("Rejected {} before contacting the router: {}", entry.params.kind(), e);
                return Outcome::failed(entry.params.clone(), entry.state, e, self.dry_run);
            }
        };

        let mut outcome = match entry.state {
            DesiredState::Present => self.reconcile(&resource).await,
            DesiredState::Absent => self.remove(&resource).await,
        };
        outcome.requested = entry.params.clone();
        outcome
    }

    fn outcome(
        &self,
        desired: &Resource,
        state: DesiredState,
        result: Result<Decision>,
    ) -> Outcome {
        match result {
            Ok(decision) => Outcome {
                action: decision.action,
                requested: desired.params(),
                state,
                id: decision.id,
                changed_fields: decision.changed_fields,
                router_details: decision.router_details,
                dry_run: self.dry_run,
                error: None,
            },
            Err(e) => {
                warn!("Failed to reconcile {}: {}", desired.identity_key(), e);
                Outcome::failed(desired.params(), state, e, self.dry_run)
            }
        }
    }

    fn check_cancelled(&self, kind: impl std::fmt::Display) -> Result<()> {
        if let Some(cancel) = &self.cancel
            && *cancel.borrow()
        {
            return Err(Error::cancelled(format!(
                "{kind} not reconciled: cancellation requested"
            )));
        }
        Ok(())
    }

    async fn ensure_present<R: RouterResource>(
        &self,
        client: &dyn RouterClient<R>,
        desired: &R,
    ) -> Result<Decision> {
        let key = desired.identity_key();
        self.check_cancelled(R::KIND)?;

        let current = client.list().await?;
        let Some(existing) = current
            .into_iter()
            .find(|entry| entry.resource.identity_key() == key)
        else {
            if self.dry_run {
                info!("[DRY-RUN] Would create {} {}", R::KIND, key);
                return Ok(Decision::new(Action::Created, None));
            }

            let created = client.create(desired).await?;
            info!("Created {} {} (id {}) via {}", R::KIND, key, created.id, client.client_name());
            return Ok(Decision::about(Action::Created, created));
        };

        let changed_fields = desired.differing_attributes(&existing.resource);
        if changed_fields.is_empty() {
            debug!("{} {} already up to date (id {})", R::KIND, key, existing.id);
            return Ok(Decision::about(Action::Unchanged, existing));
        }

        let entry = if self.dry_run {
            info!(
                "[DRY-RUN] Would update {} {} (id {}): {}",
                R::KIND,
                key,
                existing.id,
                changed_fields.join(", ")
            );
            existing
        } else {
            let updated = client.update(&existing.id, desired).await?;
            info!(
                "Updated {} {} (id {}) via {}: {}",
                R::KIND,
                key,
                updated.id,
                client.client_name(),
                changed_fields.join(", ")
            );
            updated
        };

        Ok(Decision {
            changed_fields,
            ..Decision::about(Action::Updated, entry)
        })
    }

    async fn ensure_absent<R: RouterResource>(
        &self,
        client: &dyn RouterClient<R>,
        desired: &R,
    ) -> Result<Decision> {
        let key = desired.identity_key();
        self.check_cancelled(R::KIND)?;

        let current = client.list().await?;
        let Some(existing) = current
            .into_iter()
            .find(|entry| entry.resource.identity_key() == key)
        else {
            debug!("{} {} already absent", R::KIND, key);
            return Ok(Decision::new(Action::Unchanged, None));
        };

        if self.dry_run {
            info!("[DRY-RUN] Would delete {} {} (id {})", R::KIND, key, existing.id);
            return Ok(Decision::about(Action::Deleted, existing));
        }

        match client.delete(&existing.id).await {
            Ok(()) => {
                info!(
                    "Deleted {} {} (id {}) via {}",
                    R::KIND,
                    key,
                    existing.id,
                    client.client_name()
                );
                Ok(Decision::about(Action::Deleted, existing))
            }
            Err(Error::NotFound(_)) => {
                debug!("{} {} vanished before delete (id {})", R::KIND, key, existing.id);
                Ok(Decision::new(Action::Unchanged, None))
            }
            Err(e) => Err(e),
        }
    }
}
