//! Test doubles and common utilities for reconciliation contract tests
//!
//! `MemoryRouter` from the core crate plays a well-behaved router. The
//! doubles here cover what it cannot: routers that fail on demand.

#![allow(dead_code)]

use fbxconf_core::error::{Error, Result};
use fbxconf_core::resource::{NatRule, NatRuleParams, ResourceId, RouterResource, StaticLease};
use fbxconf_core::router::{CallCounts, MemoryRouter};
use fbxconf_core::traits::{Current, RouterClient};
use fbxconf_core::Reconciler;
use std::sync::{Arc, Mutex};

/// Router clients behind a reconciler, kept for inspection
pub struct Harness {
    pub reconciler: Reconciler,
    pub leases: MemoryRouter<StaticLease>,
    pub nat_rules: MemoryRouter<NatRule>,
}

/// A reconciler over two empty in-memory routers
pub fn harness() -> Harness {
    let leases: MemoryRouter<StaticLease> = MemoryRouter::new();
    let nat_rules: MemoryRouter<NatRule> = MemoryRouter::new();
    let reconciler = Reconciler::new(Arc::new(leases.clone()), Arc::new(nat_rules.clone()));
    Harness {
        reconciler,
        leases,
        nat_rules,
    }
}

/// A reconciler in check mode over two empty in-memory routers
pub fn dry_run_harness() -> Harness {
    let Harness {
        reconciler,
        leases,
        nat_rules,
    } = harness();
    Harness {
        reconciler: reconciler.with_dry_run(true),
        leases,
        nat_rules,
    }
}

pub fn lease(mac: &str, ip: &str) -> StaticLease {
    StaticLease::new(mac, ip).expect("valid lease")
}

/// Parameters of the web server forwarding rule used across tests
pub fn web_rule_params(enabled: bool) -> NatRuleParams {
    NatRuleParams::new("192.168.1.42", 4242, (4242, 4242), "tcp", enabled)
        .with_comment("Web server access")
}

pub fn web_rule(enabled: bool) -> NatRule {
    NatRule::new(web_rule_params(enabled)).expect("valid rule")
}

/// Which operations a `FailingRouter` should fail, and with what
#[derive(Debug, Clone, Default)]
pub struct Failures {
    pub list: Option<Error>,
    pub create: Option<Error>,
    pub update: Option<Error>,
    pub delete: Option<Error>,
}

/// A router that fails selected operations and otherwise behaves like `MemoryRouter`
///
/// Failed calls are counted alongside the successful ones.
#[derive(Clone)]
pub struct FailingRouter<R> {
    inner: MemoryRouter<R>,
    failures: Failures,
    failed_calls: Arc<Mutex<CallCounts>>,
}

impl<R: RouterResource> FailingRouter<R> {
    pub fn new(failures: Failures) -> Self {
        Self {
            inner: MemoryRouter::new(),
            failures,
            failed_calls: Arc::new(Mutex::new(CallCounts::default())),
        }
    }

    /// A router whose `list` always fails with `error`
    pub fn failing_list(error: Error) -> Self {
        Self::new(Failures {
            list: Some(error),
            ..Failures::default()
        })
    }

    /// The backing table
    pub fn table(&self) -> &MemoryRouter<R> {
        &self.inner
    }

    /// Calls made so far, failed or not
    pub fn calls(&self) -> CallCounts {
        let ok = self.inner.calls();
        let failed = *self.failed_calls.lock().unwrap();
        CallCounts {
            list: ok.list + failed.list,
            get: ok.get + failed.get,
            create: ok.create + failed.create,
            update: ok.update + failed.update,
            delete: ok.delete + failed.delete,
        }
    }

    fn fail(&self, failure: &Option<Error>, count: impl FnOnce(&mut CallCounts)) -> Result<()> {
        match failure {
            Some(error) => {
                count(&mut *self.failed_calls.lock().unwrap());
                Err(error.clone())
            }
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl<R: RouterResource> RouterClient<R> for FailingRouter<R> {
    async fn list(&self) -> Result<Vec<Current<R>>> {
        self.fail(&self.failures.list, |c| c.list += 1)?;
        self.inner.list().await
    }

    async fn get(&self, id: &ResourceId) -> Result<Current<R>> {
        self.inner.get(id).await
    }

    async fn create(&self, desired: &R) -> Result<Current<R>> {
        self.fail(&self.failures.create, |c| c.create += 1)?;
        self.inner.create(desired).await
    }

    async fn update(&self, id: &ResourceId, desired: &R) -> Result<Current<R>> {
        self.fail(&self.failures.update, |c| c.update += 1)?;
        self.inner.update(id, desired).await
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        self.fail(&self.failures.delete, |c| c.delete += 1)?;
        self.inner.delete(id).await
    }

    fn client_name(&self) -> &'static str {
        "failing"
    }
}
