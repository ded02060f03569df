// # fbxconf-core
//
// Core library for declarative Freebox router configuration.
//
// ## Architecture Overview
//
// This library reconciles desired router resources against what the router
// currently holds:
// - **Resource**: the closed set of managed kinds (static DHCP leases, NAT rules)
// - **RouterClient**: trait for list/get/create/update/delete per kind
// - **SessionProvider**: trait for the injected router session
// - **Reconciler**: decides create/update/delete/no-op and carries it out
// - **Report**: flat, printable record of what a reconciliation did
//
// ## Design Principles
//
// 1. **Validated values**: invalid resources cannot be constructed
// 2. **Idempotency**: a second run against a matching router writes nothing
// 3. **Explicit deletion**: resources are only removed when asked for
// 4. **Library-First**: the binary is a thin front end over this crate

pub mod config;
pub mod error;
pub mod reconciler;
pub mod report;
pub mod resource;
pub mod router;
pub mod traits;

// Re-export core types for convenience
pub use config::{DesiredState, FbxConfig, ReconcilerConfig, ResourceEntry, RouterConfig};
pub use error::{Error, Result};
pub use reconciler::{Action, Outcome, Reconciler};
pub use report::{Echo, Report};
pub use resource::{
    NatRule, NatRuleParams, Resource, ResourceId, ResourceKind, ResourceParams, RouterResource,
    StaticLease, StaticLeaseParams,
};
pub use router::MemoryRouter;
pub use traits::{Current, RouterClient, SessionProvider};
