//! Core traits for fbxconf
//!
//! This module defines the abstract interfaces the reconciler depends on.
//!
//! - [`RouterClient`]: list/get/create/update/delete per resource kind
//! - [`SessionProvider`]: injected authentication capability

pub mod router_client;
pub mod session;

pub use router_client::{Current, RouterClient};
pub use session::SessionProvider;
