// # Router Client Implementations
//
// Router clients that live in this crate. The HTTP client for the Freebox
// API is in `fbxconf-freebox`.

pub mod memory;

pub use memory::{CallCounts, MemoryRouter};
