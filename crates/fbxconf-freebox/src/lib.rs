// # fbxconf-freebox
//
// Freebox OS HTTP API client for fbxconf.
//
// ## Security Requirements
//
// - The session token NEVER appears in logs or Debug output
// - The token is obtained from an injected `SessionProvider`, never a global
// - An empty token is rejected at construction

mod client;
mod session;
mod wire;

pub use client::{AUTH_HEADER, FreeboxClient};
pub use session::StaticSession;
