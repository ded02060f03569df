//! Configuration types for fbxconf
//!
//! A desired-state document names the router to talk to, reconciler
//! settings, and the resources that should (or should not) exist.

use crate::error::{Error, Result};
use crate::resource::{Resource, ResourceParams};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default router host
pub const DEFAULT_ROUTER_URL: &str = "mafreebox.freebox.fr";

/// Main fbxconf configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FbxConfig {
    /// Router connection settings
    #[serde(default)]
    pub router: RouterConfig,

    /// Reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Resources to reconcile, applied in order
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

impl FbxConfig {
    /// Parse a configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid desired-state document: {e}")))
    }

    /// Read and parse a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&contents)
    }

    /// Validate the configuration
    ///
    /// Entries that fail resource validation are not rejected here: they are
    /// reported individually when applied. Two valid entries sharing an
    /// identity key are rejected, since applying both would make the run
    /// fight itself.
    pub fn validate(&self) -> Result<()> {
        if self.resources.is_empty() {
            return Err(Error::config("No resources configured"));
        }

        self.router.validate()?;

        let mut seen = HashSet::new();
        for entry in &self.resources {
            if let Ok(resource) = Resource::try_from(entry.params.clone()) {
                let key = resource.identity_key();
                if !seen.insert(key.clone()) {
                    return Err(Error::config(format!(
                        "Resource {key} is declared more than once"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Router connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Router host, or full base URL including the scheme
    #[serde(default = "default_url")]
    pub url: String,

    /// API version segment, e.g. `v4`
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// HTTP timeout for a single request (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RouterConfig {
    /// Validate the router settings
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::config("Router URL cannot be empty"));
        }

        let version_ok = self
            .api_version
            .strip_prefix('v')
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
        if !version_ok {
            return Err(Error::config(format!(
                "Router API version must look like 'v4', got '{}'",
                self.api_version
            )));
        }

        if !(1..=300).contains(&self.timeout_secs) {
            return Err(Error::config(format!(
                "Router timeout must be between 1 and 300 seconds, got {}",
                self.timeout_secs
            )));
        }

        Ok(())
    }

    /// Base URL of the API, e.g. `https://mafreebox.freebox.fr/api/v4`
    ///
    /// A bare host gets `https://`; a URL that already carries a scheme is
    /// used as-is.
    pub fn api_base(&self) -> String {
        let url = self.url.trim().trim_end_matches('/');
        let root = if url.contains("://") {
            url.to_string()
        } else {
            format!("https://{url}")
        };
        format!("{root}/api/{}", self.api_version)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Reconciler settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Check mode: diff against the router but issue no writes
    #[serde(default)]
    pub dry_run: bool,
}

/// Whether a resource should exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    /// Create or update until the router matches
    #[default]
    Present,
    /// Delete if the router has it
    Absent,
}

/// One resource in the desired-state document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// The resource description
    #[serde(flatten)]
    pub params: ResourceParams,

    /// Whether it should exist
    #[serde(default)]
    pub state: DesiredState,
}

impl ResourceEntry {
    /// An entry that should exist
    pub fn present(params: ResourceParams) -> Self {
        Self {
            params,
            state: DesiredState::Present,
        }
    }

    /// An entry that should not exist
    pub fn absent(params: ResourceParams) -> Self {
        Self {
            params,
            state: DesiredState::Absent,
        }
    }
}

fn default_url() -> String {
    DEFAULT_ROUTER_URL.to_string()
}

fn default_api_version() -> String {
    "v4".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}
