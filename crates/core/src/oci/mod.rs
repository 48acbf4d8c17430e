//! OCI registry v2 client for fetching devcontainer features.
//!
//! Supports the subset of the distribution spec needed to pull a feature
//! artifact: token auth, manifest fetch, and layer blob fetch. This is
//! deliberately not a general registry client — it exists to let the
//! feature resolver materialize `(registry/path:tag)` references without
//! shelling out to the runtime CLI's own (more limited) pull.

pub mod auth;
pub mod client;

use serde::{Deserialize, Serialize};

/// A single layer descriptor from a manifest.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Descriptor {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: String,
    pub size: u64,
}

/// The subset of an OCI image manifest this client needs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Manifest {
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
    #[serde(default)]
    pub annotations: std::collections::HashMap<String, String>,
}

pub use client::OciClient;
