//! Manifest and blob fetch for a single OCI feature reference.

use super::{auth, Manifest};
use crate::errors::{FeatureError, Result};
use crate::registry_parser::OciFeatureRef;
use reqwest::StatusCode;

const ACCEPT_MANIFEST: &str =
    "application/vnd.oci.image.manifest.v1+json, application/vnd.docker.distribution.manifest.v2+json";

pub struct OciClient {
    http: reqwest::Client,
}

impl Default for OciClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OciClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    fn reference_tag_or_digest(oci_ref: &OciFeatureRef) -> String {
        oci_ref
            .digest
            .clone()
            .map(|d| d.trim_start_matches('@').to_string())
            .or_else(|| oci_ref.tag.clone())
            .unwrap_or_else(|| "latest".to_string())
    }

    async fn authorized(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let header = response
            .headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let Some(header) = header else {
            return Ok(response);
        };
        let Some(challenge) = auth::parse_challenge(&header) else {
            return Ok(response);
        };
        let token = auth::fetch_token(&self.http, &challenge).await?;
        self.http
            .get(url)
            .header("Accept", ACCEPT_MANIFEST)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                FeatureError::FetchFailed {
                    reference: url.to_string(),
                    message: e.to_string(),
                }
                .into()
            })
    }

    /// Fetches the manifest for an OCI feature reference.
    pub async fn fetch_manifest(&self, oci_ref: &OciFeatureRef) -> Result<Manifest> {
        let reference = Self::reference_tag_or_digest(oci_ref);
        let url = format!(
            "https://{}/v2/{}/manifests/{}",
            oci_ref.registry, oci_ref.path, reference
        );
        let response = self
            .http
            .get(&url)
            .header("Accept", ACCEPT_MANIFEST)
            .send()
            .await
            .map_err(|e| FeatureError::FetchFailed {
                reference: url.clone(),
                message: e.to_string(),
            })?;
        let response = self.authorized(&url, response).await?;
        if !response.status().is_success() {
            return Err(FeatureError::FetchFailed {
                reference: url,
                message: format!("manifest fetch returned {}", response.status()),
            }
            .into());
        }
        response
            .json()
            .await
            .map_err(|e| FeatureError::FetchFailed {
                reference: oci_ref.reference(),
                message: format!("parsing manifest: {e}"),
            }
            .into())
    }

    /// Fetches a single blob by digest and returns its raw bytes.
    pub async fn fetch_blob(&self, oci_ref: &OciFeatureRef, digest: &str) -> Result<bytes::Bytes> {
        let url = format!("https://{}/v2/{}/blobs/{digest}", oci_ref.registry, oci_ref.path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FeatureError::FetchFailed {
                reference: url.clone(),
                message: e.to_string(),
            })?;
        let response = self.authorized(&url, response).await?;
        if !response.status().is_success() {
            return Err(FeatureError::FetchFailed {
                reference: url,
                message: format!("blob fetch returned {}", response.status()),
            }
            .into());
        }
        response
            .bytes()
            .await
            .map_err(|e| FeatureError::FetchFailed {
                reference: oci_ref.reference(),
                message: format!("reading blob: {e}"),
            }
            .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_tag_or_digest_prefers_digest() {
        let oci_ref = OciFeatureRef {
            registry: "ghcr.io".to_string(),
            path: "a/b".to_string(),
            tag: Some("1.0".to_string()),
            digest: Some("@sha256:abc".to_string()),
        };
        assert_eq!(OciClient::reference_tag_or_digest(&oci_ref), "sha256:abc");
    }

    #[test]
    fn reference_tag_or_digest_defaults_to_latest() {
        let oci_ref = OciFeatureRef {
            registry: "ghcr.io".to_string(),
            path: "a/b".to_string(),
            tag: None,
            digest: None,
        };
        assert_eq!(OciClient::reference_tag_or_digest(&oci_ref), "latest");
    }
}
