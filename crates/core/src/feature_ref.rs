//! Feature reference transport detection.
//!
//! A feature is identified by an OCI ref, a local filesystem path, or an
//! http(s) tarball URL. This module decides which.

use crate::errors::{FeatureError, Result};
use crate::registry_parser::{parse_registry_reference, OciFeatureRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureRefType {
    Oci(OciFeatureRef),
    LocalPath(String),
    HttpsTarball(String),
}

/// Classifies a feature reference string by transport.
///
/// Precedence: `./` or `../` prefix → local path; leading `/` → error (not
/// supported, devcontainer features are always relative or OCI); `https://`
/// → tarball; `http://` → error (insecure transport not supported);
/// otherwise → OCI reference.
pub fn parse_feature_reference(reference: &str) -> Result<FeatureRefType> {
    if reference.starts_with("./") || reference.starts_with("../") {
        return Ok(FeatureRefType::LocalPath(reference.to_string()));
    }
    if let Some(rest) = reference.strip_prefix('/') {
        let _ = rest;
        return Err(FeatureError::Validation {
            message: format!(
                "absolute local feature paths are not supported: {reference}"
            ),
        }
        .into());
    }
    if reference.starts_with("https://") {
        return Ok(FeatureRefType::HttpsTarball(reference.to_string()));
    }
    if reference.starts_with("http://") {
        return Err(FeatureError::Validation {
            message: format!("insecure http:// feature URLs are not supported: {reference}"),
        }
        .into());
    }
    let oci = parse_registry_reference(reference)?;
    Ok(FeatureRefType::Oci(oci))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_is_local() {
        assert!(matches!(
            parse_feature_reference("./features/node").unwrap(),
            FeatureRefType::LocalPath(_)
        ));
    }

    #[test]
    fn absolute_path_is_rejected() {
        assert!(parse_feature_reference("/features/node").is_err());
    }

    #[test]
    fn https_url_is_tarball() {
        assert!(matches!(
            parse_feature_reference("https://example.com/feature.tgz").unwrap(),
            FeatureRefType::HttpsTarball(_)
        ));
    }

    #[test]
    fn http_url_is_rejected() {
        assert!(parse_feature_reference("http://example.com/feature.tgz").is_err());
    }

    #[test]
    fn bare_reference_is_oci() {
        assert!(matches!(
            parse_feature_reference("ghcr.io/devcontainers/features/node:1").unwrap(),
            FeatureRefType::Oci(_)
        ));
    }
}
