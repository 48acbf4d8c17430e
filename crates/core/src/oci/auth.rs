//! Docker registry v2 token auth (the `WWW-Authenticate: Bearer` dance).

use crate::errors::{FeatureError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Challenge parsed out of a registry's `WWW-Authenticate` header.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

/// Parses `Bearer realm="...",service="...",scope="..."`.
pub fn parse_challenge(header: &str) -> Option<Challenge> {
    let rest = header.strip_prefix("Bearer ")?;
    let mut realm = None;
    let mut service = None;
    let mut scope = None;
    for part in rest.split(',') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim_matches('"');
            match key {
                "realm" => realm = Some(value.to_string()),
                "service" => service = Some(value.to_string()),
                "scope" => scope = Some(value.to_string()),
                _ => {}
            }
        }
    }
    Some(Challenge {
        realm: realm?,
        service,
        scope,
    })
}

/// Exchanges a challenge for a bearer token, anonymously (no credentials
/// are stored by this crate; private registries rely on the host's
/// existing docker/podman login being reused by the runtime adapter for
/// anything beyond anonymous pull).
pub async fn fetch_token(client: &reqwest::Client, challenge: &Challenge) -> Result<String> {
    let mut request = client.get(&challenge.realm);
    if let Some(service) = &challenge.service {
        request = request.query(&[("service", service.as_str())]);
    }
    if let Some(scope) = &challenge.scope {
        request = request.query(&[("scope", scope.as_str())]);
    }
    let response = request.send().await.map_err(|e| FeatureError::FetchFailed {
        reference: challenge.realm.clone(),
        message: e.to_string(),
    })?;
    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| FeatureError::FetchFailed {
            reference: challenge.realm.clone(),
            message: e.to_string(),
        })?;
    body.token
        .or(body.access_token)
        .ok_or_else(|| {
            FeatureError::FetchFailed {
                reference: challenge.realm.clone(),
                message: "token response missing 'token' field".to_string(),
            }
            .into()
        })
}
