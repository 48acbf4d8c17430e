//! Feature resolver: fetches, caches, orders, and options-binds
//! devcontainer features.

use crate::cache::{feature_cache_dir, sha256_hex, write_json_atomic};
use crate::errors::{FeatureError, Result};
use crate::feature_ref::{parse_feature_reference, FeatureRefType};
use crate::features::{parse_feature_metadata, FeatureMetadata, OptionValue};
use crate::lockfile::Lockfile;
use crate::oci::OciClient;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// A feature ready to be installed: its metadata, materialized directory,
/// and the resolved (defaulted, validated) options it will run with.
#[derive(Debug, Clone)]
pub struct ResolvedFeature {
    pub reference: String,
    pub metadata: FeatureMetadata,
    pub directory: PathBuf,
    pub options: HashMap<String, OptionValue>,
}

/// The aggregate runtime properties contributed by every resolved feature,
/// merged per §4.6: `init`/`privileged` are logical OR, `capAdd`/
/// `securityOpt`/`mounts` are set-union (order not observable beyond
/// dedup), `entrypoints` is an ordered list, `containerEnv` is
/// last-writer-wins per key in install order.
#[derive(Debug, Clone, Default)]
pub struct MergedRuntimeProperties {
    pub privileged: bool,
    pub init: bool,
    pub cap_add: Vec<String>,
    pub security_opt: Vec<String>,
    pub mounts: Vec<String>,
    pub entrypoints: Vec<String>,
    pub container_env: HashMap<String, String>,
}

fn push_unique(set: &mut Vec<String>, value: &str) {
    if !set.iter().any(|existing| existing == value) {
        set.push(value.to_string());
    }
}

impl MergedRuntimeProperties {
    pub fn merge_feature(&mut self, feature: &FeatureMetadata) {
        self.privileged |= feature.privileged.unwrap_or(false);
        self.init |= feature.init.unwrap_or(false);
        for cap in &feature.cap_add {
            push_unique(&mut self.cap_add, cap);
        }
        for opt in &feature.security_opt {
            push_unique(&mut self.security_opt, opt);
        }
        for mount in &feature.mounts {
            push_unique(&mut self.mounts, mount);
        }
        if let Some(entrypoint) = &feature.entrypoint.0 {
            self.entrypoints.push(entrypoint.clone());
        }
        for (key, value) in &feature.container_env {
            self.container_env.insert(key.clone(), value.clone());
        }
    }
}

/// Canonicalizes a feature options object for dependency-matching: sort
/// keys, stringify scalars. See Open Question in DESIGN.md.
pub fn canonicalize_options(options: &HashMap<String, Value>) -> String {
    let mut keys: Vec<&String> = options.keys().collect();
    keys.sort();
    keys.iter()
        .map(|k| format!("{k}={}", options[*k]))
        .collect::<Vec<_>>()
        .join(",")
}

struct GraphNode {
    reference: String,
    declared_index: usize,
}

/// Builds the topological order over `dependsOn` (hard) + `installsAfter`
/// (soft, only when both endpoints are present), breaking ties by
/// user-declared order and then by lexicographic id.
fn topological_order(
    nodes: &HashMap<String, FeatureMetadata>,
    declared_order: &IndexMap<String, HashMap<String, Value>>,
) -> Result<Vec<String>> {
    let graph_nodes: Vec<GraphNode> = nodes
        .keys()
        .enumerate()
        .map(|(i, reference)| GraphNode {
            reference: reference.clone(),
            declared_index: declared_order.get_index_of(reference).unwrap_or(i),
        })
        .collect();

    let mut hard_edges: HashMap<String, HashSet<String>> = HashMap::new();
    let mut soft_edges: HashMap<String, HashSet<String>> = HashMap::new();
    for (reference, metadata) in nodes {
        for dep in metadata.depends_on.0.keys() {
            if nodes.contains_key(dep) {
                hard_edges
                    .entry(reference.clone())
                    .or_default()
                    .insert(dep.clone());
            }
        }
        for dep in &metadata.installs_after {
            if nodes.contains_key(dep) {
                soft_edges
                    .entry(reference.clone())
                    .or_default()
                    .insert(dep.clone());
            }
        }
    }

    // colors: 0 = white, 1 = gray, 2 = black
    let mut colors: HashMap<String, u8> = HashMap::new();
    let mut order = Vec::new();

    let mut sorted_refs: Vec<&String> = graph_nodes.iter().map(|n| &n.reference).collect();
    sorted_refs.sort_by(|a, b| {
        let na = graph_nodes.iter().find(|n| &n.reference == *a).unwrap();
        let nb = graph_nodes.iter().find(|n| &n.reference == *b).unwrap();
        na.declared_index
            .cmp(&nb.declared_index)
            .then_with(|| a.cmp(b))
    });

    fn visit(
        node: &str,
        hard_edges: &HashMap<String, HashSet<String>>,
        soft_edges: &HashMap<String, HashSet<String>>,
        colors: &mut HashMap<String, u8>,
        order: &mut Vec<String>,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        match colors.get(node) {
            Some(2) => return Ok(()),
            Some(1) => {
                stack.push(node.to_string());
                return Err(FeatureError::DependencyCycle {
                    ids: stack.join(" -> "),
                }
                .into());
            }
            _ => {}
        }
        colors.insert(node.to_string(), 1);
        stack.push(node.to_string());

        let mut deps: Vec<&String> = Vec::new();
        if let Some(hard) = hard_edges.get(node) {
            let mut hard_sorted: Vec<&String> = hard.iter().collect();
            hard_sorted.sort();
            deps.extend(hard_sorted);
        }
        if let Some(soft) = soft_edges.get(node) {
            let mut soft_sorted: Vec<&String> = soft.iter().collect();
            soft_sorted.sort();
            deps.extend(soft_sorted);
        }
        for dep in deps {
            visit(dep, hard_edges, soft_edges, colors, order, stack)?;
        }

        stack.pop();
        colors.insert(node.to_string(), 2);
        order.push(node.to_string());
        Ok(())
    }

    for reference in sorted_refs {
        let mut stack = Vec::new();
        visit(
            reference,
            &hard_edges,
            &soft_edges,
            &mut colors,
            &mut order,
            &mut stack,
        )?;
    }

    Ok(order)
}

/// Materializes, parses, orders, and options-binds the features declared
/// in a devcontainer config's `features` map.
///
/// `features_map` preserves declaration order (an `IndexMap`, matching the
/// `preserve_order` feature of `serde_json`): the order keys appear in is
/// the tie-break for the topological sort.
#[instrument(skip(features_map, cache_dir, lockfile))]
pub async fn resolve_features(
    features_map: &IndexMap<String, HashMap<String, Value>>,
    cache_dir: &Path,
    lockfile: Option<&Lockfile>,
) -> Result<(Vec<ResolvedFeature>, MergedRuntimeProperties)> {
    let mut metadata_by_ref: HashMap<String, FeatureMetadata> = HashMap::new();
    let mut dirs_by_ref: HashMap<String, PathBuf> = HashMap::new();
    let mut to_fetch: Vec<String> = features_map.keys().cloned().collect();
    let mut fetched: HashSet<String> = HashSet::new();

    while let Some(reference) = to_fetch.pop() {
        if fetched.contains(&reference) {
            continue;
        }
        fetched.insert(reference.clone());
        let pinned = pinned_reference(&reference, lockfile);
        let (metadata, dir) = materialize_feature(&pinned, cache_dir).await?;
        for dep in metadata.depends_on.0.keys() {
            if !fetched.contains(dep) {
                to_fetch.push(dep.clone());
            }
        }
        metadata_by_ref.insert(reference.clone(), metadata);
        dirs_by_ref.insert(reference, dir);
    }

    let order = topological_order(&metadata_by_ref, features_map)?;

    let mut resolved = Vec::with_capacity(order.len());
    let mut merged = MergedRuntimeProperties::default();
    for reference in order {
        let metadata = metadata_by_ref.remove(&reference).unwrap();
        let directory = dirs_by_ref.remove(&reference).unwrap();
        let user_options = features_map.get(&reference).cloned().unwrap_or_default();
        let options = bind_options(&metadata, &user_options)?;
        merged.merge_feature(&metadata);
        resolved.push(ResolvedFeature {
            reference,
            metadata,
            directory,
            options,
        });
    }

    Ok((resolved, merged))
}

fn bind_options(
    metadata: &FeatureMetadata,
    user_options: &HashMap<String, Value>,
) -> Result<HashMap<String, OptionValue>> {
    let mut bound = HashMap::new();
    for (name, schema) in &metadata.options {
        let value = match user_options.get(name) {
            Some(Value::Bool(b)) => OptionValue::Boolean(*b),
            Some(Value::String(s)) => OptionValue::String(s.clone()),
            Some(Value::Number(n)) => OptionValue::String(n.to_string()),
            _ => schema
                .default_value()
                .unwrap_or(OptionValue::String(String::new())),
        };
        schema.validate_value(&value)?;
        bound.insert(name.clone(), value);
    }
    Ok(bound)
}

#[instrument(skip(cache_dir))]
/// Substitutes a lockfile-pinned resolved reference for `reference`, if the
/// lockfile has an entry for it with a non-empty `resolved` field. Falls
/// back to the declared reference otherwise; the lockfile is advisory.
fn pinned_reference(reference: &str, lockfile: Option<&Lockfile>) -> String {
    lockfile
        .and_then(|lf| lf.features.get(reference))
        .and_then(|locked| locked.resolved.clone())
        .unwrap_or_else(|| reference.to_string())
}

async fn materialize_feature(
    reference: &str,
    cache_dir: &Path,
) -> Result<(FeatureMetadata, PathBuf)> {
    let digest = sha256_hex(reference);
    let dir = feature_cache_dir(cache_dir, &digest);
    let metadata_path = dir.join("devcontainer-feature.json");

    if metadata_path.exists() {
        debug!(%reference, dir = %dir.display(), "feature already cached");
        let metadata = parse_feature_metadata(&metadata_path)?;
        return Ok((metadata, dir));
    }

    info!(%reference, "fetching feature");
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(FeatureError::Io)?;

    match parse_feature_reference(reference)? {
        FeatureRefType::LocalPath(path) => {
            copy_local_feature(Path::new(&path), &dir).await?;
        }
        FeatureRefType::HttpsTarball(url) => {
            fetch_tarball_feature(&url, &dir).await?;
        }
        FeatureRefType::Oci(oci_ref) => {
            fetch_oci_feature(&oci_ref, &dir).await?;
        }
    }

    let metadata = parse_feature_metadata(&metadata_path)?;
    Ok((metadata, dir))
}

async fn copy_local_feature(source: &Path, dest: &Path) -> Result<()> {
    let mut entries = tokio::fs::read_dir(source).await.map_err(FeatureError::Io)?;
    while let Some(entry) = entries.next_entry().await.map_err(FeatureError::Io)? {
        let file_type = entry.file_type().await.map_err(FeatureError::Io)?;
        if file_type.is_file() {
            tokio::fs::copy(entry.path(), dest.join(entry.file_name()))
                .await
                .map_err(FeatureError::Io)?;
        }
    }
    Ok(())
}

async fn fetch_tarball_feature(url: &str, dest: &Path) -> Result<()> {
    let bytes = crate::retry::retry(crate::retry::RetryPolicy::default(), || async {
        let response = reqwest::get(url).await.map_err(|e| e.to_string())?;
        response.bytes().await.map_err(|e| e.to_string())
    })
    .await
    .map_err(|message| FeatureError::FetchFailed {
        reference: url.to_string(),
        message,
    })?;
    extract_tarball(&bytes, dest).map_err(|e| {
        FeatureError::FetchFailed {
            reference: url.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

fn extract_tarball(bytes: &[u8], dest: &Path) -> std::io::Result<()> {
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(dest)
}

async fn fetch_oci_feature(
    oci_ref: &crate::registry_parser::OciFeatureRef,
    dest: &Path,
) -> Result<()> {
    let client = OciClient::new();
    let manifest = client.fetch_manifest(oci_ref).await?;
    let layer = manifest.layers.first().ok_or_else(|| FeatureError::FetchFailed {
        reference: oci_ref.reference(),
        message: "manifest has no layers".to_string(),
    })?;
    let blob = client.fetch_blob(oci_ref, &layer.digest).await?;
    extract_tarball(&blob, dest).map_err(|e| {
        FeatureError::FetchFailed {
            reference: oci_ref.reference(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Persists the merged feature install order to the workspace's lockfile
/// representation, for consumption by `lockfile.rs` writers.
pub fn write_resolution_cache(cache_dir: &Path, key: &str, resolved: &[ResolvedFeature]) -> Result<()> {
    let refs: Vec<&str> = resolved.iter().map(|r| r.reference.as_str()).collect();
    let path = cache_dir.join("resolutions").join(format!("{key}.json"));
    write_json_atomic(&path, &refs)
}
