//! Synthetic Dockerfile generation for layering features onto a base image.
//!
//! Output must be byte-stable for identical input: same feature order, no
//! timestamps, no random tokens, so the runtime adapter's build cache
//! actually caches.

use crate::feature_resolver::ResolvedFeature;
use crate::features::OptionValue;
use std::path::Path;

pub const TARGET_STAGE: &str = "dev_containers_target_stage";

/// Renders the Dockerfile text for `base_image` plus the ordered, resolved
/// feature list. `context_dir` is the build context root; every feature's
/// `directory` must already live under it (the image manager stages each
/// feature's payload into the context before calling this), so `COPY`
/// sources are always expressed relative to the context root rather than
/// as host-absolute paths Docker can't resolve.
pub fn generate(base_image: &str, features: &[ResolvedFeature], context_dir: &Path) -> String {
    let mut out = String::new();
    out.push_str(&format!("FROM {base_image} AS {TARGET_STAGE}\n\n"));

    for (index, feature) in features.iter().enumerate() {
        let slot = feature_slot(feature, index);
        let target = format!("/tmp/devcontainer-features/{slot}/");
        let source = feature.directory.strip_prefix(context_dir).unwrap_or(&feature.directory);
        out.push_str(&format!("COPY {} {target}\n", source.display()));
        out.push_str(&format!("RUN chmod -R 0755 {target}\n"));

        let env_vars = option_env_vars(feature);
        let mut run_line = String::from("RUN ");
        for (key, value) in &env_vars {
            run_line.push_str(&format!("{key}={} ", shell_quote(value)));
        }
        run_line.push_str(&format!("{target}install.sh\n\n"));
        out.push_str(&run_line);
    }

    out.push_str(&metadata_label_block(features));
    out
}

fn feature_slot(feature: &ResolvedFeature, index: usize) -> String {
    format!("{index}-{}", sanitize_id(&feature.metadata.id))
}

fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn option_env_vars(feature: &ResolvedFeature) -> Vec<(String, String)> {
    let mut keys: Vec<&String> = feature.options.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|key| (key.to_uppercase(), option_value_to_string(&feature.options[key])))
        .collect()
}

fn option_value_to_string(value: &OptionValue) -> String {
    match value {
        OptionValue::Boolean(b) => b.to_string(),
        OptionValue::String(s) => s.clone(),
        OptionValue::Number(n) => n.to_string(),
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// An aggregated `LABEL` block so the image manager can retrieve the
/// merged runtime properties at container-start time via `inspect`,
/// without re-resolving features.
fn metadata_label_block(features: &[ResolvedFeature]) -> String {
    if features.is_empty() {
        return String::new();
    }
    let ids: Vec<&str> = features.iter().map(|f| f.metadata.id.as_str()).collect();
    format!("LABEL packnplay.features=\"{}\"\n", ids.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureMetadata;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn feature(id: &str, dir: &str) -> ResolvedFeature {
        ResolvedFeature {
            reference: format!("local:{id}"),
            metadata: FeatureMetadata {
                id: id.to_string(),
                ..Default::default()
            },
            directory: PathBuf::from(dir),
            options: HashMap::new(),
        }
    }

    #[test]
    fn opens_with_from_base_image() {
        let dockerfile = generate("ubuntu:22.04", &[], Path::new("/ctx"));
        assert!(dockerfile.starts_with(&format!("FROM ubuntu:22.04 AS {TARGET_STAGE}")));
    }

    #[test]
    fn copy_source_is_relative_to_the_build_context() {
        let features = vec![feature("node", "/ctx/node")];
        let dockerfile = generate("ubuntu:22.04", &features, Path::new("/ctx"));
        assert!(dockerfile.contains("COPY node /tmp/devcontainer-features/0-node/"));
        assert!(!dockerfile.contains("/ctx/node"));
    }

    #[test]
    fn generation_is_byte_stable_for_same_input() {
        let features = vec![feature("node", "/ctx/node"), feature("go", "/ctx/go")];
        let first = generate("ubuntu:22.04", &features, Path::new("/ctx"));
        let second = generate("ubuntu:22.04", &features, Path::new("/ctx"));
        assert_eq!(first, second);
    }

    #[test]
    fn options_become_uppercased_env_vars_in_sorted_order() {
        let mut f = feature("node", "/ctx/node");
        f.options.insert("version".to_string(), OptionValue::String("18".to_string()));
        f.options.insert("aFlag".to_string(), OptionValue::Boolean(true));
        let dockerfile = generate("ubuntu:22.04", std::slice::from_ref(&f), Path::new("/ctx"));
        let run_line = dockerfile.lines().find(|l| l.starts_with("RUN AFLAG")).unwrap();
        assert!(run_line.contains("AFLAG='true'"));
        assert!(run_line.contains("VERSION='18'"));
        assert!(run_line.find("AFLAG").unwrap() < run_line.find("VERSION").unwrap());
    }
}
