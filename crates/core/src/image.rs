//! Image manager: build-vs-pull decision, build context assembly, tagging.

use crate::config::DevContainerConfig;
use crate::dockerfile_generator;
use crate::docker::DockerCli;
use crate::errors::Result;
use crate::feature_resolver::{MergedRuntimeProperties, ResolvedFeature};
use crate::naming;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, instrument};

/// `ensure_image(resolved_config, features) -> image_ref`.
///
/// Decision tree: features or a dockerfile present -> build; else pull if
/// absent locally, otherwise reuse the local copy.
#[instrument(skip(docker, config, features, merged))]
pub async fn ensure_image(
    docker: &DockerCli,
    config: &DevContainerConfig,
    features: &[ResolvedFeature],
    merged: &MergedRuntimeProperties,
    launch_dir: &Path,
    project_path: &Path,
    cache_dir: &Path,
) -> Result<String> {
    if config.requires_build() {
        return build_image(docker, config, features, merged, launch_dir, project_path, cache_dir).await;
    }

    let image = config
        .image
        .clone()
        .ok_or_else(|| crate::errors::PacknplayError::runtime("no image, dockerFile, or features configured"))?;

    if docker.inspect_image(&image).await?.is_some() {
        debug!(image = %image, "image already present locally");
        return Ok(image);
    }

    info!(image = %image, "pulling image");
    docker.pull(&image).await?;
    Ok(image)
}

async fn build_image(
    docker: &DockerCli,
    config: &DevContainerConfig,
    features: &[ResolvedFeature],
    merged: &MergedRuntimeProperties,
    launch_dir: &Path,
    project_path: &Path,
    cache_dir: &Path,
) -> Result<String> {
    let base_image = resolve_base_image(docker, config, launch_dir, project_path).await?;
    let context_dir = cache_dir.join("build-context");
    std::fs::create_dir_all(&context_dir)
        .map_err(|e| crate::errors::PacknplayError::runtime(format!("creating build context: {e}")))?;

    let staged_features = stage_features_into_context(features, &context_dir)?;
    let dockerfile_text = dockerfile_generator::generate(&base_image, &staged_features, &context_dir);
    let dockerfile_path = context_dir.join("Dockerfile.packnplay");
    std::fs::write(&dockerfile_path, &dockerfile_text)
        .map_err(|e| crate::errors::PacknplayError::runtime(format!("writing generated dockerfile: {e}")))?;

    let tag = naming::image_tag(project_path);
    let labels = build_labels(features, merged);
    let build_args = config.build_args();

    info!(tag = %tag, feature_count = features.len(), "building image");
    docker.build(&context_dir, &dockerfile_path, &tag, &labels, &build_args).await?;
    Ok(tag)
}

async fn resolve_base_image(
    docker: &DockerCli,
    config: &DevContainerConfig,
    launch_dir: &Path,
    project_path: &Path,
) -> Result<String> {
    if let Some(image) = &config.image {
        return Ok(image.clone());
    }
    if let Some(dockerfile) = &config.dockerfile {
        let dockerfile_path = launch_dir.join(".devcontainer").join(dockerfile);
        let base_tag = format!("{}-base", naming::image_tag(project_path));
        let context_dir = dockerfile_path.parent().unwrap_or(launch_dir);
        let build_args = config.build_args();
        docker.build(context_dir, &dockerfile_path, &base_tag, &HashMap::new(), &build_args).await?;
        return Ok(base_tag);
    }
    Err(crate::errors::PacknplayError::runtime(
        "build path requires either 'image' or 'dockerFile'",
    ))
}

fn build_labels(features: &[ResolvedFeature], merged: &MergedRuntimeProperties) -> HashMap<String, String> {
    let mut labels = HashMap::new();
    let ids: Vec<&str> = features.iter().map(|f| f.metadata.id.as_str()).collect();
    labels.insert("packnplay.features".to_string(), ids.join(","));
    labels.insert("packnplay.privileged".to_string(), merged.privileged.to_string());
    labels.insert("packnplay.init".to_string(), merged.init.to_string());
    labels
}

/// Copies each feature's cached payload into the build context and returns
/// clones with `directory` rewritten to the staged location, so the
/// generated Dockerfile's `COPY` sources are genuinely reachable from the
/// context handed to `docker build` rather than pointing at the feature
/// cache directory outside it.
fn stage_features_into_context(features: &[ResolvedFeature], context_dir: &Path) -> Result<Vec<ResolvedFeature>> {
    let mut staged = Vec::with_capacity(features.len());
    for feature in features {
        let dest = context_dir.join(feature.directory.file_name().unwrap_or_default());
        copy_dir_recursive(&feature.directory, &dest)?;
        staged.push(ResolvedFeature {
            directory: dest,
            ..feature.clone()
        });
    }
    Ok(staged)
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .map_err(|e| crate::errors::PacknplayError::runtime(format!("creating {}: {e}", dest.display())))?;
    for entry in std::fs::read_dir(src)
        .map_err(|e| crate::errors::PacknplayError::runtime(format!("reading {}: {e}", src.display())))?
    {
        let entry = entry.map_err(|e| crate::errors::PacknplayError::runtime(e.to_string()))?;
        let target = dest.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)
                .map_err(|e| crate::errors::PacknplayError::runtime(format!("copying feature payload: {e}")))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureMetadata;
    use std::collections::HashMap as StdHashMap;
    use std::path::PathBuf;

    #[test]
    fn build_labels_aggregates_feature_ids_and_merged_flags() {
        let feature = ResolvedFeature {
            reference: "local:node".to_string(),
            metadata: FeatureMetadata {
                id: "node".to_string(),
                ..Default::default()
            },
            directory: PathBuf::from("/cache/node"),
            options: StdHashMap::new(),
        };
        let mut merged = MergedRuntimeProperties::default();
        merged.privileged = true;
        let labels = build_labels(&[feature], &merged);
        assert_eq!(labels.get("packnplay.features").map(String::as_str), Some("node"));
        assert_eq!(labels.get("packnplay.privileged").map(String::as_str), Some("true"));
    }

    #[test]
    fn copy_dir_recursive_copies_nested_files() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("nested")).unwrap();
        std::fs::write(src.path().join("install.sh"), "#!/bin/sh").unwrap();
        std::fs::write(src.path().join("nested").join("data.txt"), "hello").unwrap();

        let dest = tempfile::tempdir().unwrap();
        let target = dest.path().join("copied");
        copy_dir_recursive(src.path(), &target).unwrap();

        assert!(target.join("install.sh").exists());
        assert!(target.join("nested").join("data.txt").exists());
    }
}
