//! Resolves XDG base directories for config/cache/state roots.
//!
//! Directory resolution prefers `directories-next`; when it can't determine
//! a project directory (minimal containers without a resolvable `HOME`) it
//! falls back to `$HOME/.packnplay/<kind>`.

use std::path::PathBuf;

use directories_next::ProjectDirs;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "packnplay", "packnplay")
}

fn home_fallback(kind: &str) -> PathBuf {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".packnplay").join(kind)
}

pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| home_fallback("config"))
}

pub fn cache_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.cache_dir().to_path_buf())
        .unwrap_or_else(|| home_fallback("cache"))
}

pub fn state_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_local_dir().to_path_buf())
        .unwrap_or_else(|| home_fallback("state"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_cache_and_state_dirs_are_distinct() {
        let config = config_dir();
        let cache = cache_dir();
        let state = state_dir();
        assert_ne!(config, cache);
        assert_ne!(cache, state);
    }
}
