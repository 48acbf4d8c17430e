//! The `watch-credentials` subcommand: the credential sync daemon's own
//! entry point, spawned detached by [`crate::commands::ensure_daemon_running`].

use anyhow::Result;
use packnplay_core::credentials::CredentialCategory;
use packnplay_core::{daemon, state};
use std::time::Duration;
use tracing::{debug, info, warn};

const SYNC_INTERVAL: Duration = Duration::from_secs(30);

pub fn execute() -> Result<i32> {
    let state_dir = state::state_dir();
    if let Err(e) = daemon::claim_instance(&state_dir) {
        debug!(error = %e, "another credential sync daemon is already running, exiting");
        return Ok(0);
    }
    info!("credential sync daemon started");

    let result = run_loop(&state_dir);

    daemon::release_instance(&state_dir);
    result.map(|_| 0)
}

fn run_loop(state_dir: &std::path::Path) -> Result<()> {
    let home = std::env::var_os("HOME").map(std::path::PathBuf::from).ok_or_else(|| {
        packnplay_core::errors::PacknplayError::credential("HOME is not set; cannot locate credential sources")
    })?;
    let categories = CredentialCategory::all();

    loop {
        if let Err(e) = daemon::sync_once(state_dir, &home, &categories) {
            warn!(error = %e, "credential sync pass failed");
        }
        std::thread::sleep(SYNC_INTERVAL);
    }
}
