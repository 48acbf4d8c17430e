//! The `configure` subcommand.
//!
//! The interactive configuration editor is out of scope for this build;
//! config.json is edited by hand or by another tool. This stub exists so
//! the subcommand resolves to a clear message instead of a missing-command
//! error.

use crate::cli::ConfigureArgs;
use anyhow::Result;
use packnplay_core::state;

pub fn execute(_args: ConfigureArgs) -> Result<i32> {
    println!(
        "interactive configuration is not part of this build; edit {} directly",
        state::config_dir().join("config.json").display()
    );
    Ok(0)
}
