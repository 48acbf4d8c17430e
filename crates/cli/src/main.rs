use clap::Parser;

mod cli;
mod commands;

/// The orchestrator's async surface (subprocess I/O, OCI fetches) doesn't
/// benefit from multiple worker threads; a single-threaded runtime keeps a
/// CLI invocation's resource footprint to one process, one thread. The
/// credential sync daemon (`commands::watch_credentials`) does its polling
/// synchronously rather than under any Tokio runtime at all — its work is a
/// handful of small file copies per pass, not enough concurrency to be
/// worth a runtime of its own.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let parsed = cli::Cli::parse();
    std::process::exit(run(parsed).await);
}

async fn run(cli: cli::Cli) -> i32 {
    if let Err(e) = packnplay_core::logging::init(cli.verbose()) {
        eprintln!("failed to initialize logging: {e}");
        return 1;
    }

    match cli.dispatch().await {
        Ok(code) => code,
        Err(e) => {
            print_error_chain(&e);
            1
        }
    }
}

/// Prints the full error chain once, `Caused by: ...` per layer. Rust
/// backtraces are left to the default panic machinery rather than forced
/// here, matching the "stack traces are not user-facing" default. Error
/// text is run through the global secret registry first: a failed `docker
/// build`/`pull` surfaces the runtime CLI's own stderr verbatim, which can
/// echo back credential values this process staged into the container.
fn print_error_chain(err: &anyhow::Error) {
    eprintln!("error: {}", packnplay_core::redaction::redact_with_global(&err.to_string()));
    for cause in err.chain().skip(1) {
        eprintln!("Caused by: {}", packnplay_core::redaction::redact_with_global(&cause.to_string()));
    }
}
