mod app;
mod backend;
mod cli;
mod commands;
mod config;
mod exit_hooks;
mod frontend;
mod intercept;
mod output;
mod process;
mod threads;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() {
    // Parse CLI arguments early so we can configure logging/output.
    let cli = Cli::parse();

    crate::output::set_verbose(cli.verbose);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cli.verbose {
                EnvFilter::new("info")
            } else {
                EnvFilter::new("warn")
            }
        }))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = match cli.run() {
        Ok(code) => code,
        Err(e) => {
            crate::output::error_stderr(&e.to_string());
            1
        }
    };

    // Children must not outlive us, whichever way we got here.
    exit_hooks::fire_all();
    std::process::exit(code);
}
