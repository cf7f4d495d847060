use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use nestipy_core::{HttpChoice, LoopChoice, Verbosity};

use crate::commands::{self, start::StartError};
use crate::output;

/// Nestipy - run Nestipy applications in development and production
#[derive(Parser)]
#[command(name = "nestipy")]
#[command(version)]
#[command(about = "Nestipy - run Nestipy applications in development and production")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Show verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the application server (and optionally the web dev server)
    Start(StartArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// Application locator as <module path>:<attribute>
    #[arg(default_value = "main:app")]
    pub app: String,

    /// Development server (hot reload, console-only logging)
    #[arg(short = 'D', long)]
    pub dev: bool,

    /// Server port
    #[arg(short = 'P', long, default_value_t = 8000)]
    pub port: u16,

    /// Server host
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,

    /// Number of worker processes
    #[arg(long, default_value_t = 1)]
    pub workers: u16,

    /// SSL certificate key
    #[arg(long)]
    pub ssl_keyfile: Option<String>,

    /// SSL certificate file
    #[arg(long)]
    pub ssl_cert_file: Option<String>,

    /// Event loop implementation (auto, asyncio, rloop, uvloop)
    #[arg(long = "loop", default_value = "auto")]
    pub event_loop: LoopChoice,

    /// HTTP version (auto, 1, 2)
    #[arg(long, default_value = "auto")]
    pub http: HttpChoice,

    /// Treat the application as a microservice (no user-facing HTTP)
    #[arg(long, env = "NESTIPY_MICROSERVICE", value_parser = BoolishValueParser::new())]
    pub microservice: bool,

    /// Backend server program
    #[arg(long, env = "NESTIPY_SERVER", default_value = "granian")]
    pub server: String,

    /// Reload on any file change, not only Python sources
    #[arg(long)]
    pub reload_any: bool,

    /// Extra paths to watch (repeatable)
    #[arg(long = "reload-paths", value_name = "PATH")]
    pub reload_paths: Vec<String>,

    /// Extra directories to ignore (repeatable)
    #[arg(long = "reload-ignore-dirs", value_name = "DIR")]
    pub reload_ignore_dirs: Vec<String>,

    /// Extra ignore patterns (repeatable)
    #[arg(long = "reload-ignore-patterns", value_name = "PATTERN")]
    pub reload_ignore_patterns: Vec<String>,

    /// Extra ignored paths (repeatable)
    #[arg(long = "reload-ignore-paths", value_name = "PATH")]
    pub reload_ignore_paths: Vec<String>,

    /// Reload watcher tick in milliseconds
    #[arg(long, value_name = "MS")]
    pub reload_tick: Option<u64>,

    /// Keep reloading even when a worker fails to start
    #[arg(long)]
    pub reload_ignore_worker_failure: bool,

    /// Also run the web dev server
    #[arg(long)]
    pub web: bool,

    /// Extra arguments for the web dev server
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    pub web_args: Option<String>,

    /// Install web dependencies before starting the web dev server
    #[arg(long)]
    pub web_install: bool,

    /// Proxy target the web dev server forwards API calls to
    #[arg(long, value_name = "URL")]
    pub web_proxy: Option<String>,

    /// Web dev server log level (quiet, normal, verbose)
    #[arg(long, env = "NESTIPY_WEB_LOG", default_value = "normal")]
    pub web_log: Verbosity,

    /// Show dependency install progress
    #[arg(long, env = "NESTIPY_WEB_INSTALL_LOGS", value_parser = BoolishValueParser::new())]
    pub web_install_logs: bool,

    /// Enable server-side rendering in the web dev server
    #[arg(long)]
    pub ssr: bool,

    /// SSR runtime
    #[arg(long, value_name = "RUNTIME")]
    pub ssr_runtime: Option<String>,

    /// SSR entry module
    #[arg(long, value_name = "PATH")]
    pub ssr_entry: Option<String>,

    /// Generate the router spec for the web dev server
    #[arg(long)]
    pub router_spec: bool,
}

impl Cli {
    /// Run the selected command. Returns the process exit code.
    pub fn run(self) -> Result<i32, StartError> {
        let color = output::should_color(self.no_color);
        output::init_colors(color);

        match self.command {
            Commands::Start(args) => commands::start::run(args, color),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_args(argv: &[&str]) -> StartArgs {
        let mut full = vec!["nestipy", "start"];
        full.extend_from_slice(argv);
        let cli = Cli::try_parse_from(full).unwrap();
        let Commands::Start(args) = cli.command;
        args
    }

    #[test]
    fn start_defaults() {
        let args = start_args(&[]);
        assert_eq!(args.app, "main:app");
        assert!(!args.dev);
        assert_eq!(args.port, 8000);
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.workers, 1);
        assert_eq!(args.event_loop, LoopChoice::Auto);
        assert_eq!(args.http, HttpChoice::Auto);
        assert!(!args.web);
        assert!(args.reload_paths.is_empty());
    }

    #[test]
    fn start_parses_short_flags_and_app() {
        let args = start_args(&["src/main:app", "-D", "-P", "9000", "-H", "127.0.0.1"]);
        assert_eq!(args.app, "src/main:app");
        assert!(args.dev);
        assert_eq!(args.port, 9000);
        assert_eq!(args.host, "127.0.0.1");
    }

    #[test]
    fn start_parses_reload_flags_repeatedly() {
        let args = start_args(&[
            "--reload-paths",
            "src",
            "--reload-paths",
            "lib",
            "--reload-ignore-dirs",
            "dist",
            "--reload-tick",
            "250",
            "--reload-ignore-worker-failure",
        ]);
        assert_eq!(args.reload_paths, vec!["src", "lib"]);
        assert_eq!(args.reload_ignore_dirs, vec!["dist"]);
        assert_eq!(args.reload_tick, Some(250));
        assert!(args.reload_ignore_worker_failure);
    }

    #[test]
    fn start_accepts_hyphenated_web_args() {
        let args = start_args(&["--web", "--web-args", "--port 5174 --open"]);
        assert!(args.web);
        assert_eq!(args.web_args.as_deref(), Some("--port 5174 --open"));
    }

    #[test]
    fn start_parses_typed_selectors() {
        let args = start_args(&["--loop", "uvloop", "--http", "2", "--web-log", "verbose"]);
        assert_eq!(args.event_loop, LoopChoice::Uvloop);
        assert_eq!(args.http, HttpChoice::Http2);
        assert_eq!(args.web_log, Verbosity::Verbose);
    }

    #[test]
    fn start_rejects_unknown_loop() {
        let res = Cli::try_parse_from(["nestipy", "start", "--loop", "tokio"]);
        match res {
            Ok(_) => panic!("expected parse failure"),
            Err(err) => assert!(
                err.to_string().contains("unknown event loop"),
                "unexpected error: {err}"
            ),
        }
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from(["nestipy", "start", "--no-color", "-v"]).unwrap();
        assert!(cli.no_color);
        assert!(cli.verbose);
    }
}
