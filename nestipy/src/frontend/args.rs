use std::env;
use std::path::PathBuf;

use nestipy_core::Verbosity;

/// Flags that belong to `nestipy start` and mean nothing to the frontend
/// tool, with the number of values each takes. `--port` and `--host` are
/// the tool's own and pass through.
const BACKEND_ONLY_FLAGS: &[(&str, usize)] = &[
    ("-D", 0),
    ("--dev", 0),
    ("--workers", 1),
    ("--ssl-keyfile", 1),
    ("--ssl-cert-file", 1),
    ("--loop", 1),
    ("--http", 1),
    ("--microservice", 0),
    ("--server", 1),
    ("--reload", 0),
    ("--reload-any", 0),
    ("--reload-paths", 1),
    ("--reload-ignore-dirs", 1),
    ("--reload-ignore-patterns", 1),
    ("--reload-ignore-paths", 1),
    ("--reload-tick", 1),
    ("--reload-ignore-worker-failure", 0),
    ("--web", 0),
    ("--web-args", 1),
    ("--web-install", 0),
];

const ACTIONS_FLAG: &str = "--actions";
const PROXY_FLAG: &str = "--proxy";

pub const ENV_WEB_PROXY: &str = "NESTIPY_WEB_PROXY";
pub const ENV_WEB_WATCH: &str = "NESTIPY_WEB_WATCH";
pub const ENV_WEB_LOG: &str = "NESTIPY_WEB_LOG";
pub const ENV_WEB_INSTALL_LOGS: &str = "NESTIPY_WEB_INSTALL_LOGS";
pub const ENV_WEB_SKIP_BACKEND: &str = "NESTIPY_WEB_SKIP_BACKEND";
pub const ENV_WEB_SSR: &str = "NESTIPY_WEB_SSR";
pub const ENV_WEB_SSR_RUNTIME: &str = "NESTIPY_WEB_SSR_RUNTIME";
pub const ENV_WEB_SSR_ENTRY: &str = "NESTIPY_WEB_SSR_ENTRY";
pub const ENV_ROUTER_SPEC: &str = "NESTIPY_ROUTER_SPEC";

/// Where the backend listens; the default proxy target.
#[derive(Debug, Clone)]
pub struct BackendTarget {
    pub scheme: &'static str,
    pub host: String,
    pub port: u16,
}

impl BackendTarget {
    /// Wildcard binds are not connectable; point at loopback instead.
    pub fn proxy_url(&self) -> String {
        let host = match self.host.as_str() {
            "0.0.0.0" | "" => "127.0.0.1",
            "::" | "[::]" => "[::1]",
            other => other,
        };
        format!("{}://{}:{}", self.scheme, host, self.port)
    }
}

/// Everything the session asks of the frontend tool.
#[derive(Debug, Clone, Default)]
pub struct FrontendOptions {
    /// Raw user argument string, shell-tokenized.
    pub args: Option<String>,
    pub proxy: Option<String>,
    pub ssr: bool,
    pub ssr_runtime: Option<String>,
    pub ssr_entry: Option<String>,
    pub router_spec: bool,
    pub verbosity: Verbosity,
    pub install_logs: bool,
    pub watch: Vec<PathBuf>,
}

/// Final argument list and environment for the dev server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendPlan {
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter()
        .any(|arg| arg == flag || arg.strip_prefix(flag).is_some_and(|rest| rest.starts_with('=')))
}

fn strip_backend_flags(tokens: Vec<String>) -> Vec<String> {
    let mut kept = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        let matched = BACKEND_ONLY_FLAGS.iter().find_map(|(flag, arity)| {
            if token == *flag {
                Some(*arity)
            } else if token
                .strip_prefix(flag)
                .is_some_and(|rest| rest.starts_with('='))
            {
                Some(0)
            } else {
                None
            }
        });
        match matched {
            Some(arity) => {
                tracing::debug!(flag = %token, "dropping backend-only flag from web args");
                for _ in 0..arity {
                    iter.next();
                }
            }
            None => kept.push(token),
        }
    }
    kept
}

/// Build the frontend tool's arguments and environment.
///
/// `env_proxy` is the inherited `NESTIPY_WEB_PROXY` value; when set, no
/// `--proxy` flag is injected and the tool reads the variable itself.
pub fn plan_frontend(
    opts: &FrontendOptions,
    backend: &BackendTarget,
    env_proxy: Option<&str>,
) -> Result<FrontendPlan, shell_words::ParseError> {
    let tokens = match opts.args.as_deref() {
        Some(raw) => shell_words::split(raw)?,
        None => Vec::new(),
    };
    let mut args = strip_backend_flags(tokens);

    if !has_flag(&args, ACTIONS_FLAG) {
        args.push(ACTIONS_FLAG.to_string());
    }

    let mut env = Vec::new();
    let env_proxy = env_proxy.filter(|v| !v.trim().is_empty());
    if !has_flag(&args, PROXY_FLAG) {
        let proxy = match (&opts.proxy, env_proxy) {
            (Some(proxy), _) => Some(proxy.clone()),
            (None, Some(_)) => None,
            (None, None) => Some(backend.proxy_url()),
        };
        if let Some(proxy) = proxy {
            args.push(PROXY_FLAG.to_string());
            args.push(proxy.clone());
            env.push((ENV_WEB_PROXY.to_string(), proxy));
        }
    }

    if opts.ssr {
        if !has_flag(&args, "--ssr") {
            args.push("--ssr".to_string());
        }
        env.push((ENV_WEB_SSR.to_string(), "1".to_string()));
        if let Some(runtime) = &opts.ssr_runtime {
            if !has_flag(&args, "--ssr-runtime") {
                args.push("--ssr-runtime".to_string());
                args.push(runtime.clone());
            }
            env.push((ENV_WEB_SSR_RUNTIME.to_string(), runtime.clone()));
        }
        if let Some(entry) = &opts.ssr_entry {
            if !has_flag(&args, "--ssr-entry") {
                args.push("--ssr-entry".to_string());
                args.push(entry.clone());
            }
            env.push((ENV_WEB_SSR_ENTRY.to_string(), entry.clone()));
        }
    }

    if opts.router_spec {
        env.push((ENV_ROUTER_SPEC.to_string(), "1".to_string()));
    }
    if !opts.watch.is_empty()
        && let Ok(joined) = env::join_paths(&opts.watch)
    {
        env.push((
            ENV_WEB_WATCH.to_string(),
            joined.to_string_lossy().into_owned(),
        ));
    }
    env.push((ENV_WEB_LOG.to_string(), opts.verbosity.to_string()));
    env.push((
        ENV_WEB_INSTALL_LOGS.to_string(),
        if opts.install_logs { "1" } else { "0" }.to_string(),
    ));
    // The backend is already managed by this session.
    env.push((ENV_WEB_SKIP_BACKEND.to_string(), "1".to_string()));

    Ok(FrontendPlan { args, env })
}

/// Append tool arguments to the configured dev command. `npm run` needs a
/// `--` separator before script arguments.
pub fn dev_command_argv(
    command: &str,
    extra: &[String],
) -> Result<Vec<String>, shell_words::ParseError> {
    let mut argv = shell_words::split(command)?;
    if extra.is_empty() {
        return Ok(argv);
    }
    let is_npm_run = argv.first().is_some_and(|p| p == "npm")
        && argv.iter().any(|a| a == "run" || a == "run-script");
    if is_npm_run && !argv.iter().any(|a| a == "--") {
        argv.push("--".to_string());
    }
    argv.extend(extra.iter().cloned());
    Ok(argv)
}
