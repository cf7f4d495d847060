use std::env;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nestipy_core::{
    Level, LoggingConfigError, ReloadPathResolver, ReloadPathSet, ReloadRequest, ReloadSettings,
    SessionState, StartConfig, build_logging_config, select_port, server_args, write_logging_config,
};
use thiserror::Error;

use crate::app::{AppError, AppLocator, Application, ExternalApplication, run_lifecycle};
use crate::backend;
use crate::cli::StartArgs;
use crate::config::{ConfigError, NestipyToml, WebScaffold, resolve_web_scaffold};
use crate::exit_hooks;
use crate::frontend::{
    BackendTarget, CommandSpec, ENV_WEB_PROXY, FrontendOptions, ProcessHandle, ProcessSupervisor,
    SupervisorError, dev_command_argv, plan_frontend, resolve_use_pty,
};
use crate::intercept::StreamInterceptor;
use crate::output::{self, Banner, ConsoleSink};

#[derive(Debug, Error)]
pub enum StartError {
    #[error("Failed to resolve the current directory: {0}")]
    CurrentDir(io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    LoggingConfig(#[from] LoggingConfigError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("Failed to launch backend server '{program}': {source}")]
    BackendSpawn { program: String, source: io::Error },

    #[error("Interrupted before the backend server started")]
    Interrupted,
}

/// Commands for the frontend: optional install, then the dev server.
#[derive(Debug, Clone)]
pub struct FrontendLaunch {
    pub install: Option<CommandSpec>,
    pub dev: CommandSpec,
}

/// Run one `start` session. Returns the backend's exit code.
pub fn run(args: StartArgs, color: bool) -> Result<i32, StartError> {
    let cwd = env::current_dir().map_err(StartError::CurrentDir)?;
    let locator = AppLocator::parse(&args.app)?;
    let project_root = locator.project_root(&cwd);
    let project = NestipyToml::load_from_dir(&project_root)?;
    let is_microservice = args.microservice || project.app.microservice.unwrap_or(false);
    let scaffold = resolve_web_scaffold(&project_root, &project);

    let reload = reload_settings(&args, &project, scaffold.as_ref(), &project_root, &cwd);
    // Removed when the session ends.
    let log_file = write_logging_config(&build_logging_config(args.dev, &cwd)?)?;

    let config = StartConfig {
        app_path: locator.target(),
        dev: args.dev,
        host: args.host.clone(),
        port: select_port(args.port, is_microservice),
        workers: args.workers,
        ssl_keyfile: args.ssl_keyfile.clone(),
        ssl_cert_file: args.ssl_cert_file.clone(),
        event_loop: args.event_loop,
        http: args.http,
        is_microservice,
        log_config_path: log_file.path().to_path_buf(),
        reload,
    };
    tracing::info!(
        app = %config.app_path,
        root = %project_root.display(),
        port = config.port,
        "start configuration resolved"
    );
    let app = ExternalApplication::new(
        locator,
        is_microservice,
        project.app.bootstrap.clone(),
        project_root.clone(),
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(Arc::clone(&interrupted));

    let frontend = if args.web {
        start_frontend(&args, &config, scaffold.as_ref(), color)?
    } else {
        None
    };
    ensure_not_interrupted(&interrupted)?;

    Banner::new(
        config.dev,
        app.is_microservice(),
        config.scheme(),
        &config.host,
        args.port,
    )
    .print();

    if app.is_microservice() && !config.dev {
        run_lifecycle(&app)?;
    }

    ensure_not_interrupted(&interrupted)?;
    let code = launch_backend(&args.server, &config, &project_root, color)?;
    if let Some(handle) = frontend {
        tracing::debug!(exited = handle.has_exited(), "stopping web dev server");
        handle.shutdown();
    }
    drop(log_file);
    Ok(code)
}

fn install_interrupt_handler(interrupted: Arc<AtomicBool>) {
    // The backend shares our process group and sees the interrupt itself;
    // supervised children run in their own groups and are stopped through
    // their hooks.
    if let Err(err) = ctrlc::set_handler(move || {
        interrupted.store(true, Ordering::SeqCst);
        exit_hooks::fire_all();
    }) {
        tracing::debug!("could not install Ctrl-C handler: {err}");
    }
}

/// An interrupt before launch cancels the session instead of starting the
/// backend.
fn ensure_not_interrupted(interrupted: &AtomicBool) -> Result<(), StartError> {
    if interrupted.load(Ordering::SeqCst) {
        return Err(StartError::Interrupted);
    }
    Ok(())
}

fn reload_settings(
    args: &StartArgs,
    project: &NestipyToml,
    scaffold: Option<&WebScaffold>,
    project_root: &Path,
    cwd: &Path,
) -> ReloadSettings {
    let mut request = ReloadRequest {
        dev: args.dev,
        reload_any: args.reload_any,
        paths: project.reload.paths.clone(),
        ignore_dirs: project.reload.ignore_dirs.clone(),
        ignore_patterns: project.reload.ignore_patterns.clone(),
        ignore_paths: project.reload.ignore_paths.clone(),
        scaffold: scaffold.map(|s| s.reload_dirs(project_root)),
    };
    request.paths.extend(args.reload_paths.iter().cloned());
    request.ignore_dirs.extend(args.reload_ignore_dirs.iter().cloned());
    request
        .ignore_patterns
        .extend(args.reload_ignore_patterns.iter().cloned());
    request
        .ignore_paths
        .extend(args.reload_ignore_paths.iter().cloned());

    let paths = if args.dev {
        ReloadPathResolver::new(project_root, cwd).resolve(&request)
    } else {
        ReloadPathSet::default()
    };
    ReloadSettings {
        any: args.reload_any,
        paths,
        tick: args.reload_tick,
        ignore_worker_failure: args.reload_ignore_worker_failure,
    }
}

fn start_frontend(
    args: &StartArgs,
    config: &StartConfig,
    scaffold: Option<&WebScaffold>,
    color: bool,
) -> Result<Option<ProcessHandle>, StartError> {
    let Some(scaffold) = scaffold else {
        output::warning(
            "No web scaffold found (add [web] to nestipy.toml or create web/package.json), skipping the web dev server",
        );
        return Ok(None);
    };

    let env_proxy = env::var(ENV_WEB_PROXY).ok();
    let launch = plan_frontend_launch(args, config, scaffold, env_proxy.as_deref())?;
    let state = Arc::new(SessionState::new(args.web_log, args.web_install_logs));
    let supervisor = ProcessSupervisor::new(state, Arc::new(ConsoleSink))
        .with_pty(resolve_use_pty())
        .with_color(color);
    let handle = launch_frontend(&supervisor, &launch)?;
    if let Some(handle) = &handle {
        tracing::info!(
            pid = ?handle.pid(),
            transport = ?handle.transport(),
            command = %launch.dev.display(),
            "web dev server running"
        );
    }
    Ok(handle)
}

fn plan_frontend_launch(
    args: &StartArgs,
    config: &StartConfig,
    scaffold: &WebScaffold,
    env_proxy: Option<&str>,
) -> Result<FrontendLaunch, SupervisorError> {
    let opts = FrontendOptions {
        args: args.web_args.clone(),
        proxy: args.web_proxy.clone(),
        ssr: args.ssr,
        ssr_runtime: args.ssr_runtime.clone(),
        ssr_entry: args.ssr_entry.clone(),
        router_spec: args.router_spec,
        verbosity: args.web_log,
        install_logs: args.web_install_logs,
        watch: vec![scaffold.app_dir.clone()],
    };
    let backend = BackendTarget {
        scheme: config.scheme(),
        host: config.host.clone(),
        port: config.port,
    };
    let plan = plan_frontend(&opts, &backend, env_proxy).map_err(|source| {
        SupervisorError::Parse {
            command: opts.args.clone().unwrap_or_default(),
            source,
        }
    })?;

    let argv =
        dev_command_argv(&scaffold.command, &plan.args).map_err(|source| SupervisorError::Parse {
            command: scaffold.command.clone(),
            source,
        })?;
    let dev = CommandSpec::from_argv(argv, scaffold.dir.clone())?.with_env(plan.env.clone());
    let install = if args.web_install {
        Some(CommandSpec::parse(&scaffold.install, scaffold.dir.clone())?.with_env(plan.env))
    } else {
        None
    };
    Ok(FrontendLaunch { install, dev })
}

/// Install first when requested, then spawn the dev server.
///
/// A failed install aborts the session and the dev server is never spawned.
/// A dev server that fails to spawn is reported and the session continues
/// without it.
pub fn launch_frontend(
    supervisor: &ProcessSupervisor,
    launch: &FrontendLaunch,
) -> Result<Option<ProcessHandle>, SupervisorError> {
    if let Some(install) = &launch.install {
        supervisor.run_install(install)?;
    }
    match supervisor.spawn_dev_server(&launch.dev) {
        Ok(handle) => Ok(Some(handle)),
        Err(err) => {
            supervisor.report(Level::Error, err.to_string());
            Ok(None)
        }
    }
}

fn launch_backend(
    program: &str,
    config: &StartConfig,
    project_root: &Path,
    color: bool,
) -> Result<i32, StartError> {
    if output::is_verbose() {
        output::step(&format!(
            "{program} {}",
            shell_words::join(server_args(config))
        ));
    }

    let interceptor = match StreamInterceptor::install(color) {
        Ok(interceptor) => Some(interceptor),
        Err(err) => {
            tracing::warn!("backend output will not be rewritten: {err}");
            None
        }
    };
    let result = backend::launch(program, config, project_root);
    // Restore the terminal before anything else is printed.
    drop(interceptor);
    result.map_err(|source| StartError::BackendSpawn {
        program: program.to_string(),
        source,
    })
}
