//! Mapping from [`StartConfig`] to the backend server command line.
//!
//! This is the only place that knows the concrete server's flag names.

use std::path::Path;

use crate::start_config::StartConfig;

fn push_flag(args: &mut Vec<String>, flag: &str, value: impl ToString) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Arguments for the Granian CLI, ending with the application locator.
pub fn server_args(cfg: &StartConfig) -> Vec<String> {
    let mut args = Vec::new();
    push_flag(&mut args, "--interface", "asgi");
    push_flag(&mut args, "--host", &cfg.host);
    push_flag(&mut args, "--port", cfg.port);
    push_flag(&mut args, "--workers", cfg.workers);
    push_flag(&mut args, "--loop", cfg.event_loop);
    push_flag(&mut args, "--http", cfg.http);
    push_flag(&mut args, "--log-config", path_arg(&cfg.log_config_path));

    if cfg.is_microservice {
        push_flag(&mut args, "--log-level", "critical");
        args.push("--no-access-log".to_string());
    } else {
        args.push("--access-log".to_string());
    }

    if let Some(key) = &cfg.ssl_keyfile {
        push_flag(&mut args, "--ssl-keyfile", key);
    }
    if let Some(cert) = &cfg.ssl_cert_file {
        push_flag(&mut args, "--ssl-certificate", cert);
    }

    if cfg.dev {
        args.push("--reload".to_string());
        let paths = &cfg.reload.paths;
        for path in &paths.watch_paths {
            push_flag(&mut args, "--reload-paths", path_arg(path));
        }
        for dir in &paths.ignore_dirs {
            push_flag(&mut args, "--reload-ignore-dirs", path_arg(dir));
        }
        for pattern in &paths.ignore_patterns {
            push_flag(&mut args, "--reload-ignore-patterns", pattern);
        }
        for path in &paths.ignore_paths {
            push_flag(&mut args, "--reload-ignore-paths", path_arg(path));
        }
        if let Some(tick) = cfg.reload.tick {
            push_flag(&mut args, "--reload-tick", tick);
        }
        if cfg.reload.ignore_worker_failure {
            args.push("--reload-ignore-worker-failure".to_string());
        }
    }

    args.push(cfg.app_path.clone());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::ReloadPathSet;
    use crate::start_config::{HttpChoice, LoopChoice, ReloadSettings};
    use std::path::PathBuf;

    fn config(dev: bool, is_microservice: bool) -> StartConfig {
        StartConfig {
            app_path: "main:app".to_string(),
            dev,
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: 2,
            ssl_keyfile: None,
            ssl_cert_file: None,
            event_loop: LoopChoice::Auto,
            http: HttpChoice::Auto,
            is_microservice,
            log_config_path: PathBuf::from("/tmp/logging.json"),
            reload: ReloadSettings::default(),
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|idx| args.get(idx + 1))
            .map(String::as_str)
    }

    #[test]
    fn dev_options_enable_reload_and_access_log() {
        let mut cfg = config(true, false);
        cfg.reload = ReloadSettings {
            any: false,
            paths: ReloadPathSet {
                watch_paths: vec![PathBuf::from("/srv/app")],
                ignore_patterns: vec![r".*\.log$".to_string()],
                ..ReloadPathSet::default()
            },
            tick: Some(50),
            ignore_worker_failure: true,
        };
        let args = server_args(&cfg);

        assert!(args.contains(&"--reload".to_string()));
        assert!(args.contains(&"--access-log".to_string()));
        assert!(!args.contains(&"--no-access-log".to_string()));
        assert_eq!(value_after(&args, "--host"), Some("0.0.0.0"));
        assert_eq!(value_after(&args, "--port"), Some("8000"));
        assert_eq!(value_after(&args, "--reload-paths"), Some("/srv/app"));
        assert_eq!(value_after(&args, "--reload-ignore-patterns"), Some(r".*\.log$"));
        assert_eq!(value_after(&args, "--reload-tick"), Some("50"));
        assert!(args.contains(&"--reload-ignore-worker-failure".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("main:app"));
    }

    #[test]
    fn microservice_options_silence_access_log() {
        let mut cfg = config(false, true);
        cfg.ssl_keyfile = Some("key.pem".to_string());
        cfg.ssl_cert_file = Some("cert.pem".to_string());
        cfg.event_loop = LoopChoice::Asyncio;
        cfg.http = HttpChoice::Http1;
        let args = server_args(&cfg);

        assert!(args.contains(&"--no-access-log".to_string()));
        assert_eq!(value_after(&args, "--log-level"), Some("critical"));
        assert_eq!(value_after(&args, "--ssl-keyfile"), Some("key.pem"));
        assert_eq!(value_after(&args, "--ssl-certificate"), Some("cert.pem"));
        assert_eq!(value_after(&args, "--loop"), Some("asyncio"));
        assert_eq!(value_after(&args, "--http"), Some("1"));
        assert!(!args.contains(&"--reload".to_string()));
    }

    #[test]
    fn production_never_passes_reload_paths() {
        let mut cfg = config(false, false);
        cfg.reload.paths.watch_paths = vec![PathBuf::from("/srv/app")];
        let args = server_args(&cfg);
        assert!(value_after(&args, "--reload-paths").is_none());
        assert_eq!(value_after(&args, "--log-config"), Some("/tmp/logging.json"));
    }
}
