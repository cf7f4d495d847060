use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::str::FromStr;

use rand::Rng;

use crate::reload::ReloadPathSet;

/// Bind ports a microservice picks from. The displayed port is unaffected.
pub const MICROSERVICE_PORT_RANGE: Range<u16> = 5000..7000;

/// Event loop implementation requested from the backend server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopChoice {
    #[default]
    Auto,
    Asyncio,
    Rloop,
    Uvloop,
}

impl fmt::Display for LoopChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopChoice::Auto => "auto",
            LoopChoice::Asyncio => "asyncio",
            LoopChoice::Rloop => "rloop",
            LoopChoice::Uvloop => "uvloop",
        };
        f.pad(s)
    }
}

impl FromStr for LoopChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(LoopChoice::Auto),
            "asyncio" => Ok(LoopChoice::Asyncio),
            "rloop" => Ok(LoopChoice::Rloop),
            "uvloop" => Ok(LoopChoice::Uvloop),
            other => Err(format!(
                "unknown event loop '{other}' (expected auto, asyncio, rloop or uvloop)"
            )),
        }
    }
}

/// HTTP protocol version requested from the backend server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpChoice {
    #[default]
    Auto,
    Http1,
    Http2,
}

impl fmt::Display for HttpChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpChoice::Auto => "auto",
            HttpChoice::Http1 => "1",
            HttpChoice::Http2 => "2",
        };
        f.pad(s)
    }
}

impl FromStr for HttpChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "auto" => Ok(HttpChoice::Auto),
            "1" => Ok(HttpChoice::Http1),
            "2" => Ok(HttpChoice::Http2),
            other => Err(format!("unknown http version '{other}' (expected auto, 1 or 2)")),
        }
    }
}

/// Hot-reload settings handed to the backend server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSettings {
    /// Reload on any file change instead of only backend sources.
    pub any: bool,
    pub paths: ReloadPathSet,
    /// Watcher poll tick in milliseconds.
    pub tick: Option<u64>,
    pub ignore_worker_failure: bool,
}

/// Resolved options for one `start` session.
///
/// Built once from CLI input and never mutated afterwards; consumers receive
/// their own clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartConfig {
    /// `module:attribute` locator of the application object.
    pub app_path: String,
    pub dev: bool,
    pub host: String,
    /// Bind port. For microservices this is the randomized port, not the
    /// one shown in the banner.
    pub port: u16,
    pub workers: u16,
    pub ssl_keyfile: Option<String>,
    pub ssl_cert_file: Option<String>,
    pub event_loop: LoopChoice,
    pub http: HttpChoice,
    pub is_microservice: bool,
    pub log_config_path: PathBuf,
    pub reload: ReloadSettings,
}

impl StartConfig {
    pub fn scheme(&self) -> &'static str {
        if self.ssl_cert_file.is_some() {
            "https"
        } else {
            "http"
        }
    }
}

/// Pick the port the backend binds to.
///
/// Microservices never serve user-facing HTTP, so they get a pseudo-random
/// port from [`MICROSERVICE_PORT_RANGE`]. There is no collision retry.
pub fn select_port(port: u16, is_microservice: bool) -> u16 {
    if is_microservice {
        return rand::rng().random_range(MICROSERVICE_PORT_RANGE);
    }
    port
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_port_passes_through_for_http_apps() {
        for port in [0, 80, 8000, 65535] {
            assert_eq!(select_port(port, false), port);
        }
    }

    #[test]
    fn select_port_stays_in_microservice_range() {
        for port in [0, 80, 8000, 65535] {
            for _ in 0..200 {
                let selected = select_port(port, true);
                assert!(
                    MICROSERVICE_PORT_RANGE.contains(&selected),
                    "port {selected} outside range"
                );
            }
        }
    }

    #[test]
    fn loop_choice_parses_case_insensitively() {
        assert_eq!("UVLOOP".parse::<LoopChoice>().unwrap(), LoopChoice::Uvloop);
        assert_eq!("auto".parse::<LoopChoice>().unwrap(), LoopChoice::Auto);
        assert!("tokio".parse::<LoopChoice>().is_err());
    }

    #[test]
    fn http_choice_round_trips_through_display() {
        for choice in [HttpChoice::Auto, HttpChoice::Http1, HttpChoice::Http2] {
            assert_eq!(choice.to_string().parse::<HttpChoice>().unwrap(), choice);
        }
        assert!("3".parse::<HttpChoice>().is_err());
    }
}
