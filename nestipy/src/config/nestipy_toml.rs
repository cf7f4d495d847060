use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::error::{ConfigError, Result};

pub const NESTIPY_TOML: &str = "nestipy.toml";

/// Root configuration from nestipy.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NestipyToml {
    /// [app] section - application handle
    #[serde(default)]
    pub app: AppSection,

    /// [web] section - frontend scaffold. Presence activates the scaffold.
    #[serde(default)]
    pub web: Option<WebSection>,

    /// [reload] section - extra hot-reload paths, merged with CLI flags
    #[serde(default)]
    pub reload: ReloadSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppSection {
    /// The application is a microservice (no user-facing HTTP)
    pub microservice: Option<bool>,

    /// Command run by the application's start() before the server binds
    pub bootstrap: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebSection {
    /// Frontend project directory (default: web)
    pub dir: Option<String>,

    /// Python page sources compiled by the frontend tool (default: app)
    pub app_dir: Option<String>,

    /// Build output directory (default: <dir>/dist)
    pub out_dir: Option<String>,

    /// Dev server command (default: npm run dev)
    pub command: Option<String>,

    /// Dependency install command (default: npm install)
    pub install: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReloadSection {
    #[serde(default)]
    pub paths: Vec<String>,

    #[serde(default)]
    pub ignore_dirs: Vec<String>,

    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    #[serde(default)]
    pub ignore_paths: Vec<String>,
}

impl NestipyToml {
    /// Load nestipy.toml from a directory. A missing file is an empty config.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(NESTIPY_TOML);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let Some(web) = &self.web else {
            return Ok(());
        };
        for (key, value) in [
            ("web.dir", &web.dir),
            ("web.app_dir", &web.app_dir),
            ("web.out_dir", &web.out_dir),
            ("web.command", &web.command),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = NestipyToml::load_from_dir(dir.path()).unwrap();
        assert_eq!(config, NestipyToml::default());
        assert!(config.web.is_none());
    }

    #[test]
    fn parses_all_sections() {
        let config = NestipyToml::parse(
            r#"
[app]
microservice = true
bootstrap = "python -m migrate"

[web]
dir = "frontend"
command = "pnpm dev"

[reload]
paths = ["src"]
ignore_dirs = ["generated"]
"#,
        )
        .unwrap();
        assert_eq!(config.app.microservice, Some(true));
        assert_eq!(config.app.bootstrap.as_deref(), Some("python -m migrate"));
        let web = config.web.unwrap();
        assert_eq!(web.dir.as_deref(), Some("frontend"));
        assert_eq!(web.command.as_deref(), Some("pnpm dev"));
        assert!(web.install.is_none());
        assert_eq!(config.reload.paths, vec!["src"]);
        assert_eq!(config.reload.ignore_dirs, vec!["generated"]);
        assert!(config.reload.ignore_patterns.is_empty());
    }

    #[test]
    fn empty_web_section_activates_scaffold() {
        let config = NestipyToml::parse("[web]\n").unwrap();
        assert_eq!(config.web, Some(WebSection::default()));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(NESTIPY_TOML), "[app\nmicroservice = ").unwrap();
        let err = NestipyToml::load_from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)), "{err}");
    }

    #[test]
    fn empty_web_command_is_rejected() {
        let err = NestipyToml::parse("[web]\ncommand = \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("web.command"), "{err}");
    }
}
