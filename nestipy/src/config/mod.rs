mod error;
mod nestipy_toml;

pub use error::*;
pub use nestipy_toml::*;

use std::path::{Path, PathBuf};

use nestipy_core::ScaffoldDirs;

const DEFAULT_WEB_DIR: &str = "web";
const DEFAULT_APP_DIR: &str = "app";
const DEFAULT_DEV_COMMAND: &str = "npm run dev";
const DEFAULT_INSTALL_COMMAND: &str = "npm install";

/// Resolved frontend scaffold. Directories are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebScaffold {
    pub dir: PathBuf,
    pub app_dir: PathBuf,
    pub out_dir: PathBuf,
    pub command: String,
    pub install: String,
}

impl WebScaffold {
    /// Scaffold directories relative to the project root, for the reload
    /// resolver.
    pub fn reload_dirs(&self, project_root: &Path) -> ScaffoldDirs {
        let relative = |p: &Path| p.strip_prefix(project_root).unwrap_or(p).to_path_buf();
        ScaffoldDirs {
            app_dir: relative(&self.app_dir),
            out_dir: relative(&self.out_dir),
        }
    }
}

/// The scaffold is active when nestipy.toml has a `[web]` section or
/// `web/package.json` exists under the project root.
pub fn resolve_web_scaffold(project_root: &Path, config: &NestipyToml) -> Option<WebScaffold> {
    let web = match &config.web {
        Some(web) => web.clone(),
        None if project_root
            .join(DEFAULT_WEB_DIR)
            .join("package.json")
            .is_file() =>
        {
            WebSection::default()
        }
        None => return None,
    };

    let dir_name = web.dir.as_deref().unwrap_or(DEFAULT_WEB_DIR);
    let dir = project_root.join(dir_name);
    let out_dir = match web.out_dir.as_deref() {
        Some(out) => project_root.join(out),
        None => dir.join("dist"),
    };
    Some(WebScaffold {
        app_dir: project_root.join(web.app_dir.as_deref().unwrap_or(DEFAULT_APP_DIR)),
        out_dir,
        dir,
        command: web.command.unwrap_or_else(|| DEFAULT_DEV_COMMAND.to_string()),
        install: web
            .install
            .unwrap_or_else(|| DEFAULT_INSTALL_COMMAND.to_string()),
    })
}
