//! Hot-reload path resolution.
//!
//! User overrides are layered on top of convention-based defaults. Directories
//! the frontend build rewrites on every compile are always ignored, whether or
//! not the user supplied overrides of their own.

use std::path::{Path, PathBuf};

use path_clean::PathClean;

/// Extensions that count as backend sources for the default ignore patterns.
pub const BACKEND_SOURCE_EXTENSIONS: &[&str] = &["py", "pyi"];

/// Directory names holding rendered pages/components. Ignored whenever they
/// exist under the project root or the invocation root.
pub const CONVENTIONAL_RENDER_DIRS: &[&str] = &["views", "templates", "pages", "components"];

/// Default ignore patterns (regexes understood by the backend reloader).
pub fn default_ignore_patterns() -> Vec<String> {
    vec![
        format!(
            r".*\.(?!(?:{})$)[^./\\]+$",
            BACKEND_SOURCE_EXTENSIONS.join("|")
        ),
        r".*[/\\]node_modules([/\\].*)?$".to_string(),
        r".*[/\\]__pycache__([/\\].*)?$".to_string(),
        r".*~$".to_string(),
    ]
}

/// Directories declared by an active frontend scaffold, relative to the
/// project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldDirs {
    pub app_dir: PathBuf,
    pub out_dir: PathBuf,
}

/// Raw reload inputs: CLI flags merged with project-file values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadRequest {
    pub dev: bool,
    pub reload_any: bool,
    pub paths: Vec<String>,
    pub ignore_dirs: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub ignore_paths: Vec<String>,
    pub scaffold: Option<ScaffoldDirs>,
}

/// Final watch/ignore sets. Every path is absolute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadPathSet {
    pub watch_paths: Vec<PathBuf>,
    pub ignore_dirs: Vec<PathBuf>,
    pub ignore_paths: Vec<PathBuf>,
    pub ignore_patterns: Vec<String>,
}

pub struct ReloadPathResolver<'a> {
    project_root: &'a Path,
    invocation_root: &'a Path,
}

impl<'a> ReloadPathResolver<'a> {
    pub fn new(project_root: &'a Path, invocation_root: &'a Path) -> Self {
        Self {
            project_root,
            invocation_root,
        }
    }

    pub fn resolve(&self, request: &ReloadRequest) -> ReloadPathSet {
        let mut set = ReloadPathSet::default();
        let defaults_apply = request.dev && !request.reload_any;

        for path in &request.paths {
            push_unique(&mut set.watch_paths, self.absolute(path));
        }
        for dir in &request.ignore_dirs {
            push_unique(&mut set.ignore_dirs, self.absolute(dir));
        }
        for path in &request.ignore_paths {
            push_unique(&mut set.ignore_paths, self.absolute(path));
        }

        if defaults_apply && request.ignore_patterns.is_empty() {
            set.ignore_patterns = default_ignore_patterns();
        }
        for pattern in &request.ignore_patterns {
            push_unique(&mut set.ignore_patterns, pattern.clone());
        }

        for root in [self.project_root, self.invocation_root] {
            for name in CONVENTIONAL_RENDER_DIRS {
                let candidate = root.join(name);
                if candidate.is_dir() {
                    push_unique(&mut set.ignore_dirs, candidate.clean());
                }
            }
        }

        if let Some(scaffold) = &request.scaffold {
            for dir in [&scaffold.app_dir, &scaffold.out_dir] {
                let candidate = self.absolute(dir);
                if candidate.is_dir() {
                    push_unique(&mut set.ignore_dirs, candidate);
                }
            }
        }

        if defaults_apply && set.watch_paths.is_empty() {
            set.watch_paths.push(self.project_root.to_path_buf().clean());
        }

        tracing::debug!(
            watch = set.watch_paths.len(),
            ignore_dirs = set.ignore_dirs.len(),
            ignore_paths = set.ignore_paths.len(),
            ignore_patterns = set.ignore_patterns.len(),
            "resolved reload paths"
        );
        set
    }

    fn absolute(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.clean()
        } else {
            self.project_root.join(path).clean()
        }
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn dev_request() -> ReloadRequest {
        ReloadRequest {
            dev: true,
            ..ReloadRequest::default()
        }
    }

    #[test]
    fn dev_defaults_watch_project_root_and_ignore_non_sources() {
        let root = TempDir::new().unwrap();
        let set = ReloadPathResolver::new(root.path(), root.path()).resolve(&dev_request());

        assert_eq!(set.watch_paths, vec![root.path().to_path_buf()]);
        assert!(!set.ignore_patterns.is_empty());
        assert!(set.ignore_patterns[0].contains("py|pyi"));
    }

    #[test]
    fn reload_any_skips_defaults() {
        let root = TempDir::new().unwrap();
        let request = ReloadRequest {
            reload_any: true,
            ..dev_request()
        };
        let set = ReloadPathResolver::new(root.path(), root.path()).resolve(&request);

        assert!(set.watch_paths.is_empty());
        assert!(set.ignore_patterns.is_empty());
    }

    #[test]
    fn production_skips_defaults() {
        let root = TempDir::new().unwrap();
        let set =
            ReloadPathResolver::new(root.path(), root.path()).resolve(&ReloadRequest::default());
        assert_eq!(set, ReloadPathSet::default());
    }

    #[test]
    fn explicit_patterns_replace_default_patterns() {
        let root = TempDir::new().unwrap();
        let request = ReloadRequest {
            ignore_patterns: vec![r".*\.log$".to_string()],
            ..dev_request()
        };
        let set = ReloadPathResolver::new(root.path(), root.path()).resolve(&request);
        assert_eq!(set.ignore_patterns, vec![r".*\.log$".to_string()]);
    }

    #[test]
    fn relative_overrides_resolve_against_project_root() {
        let root = TempDir::new().unwrap();
        let request = ReloadRequest {
            paths: vec!["src".to_string(), "./src/../lib".to_string()],
            ignore_paths: vec!["settings/local.py".to_string()],
            ..dev_request()
        };
        let set = ReloadPathResolver::new(root.path(), root.path()).resolve(&request);

        assert_eq!(
            set.watch_paths,
            vec![root.path().join("src"), root.path().join("lib")]
        );
        assert_eq!(
            set.ignore_paths,
            vec![root.path().join("settings").join("local.py")]
        );
    }

    #[test]
    fn conventional_dirs_are_ignored_even_with_overrides() {
        let project = TempDir::new().unwrap();
        let invocation = TempDir::new().unwrap();
        fs::create_dir(project.path().join("views")).unwrap();
        fs::create_dir(invocation.path().join("templates")).unwrap();

        let request = ReloadRequest {
            ignore_dirs: vec!["build".to_string()],
            ..dev_request()
        };
        let set = ReloadPathResolver::new(project.path(), invocation.path()).resolve(&request);

        assert!(set.ignore_dirs.contains(&project.path().join("build")));
        assert!(set.ignore_dirs.contains(&project.path().join("views")));
        assert!(set.ignore_dirs.contains(&invocation.path().join("templates")));
        assert!(!set.ignore_dirs.contains(&project.path().join("pages")));
    }

    #[test]
    fn scaffold_dirs_are_ignored_once_they_exist() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("app")).unwrap();

        let request = ReloadRequest {
            scaffold: Some(ScaffoldDirs {
                app_dir: PathBuf::from("app"),
                out_dir: PathBuf::from("web/dist"),
            }),
            ..dev_request()
        };
        let set = ReloadPathResolver::new(root.path(), root.path()).resolve(&request);
        assert_eq!(set.ignore_dirs, vec![root.path().join("app")]);

        fs::create_dir_all(root.path().join("web/dist")).unwrap();
        let set = ReloadPathResolver::new(root.path(), root.path()).resolve(&request);
        assert_eq!(
            set.ignore_dirs,
            vec![root.path().join("app"), root.path().join("web").join("dist")]
        );
    }

    #[test]
    fn ignore_dirs_are_deduplicated() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("views")).unwrap();

        let request = ReloadRequest {
            ignore_dirs: vec!["views".to_string(), "./views".to_string()],
            scaffold: Some(ScaffoldDirs {
                app_dir: PathBuf::from("views"),
                out_dir: PathBuf::from("views/"),
            }),
            ..dev_request()
        };
        // Project and invocation root are the same directory.
        let set = ReloadPathResolver::new(root.path(), root.path()).resolve(&request);
        assert_eq!(set.ignore_dirs, vec![root.path().join("views")]);
    }
}
