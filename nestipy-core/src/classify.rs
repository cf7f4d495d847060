//! Classification of frontend dev-server output.
//!
//! Third-party tool output is unstructured, so every line is run through an
//! ordered rule table. The first rule that claims a line decides its fate;
//! [`RULES`] order is part of the contract and is tested as such.
//!
//! Classification is total: every input yields either [`Classification::Dropped`]
//! or at least one [`Emission`].

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use regex::Regex;

use crate::ansi::strip_ansi;
use crate::rewrite::CANONICAL_TAG;

/// How much frontend chatter reaches the terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn as_str(self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "silent" => Ok(Verbosity::Quiet),
            "normal" | "default" => Ok(Verbosity::Normal),
            "verbose" | "debug" => Ok(Verbosity::Verbose),
            other => Err(format!(
                "unknown verbosity '{other}' (expected quiet, normal or verbose)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    pub fn label(self) -> &'static str {
        match self {
            Level::Info | Level::Success => "INFO",
            Level::Warning => "WARN",
            Level::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Dropped,
    Info,
    Success,
    Warning,
    Error,
}

impl From<Level> for Category {
    fn from(level: Level) -> Self {
        match level {
            Level::Info => Category::Info,
            Level::Success => Category::Success,
            Level::Warning => Category::Warning,
            Level::Error => Category::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionKind {
    /// Rendered from the ANSI-stripped line.
    Line,
    /// The one-shot "dev server ready" notice.
    Announcement,
    /// A line that already carries the canonical tag, forwarded verbatim.
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub level: Level,
    pub kind: EmissionKind,
    pub message: String,
}

impl Emission {
    pub fn line(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            kind: EmissionKind::Line,
            message: message.into(),
        }
    }

    fn announcement(url: &str) -> Self {
        Self {
            level: Level::Success,
            kind: EmissionKind::Announcement,
            message: format!("Web dev server ready at {url}"),
        }
    }

    fn passthrough(level: Level, raw: &str) -> Self {
        Self {
            level,
            kind: EmissionKind::Passthrough,
            message: raw.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Dropped,
    Emit(Vec<Emission>),
}

impl Classification {
    fn one(level: Level, message: impl Into<String>) -> Self {
        Classification::Emit(vec![Emission::line(level, message)])
    }

    /// Category of the line: the level of its first emission.
    pub fn category(&self) -> Category {
        match self {
            Classification::Dropped => Category::Dropped,
            Classification::Emit(emissions) => emissions
                .first()
                .map(|e| Category::from(e.level))
                .unwrap_or(Category::Dropped),
        }
    }

    pub fn emissions(&self) -> &[Emission] {
        match self {
            Classification::Dropped => &[],
            Classification::Emit(emissions) => emissions,
        }
    }
}

/// Per-session classifier state, shared by every reader thread.
#[derive(Debug, Default)]
pub struct SessionState {
    verbosity: Verbosity,
    install_logs: bool,
    ready_announced: AtomicBool,
}

impl SessionState {
    pub fn new(verbosity: Verbosity, install_logs: bool) -> Self {
        Self {
            verbosity,
            install_logs,
            ready_announced: AtomicBool::new(false),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn install_logs(&self) -> bool {
        self.install_logs
    }

    pub fn ready_announced(&self) -> bool {
        self.ready_announced.load(Ordering::Acquire)
    }

    /// Atomically claim the ready announcement. Only the first caller wins.
    fn claim_ready(&self) -> bool {
        !self.ready_announced.swap(true, Ordering::AcqRel)
    }
}

/// Structured kind of a file-change line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Updated,
    Created,
    Deleted,
    HotUpdate,
    PageReload,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Updated => "updated",
            ChangeKind::Created => "created",
            ChangeKind::Deleted => "deleted",
            ChangeKind::HotUpdate => "hot update",
            ChangeKind::PageReload => "page reload",
        };
        f.pad(s)
    }
}

/// Decomposition of a file-change / hot-update / build-progress line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevActivity {
    FileChange { kind: ChangeKind, payload: String },
    BuildComplete { duration: String },
    BuildFile { file: String },
    Other,
}

struct Line<'a> {
    raw: &'a str,
    text: String,
}

impl<'a> Line<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            text: strip_ansi(raw).trim().to_string(),
        }
    }

    fn is_tagged(&self) -> bool {
        self.text.starts_with(CANONICAL_TAG)
    }
}

type RuleFn = fn(&Line<'_>, &SessionState) -> Option<Classification>;

pub struct Rule {
    pub name: &'static str,
    apply: RuleFn,
}

/// Evaluation order. The first rule returning a classification wins.
pub static RULES: [Rule; 11] = [
    Rule { name: "empty", apply: rule_empty },
    Rule { name: "audit-boilerplate", apply: rule_audit_boilerplate },
    Rule { name: "install-progress", apply: rule_install_progress },
    Rule { name: "startup-banner", apply: rule_startup_banner },
    Rule { name: "ready-url", apply: rule_ready_url },
    Rule { name: "traceback", apply: rule_traceback },
    Rule { name: "canonical-tag", apply: rule_canonical_tag },
    Rule { name: "warning", apply: rule_warning },
    Rule { name: "error", apply: rule_error },
    Rule { name: "dev-activity", apply: rule_dev_activity },
    Rule { name: "fallback", apply: rule_fallback },
];

pub fn rule_names() -> Vec<&'static str> {
    RULES.iter().map(|rule| rule.name).collect()
}

/// Classify one raw line of frontend output.
pub fn classify(line: &str, state: &SessionState) -> Classification {
    let line = Line::new(line);
    RULES
        .iter()
        .find_map(|rule| (rule.apply)(&line, state))
        .unwrap_or(Classification::Dropped)
}

const AUDIT_MARKERS: &[&str] = &[
    "audited",
    "vulnerabilit",
    "looking for funding",
    "npm fund",
    "npm audit",
    "to address all issues",
    "to address issues that do not require attention",
];

static INSTALL_PROGRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:added|removed|changed|updated) \d+ packages?\b|^up to date\b|\bpackages? in \d+(?:\.\d+)?m?s\b|^progress: resolved \d+|^packages: [+-]\d+|^lockfile is up to date|^already up[- ]to[- ]date|^done in \d|^resolving dependencies|^(?:npm|pnpm|yarn) (?:warn|notice) (?:deprecated|using)|^dependencies:$|^\+ \S+ \d",
    )
    .expect("valid install progress regex")
});

static BANNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^vite v\d|\bready in \d+(?:\.\d+)? ?m?s\b|\bnetwork:\s|press h(?: \+ enter)? to show help|use --host to expose|^> \S+@\S+ \S+|^> (?:vite|next|nestipy-web)\b",
    )
    .expect("valid banner regex")
});

static LOOPBACK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\bhttps?://(?:localhost|127\.0\.0\.1|\[::1\]|0\.0\.0\.0)(?::\d+)?(?:/[^\s'"]*)?"#,
    )
    .expect("valid loopback url regex")
});

static TRACEBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i:^traceback \(most recent call last\))|^File ".+", line \d+|^at \S.*:\d+:\d+\)?$|\b[A-Z]\w*(?:Error|Exception)(?::|$)|^raise \w+|(?i:unhandled (?:promise )?rejection)"#,
    )
    .expect("valid traceback regex")
});

static WARNING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bwarn(?:ing)?\b|⚠").expect("valid warning regex"));

static ACTIVITY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\[vite\]|\bhmr\b|hot[- ]update|page reload|file change|\b(?:updated|created|deleted|changed)\b|\b(?:built|rebuilt) in\b|\bcompiled\b|\btransforming\b|\bbuilding\b|\brebuilding\b|watching for file changes",
    )
    .expect("valid activity regex")
});

static HOT_UPDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:hmr update|hot[- ]update)\s+(?P<payload>\S.*)$")
        .expect("valid hot update regex")
});

static PAGE_RELOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bpage reload\s+(?P<payload>\S.*)$").expect("valid page reload regex")
});

static FILE_CHANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:file\s+)?(?P<kind>updated|created|deleted|changed|added|removed):?\s+(?P<payload>\S.*)$",
    )
    .expect("valid file change regex")
});

static BUILD_COMPLETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:built|rebuilt|compiled(?: successfully)?)\s+in\s+(?P<duration>\d+(?:\.\d+)?\s*m?s)\b",
    )
    .expect("valid build complete regex")
});

static BUILD_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:transforming|building|compiling|processing|rendering)\b\s*(?:\(\d+\)\s*)?(?P<file>[\w./\\@-]*[./\\][\w./\\@-]+)",
    )
    .expect("valid build file regex")
});

fn rule_empty(line: &Line<'_>, _state: &SessionState) -> Option<Classification> {
    line.text.is_empty().then_some(Classification::Dropped)
}

fn rule_audit_boilerplate(line: &Line<'_>, _state: &SessionState) -> Option<Classification> {
    let lower = line.text.to_lowercase();
    AUDIT_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
        .then_some(Classification::Dropped)
}

fn rule_install_progress(line: &Line<'_>, state: &SessionState) -> Option<Classification> {
    if !INSTALL_PROGRESS.is_match(&line.text) {
        return None;
    }
    if state.install_logs() {
        Some(Classification::one(Level::Info, line.text.as_str()))
    } else {
        Some(Classification::Dropped)
    }
}

fn verbose_only(text: &str, state: &SessionState) -> Classification {
    if state.verbosity() == Verbosity::Verbose {
        Classification::one(Level::Info, text)
    } else {
        Classification::Dropped
    }
}

fn rule_startup_banner(line: &Line<'_>, state: &SessionState) -> Option<Classification> {
    if line.is_tagged() || !BANNER.is_match(&line.text) {
        return None;
    }
    Some(verbose_only(&line.text, state))
}

fn loopback_url(text: &str) -> Option<&str> {
    LOOPBACK_URL
        .find(text)
        .map(|m| m.as_str().trim_end_matches([',', '.', ')', ';']))
}

fn ready_emissions(url: &str, echo: Emission, state: &SessionState) -> Classification {
    let mut emissions = Vec::with_capacity(2);
    if state.claim_ready() {
        emissions.push(Emission::announcement(url));
    }
    emissions.push(echo);
    Classification::Emit(emissions)
}

fn rule_ready_url(line: &Line<'_>, state: &SessionState) -> Option<Classification> {
    if line.is_tagged() {
        return None;
    }
    let url = loopback_url(&line.text)?;
    Some(ready_emissions(
        url,
        Emission::line(Level::Info, line.text.as_str()),
        state,
    ))
}

fn rule_traceback(line: &Line<'_>, _state: &SessionState) -> Option<Classification> {
    TRACEBACK
        .is_match(&line.text)
        .then(|| Classification::one(Level::Error, line.text.as_str()))
}

fn tag_level(word: &str) -> Option<Level> {
    match word.to_ascii_uppercase().as_str() {
        "ERROR" | "CRITICAL" | "FATAL" => Some(Level::Error),
        "WARN" | "WARNING" => Some(Level::Warning),
        "INFO" | "DEBUG" => Some(Level::Info),
        "SUCCESS" => Some(Level::Success),
        _ => None,
    }
}

fn rule_canonical_tag(line: &Line<'_>, state: &SessionState) -> Option<Classification> {
    let payload = line.text.strip_prefix(CANONICAL_TAG)?.trim_start();
    let (level, rest) = match payload.split_once(char::is_whitespace) {
        Some((word, rest)) => match tag_level(word) {
            Some(level) => (level, rest.trim_start()),
            None => (Level::Info, payload),
        },
        None => (tag_level(payload).unwrap_or(Level::Info), ""),
    };

    if BANNER.is_match(rest) {
        return Some(if state.verbosity() == Verbosity::Verbose {
            Classification::Emit(vec![Emission::passthrough(level, line.raw)])
        } else {
            Classification::Dropped
        });
    }
    if let Some(url) = loopback_url(rest) {
        return Some(ready_emissions(
            url,
            Emission::passthrough(level, line.raw),
            state,
        ));
    }
    Some(Classification::Emit(vec![Emission::passthrough(
        level, line.raw,
    )]))
}

fn rule_warning(line: &Line<'_>, _state: &SessionState) -> Option<Classification> {
    WARNING
        .is_match(&line.text)
        .then(|| Classification::one(Level::Warning, line.text.as_str()))
}

fn rule_error(line: &Line<'_>, _state: &SessionState) -> Option<Classification> {
    line.text
        .to_lowercase()
        .contains("error")
        .then(|| Classification::one(Level::Error, line.text.as_str()))
}

fn change_kind(word: &str) -> ChangeKind {
    match word.to_ascii_lowercase().as_str() {
        "created" | "added" => ChangeKind::Created,
        "deleted" | "removed" => ChangeKind::Deleted,
        _ => ChangeKind::Updated,
    }
}

/// Break a dev-activity line into its structured parts.
pub fn parse_activity(text: &str) -> DevActivity {
    if let Some(caps) = HOT_UPDATE.captures(text) {
        return DevActivity::FileChange {
            kind: ChangeKind::HotUpdate,
            payload: caps["payload"].trim().to_string(),
        };
    }
    if let Some(caps) = PAGE_RELOAD.captures(text) {
        return DevActivity::FileChange {
            kind: ChangeKind::PageReload,
            payload: caps["payload"].trim().to_string(),
        };
    }
    if let Some(caps) = BUILD_COMPLETE.captures(text) {
        return DevActivity::BuildComplete {
            duration: caps["duration"].split_whitespace().collect(),
        };
    }
    if let Some(caps) = FILE_CHANGE.captures(text) {
        return DevActivity::FileChange {
            kind: change_kind(&caps["kind"]),
            payload: caps["payload"].trim().to_string(),
        };
    }
    if let Some(caps) = BUILD_FILE.captures(text) {
        return DevActivity::BuildFile {
            file: caps["file"].trim_end_matches("...").to_string(),
        };
    }
    DevActivity::Other
}

fn rule_dev_activity(line: &Line<'_>, state: &SessionState) -> Option<Classification> {
    if !ACTIVITY_MARKER.is_match(&line.text) {
        return None;
    }
    if state.verbosity() == Verbosity::Quiet {
        return Some(Classification::Dropped);
    }
    Some(match parse_activity(&line.text) {
        DevActivity::FileChange { kind, payload } => {
            Classification::one(Level::Info, format!("{kind} {payload}"))
        }
        DevActivity::BuildComplete { duration } => {
            Classification::one(Level::Success, format!("built in {duration}"))
        }
        DevActivity::BuildFile { file } => {
            Classification::one(Level::Info, format!("processing {file}"))
        }
        DevActivity::Other => Classification::one(Level::Info, line.text.as_str()),
    })
}

fn rule_fallback(line: &Line<'_>, state: &SessionState) -> Option<Classification> {
    Some(verbose_only(&line.text, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn state(verbosity: Verbosity) -> SessionState {
        SessionState::new(verbosity, false)
    }

    fn all_states() -> Vec<SessionState> {
        let mut states = Vec::new();
        for verbosity in [Verbosity::Quiet, Verbosity::Normal, Verbosity::Verbose] {
            for install_logs in [false, true] {
                states.push(SessionState::new(verbosity, install_logs));
            }
        }
        states
    }

    fn single(classification: &Classification) -> &Emission {
        let emissions = classification.emissions();
        assert_eq!(emissions.len(), 1, "{classification:?}");
        &emissions[0]
    }

    #[test]
    fn rule_order_is_fixed() {
        assert_eq!(
            rule_names(),
            vec![
                "empty",
                "audit-boilerplate",
                "install-progress",
                "startup-banner",
                "ready-url",
                "traceback",
                "canonical-tag",
                "warning",
                "error",
                "dev-activity",
                "fallback",
            ]
        );
    }

    #[test]
    fn empty_and_escape_only_lines_are_dropped() {
        let s = state(Verbosity::Verbose);
        assert_eq!(classify("", &s), Classification::Dropped);
        assert_eq!(classify("   ", &s), Classification::Dropped);
        assert_eq!(classify("\x1b[2K\x1b[1G", &s), Classification::Dropped);
    }

    #[test]
    fn audit_boilerplate_is_always_dropped() {
        for s in all_states() {
            for line in [
                "up to date, audited 213 packages in 2s",
                "found 0 vulnerabilities",
                "\x1b[1mfound 0 vulnerabilities\x1b[22m",
                "42 packages are looking for funding",
                "  run `npm fund` for details",
                "3 moderate severity vulnerabilities",
            ] {
                assert_eq!(classify(line, &s).category(), Category::Dropped, "{line}");
            }
        }
    }

    #[test]
    fn install_progress_follows_toggle() {
        let line = "added 120 packages in 4s";
        assert_eq!(
            classify(line, &SessionState::new(Verbosity::Verbose, false)),
            Classification::Dropped
        );
        let shown = classify(line, &SessionState::new(Verbosity::Quiet, true));
        assert_eq!(shown.category(), Category::Info);
        assert_eq!(single(&shown).message, line);

        let deprecated = "npm WARN deprecated inflight@1.0.6: not supported";
        assert_eq!(
            classify(deprecated, &state(Verbosity::Normal)),
            Classification::Dropped
        );
    }

    #[test]
    fn banner_needs_verbose() {
        let banner = "  VITE v5.4.2  ready in 312 ms";
        assert_eq!(classify(banner, &state(Verbosity::Normal)), Classification::Dropped);
        let shown = classify(banner, &state(Verbosity::Verbose));
        assert_eq!(single(&shown).message, "VITE v5.4.2  ready in 312 ms");

        assert_eq!(
            classify("  ➜  Network: use --host to expose", &state(Verbosity::Normal)),
            Classification::Dropped
        );
        assert_eq!(
            classify("> web@0.0.0 dev", &state(Verbosity::Quiet)),
            Classification::Dropped
        );
    }

    #[test]
    fn ready_url_is_announced_once() {
        let s = state(Verbosity::Quiet);
        let first = classify("  ➜  Local:   http://localhost:5173/", &s);
        assert_eq!(first.category(), Category::Success);
        let emissions = first.emissions();
        assert_eq!(emissions.len(), 2);
        assert_eq!(emissions[0].kind, EmissionKind::Announcement);
        assert_eq!(emissions[0].message, "Web dev server ready at http://localhost:5173/");
        assert_eq!(emissions[1].level, Level::Info);
        assert_eq!(emissions[1].message, "➜  Local:   http://localhost:5173/");
        assert!(s.ready_announced());

        let second = classify("Local: http://127.0.0.1:5173/", &s);
        assert_eq!(second.category(), Category::Info);
        assert_eq!(single(&second).kind, EmissionKind::Line);
    }

    #[test]
    fn ready_latch_is_race_free() {
        let s = Arc::new(state(Verbosity::Normal));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let s = Arc::clone(&s);
                std::thread::spawn(move || {
                    let line = format!("Local: http://localhost:{}/", 5170 + i);
                    classify(&line, &s)
                        .emissions()
                        .iter()
                        .filter(|e| e.kind == EmissionKind::Announcement)
                        .count()
                })
            })
            .collect();
        let announced: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(announced, 1);
    }

    #[test]
    fn tracebacks_are_errors() {
        let s = state(Verbosity::Quiet);
        for line in [
            "Traceback (most recent call last):",
            "  File \"/srv/app/main.py\", line 12, in <module>",
            "    at Object.<anonymous> (/srv/web/vite.config.ts:3:9)",
            "TypeError: Cannot read properties of undefined",
            "Unhandled promise rejection: boom",
        ] {
            assert_eq!(classify(line, &s).category(), Category::Error, "{line}");
        }
    }

    #[test]
    fn tagged_lines_pass_through_verbatim() {
        let s = state(Verbosity::Normal);
        let raw = "[NESTIPY] \x1b[33mWARN\x1b[0m actions schema regenerated";
        let out = classify(raw, &s);
        let emission = single(&out);
        assert_eq!(emission.kind, EmissionKind::Passthrough);
        assert_eq!(emission.level, Level::Warning);
        assert_eq!(emission.message, raw);

        assert_eq!(classify("[NESTIPY]", &s).category(), Category::Info);
    }

    #[test]
    fn tagged_banner_and_url_are_refiltered() {
        let normal = state(Verbosity::Normal);
        assert_eq!(
            classify("[NESTIPY] INFO VITE v5.4.2  ready in 200 ms", &normal),
            Classification::Dropped
        );
        let verbose = state(Verbosity::Verbose);
        assert_eq!(
            classify("[NESTIPY] INFO VITE v5.4.2  ready in 200 ms", &verbose).category(),
            Category::Info
        );

        let out = classify("[NESTIPY] INFO Web UI on http://localhost:5173", &normal);
        let emissions = out.emissions();
        assert_eq!(emissions.len(), 2);
        assert_eq!(emissions[0].kind, EmissionKind::Announcement);
        assert_eq!(emissions[1].kind, EmissionKind::Passthrough);
    }

    #[test]
    fn warnings_and_errors() {
        let s = state(Verbosity::Quiet);
        let warn = classify("\x1b[33mwarning\x1b[39m: unused import", &s);
        assert_eq!(warn.category(), Category::Warning);
        assert_eq!(single(&warn).message, "warning: unused import");

        let err = classify("[vite] Internal server error: failed to resolve", &s);
        assert_eq!(err.category(), Category::Error);
    }

    #[test]
    fn dev_activity_is_decomposed() {
        assert_eq!(
            parse_activity("12:01:02 PM [vite] hmr update /src/App.tsx, /src/index.css"),
            DevActivity::FileChange {
                kind: ChangeKind::HotUpdate,
                payload: "/src/App.tsx, /src/index.css".to_string()
            }
        );
        assert_eq!(
            parse_activity("[vite] page reload src/main.ts"),
            DevActivity::FileChange {
                kind: ChangeKind::PageReload,
                payload: "src/main.ts".to_string()
            }
        );
        assert_eq!(
            parse_activity("file created: app/_generated/api_types.ts"),
            DevActivity::FileChange {
                kind: ChangeKind::Created,
                payload: "app/_generated/api_types.ts".to_string()
            }
        );
        assert_eq!(
            parse_activity("✓ built in 1.23s"),
            DevActivity::BuildComplete {
                duration: "1.23s".to_string()
            }
        );
        assert_eq!(
            parse_activity("transforming (42) src/components/Button.tsx"),
            DevActivity::BuildFile {
                file: "src/components/Button.tsx".to_string()
            }
        );
        assert_eq!(parse_activity("watching for file changes..."), DevActivity::Other);
    }

    #[test]
    fn dev_activity_respects_verbosity() {
        let line = "[vite] hmr update /src/App.tsx";
        assert_eq!(classify(line, &state(Verbosity::Quiet)), Classification::Dropped);

        let out = classify(line, &state(Verbosity::Normal));
        assert_eq!(single(&out).message, "hot update /src/App.tsx");

        let built = classify("built in 812ms", &state(Verbosity::Normal));
        assert_eq!(built.category(), Category::Success);
        assert_eq!(single(&built).message, "built in 812ms");

        let other = classify("watching for file changes...", &state(Verbosity::Verbose));
        assert_eq!(single(&other).message, "watching for file changes...");
    }

    #[test]
    fn unmatched_lines_need_verbose() {
        let line = "some unrelated chatter";
        assert_eq!(classify(line, &state(Verbosity::Normal)), Classification::Dropped);
        assert_eq!(
            classify(line, &state(Verbosity::Verbose)).category(),
            Category::Info
        );
    }

    #[test]
    fn odd_input_never_panics() {
        let s = state(Verbosity::Verbose);
        for line in [
            "\x1b[",
            "\u{0}\u{7f}",
            "[NESTIPY]   ",
            "http://",
            "error",
            "\u{fffd}\u{fffd}",
            "[NESTIPY] ERROR",
        ] {
            let _ = classify(line, &s).category();
        }
    }

    #[test]
    fn verbosity_parses() {
        assert_eq!("VERBOSE".parse::<Verbosity>().unwrap(), Verbosity::Verbose);
        assert_eq!("quiet".parse::<Verbosity>().unwrap(), Verbosity::Quiet);
        assert!("loud".parse::<Verbosity>().is_err());
        assert_eq!(Verbosity::default().to_string(), "normal");
    }
}
