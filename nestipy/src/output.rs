use std::fmt::Display;
use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use console::{measure_text_width, style};
use nestipy_core::{CANONICAL_TAG, Emission, EmissionKind, Level};

use crate::frontend::LogSink;

static VERBOSE: AtomicBool = AtomicBool::new(false);

const BANNER_WIDTH: usize = 50;
const BANNER_PAD_LEFT: usize = 6;

pub fn brand_accent<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).cyan()
}

pub fn brand_fg<D: Display>(value: D) -> console::StyledObject<D> {
    style(value)
}

pub fn brand_muted<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).dim()
}

pub fn brand_success<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).green()
}

pub fn brand_warning<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).yellow()
}

pub fn brand_error<D: Display>(value: D) -> console::StyledObject<D> {
    style(value).red()
}

pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Whether this session writes ANSI colors. Decided once, before any
/// descriptor is redirected.
pub fn should_color(no_color: bool) -> bool {
    !no_color && std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

pub fn init_colors(enabled: bool) {
    console::set_colors_enabled(enabled);
    console::set_colors_enabled_stderr(enabled);
}

pub fn step(message: &str) {
    println!("{} {}", brand_accent("•").bold(), brand_fg(message));
}

pub fn warning(message: &str) {
    println!("{} {}", brand_warning("!").bold(), brand_fg(message));
}

pub fn error_stderr(message: &str) {
    eprintln!("{} {}", brand_error("✗").bold(), brand_fg(message));
}

/// Title and body lines of the startup banner.
pub struct Banner {
    pub title: String,
    pub lines: Vec<String>,
}

impl Banner {
    pub fn new(dev: bool, microservice: bool, scheme: &str, host: &str, port: u16) -> Self {
        let environment = if dev { "Development" } else { "Production" };
        let mut lines = Vec::new();
        if microservice {
            lines.push("Microservice server running ...".to_string());
        } else {
            lines.push(format!("Serving at: {scheme}://{host}:{port}"));
        }
        lines.push(format!("Running in {} mode", environment.to_lowercase()));
        if dev {
            lines.push("For production, use : nestipy start".to_string());
        }
        Self {
            title: format!("Nestipy CLI - {environment} mode"),
            lines,
        }
    }

    /// Plain box rows, rounded corners.
    pub fn render(&self) -> Vec<String> {
        let title = format!(" {} ", self.title);
        let content_width = self
            .lines
            .iter()
            .map(|line| measure_text_width(line) + BANNER_PAD_LEFT + 1)
            .chain([measure_text_width(&title) + 2])
            .max()
            .unwrap_or(0)
            .max(BANNER_WIDTH - 2);

        let title_width = measure_text_width(&title);
        let left = (content_width - title_width) / 2;
        let right = content_width - title_width - left;

        let mut rows = Vec::with_capacity(self.lines.len() + 2);
        rows.push(format!("╭{}{title}{}╮", "─".repeat(left), "─".repeat(right)));
        for line in &self.lines {
            let fill = content_width - BANNER_PAD_LEFT - measure_text_width(line);
            rows.push(format!(
                "│{}{line}{}│",
                " ".repeat(BANNER_PAD_LEFT),
                " ".repeat(fill)
            ));
        }
        rows.push(format!("╰{}╯", "─".repeat(content_width)));
        rows
    }

    pub fn print(&self) {
        let mut out = std::io::stdout().lock();
        for row in self.render() {
            let _ = writeln!(out, "{}", brand_success(row).bold());
        }
        let _ = out.flush();
    }
}

fn level_label(level: Level) -> String {
    let label = level.label();
    match level {
        Level::Info | Level::Success => brand_success(label).to_string(),
        Level::Warning => brand_warning(label).to_string(),
        Level::Error => brand_error(label).bold().to_string(),
    }
}

/// One frontend emission as a terminal line.
pub fn web_line(emission: &Emission) -> String {
    match emission.kind {
        EmissionKind::Passthrough => emission.message.clone(),
        EmissionKind::Announcement => format!(
            "{CANONICAL_TAG} {} {} {}",
            level_label(emission.level),
            brand_muted("[web]"),
            brand_success(&emission.message).bold()
        ),
        EmissionKind::Line => {
            let message = match emission.level {
                Level::Info => brand_fg(&emission.message).to_string(),
                Level::Success => brand_success(&emission.message).to_string(),
                Level::Warning => brand_warning(&emission.message).to_string(),
                Level::Error => brand_error(&emission.message).to_string(),
            };
            format!(
                "{CANONICAL_TAG} {} {} {message}",
                level_label(emission.level),
                brand_muted("[web]")
            )
        }
    }
}

/// Writes frontend emissions to stdout.
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn emit(&self, emission: &Emission) {
        let line = web_line(emission);
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}
