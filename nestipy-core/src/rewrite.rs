//! Canonical prefixing for backend server output.
//!
//! Three shapes are recognized: lines that already carry [`CANONICAL_TAG`],
//! bracketed level prefixes (`[INFO] message`), and access-log lines
//! (`[timestamp] client - "request" status duration`). Anything else passes
//! through untouched.

use std::sync::LazyLock;

use regex::Regex;

use crate::ansi::has_ansi;

pub const CANONICAL_TAG: &str = "[NESTIPY]";

const RESET: &str = "\x1b[0m";
const BASELINE_COLOR: &str = "37";

static LEVEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<level>[A-Z]+)\]\s*(?P<rest>.*)$").expect("valid level prefix regex")
});

static ACCESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\[(?P<ts>[^\]]+)\]\s+(?P<client>\S+)\s+-\s+"(?P<request>[^"]*)"\s+(?P<status>\d{3})\s+(?P<duration>\d+(?:\.\d+)?)\s*$"#,
    )
    .expect("valid access line regex")
});

static STATUS_AFTER_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""[^"]*"\s+(?P<status>\d{3})\b"#).expect("valid status regex")
});

static NUMBER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)*").expect("valid number regex"));

fn level_color(level: &str) -> Option<&'static str> {
    match level {
        "DEBUG" => Some("36"),
        "INFO" => Some("32"),
        "WARNING" | "WARN" => Some("33"),
        "ERROR" => Some("31"),
        "CRITICAL" => Some("1;31"),
        _ => None,
    }
}

fn status_color(status: u16) -> &'static str {
    match status {
        200..=299 => "32",
        300..=399 => "36",
        400..=499 => "33",
        500..=599 => "31",
        _ => "37",
    }
}

fn paint(color: &str, text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    format!("\x1b[{color}m{text}{RESET}")
}

/// Rewrite one backend line into `[NESTIPY] LEVEL rest` form.
///
/// Idempotent: feeding the output back in returns it unchanged. Color is
/// never applied to a line that already contains escape sequences.
pub fn rewrite_line(line: &str, use_color: bool) -> String {
    let Some(canonical) = canonicalize(line) else {
        return line.to_string();
    };
    if use_color && !has_ansi(&canonical) {
        colorize(&canonical)
    } else {
        canonical
    }
}

fn canonicalize(line: &str) -> Option<String> {
    if line.starts_with(CANONICAL_TAG) {
        return Some(line.to_string());
    }

    if let Some(caps) = LEVEL_PREFIX.captures(line) {
        let level = &caps["level"];
        let rest = &caps["rest"];
        if rest.is_empty() {
            return Some(format!("{CANONICAL_TAG} {level}"));
        }
        return Some(format!("{CANONICAL_TAG} {level} {rest}"));
    }

    if let Some(caps) = ACCESS_LINE.captures(line) {
        return Some(format!(
            "{CANONICAL_TAG} INFO [{}] {} - \"{}\" {} - {} ms",
            &caps["ts"], &caps["client"], &caps["request"], &caps["status"], &caps["duration"],
        ));
    }

    None
}

fn colorize(line: &str) -> String {
    let Some(body) = line.strip_prefix(CANONICAL_TAG) else {
        return line.to_string();
    };
    let body = body.trim_start();
    let (first, tail) = match body.split_once(' ') {
        Some((first, tail)) => (first, Some(tail)),
        None => (body, None),
    };

    let (level, rest) = match level_color(first) {
        Some(color) => (Some(paint(color, first)), tail),
        None => (None, Some(body)),
    };
    let colored_rest = rest.and_then(colorize_status);
    if level.is_none() && colored_rest.is_none() {
        return line.to_string();
    }

    let mut out = CANONICAL_TAG.to_string();
    if let Some(level) = level {
        out.push(' ');
        out.push_str(&level);
    }
    if let Some(rest) = rest {
        out.push(' ');
        match colored_rest {
            Some(colored) => out.push_str(&colored),
            None => out.push_str(rest),
        }
    }
    out
}

fn colorize_status(text: &str) -> Option<String> {
    let (start, end) = status_span(text)?;
    let status: u16 = text[start..end].parse().ok()?;
    Some(format!(
        "{}{}{}",
        paint(BASELINE_COLOR, &text[..start]),
        paint(status_color(status), &text[start..end]),
        paint(BASELINE_COLOR, &text[end..]),
    ))
}

/// Byte span of the HTTP status in `text`: the token right after a quoted
/// request line when present, else the last standalone 3-digit number in
/// 100..=599.
fn status_span(text: &str) -> Option<(usize, usize)> {
    if let Some(status) = STATUS_AFTER_REQUEST
        .captures(text)
        .and_then(|caps| caps.name("status"))
    {
        return Some((status.start(), status.end()));
    }

    NUMBER_TOKEN
        .find_iter(text)
        .filter(|m| m.as_str().len() == 3 && !m.as_str().contains('.'))
        .filter(|m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            !before.is_some_and(|c| c.is_alphanumeric() || c == '.')
                && !after.is_some_and(|c| c.is_alphanumeric())
        })
        .filter(|m| {
            m.as_str()
                .parse::<u16>()
                .is_ok_and(|v| (100..=599).contains(&v))
        })
        .last()
        .map(|m| (m.start(), m.end()))
}
