use std::sync::LazyLock;

use regex::Regex;

// CSI sequences, OSC sequences (BEL or ST terminated), and two-byte escapes.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("valid ansi escape regex")
});

/// Remove terminal escape sequences from `input`.
pub fn strip_ansi(input: &str) -> String {
    if !input.contains('\x1b') {
        return input.to_string();
    }
    ANSI_ESCAPE.replace_all(input, "").into_owned()
}

pub fn has_ansi(input: &str) -> bool {
    input.contains("\x1b[")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_sequences() {
        assert_eq!(strip_ansi("\x1b[32mready\x1b[0m in 120ms"), "ready in 120ms");
    }

    #[test]
    fn strips_cursor_and_osc_sequences() {
        assert_eq!(strip_ansi("\x1b[2K\x1b[1Gbuilding"), "building");
        assert_eq!(strip_ansi("\x1b]0;title\x07vite"), "vite");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(strip_ansi("plain [INFO] text"), "plain [INFO] text");
        assert!(!has_ansi("plain"));
        assert!(has_ansi("\x1b[1mbold"));
    }
}
