//! Text sanitization for inbound requests and model output.
//!
//! Model responses arrive with literal escape sequences, decorative emoji,
//! and `:shortcode:` markers that must not end up in the cache or on the
//! wire back to the client. Inbound text may additionally carry ANSI
//! escape sequences when clients relay terminal content.

use std::sync::LazyLock;

use regex::Regex;

/// CSI escape sequences (`ESC [ ... <final byte>`).
static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid ANSI regex"));

/// Sanitize inbound request text before hashing and caching.
pub fn sanitize_request_text(text: &str) -> String {
    strip_emoji_and_shortcodes(&strip_ansi_codes(text))
}

/// Sanitize model output before caching and returning to the client.
pub fn sanitize_model_output(text: &str) -> String {
    strip_emoji_and_shortcodes(&unescape(text))
}

/// Remove ANSI CSI escape sequences.
pub fn strip_ansi_codes(text: &str) -> String {
    ANSI_RE.replace_all(text, "").into_owned()
}

/// Convert literal backslash escapes (`\n`, `\t`, `\r`, `\\`, `\"`, `\'`)
/// to their characters. Unrecognized escapes keep the backslash.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('n') => {
                out.push('\n');
                chars.next();
            }
            Some('t') => {
                out.push('\t');
                chars.next();
            }
            Some('r') => {
                out.push('\r');
                chars.next();
            }
            Some('\\') => {
                out.push('\\');
                chars.next();
            }
            Some('"') => {
                out.push('"');
                chars.next();
            }
            Some('\'') => {
                out.push('\'');
                chars.next();
            }
            _ => out.push('\\'),
        }
    }
    out
}

/// Whether a codepoint falls in an emoji block.
fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1F5FF   // symbols & pictographs
        | 0x1F600..=0x1F64F // emoticons
        | 0x1F680..=0x1F6FF // transport & map
        | 0x1F700..=0x1F77F // alchemical
        | 0x1F780..=0x1F7FF // geometric extended
        | 0x1F800..=0x1F8FF // supplemental arrows-C
        | 0x1F900..=0x1F9FF // supplemental symbols
        | 0x1FA00..=0x1FA6F // chess symbols
        | 0x1FA70..=0x1FAFF // symbols extended-A
        | 0x2600..=0x26FF   // misc symbols
        | 0x2700..=0x27BF   // dingbats
    )
}

/// Whether a character may appear inside a `:shortcode:` body.
fn is_shortcode_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-' | '&')
}

/// Strip emoji codepoints and `:shortcode:` markers, collapsing runs of
/// non-newline whitespace to a single space. Newlines are preserved.
///
/// A `:` opens a candidate shortcode; the candidate (including the colon)
/// is dropped whether or not a closing `:` is ever seen, matching the
/// behavior clients already depend on.
pub fn strip_emoji_and_shortcodes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_shortcode = false;
    let mut last_was_space = false;

    for c in text.chars() {
        if in_shortcode {
            if c == ':' {
                in_shortcode = false;
                continue;
            }
            if is_shortcode_char(c) {
                continue;
            }
            in_shortcode = false;
        }

        if c == ':' {
            in_shortcode = true;
            continue;
        }

        if is_emoji(c) {
            continue;
        }

        if c == '\n' {
            out.push('\n');
            last_was_space = false;
            continue;
        }

        if c.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
                last_was_space = true;
            }
            continue;
        }

        last_was_space = false;
        out.push(c);
    }

    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Truncate text to at most `max_chars` characters for log display,
/// appending `...` when shortened. Always cuts on a character boundary.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
