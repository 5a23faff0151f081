//! Outbound markup validation.
//!
//! Everything headed for a device passes through here first: a length cap,
//! an allow-list of elements and their attributes, and an allow-list of
//! command names inside `<mark/>` elements. Plain text between elements is
//! always permitted (it is spoken verbatim).

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Maximum accepted markup length in characters.
pub const MAX_MARKUP_LENGTH: usize = 10_000;

/// Command names accepted in a mark's `name` attribute (the part before
/// the first comma).
const ALLOWED_COMMANDS: &[&str] = &[
    "cmd:behaviour-tree",
    "cmd:playaudio",
    "cmd:external",
    "cmd:stop",
    "cmd:interrupt",
];

/// Any angle-bracket element, with the tag name and attribute blob
/// captured. Quoted attribute values may contain `>`.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<\s*/?\s*([A-Za-z][A-Za-z0-9_-]*)((?:[^>"]|"[^"]*")*)>"#)
        .expect("tag pattern is valid")
});

/// One `attr="value"` pair inside an element.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_-]*)\s*=\s*"([^"]*)""#).expect("attr pattern is valid")
});

/// Markup validation failures.
#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("markup too long: {length} characters (max {max})")]
    TooLong { length: usize, max: usize },

    #[error("malformed element at byte {position}")]
    MalformedElement { position: usize },

    #[error("disallowed element: {tag}")]
    DisallowedElement { tag: String },

    #[error("disallowed attribute '{attribute}' in element '{tag}'")]
    DisallowedAttribute { attribute: String, tag: String },

    #[error("invalid mark command: {name}")]
    InvalidMarkCommand { name: String },
}

/// Attributes accepted on an allow-listed element.
fn allowed_attributes(tag: &str) -> Option<&'static [&'static str]> {
    match tag {
        "mark" => Some(&["name"]),
        "break" => Some(&["time"]),
        "speak" => Some(&[]),
        "emphasis" => Some(&["level"]),
        "prosody" => Some(&["rate", "pitch", "volume"]),
        _ => None,
    }
}

/// Check a mark's `name` attribute: the command part before the first
/// comma must be one of the allowed commands.
fn mark_command_allowed(name: &str) -> bool {
    let command = name.split(',').next().unwrap_or("");
    ALLOWED_COMMANDS.contains(&command)
}

/// Validate markup for safety and well-formedness.
///
/// Empty markup and plain text are valid. Fails on overlong payloads,
/// stray or unterminated angle brackets, elements or attributes outside
/// the allow-list, and mark commands outside the command allow-list.
pub fn validate_markup(markup: &str) -> Result<(), MarkupError> {
    if markup.is_empty() {
        return Ok(());
    }
    if markup.len() > MAX_MARKUP_LENGTH {
        return Err(MarkupError::TooLong {
            length: markup.len(),
            max: MAX_MARKUP_LENGTH,
        });
    }

    let matches: Vec<_> = TAG_RE.find_iter(markup).collect();

    // Every '<' must open a recognized element.
    for (position, _) in markup.match_indices('<') {
        if !matches.iter().any(|m| m.start() == position) {
            return Err(MarkupError::MalformedElement { position });
        }
    }

    for m in &matches {
        let caps = TAG_RE
            .captures(m.as_str())
            .ok_or(MarkupError::MalformedElement { position: m.start() })?;
        let tag = caps[1].to_string();
        let attr_blob = caps.get(2).map(|g| g.as_str()).unwrap_or("");

        let Some(allowed) = allowed_attributes(&tag) else {
            return Err(MarkupError::DisallowedElement { tag });
        };

        let mut mark_name = None;
        for attr in ATTR_RE.captures_iter(attr_blob) {
            let attribute = attr[1].to_string();
            if !allowed.contains(&attribute.as_str()) {
                return Err(MarkupError::DisallowedAttribute { attribute, tag });
            }
            if tag == "mark" && &attr[1] == "name" {
                mark_name = Some(attr[2].to_string());
            }
        }

        if tag == "mark" {
            let name = mark_name.unwrap_or_default();
            if !mark_command_allowed(&name) {
                return Err(MarkupError::InvalidMarkCommand { name });
            }
        }
    }

    Ok(())
}
