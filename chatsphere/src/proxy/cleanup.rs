//! Cosmetic cleanup applied to upstream replies before they reach clients.

use std::sync::LazyLock;

use regex::Regex;

/// A `* ` bullet at the start of a line, keeping its indentation.
static STAR_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)\* ").expect("valid bullet regex"));

/// A ` - ` separator between two run-together list items.
static DASH_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+-[ \t]+").expect("valid dash regex"));

/// Remove every `**` marker. Applying it twice changes nothing further.
pub fn strip_bold(text: &str) -> String {
    text.replace("**", "")
}

/// Turn `* item` bullets into `- item`.
pub fn normalize_bullets(text: &str) -> String {
    STAR_BULLET.replace_all(text, "${1}- ").into_owned()
}

/// Break `- a - b - c` into one `- ` item per line.
///
/// Only lines that already start with a dash bullet are touched, so hyphens
/// and dashes inside ordinary prose survive.
pub fn split_dash_items(text: &str) -> String {
    text.lines()
        .map(|line| {
            let body = line.trim_start();
            match body.strip_prefix("- ") {
                Some(rest) => {
                    let indent = &line[..line.len() - body.len()];
                    let items = DASH_SEPARATOR.replace_all(rest, format!("\n{indent}- "));
                    format!("{indent}- {items}")
                }
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full cleanup pipeline used by the proxy.
pub fn clean_reply(text: &str) -> String {
    let text = strip_bold(text);
    let text = normalize_bullets(&text);
    split_dash_items(&text).trim().to_string()
}
