//! Message rendering.
//!
//! `render_inline` turns raw message text into HTML using a small fixed
//! grammar:
//!
//! - `&`, `<`, `>`, `"` and `'` are escaped.
//! - A numbered item (`1. `, `12. `) that follows whitespace mid-line starts a
//!   new line.
//! - A heading-like bold span (`**Label:**` or `**Label**:`) mid-line starts a
//!   new line.
//! - `**text**` becomes `<strong>`, `*text*` becomes `<em>` when `text` is not
//!   bordered by whitespace. Unmatched markers are kept literally.
//! - Newlines become `<br>`.

use std::fmt::Write as _;
use std::io::Write as _;

use chrono::Utc;

use crate::models::{ChatMessage, CreatorInfo, MessageRole};

/// Longest numbered-list prefix recognised, in digits.
const MAX_LIST_DIGITS: usize = 2;

const TYPING_TEXT: &str = "AI is typing...";

/// Render raw message text to HTML.
pub fn render_inline(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = insert_line_breaks(&text);

    let mut html = String::with_capacity(text.len() + 16);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            html.push_str("<br>");
        }
        render_spans(line, &mut html);
    }
    html
}

/// Put numbered items and bold headings that appear mid-line on their own line.
fn insert_line_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }

        let mut segment_start = 0;
        for (pos, _) in line.char_indices() {
            if pos == segment_start || line[segment_start..pos].trim().is_empty() {
                continue;
            }
            if starts_numbered_item(line, pos) || starts_bold_heading(line, pos) {
                out.push_str(line[segment_start..pos].trim_end());
                out.push('\n');
                segment_start = pos;
            }
        }
        out.push_str(&line[segment_start..]);
    }

    out
}

fn follows_whitespace(line: &str, pos: usize) -> bool {
    line[..pos].chars().next_back().is_some_and(char::is_whitespace)
}

fn starts_numbered_item(line: &str, pos: usize) -> bool {
    if !follows_whitespace(line, pos) {
        return false;
    }
    let rest = &line[pos..];
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    (1..=MAX_LIST_DIGITS).contains(&digits) && rest[digits..].starts_with(". ")
}

fn starts_bold_heading(line: &str, pos: usize) -> bool {
    if !follows_whitespace(line, pos) {
        return false;
    }
    let Some(after) = line[pos..].strip_prefix("**") else {
        return false;
    };
    let Some(end) = after.find("**") else {
        return false;
    };
    let label = &after[..end];
    !label.trim().is_empty() && (label.ends_with(':') || after[end + 2..].starts_with(':'))
}

/// Render emphasis within a single line.
fn render_spans(line: &str, out: &mut String) {
    let mut rest = line;

    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix("**") {
            if let Some(end) = after.find("**").filter(|&end| end > 0) {
                out.push_str("<strong>");
                render_spans(&after[..end], out);
                out.push_str("</strong>");
                rest = &after[end + 2..];
            } else {
                out.push_str("**");
                rest = after;
            }
            continue;
        }

        if let Some(after) = rest.strip_prefix('*') {
            if let Some(inner) = italic_span(after) {
                out.push_str("<em>");
                push_escaped(out, inner);
                out.push_str("</em>");
                rest = &after[inner.len() + 1..];
            } else {
                out.push('*');
                rest = after;
            }
            continue;
        }

        push_escaped_char(out, c);
        rest = &rest[c.len_utf8()..];
    }
}

/// The text of a `*text*` span starting just after the opening marker.
fn italic_span(after: &str) -> Option<&str> {
    let first = after.chars().next()?;
    if first.is_whitespace() || first == '*' {
        return None;
    }
    let end = after.find('*')?;
    let inner = &after[..end];
    if inner.ends_with(char::is_whitespace) {
        return None;
    }
    Some(inner)
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        push_escaped_char(out, c);
    }
}

fn push_escaped_char(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        _ => out.push(c),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped(&mut out, text);
    out
}

/// Where chat output goes.
pub trait Renderer {
    /// Drop everything shown so far.
    fn clear(&mut self);
    fn show_message(&mut self, message: &ChatMessage);
    /// Show the transient "typing" placeholder.
    fn show_typing(&mut self);
    fn hide_typing(&mut self);
    fn show_creator_card(&mut self, creator: &CreatorInfo);
}

/// Plain-text output on stdout.
#[derive(Debug, Default)]
pub struct TerminalRenderer;

impl Renderer for TerminalRenderer {
    fn clear(&mut self) {
        println!("{}", "-".repeat(60));
    }

    fn show_message(&mut self, message: &ChatMessage) {
        let label = match message.role {
            MessageRole::User => "You",
            MessageRole::Assistant => "AI",
            MessageRole::System => "System",
        };
        println!("{label}: {}", message.content);
        println!();
    }

    fn show_typing(&mut self) {
        print!("{TYPING_TEXT}");
        let _ = std::io::stdout().flush();
    }

    fn hide_typing(&mut self) {
        print!("\r{}\r", " ".repeat(TYPING_TEXT.len()));
        let _ = std::io::stdout().flush();
    }

    fn show_creator_card(&mut self, creator: &CreatorInfo) {
        println!("  {} - {}", creator.name, creator.role);
        println!("  {}", creator.bio);
        println!();
    }
}

/// Collects a chat as an HTML page.
#[derive(Debug)]
pub struct HtmlTranscript {
    title: String,
    body: String,
}

impl HtmlTranscript {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: String::new(),
        }
    }

    /// Wrap the collected messages in a standalone HTML document.
    pub fn finish(self) -> String {
        let title = escape(&self.title);
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n\
             <body>\n<h1>{title}</h1>\n<p class=\"exported\">Exported {}</p>\n<div id=\"chat\">\n{}</div>\n</body>\n</html>\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            self.body
        )
    }
}

impl Renderer for HtmlTranscript {
    fn clear(&mut self) {
        self.body.clear();
    }

    fn show_message(&mut self, message: &ChatMessage) {
        let class = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "bot",
            MessageRole::System => "system",
        };
        let _ = writeln!(
            self.body,
            "<div class=\"message {class}\">{}</div>",
            render_inline(&message.content)
        );
    }

    fn show_typing(&mut self) {}

    fn hide_typing(&mut self) {}

    fn show_creator_card(&mut self, creator: &CreatorInfo) {
        let _ = writeln!(
            self.body,
            "<div class=\"creator-card\"><img src=\"{}\" alt=\"{}\"><h3>{}</h3><p>{}</p><p>{}</p></div>",
            escape(&creator.image),
            escape(&creator.name),
            escape(&creator.name),
            escape(&creator.role),
            escape(&creator.bio)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_and_italic() {
        assert_eq!(render_inline("**Hi** there"), "<strong>Hi</strong> there");
        assert_eq!(
            render_inline("this is *really* good"),
            "this is <em>really</em> good"
        );
    }

    #[test]
    fn test_unmatched_and_spaced_markers_stay_literal() {
        assert_eq!(render_inline("**open only"), "**open only");
        assert_eq!(render_inline("2 * 3 * 4"), "2 * 3 * 4");
        assert_eq!(render_inline("* bullet"), "* bullet");
    }

    #[test]
    fn test_escapes_html() {
        assert_eq!(
            render_inline("a < b & \"c\""),
            "a &lt; b &amp; &quot;c&quot;"
        );
        assert_eq!(
            render_inline("**<b>**"),
            "<strong>&lt;b&gt;</strong>"
        );
    }

    #[test]
    fn test_newlines_become_breaks() {
        assert_eq!(render_inline("one\ntwo\r\nthree"), "one<br>two<br>three");
    }

    #[test]
    fn test_numbered_items_split() {
        assert_eq!(
            render_inline("Steps: 1. Mix 2. Bake"),
            "Steps:<br>1. Mix<br>2. Bake"
        );
        assert_eq!(render_inline("1. First"), "1. First");
        assert_eq!(render_inline("In 2019. Then"), "In 2019. Then");
    }

    #[test]
    fn test_bold_headings_split() {
        assert_eq!(
            render_inline("Some intro. **Tips:** drink water"),
            "Some intro.<br><strong>Tips:</strong> drink water"
        );
        assert_eq!(
            render_inline("Intro **Tips**: rest"),
            "Intro<br><strong>Tips</strong>: rest"
        );
        assert_eq!(
            render_inline("a **bold** word"),
            "a <strong>bold</strong> word"
        );
    }

    #[test]
    fn test_transcript_collects_messages() {
        let mut transcript = HtmlTranscript::new("Test <chat>");
        transcript.show_typing();
        transcript.show_message(&ChatMessage::user("hi"));
        transcript.show_message(&ChatMessage::assistant("**Hello**"));
        transcript.hide_typing();

        let page = transcript.finish();
        assert!(page.contains("<title>Test &lt;chat&gt;</title>"));
        assert!(page.contains(
            "<div class=\"message user\">hi</div>\n\
             <div class=\"message bot\"><strong>Hello</strong></div>\n"
        ));
    }
}
