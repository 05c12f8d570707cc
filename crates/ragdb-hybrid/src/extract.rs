//! Plain-text extraction for uploaded files.
//!
//! Markup formats are reduced to their readable text before chunking so
//! that tags, scripts and formatting never reach the index. Block elements
//! end with a blank line, which the chunker treats as a sentence boundary.
use pulldown_cmark::{Event, Parser, TagEnd};
use scraper::{ElementRef, Html, Node};

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "main", "nav", "aside", "blockquote", "pre", "h1", "h2",
    "h3", "h4", "h5", "h6", "li", "ul", "ol", "dl", "dt", "dd", "table", "tr", "title", "figcaption",
];

/// Text content of a file with the given (lowercase) extension.
/// Formats without markup are decoded as lossy UTF-8 and returned as is.
pub fn extract_text(extension: &str, bytes: &[u8]) -> String {
    let raw = String::from_utf8_lossy(bytes);
    match extension {
        "html" | "htm" => tidy(&html_text(&raw)),
        "md" | "markdown" => tidy(&markdown_text(&raw)),
        _ => raw.into_owned(),
    }
}

fn html_text(source: &str) -> String {
    let document = Html::parse_document(source);
    let mut out = String::new();
    walk_html(document.root_element(), &mut out);
    out
}

fn walk_html(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                if let Some(inner) = ElementRef::wrap(child) {
                    walk_html(inner, out);
                }
                if name == "br" {
                    out.push('\n');
                } else if BLOCK_ELEMENTS.contains(&name) {
                    out.push_str("\n\n");
                } else if name == "td" || name == "th" {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

fn markdown_text(source: &str) -> String {
    let mut out = String::new();
    for event in Parser::new(source) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock | TagEnd::BlockQuote,
            ) => out.push_str("\n\n"),
            Event::End(TagEnd::TableRow | TagEnd::TableHead) => out.push('\n'),
            Event::End(TagEnd::TableCell) => out.push(' '),
            _ => {}
        }
    }
    out
}

/// Collapses whitespace inside lines and runs of blank lines.
fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_pending = false;
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_pending = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_pending { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank_pending = false;
    }
    out
}
