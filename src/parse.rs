//! HTML parsing: title, description, headings and cleaned body text.

use scraper::{Html, Selector};
use std::path::Path;
use thiserror::Error;

use crate::models::ParsedDocument;

/// Elements whose text never counts as document content.
const STRIPPED: &str = "script, style, nav, header, footer, noscript";
const MAX_HEADINGS: usize = 10;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("{0} is not valid UTF-8 text")]
    Encoding(String),
    #[error("{0} contains no markup")]
    Empty(String),
}

/// Read a file and parse it, failing on I/O errors, non-UTF-8 bytes or an
/// empty file.
pub fn read_document(path: &Path, max_body_chars: usize) -> Result<ParsedDocument, ParseError> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|source| ParseError::Read {
        path: display.clone(),
        source,
    })?;
    let markup = String::from_utf8(bytes).map_err(|_| ParseError::Encoding(display.clone()))?;
    if markup.trim().is_empty() {
        return Err(ParseError::Empty(display));
    }
    Ok(parse_html(&markup, max_body_chars))
}

pub fn parse_html(markup: &str, max_body_chars: usize) -> ParsedDocument {
    let mut document = Html::parse_document(markup);

    let title = first_text(&document, "title")
        .or_else(|| first_text(&document, "h1"))
        .or_else(|| first_attr(&document, r#"meta[property="og:title"]"#, "content"))
        .unwrap_or_default();

    let description = first_attr(&document, r#"meta[name="description"]"#, "content")
        .or_else(|| first_attr(&document, r#"meta[property="og:description"]"#, "content"))
        .unwrap_or_default();

    let headings: Vec<String> = selector("h1, h2, h3")
        .map(|sel| {
            document
                .select(&sel)
                .map(|h| collapse_whitespace(&h.text().collect::<String>()))
                .filter(|t| !t.is_empty())
                .take(MAX_HEADINGS)
                .collect()
        })
        .unwrap_or_default();

    remove_elements(&mut document, STRIPPED);

    let raw_text = selector("body")
        .and_then(|sel| document.select(&sel).next().map(|b| b.text().collect::<String>()))
        .unwrap_or_default();
    let text = truncate_chars(&collapse_whitespace(&raw_text), max_body_chars);

    tracing::debug!(
        title = %title,
        headings = headings.len(),
        chars = text.chars().count(),
        "parsed document"
    );

    ParsedDocument {
        title,
        description,
        text,
        headings,
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

fn first_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(collapse_whitespace)
        .find(|v| !v.is_empty())
}

fn remove_elements(document: &mut Html, css: &str) {
    let Some(sel) = selector(css) else {
        return;
    };
    let ids: Vec<_> = document.select(&sel).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
