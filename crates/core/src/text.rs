//! Small text helpers shared by the classifier and the article extractor.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::domain::email::MessageBody;

/// Rendering width for HTML bodies. Wide enough that an article line is never
/// wrapped onto the next one.
const HTML_RENDER_WIDTH: usize = 400;

/// Lower-cases `input` and strips diacritics, so `Quantité` and `quantite`
/// compare equal.
pub fn fold(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.to_lowercase().nfd() {
        match ch {
            // Ligatures have no canonical decomposition.
            'œ' => out.push_str("oe"),
            'æ' => out.push_str("ae"),
            'ß' => out.push_str("ss"),
            ch if is_combining_mark(ch) => {}
            ch => out.push(ch),
        }
    }
    out
}

/// Folds `input` and collapses every run of non-alphanumeric characters into a
/// single space, padded on both ends. Whole-word lookups become `contains`.
pub fn word_stream(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    out.push(' ');
    for ch in fold(input).chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with(' ') {
            out.push(' ');
        }
    }
    if !out.ends_with(' ') {
        out.push(' ');
    }
    out
}

/// Plain-text rendition of a message body.
pub fn body_text(body: &MessageBody) -> String {
    if body.is_html() {
        html_to_text(&body.content)
    } else {
        body.content.clone()
    }
}

/// Renders an HTML body to lines of text with entities decoded and `<style>`
/// content dropped. Markup the renderer cannot handle yields an empty string.
pub fn html_to_text(html: &str) -> String {
    let rendered =
        std::panic::catch_unwind(|| html2text::from_read(html.as_bytes(), HTML_RENDER_WIDTH))
            .unwrap_or_default();

    rendered
        .lines()
        .map(|line| line.replace('\u{a0}', " ").trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
