//! HTML link and text extraction, built on `lol_html`'s streaming rewriter.
//! Tracks `<base href>` for relative-link resolution and strips
//! `<script>`/`<style>`/`<noscript>` content before extracting visible text.

use std::cell::Cell;
use std::collections::HashSet;

use lol_html::{doc_text, element, HtmlRewriter, Settings};
use url::Url;

const MAX_BODY_BYTES: usize = 5_000_000;

pub struct Extracted {
    pub links: Vec<String>,
    pub text: String,
}

/// Extracts absolute, defragmented outlinks and whitespace-joined visible
/// text from an HTML document.
///
/// `content_type` is the declared `Content-Type` header value, if any.
/// `effective_url` is the (already defragmented) URL the document was
/// fetched from, used to resolve relative links absent a `<base>` tag.
pub fn extract(bytes: &[u8], content_type: Option<&str>, effective_url: &str) -> Extracted {
    if let Some(ct) = content_type {
        if !ct.to_lowercase().contains("text/html") {
            return empty();
        }
    }
    if bytes.len() > MAX_BODY_BYTES {
        return empty();
    }

    let base = resolve_base(bytes, effective_url);

    let skip_depth = Cell::new(0i32);
    let mut links: Vec<String> = Vec::new();
    let mut seen_links: HashSet<String> = HashSet::new();
    let mut text_parts: Vec<String> = Vec::new();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("script, style, noscript", |el| {
                    skip_depth.set(skip_depth.get() + 1);
                    el.on_end_tag(|_end| {
                        skip_depth.set(skip_depth.get() - 1);
                        Ok(())
                    })?;
                    Ok(())
                }),
                element!("a[href]", |el| {
                    if let Some(href) = el.get_attribute("href") {
                        record_link(&base, &href, &mut seen_links, &mut links);
                    }
                    Ok(())
                }),
            ],
            document_content_handlers: vec![doc_text!(|t| {
                if skip_depth.get() == 0 {
                    let s = t.as_str();
                    if !s.trim().is_empty() {
                        text_parts.push(s.to_string());
                    }
                }
                Ok(())
            })],
            ..Settings::new()
        },
        |_: &[u8]| {},
    );

    if rewriter.write(bytes).is_err() || rewriter.end().is_err() {
        return empty();
    }
    drop(rewriter);

    Extracted {
        links,
        text: text_parts.join("").split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

fn empty() -> Extracted {
    Extracted { links: Vec::new(), text: String::new() }
}

fn record_link(base: &str, href: &str, seen: &mut HashSet<String>, out: &mut Vec<String>) {
    let href = href.trim();
    if href.is_empty() {
        return;
    }
    let lower = href.to_lowercase();
    if lower.starts_with("mailto:") || lower.starts_with("javascript:") || lower.starts_with("tel:") {
        return;
    }
    let Ok(base_url) = Url::parse(base) else { return };
    let Ok(mut joined) = base_url.join(href) else { return };
    joined.set_fragment(None);
    let joined = joined.to_string();
    if seen.insert(joined.clone()) {
        out.push(joined);
    }
}

/// Resolves the effective base URL: the page URL itself, unless the
/// document declares a `<base href>`, in which case that href is joined
/// against the (defragmented) page URL.
fn resolve_base(bytes: &[u8], effective_url: &str) -> String {
    let mut base_href: Option<String> = None;

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("base[href]", |el| {
                if base_href.is_none() {
                    base_href = el.get_attribute("href");
                }
                Ok(())
            })],
            ..Settings::new()
        },
        |_: &[u8]| {},
    );
    let _ = rewriter.write(bytes);
    let _ = rewriter.end();
    drop(rewriter);

    let Some(href) = base_href else { return effective_url.to_string() };
    let Ok(mut page) = Url::parse(effective_url) else { return effective_url.to_string() };
    page.set_fragment(None);
    match page.join(href.trim()) {
        Ok(joined) => joined.to_string(),
        Err(_) => effective_url.to_string(),
    }
}
