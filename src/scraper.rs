//! Pipeline glue: turn a fetched page into accepted outlinks, updating
//! analytics along the way. Extracts links and text, applies low-information
//! page heuristics, then admission-filters the discovered outlinks, with
//! HTML parsing delegated to [`crate::extractor`].

use crate::admission;
use crate::analytics::Analytics;
use crate::cache_client::FetchResponse;
use crate::extractor;
use crate::urlcanon;

const MAX_OUTLINKS: usize = 1000;
const MIN_WORDS: usize = 10;
const THIN_OUTLINK_THRESHOLD: usize = 200;
const THIN_WORD_RATIO: f64 = 0.05;
const DUPLICATE_CHECK_MIN_WORDS: usize = 50;

/// Extracts, classifies, and admission-filters the outlinks discovered on
/// a fetched page. Returns only links worth adding to the frontier.
pub fn scrape(original_url: &str, resp: &FetchResponse, analytics: &Analytics) -> Vec<String> {
    extract_next_links(original_url, resp, analytics).into_iter().filter(|link| admission::is_valid(link)).collect()
}

fn extract_next_links(original_url: &str, resp: &FetchResponse, analytics: &Analytics) -> Vec<String> {
    if resp.status != 200 || resp.content.is_empty() {
        return Vec::new();
    }

    let effective_url = if resp.url.is_empty() { original_url } else { &resp.url };
    let page_url = urlcanon::canonicalize(effective_url).unwrap_or_else(|_| effective_url.to_string());

    let extracted = extractor::extract(&resp.content, resp.content_type(), &page_url);

    let is_new = analytics.record_url(&page_url);
    let words = if extracted.text.is_empty() { Vec::new() } else { analytics.tokenize(&extracted.text) };

    let word_count = words.len();
    let outlink_count = extracted.links.len();

    if outlink_count > MAX_OUTLINKS {
        analytics.mark_lowinfo_skipped();
        return Vec::new();
    }
    if word_count < MIN_WORDS {
        analytics.mark_lowinfo_skipped();
        return Vec::new();
    }
    if outlink_count > THIN_OUTLINK_THRESHOLD && (word_count as f64 / (outlink_count as f64 + 1.0)) < THIN_WORD_RATIO
    {
        analytics.mark_lowinfo_skipped();
        return Vec::new();
    }

    if is_new && word_count >= DUPLICATE_CHECK_MIN_WORDS {
        if analytics.is_duplicate_text(&words) {
            return Vec::new();
        }
        analytics.record_words(&page_url, &words);
    }

    extracted.links
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn html_response(url: &str, body: &str) -> FetchResponse {
        FetchResponse {
            url: url.to_string(),
            status: 200,
            error: None,
            content: body.as_bytes().to_vec(),
            headers: HashMap::from([("Content-Type".to_string(), "text/html".to_string())]),
        }
    }

    #[test]
    fn non_200_status_yields_no_links() {
        let analytics = Analytics::new(tempfile::tempdir().unwrap().path());
        let mut resp = html_response("https://ics.uci.edu/", "<a href=\"/a\">x</a>");
        resp.status = 404;
        assert!(scrape("https://ics.uci.edu/", &resp, &analytics).is_empty());
    }

    #[test]
    fn short_page_is_marked_lowinfo_and_yields_no_links() {
        let analytics = Analytics::new(tempfile::tempdir().unwrap().path());
        let resp = html_response("https://ics.uci.edu/", "<a href=\"/a\">hi</a>");
        assert!(scrape("https://ics.uci.edu/", &resp, &analytics).is_empty());
    }

    #[test]
    fn admission_filters_out_of_scope_links() {
        let analytics = Analytics::new(tempfile::tempdir().unwrap().path());
        let body = format!(
            "<a href=\"https://example.com/x\">ex</a><a href=\"/in-scope\">in</a> {}",
            "word ".repeat(15)
        );
        let resp = html_response("https://ics.uci.edu/", &body);
        let links = scrape("https://ics.uci.edu/", &resp, &analytics);
        assert_eq!(links, vec!["https://ics.uci.edu/in-scope"]);
    }
}
