//! Admission filter: decides whether a discovered URL is worth crawling.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

const ALLOWED_HOSTS: [&str; 4] = ["ics.uci.edu", "cs.uci.edu", "informatics.uci.edu", "stat.uci.edu"];

const BLOCKED_QUERY_SUBSTRINGS: [&str; 6] =
    ["replytocom=", "session=", "sid=", "phpsessid=", "jsessionid=", "utm_"];

static BLACKLISTED_EXTENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i).*\.(css|js|bmp|gif|jpe?g|ico",
        r"|png|tiff?|mid|mp2|mp3|mp4",
        r"|wav|avi|mov|mpeg|ram|m4v|mkv|ogg|ogv|pdf",
        r"|ps|eps|tex|ppt|pptx|doc|docx|xls|xlsx|names",
        r"|data|dat|exe|bz2|tar|msi|bin|7z|psd|dmg|iso",
        r"|epub|dll|cnf|tgz|sha1",
        r"|thmx|mso|arff|rtf|jar|csv",
        r"|rm|smil|wmv|swf|wma|zip|rar|gz)$",
    ))
    .expect("valid extension regex")
});

fn host_allowed(host: &str) -> bool {
    ALLOWED_HOSTS
        .iter()
        .any(|allowed| host == *allowed || host.ends_with(&format!(".{allowed}")))
}

fn path_segment_ok(path: &str) -> bool {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() > 25 {
        return false;
    }
    let mut counts: HashMap<String, usize> = HashMap::new();
    for seg in &segments {
        let lower = seg.to_lowercase();
        let count = counts.entry(lower).or_insert(0);
        *count += 1;
        if *count > 5 {
            return false;
        }
    }
    true
}

fn query_ok(query: &str, path_lower: &str) -> bool {
    if query.len() > 200 {
        return false;
    }
    let lower = query.to_lowercase();
    if BLOCKED_QUERY_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return false;
    }

    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.len() > 8 {
        return false;
    }
    let mut key_counts: HashMap<String, usize> = HashMap::new();
    for (k, v) in &pairs {
        let key_lower = k.to_lowercase();
        let count = key_counts.entry(key_lower).or_insert(0);
        *count += 1;
        if *count > 2 || v.len() > 100 {
            return false;
        }
    }
    if (path_lower.contains("calendar") || path_lower.contains("event")) && pairs.len() >= 4 {
        return false;
    }
    true
}

/// Returns true iff `url` is crawl-worthy: in-scope scheme/host, within the
/// size/shape limits that rule out obvious crawler traps, and not pointing
/// at a blacklisted (non-HTML) file extension.
pub fn is_valid(url: &str) -> bool {
    match try_is_valid(url) {
        Some(valid) => valid,
        None => false,
    }
}

fn try_is_valid(raw: &str) -> Option<bool> {
    let parsed = Url::parse(raw).ok()?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Some(false);
    }
    let host = parsed.host_str()?.to_lowercase();
    if host.is_empty() || !host_allowed(&host) {
        return Some(false);
    }

    if raw.len() > 300 {
        return Some(false);
    }
    let path = parsed.path();
    if path.len() > 200 {
        return Some(false);
    }
    if !path_segment_ok(path) {
        return Some(false);
    }

    if let Some(query) = parsed.query() {
        if !query_ok(query, &path.to_lowercase()) {
            return Some(false);
        }
    }

    Some(!BLACKLISTED_EXTENSIONS.is_match(&path.to_lowercase()))
}
