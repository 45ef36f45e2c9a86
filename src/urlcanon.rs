//! URL canonicalization and hashing.
//!
//! `canonicalize` is the single source of identity used for dedup
//! throughout the crawler: defragmented, lowercased scheme/host, default
//! ports dropped, everything else preserved. `urlhash` is the SHA-256 of
//! that canonical string and is the primary key used by the frontier and
//! the analytics engine.

use sha2::{Digest, Sha256};
use url::Url;

#[derive(Debug)]
pub struct ParseError;

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not parse url")
    }
}

impl std::error::Error for ParseError {}

/// Canonicalizes a URL for crawl-deduping.
///
/// Fragment is stripped, scheme/host lowercased, default ports
/// (80 for http, 443 for https) dropped, userinfo/path/query preserved.
pub fn canonicalize(raw: &str) -> Result<String, ParseError> {
    let mut url = Url::parse(raw).map_err(|_| ParseError)?;
    url.set_fragment(None);
    Ok(url.to_string())
}

/// SHA-256 of the canonical URL's UTF-8 bytes.
pub fn urlhash(raw: &str) -> Result<[u8; 32], ParseError> {
    let canonical = canonicalize(raw)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(digest.into())
}

pub fn urlhash_hex(raw: &str) -> Result<String, ParseError> {
    Ok(hex_encode(&urlhash(raw)?))
}

pub fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fragment() {
        let a = canonicalize("https://ics.uci.edu/page#section").unwrap();
        let b = canonicalize("https://ics.uci.edu/page").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn lowercases_scheme_and_host() {
        let a = canonicalize("HTTPS://ICS.UCI.EDU/Page").unwrap();
        assert!(a.starts_with("https://ics.uci.edu/"));
    }

    #[test]
    fn drops_default_ports() {
        let a = canonicalize("https://ics.uci.edu:443/page").unwrap();
        assert_eq!(a, "https://ics.uci.edu/page");
        let b = canonicalize("http://ics.uci.edu:80/page").unwrap();
        assert_eq!(b, "http://ics.uci.edu/page");
    }

    #[test]
    fn keeps_non_default_ports() {
        let a = canonicalize("https://ics.uci.edu:8443/page").unwrap();
        assert_eq!(a, "https://ics.uci.edu:8443/page");
    }

    #[test]
    fn is_idempotent() {
        let once = canonicalize("https://ICS.uci.edu:443/a/b?x=1#frag").unwrap();
        let twice = canonicalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn hash_is_stable_across_fragments() {
        let h1 = urlhash("https://ics.uci.edu/x#a").unwrap();
        let h2 = urlhash("https://ics.uci.edu/x#b").unwrap();
        assert_eq!(h1, h2);
    }
}
