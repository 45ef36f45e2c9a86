//! Crawl analytics: uniqueness, subdomain counts, word frequencies, and
//! exact/near-duplicate text detection, periodically checkpointed to disk.
//!
//! State is checkpointed with `bincode` and a human-readable summary is
//! written alongside it with `serde_json`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::urlcanon;

const DEFAULT_SAVE_EVERY_PAGES: u64 = 250;
const DEFAULT_SAVE_EVERY_SECONDS: u64 = 60;
const NEAR_THRESHOLD_BITS: u32 = 3;
const SHINGLE_K: usize = 3;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z]{2,}(?:['\u{2019}][a-zA-Z]+)*").expect("valid word regex"));

fn default_stopwords() -> HashSet<String> {
    const WORDS: &[&str] = &[
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
        "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
        "but", "by", "can", "can't", "cannot", "could", "couldn't", "did", "didn't", "do", "does",
        "doesn't", "doing", "don't", "down", "during", "each", "few", "for", "from", "further", "had",
        "hadn't", "has", "hasn't", "have", "haven't", "having", "he", "he'd", "he'll", "he's", "her",
        "here", "here's", "hers", "herself", "him", "himself", "his", "how", "how's", "i", "i'd",
        "i'll", "i'm", "i've", "if", "in", "into", "is", "isn't", "it", "it's", "its", "itself",
        "let's", "may", "me", "more", "most", "mustn't", "my", "myself", "no", "nor", "not", "of",
        "off", "on", "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out", "over",
        "own", "please", "same", "shan't", "she", "she'd", "she'll", "she's", "should", "shouldn't",
        "so", "some", "such", "than", "that", "that's", "the", "their", "theirs", "them", "themselves",
        "then", "there", "there's", "these", "they", "they'd", "they'll", "they're", "they've", "this",
        "those", "through", "to", "too", "under", "until", "up", "us", "very", "was", "wasn't", "we",
        "we'd", "we'll", "we're", "we've", "were", "weren't", "what", "what's", "when", "when's",
        "where", "where's", "which", "while", "who", "who's", "whom", "why", "why's", "with", "won't",
        "would", "wouldn't", "will", "you", "you'd", "you'll", "you're", "you've", "your", "yours",
        "yourself", "yourselves",
    ];
    WORDS.iter().map(|w| w.to_string()).collect()
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct LongestPage {
    url: String,
    words: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct State {
    unique_url_hashes: HashSet<[u8; 32]>,
    subdomain_counts: HashMap<String, u64>,
    word_frequencies: HashMap<String, u64>,
    longest_page: LongestPage,
    exact_digests: HashSet<[u8; 32]>,
    simhash_buckets: HashMap<u32, HashSet<u64>>,
    duplicate_exact: u64,
    duplicate_near: u64,
    skipped_lowinfo: u64,
}

struct Inner {
    state: State,
    dirty_pages: u64,
    last_save_at: Instant,
}

pub struct Analytics {
    out_dir: PathBuf,
    state_path: PathBuf,
    save_every_pages: u64,
    save_every_seconds: u64,
    stopwords: HashSet<String>,
    inner: Mutex<Inner>,
}

impl Analytics {
    /// Loads persisted state from `<out_dir>/state.pkl` if present, or
    /// starts empty.
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        Self::with_save_policy(out_dir, DEFAULT_SAVE_EVERY_PAGES, DEFAULT_SAVE_EVERY_SECONDS)
    }

    pub fn with_save_policy(out_dir: impl AsRef<Path>, save_every_pages: u64, save_every_seconds: u64) -> Self {
        let out_dir = out_dir.as_ref().to_path_buf();
        let state_path = out_dir.join("state.pkl");

        let mut stopwords = default_stopwords();
        load_stopwords_file(&mut stopwords);

        let state = load_state(&state_path).unwrap_or_default();

        Analytics {
            out_dir,
            state_path,
            save_every_pages,
            save_every_seconds,
            stopwords,
            inner: Mutex::new(Inner { state, dirty_pages: 0, last_save_at: Instant::now() }),
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        WORD_RE
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase().replace('\u{2019}', "'"))
            .filter(|w| !self.stopwords.contains(w))
            .collect()
    }

    /// Records a successfully fetched URL for uniqueness/subdomain counts.
    /// Returns `true` the first time this (defragmented) URL is seen.
    pub fn record_url(&self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }
        let Ok(canonical) = urlcanon::canonicalize(url) else { return false };
        let Ok(hash) = urlcanon::urlhash(url) else { return false };

        let mut inner = self.inner.lock().expect("analytics lock poisoned");
        if !inner.state.unique_url_hashes.insert(hash) {
            return false;
        }

        if let Ok(parsed) = url::Url::parse(&canonical) {
            if let Some(host) = parsed.host_str() {
                let host = host.to_lowercase();
                if host.ends_with(".uci.edu") {
                    *inner.state.subdomain_counts.entry(host).or_insert(0) += 1;
                }
            }
        }

        inner.dirty_pages += 1;
        self.maybe_save_locked(&mut inner);
        true
    }

    /// Records tokenized, stopword-filtered words for the longest-page and
    /// frequency statistics.
    pub fn record_words(&self, url: &str, words: &[String]) {
        if url.is_empty() || words.is_empty() {
            return;
        }
        let Ok(canonical) = urlcanon::canonicalize(url) else { return };

        let mut inner = self.inner.lock().expect("analytics lock poisoned");
        let word_count = words.len();
        if word_count > inner.state.longest_page.words {
            inner.state.longest_page = LongestPage { url: canonical, words: word_count };
        }
        for w in words {
            *inner.state.word_frequencies.entry(w.clone()).or_insert(0) += 1;
        }
        inner.dirty_pages += 1;
        self.maybe_save_locked(&mut inner);
    }

    pub fn unique_pages(&self) -> usize {
        self.inner.lock().expect("analytics lock poisoned").state.unique_url_hashes.len()
    }

    pub fn top_words(&self, n: usize) -> Vec<(String, u64)> {
        let inner = self.inner.lock().expect("analytics lock poisoned");
        self.top_words_locked(&inner.state, n)
    }

    /// Returns the (url, word count) of the longest page recorded so far.
    pub fn longest_page(&self) -> (String, usize) {
        let inner = self.inner.lock().expect("analytics lock poisoned");
        (inner.state.longest_page.url.clone(), inner.state.longest_page.words)
    }

    /// Returns `(host, count)` pairs for every `*.uci.edu` subdomain seen.
    pub fn subdomains(&self) -> Vec<(String, u64)> {
        let inner = self.inner.lock().expect("analytics lock poisoned");
        inner.state.subdomain_counts.iter().map(|(h, c)| (h.clone(), *c)).collect()
    }

    fn top_words_locked(&self, state: &State, n: usize) -> Vec<(String, u64)> {
        let mut items: Vec<(String, u64)> = state
            .word_frequencies
            .iter()
            .filter(|(w, _)| !self.stopwords.contains(*w))
            .map(|(w, c)| (w.clone(), *c))
            .collect();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        items.truncate(n);
        items
    }

    pub fn mark_lowinfo_skipped(&self) {
        let mut inner = self.inner.lock().expect("analytics lock poisoned");
        inner.state.skipped_lowinfo += 1;
        inner.dirty_pages += 1;
        self.maybe_save_locked(&mut inner);
    }

    /// Returns true if `words` is an exact or near-duplicate of previously
    /// accepted page text. Registers this page's fingerprint otherwise.
    pub fn is_duplicate_text(&self, words: &[String]) -> bool {
        if words.is_empty() {
            return false;
        }
        let digest: [u8; 32] = Sha256::digest(words.join(" ").as_bytes()).into();
        let shingles = shingles(words, SHINGLE_K);
        let sim = simhash(&shingles);
        let keys = bucket_keys(sim);

        let mut inner = self.inner.lock().expect("analytics lock poisoned");
        if inner.state.exact_digests.contains(&digest) {
            inner.state.duplicate_exact += 1;
            return true;
        }

        let mut candidates: HashSet<u64> = HashSet::new();
        for key in &keys {
            if let Some(bucket) = inner.state.simhash_buckets.get(key) {
                candidates.extend(bucket.iter().copied());
            }
        }
        for cand in candidates {
            if (sim ^ cand).count_ones() <= NEAR_THRESHOLD_BITS {
                inner.state.duplicate_near += 1;
                return true;
            }
        }

        inner.state.exact_digests.insert(digest);
        for key in keys {
            inner.state.simhash_buckets.entry(key).or_default().insert(sim);
        }
        inner.dirty_pages += 1;
        self.maybe_save_locked(&mut inner);
        false
    }

    fn maybe_save_locked(&self, inner: &mut Inner) {
        let now = Instant::now();
        let due = inner.dirty_pages >= self.save_every_pages
            || now.duration_since(inner.last_save_at) >= Duration::from_secs(self.save_every_seconds);
        if !due {
            return;
        }
        if let Err(e) = self.save_locked(inner) {
            tracing::warn!(error = %e, "analytics checkpoint failed");
        }
        inner.dirty_pages = 0;
        inner.last_save_at = now;
    }

    pub fn save(&self) -> Result<()> {
        let mut inner = self.inner.lock().expect("analytics lock poisoned");
        self.save_locked(&mut inner)
    }

    fn save_locked(&self, inner: &mut Inner) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;

        let tmp_state = self.state_path.with_extension("pkl.tmp");
        let bytes = bincode::serialize(&inner.state)?;
        fs::write(&tmp_state, bytes)?;
        fs::rename(&tmp_state, &self.state_path)?;

        let summary_path = self.out_dir.join("summary.json");
        let tmp_summary = summary_path.with_extension("json.tmp");
        let summary = Summary {
            unique_pages: inner.state.unique_url_hashes.len(),
            longest_page: LongestPageSummary {
                url: inner.state.longest_page.url.clone(),
                words: inner.state.longest_page.words,
            },
            top_words: self.top_words_locked(&inner.state, 50),
            subdomains: inner.state.subdomain_counts.clone(),
            duplicates: Duplicates {
                exact: inner.state.duplicate_exact,
                near: inner.state.duplicate_near,
                lowinfo: inner.state.skipped_lowinfo,
            },
        };
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(&tmp_summary, json)?;
        fs::rename(&tmp_summary, &summary_path)?;

        Ok(())
    }
}

#[derive(Serialize)]
struct Summary {
    unique_pages: usize,
    longest_page: LongestPageSummary,
    top_words: Vec<(String, u64)>,
    subdomains: HashMap<String, u64>,
    duplicates: Duplicates,
}

#[derive(Serialize)]
struct LongestPageSummary {
    url: String,
    words: usize,
}

#[derive(Serialize)]
struct Duplicates {
    exact: u64,
    near: u64,
    lowinfo: u64,
}

fn load_state(state_path: &Path) -> Option<State> {
    let bytes = fs::read(state_path).ok()?;
    bincode::deserialize(&bytes).ok()
}

fn load_stopwords_file(stopwords: &mut HashSet<String>) {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(env_path) = std::env::var("STOPWORDS_PATH") {
        candidates.push(PathBuf::from(env_path));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("stopwords.txt"));
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("../stopwords.txt"));
        }
    }

    for path in candidates {
        let Ok(contents) = fs::read_to_string(&path) else { continue };
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            stopwords.insert(line.to_lowercase().replace('\u{2019}', "'"));
        }
        return;
    }
}

fn simhash(features: &[String]) -> u64 {
    if features.is_empty() {
        return 0;
    }
    let mut acc = [0i64; 64];
    for f in features {
        let digest = Sha256::digest(f.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let h = u64::from_be_bytes(bytes);
        for (i, slot) in acc.iter_mut().enumerate() {
            *slot += if (h >> i) & 1 == 1 { 1 } else { -1 };
        }
    }
    let mut out = 0u64;
    for (i, v) in acc.iter().enumerate() {
        if *v >= 0 {
            out |= 1 << i;
        }
    }
    out
}

fn shingles(words: &[String], k: usize) -> Vec<String> {
    if k <= 1 || words.len() < k {
        return words.to_vec();
    }
    words.windows(k).map(|w| w.join(" ")).collect()
}

fn bucket_keys(simhash: u64) -> [u32; 4] {
    let mut keys = [0u32; 4];
    for (i, key) in keys.iter_mut().enumerate() {
        let band = ((simhash >> (i * 16)) & 0xFFFF) as u32;
        *key = ((i as u32) << 16) | band;
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_and_filters_stopwords() {
        let analytics = Analytics::new(tempfile::tempdir().unwrap().path());
        let words = analytics.tokenize("The Quick brown fox jumps over the lazy dog's bone");
        assert!(!words.contains(&"the".to_string()));
        assert!(words.contains(&"quick".to_string()));
        assert!(words.contains(&"dog's".to_string()));
    }

    #[test]
    fn record_url_is_idempotent_per_canonical_url() {
        let analytics = Analytics::new(tempfile::tempdir().unwrap().path());
        assert!(analytics.record_url("https://ics.uci.edu/page#a"));
        assert!(!analytics.record_url("https://ics.uci.edu/page#b"));
        assert_eq!(analytics.unique_pages(), 1);
    }

    #[test]
    fn tracks_longest_page_and_word_frequencies() {
        let analytics = Analytics::new(tempfile::tempdir().unwrap().path());
        let words: Vec<String> = vec!["alpha".into(), "beta".into(), "alpha".into()];
        analytics.record_words("https://ics.uci.edu/a", &words);
        let top = analytics.top_words(10);
        assert_eq!(top[0], ("alpha".to_string(), 2));
    }

    #[test]
    fn detects_exact_duplicate_text() {
        let analytics = Analytics::new(tempfile::tempdir().unwrap().path());
        let words: Vec<String> = "alpha beta gamma delta epsilon".split(' ').map(String::from).collect();
        assert!(!analytics.is_duplicate_text(&words));
        assert!(analytics.is_duplicate_text(&words));
    }

    #[test]
    fn detects_near_duplicate_text() {
        let analytics = Analytics::new(tempfile::tempdir().unwrap().path());
        let a: Vec<String> = "the quick brown fox jumps over the lazy dog today"
            .split(' ')
            .map(String::from)
            .collect();
        let mut b = a.clone();
        *b.last_mut().unwrap() = "yesterday".to_string();
        assert!(!analytics.is_duplicate_text(&a));
        assert!(analytics.is_duplicate_text(&b));
    }

    #[test]
    fn saves_and_reloads_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let analytics = Analytics::new(dir.path());
            analytics.record_url("https://ics.uci.edu/a");
            analytics.save().unwrap();
        }
        let reloaded = Analytics::new(dir.path());
        assert_eq!(reloaded.unique_pages(), 1);
        assert!(dir.path().join("summary.json").exists());
    }
}
