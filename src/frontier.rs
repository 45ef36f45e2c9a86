//! The durable, politeness-aware URL frontier.
//!
//! Backed by a `rusqlite` table (`urls(urlhash, url, completed)`) holding
//! the crawled-url ledger: a small, queryable durability log rather than a
//! write-heavy key/value cache. Concurrency is a `tokio::sync::Mutex` plus
//! `tokio::sync::Notify`: `notify_one` wakes a single waiting worker and
//! `notify_waiters` wakes all of them, e.g. on shutdown.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection};
use tokio::sync::{Mutex, Notify};

use crate::admission;
use crate::error::Result;
use crate::politeness::PolitenessClock;
use crate::urlcanon;

struct State {
    db: Connection,
    to_be_downloaded: VecDeque<String>,
    seen_hashes: HashSet<String>,
    in_progress: u64,
    closed: bool,
    politeness: PolitenessClock,
}

impl State {
    /// Loads every row from the save file, seeding `seen_hashes` and
    /// queueing incomplete, still-admissible URLs for (re)download.
    fn parse_save_file(&mut self) -> Result<()> {
        let mut tbd_count = 0usize;
        let mut total_count = 0usize;
        {
            let mut stmt = self.db.prepare("SELECT urlhash, url, completed FROM urls")?;
            let rows = stmt.query_map([], |row| {
                let urlhash: String = row.get(0)?;
                let url: String = row.get(1)?;
                let completed: i64 = row.get(2)?;
                Ok((urlhash, url, completed))
            })?;
            for row in rows {
                let (urlhash, url, completed) = row?;
                total_count += 1;
                self.seen_hashes.insert(urlhash);
                if completed == 0 && admission::is_valid(&url) {
                    self.to_be_downloaded.push_back(url);
                    tbd_count += 1;
                }
            }
        }
        tracing::info!(tbd_count, total_count, "loaded frontier state from save file");
        Ok(())
    }

    fn add_url_locked(&mut self, raw: &str) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        let Ok(canonical) = urlcanon::canonicalize(raw) else { return Ok(false) };
        let Ok(urlhash) = urlcanon::urlhash_hex(raw) else { return Ok(false) };
        if self.seen_hashes.contains(&urlhash) {
            return Ok(false);
        }
        self.seen_hashes.insert(urlhash.clone());
        self.db.execute(
            "INSERT OR IGNORE INTO urls(urlhash, url, completed) VALUES (?1, ?2, 0)",
            params![urlhash, canonical],
        )?;
        self.to_be_downloaded.push_back(canonical);
        Ok(true)
    }
}

pub struct Frontier {
    state: Mutex<State>,
    notify: Notify,
    time_delay: Duration,
}

impl Frontier {
    /// Opens (or creates) the save file at `save_file`. On `restart`, any
    /// existing save file (and its `-wal`/`-shm` sidecars) is deleted and
    /// the frontier reseeds from `seed_urls`. Otherwise prior state is
    /// rehydrated, falling back to the seed list only if nothing was seen.
    pub async fn open(save_file: &Path, seed_urls: &[String], restart: bool, time_delay: Duration) -> Result<Self> {
        let existed = save_file.exists();
        if existed && restart {
            tracing::info!(path = %save_file.display(), "restart requested, deleting frontier save file");
            for suffix in ["", "-wal", "-shm"] {
                let sidecar = PathBuf::from(format!("{}{suffix}", save_file.display()));
                if sidecar.exists() {
                    std::fs::remove_file(&sidecar)?;
                }
            }
        } else if !existed && !restart {
            tracing::info!(path = %save_file.display(), "no frontier save file found, starting from seed");
        }

        let db = Connection::open(save_file)?;
        db.busy_timeout(Duration::from_secs(30))?;
        let _ = db.pragma_update(None, "journal_mode", "WAL");
        let _ = db.pragma_update(None, "synchronous", "NORMAL");
        db.execute(
            "CREATE TABLE IF NOT EXISTS urls (urlhash TEXT PRIMARY KEY, url TEXT NOT NULL, completed INTEGER NOT NULL)",
            [],
        )?;

        let mut state = State {
            db,
            to_be_downloaded: VecDeque::new(),
            seen_hashes: HashSet::new(),
            in_progress: 0,
            closed: false,
            politeness: PolitenessClock::new(),
        };

        if restart {
            for seed in seed_urls {
                state.add_url_locked(seed)?;
            }
        } else {
            state.parse_save_file()?;
            if state.seen_hashes.is_empty() {
                for seed in seed_urls {
                    state.add_url_locked(seed)?;
                }
            }
        }

        Ok(Frontier { state: Mutex::new(state), notify: Notify::new(), time_delay })
    }

    /// Adds a discovered URL to the frontier if it hasn't been seen before.
    pub async fn add_url(&self, raw: &str) {
        let mut state = self.state.lock().await;
        match state.add_url_locked(raw) {
            Ok(true) => self.notify.notify_one(),
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, url = raw, "failed to persist discovered url"),
        }
    }

    /// Pops the next URL to download, blocking until one is available. When
    /// the queue is empty and no worker has an in-flight URL, the frontier
    /// closes and every waiter (including future callers) receives `None`.
    pub async fn get_tbd_url(&self) -> Option<String> {
        loop {
            let notified = {
                let mut state = self.state.lock().await;
                if state.closed {
                    return None;
                }
                if let Some(url) = state.to_be_downloaded.pop_front() {
                    state.in_progress += 1;
                    return Some(url);
                }
                if state.in_progress == 0 {
                    state.closed = true;
                    self.notify.notify_waiters();
                    return None;
                }
                // Register as a waiter before releasing the lock, so a
                // notify from another task can't be missed in between.
                self.notify.notified()
            };
            notified.await;
        }
    }

    /// Blocks until `url`'s host may be fetched without violating the
    /// per-host delay, reserving the next slot atomically.
    pub async fn wait_for_politeness(&self, url: &str) {
        let Ok(parsed) = url::Url::parse(url) else { return };
        let Some(host) = parsed.host_str() else { return };
        let host = host.to_lowercase();

        loop {
            let wait = {
                let mut state = self.state.lock().await;
                state.politeness.check(&host, self.time_delay)
            };
            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }

    /// Marks `url` as completed, decrements the in-flight count, and closes
    /// the frontier if nothing remains to do.
    pub async fn mark_url_complete(&self, url: &str) {
        let mut state = self.state.lock().await;

        match urlcanon::urlhash_hex(url) {
            Ok(urlhash) => {
                if !state.seen_hashes.contains(&urlhash) {
                    tracing::error!(url, "completed url was not previously seen");
                } else if let Err(e) =
                    state.db.execute("UPDATE urls SET completed = 1 WHERE urlhash = ?1", params![urlhash])
                {
                    tracing::error!(error = %e, url, "failed to mark url complete");
                }
            }
            Err(_) => tracing::error!(url, "could not hash completed url"),
        }

        state.in_progress = state.in_progress.saturating_sub(1);
        if state.in_progress == 0 && state.to_be_downloaded.is_empty() {
            state.closed = true;
        }
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds() -> Vec<String> {
        vec!["https://ics.uci.edu/".to_string()]
    }

    #[tokio::test]
    async fn seeds_when_no_save_file_present() {
        let dir = tempfile::tempdir().unwrap();
        let frontier = Frontier::open(&dir.path().join("frontier.sqlite3"), &seeds(), false, Duration::from_millis(1))
            .await
            .unwrap();
        let url = frontier.get_tbd_url().await;
        assert_eq!(url.as_deref(), Some("https://ics.uci.edu/"));
    }

    #[tokio::test]
    async fn add_url_dedupes_by_canonical_hash() {
        let dir = tempfile::tempdir().unwrap();
        let frontier =
            Frontier::open(&dir.path().join("frontier.sqlite3"), &[], false, Duration::from_millis(1)).await.unwrap();
        frontier.add_url("https://ics.uci.edu/a#frag1").await;
        frontier.add_url("https://ics.uci.edu/a#frag2").await;
        let first = frontier.get_tbd_url().await;
        assert!(first.is_some());
        frontier.mark_url_complete(&first.unwrap()).await;
        assert!(frontier.get_tbd_url().await.is_none());
    }

    #[tokio::test]
    async fn closes_once_drained_with_nothing_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let frontier =
            Frontier::open(&dir.path().join("frontier.sqlite3"), &[], false, Duration::from_millis(1)).await.unwrap();
        assert!(frontier.get_tbd_url().await.is_none());
    }

    #[tokio::test]
    async fn wait_for_politeness_enforces_delay() {
        let dir = tempfile::tempdir().unwrap();
        let frontier = Frontier::open(
            &dir.path().join("frontier.sqlite3"),
            &[],
            false,
            Duration::from_millis(50),
        )
        .await
        .unwrap();
        let start = std::time::Instant::now();
        frontier.wait_for_politeness("https://ics.uci.edu/a").await;
        frontier.wait_for_politeness("https://ics.uci.edu/b").await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn rehydrates_pending_urls_from_save_file() {
        let dir = tempfile::tempdir().unwrap();
        let save_path = dir.path().join("frontier.sqlite3");
        {
            let frontier = Frontier::open(&save_path, &seeds(), true, Duration::from_millis(1)).await.unwrap();
            frontier.add_url("https://ics.uci.edu/sub").await;
        }
        let frontier = Frontier::open(&save_path, &seeds(), false, Duration::from_millis(1)).await.unwrap();
        let mut found = HashSet::new();
        while let Some(url) = frontier.get_tbd_url().await {
            found.insert(url.clone());
            frontier.mark_url_complete(&url).await;
        }
        assert!(found.contains("https://ics.uci.edu/"));
        assert!(found.contains("https://ics.uci.edu/sub"));
    }
}
