//! `config.ini` parsing into a typed [`Config`]. A missing or malformed
//! config file is a fatal startup error — the only place
//! `error::Error::Config` is allowed to abort the process.

use std::path::Path;
use std::time::Duration;

use ini::Ini;

use crate::error::{Error, Result};

const DEFAULT_USER_AGENT: &str = "domaincrawl/1.0";
const DEFAULT_TIME_DELAY_SECS: u64 = 1;
const DEFAULT_CACHE_HOST: &str = "127.0.0.1";
const DEFAULT_CACHE_PORT: u16 = 9000;
const DEFAULT_SAVE_FILE: &str = "frontier.db";
const DEFAULT_THREADS: usize = 4;

#[derive(Debug, Clone)]
pub struct Config {
    pub user_agent: String,
    pub seed_urls: Vec<String>,
    pub time_delay: Duration,
    pub cache_server_host: String,
    pub cache_server_port: u16,
    pub save_file: String,
    pub threads_count: usize,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let ini = Ini::load_from_file(path)
            .map_err(|e| Error::Config(format!("could not read {}: {e}", path.display())))?;
        let section = ini
            .section(Some("CRAWLER"))
            .ok_or_else(|| Error::Config(format!("{} is missing a [CRAWLER] section", path.display())))?;

        let user_agent = section.get("user_agent").unwrap_or(DEFAULT_USER_AGENT).to_string();

        let seed_urls: Vec<String> = section
            .get("seed_urls")
            .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
            .unwrap_or_default();

        let time_delay = parse_or_default(section.get("time_delay"), "time_delay", DEFAULT_TIME_DELAY_SECS)?;
        let cache_server_host = section.get("cache_server_host").unwrap_or(DEFAULT_CACHE_HOST).to_string();
        let cache_server_port = parse_or_default(section.get("cache_server_port"), "cache_server_port", DEFAULT_CACHE_PORT)?;
        let save_file = section.get("save_file").unwrap_or(DEFAULT_SAVE_FILE).to_string();
        let threads_count = parse_or_default(section.get("threads_count"), "threads_count", DEFAULT_THREADS)?;

        Ok(Config {
            user_agent,
            seed_urls,
            time_delay: Duration::from_secs(time_delay),
            cache_server_host,
            cache_server_port,
            save_file,
            threads_count,
        })
    }
}

fn parse_or_default<T: std::str::FromStr>(raw: Option<&str>, key: &str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| Error::Config(format!("invalid {key}: {v}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_ini(contents: &str) -> tempfile::TempPath {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.into_temp_path()
    }

    #[test]
    fn loads_full_config() {
        let path = write_ini(
            "[CRAWLER]\n\
             user_agent = test-agent\n\
             seed_urls = https://ics.uci.edu/, https://cs.uci.edu/\n\
             time_delay = 2\n\
             cache_server_host = 10.0.0.1\n\
             cache_server_port = 8080\n\
             save_file = my.db\n\
             threads_count = 8\n",
        );
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.user_agent, "test-agent");
        assert_eq!(cfg.seed_urls, vec!["https://ics.uci.edu/", "https://cs.uci.edu/"]);
        assert_eq!(cfg.time_delay, Duration::from_secs(2));
        assert_eq!(cfg.cache_server_port, 8080);
        assert_eq!(cfg.threads_count, 8);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let path = write_ini("[CRAWLER]\n");
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(cfg.threads_count, DEFAULT_THREADS);
        assert!(cfg.seed_urls.is_empty());
    }

    #[test]
    fn missing_section_is_a_config_error() {
        let path = write_ini("[OTHER]\nkey = value\n");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = Config::load(Path::new("/nonexistent/config.ini"));
        assert!(err.is_err());
    }

    #[test]
    fn invalid_numeric_value_is_a_config_error() {
        let path = write_ini("[CRAWLER]\ntime_delay = not-a-number\n");
        assert!(Config::load(&path).is_err());
    }
}
