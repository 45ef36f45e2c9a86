//! Read-only report projection over analytics state.

use std::io::Write as _;
use std::path::Path;

use crate::analytics::Analytics;
use crate::error::Result;

const TOP_WORDS_N: usize = 50;

/// Renders the report for `analytics` and writes it to `out_path`,
/// creating parent directories as needed.
pub fn write_report(analytics: &Analytics, out_path: &Path) -> Result<()> {
    let report = render(analytics);
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = std::fs::File::create(out_path)?;
    file.write_all(report.as_bytes())?;
    Ok(())
}

fn render(analytics: &Analytics) -> String {
    let unique_pages = analytics.unique_pages();
    let (longest_url, longest_words) = analytics.longest_page();
    let top_words = analytics.top_words(TOP_WORDS_N);
    let mut subdomains = analytics.subdomains();
    subdomains.sort_by(|a, b| a.0.cmp(&b.0));

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("Unique pages (URL defragmented only): {unique_pages}"));
    lines.push(String::new());
    lines.push("Longest page (by word count):".to_string());
    lines.push(format!("{longest_url}, {longest_words}"));
    lines.push(String::new());
    lines.push("Top 50 words (stopwords removed):".to_string());
    for (word, count) in &top_words {
        lines.push(format!("{word}, {count}"));
    }
    lines.push(String::new());
    lines.push(format!("Subdomains in uci.edu: {}", subdomains.len()));
    for (host, count) in &subdomains {
        lines.push(format!("{host}, {count}"));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_empty_report() {
        let analytics = Analytics::new(tempfile::tempdir().unwrap().path());
        let report = render(&analytics);
        assert!(report.starts_with("Unique pages (URL defragmented only): 0\n"));
        assert!(report.contains("Top 50 words (stopwords removed):\n"));
        assert!(report.contains("Subdomains in uci.edu: 0\n"));
    }

    #[test]
    fn writes_report_to_disk() {
        let analytics = Analytics::new(tempfile::tempdir().unwrap().path());
        analytics.record_url("https://ics.uci.edu/a");
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("nested").join("report.txt");
        write_report(&analytics, &out_path).unwrap();
        let contents = std::fs::read_to_string(&out_path).unwrap();
        assert!(contents.starts_with("Unique pages (URL defragmented only): 1\n"));
    }

    #[test]
    fn subdomains_are_sorted_by_host() {
        let analytics = Analytics::new(tempfile::tempdir().unwrap().path());
        analytics.record_url("https://zzz.uci.edu/a");
        analytics.record_url("https://aaa.uci.edu/b");
        let report = render(&analytics);
        let zzz_pos = report.find("zzz.uci.edu").unwrap();
        let aaa_pos = report.find("aaa.uci.edu").unwrap();
        assert!(aaa_pos < zzz_pos);
    }
}
