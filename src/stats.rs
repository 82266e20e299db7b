//! Corpus statistics.
//!
//! A quick summary of what has been scanned: document, collection and tag
//! counts, near-duplicates, a tag cloud, the most frequent keywords and how
//! the corpus splits across collections. Used by `docscan stats`.

use std::fmt::Write as _;
use std::path::Path;

use crate::app::App;

const TOP_KEYWORDS: usize = 5;
const TOP_TAGS: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionShare {
    pub name: String,
    pub count: usize,
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub total: usize,
    pub collections: usize,
    pub tags: usize,
    pub near_duplicates: usize,
    pub favorites: usize,
    pub failed: usize,
    pub top_tags: Vec<(String, usize)>,
    pub top_keywords: Vec<(String, usize)>,
    pub shares: Vec<CollectionShare>,
    /// Creation time of the newest document, Unix seconds.
    pub last_ingest: Option<i64>,
}

pub fn compute(app: &App) -> Stats {
    let docs = app.documents();
    let total = docs.len();
    let index = app.index();

    let shares = index
        .collections()
        .iter()
        .map(|(name, ids)| CollectionShare {
            name: name.clone(),
            count: ids.len(),
            percent: percent(ids.len(), total),
        })
        .collect();

    Stats {
        total,
        collections: index.collections().len(),
        tags: index.tag_total(),
        near_duplicates: app
            .similarity()
            .near_duplicates(app.config().similarity.duplicate_score),
        favorites: docs.iter().filter(|d| d.favorite).count(),
        failed: docs.iter().filter(|d| d.error).count(),
        top_tags: index
            .top_tags(TOP_TAGS)
            .into_iter()
            .map(|(t, n)| (t.to_string(), n))
            .collect(),
        top_keywords: index
            .top_keywords(TOP_KEYWORDS)
            .into_iter()
            .map(|(k, n)| (k.to_string(), n))
            .collect(),
        shares,
        last_ingest: docs.iter().map(|d| d.created_at.timestamp()).max(),
    }
}

fn percent(count: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        ((count as f64 / total as f64) * 100.0).round() as u32
    }
}

pub fn render(stats: &Stats, store_path: &Path) -> String {
    let size = std::fs::metadata(store_path).map(|m| m.len()).unwrap_or(0);
    let mut out = String::new();

    let _ = writeln!(out, "DocScan — Corpus Stats");
    let _ = writeln!(out, "======================");
    let _ = writeln!(out);
    let _ = writeln!(out, "  Store:           {}", store_path.display());
    let _ = writeln!(out, "  Size:            {}", format_bytes(size));
    let _ = writeln!(
        out,
        "  Last ingest:     {}",
        stats
            .last_ingest
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "  Documents:       {}", stats.total);
    let _ = writeln!(out, "  Collections:     {}", stats.collections);
    let _ = writeln!(out, "  Tags:            {}", stats.tags);
    let _ = writeln!(out, "  Near-duplicates: {}", stats.near_duplicates);
    let _ = writeln!(out, "  Favorites:       {}", stats.favorites);
    let _ = writeln!(out, "  Failed:          {}", stats.failed);

    if !stats.top_tags.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Top tags:");
        for line in stats.top_tags.chunks(5) {
            let cloud: Vec<String> = line
                .iter()
                .map(|(tag, count)| format!("#{} ({})", tag, count))
                .collect();
            let _ = writeln!(out, "    {}", cloud.join("  "));
        }
    }

    if !stats.top_keywords.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Top keywords:");
        for (keyword, count) in &stats.top_keywords {
            let _ = writeln!(out, "    {:<30} {:>6}", keyword, count);
        }
    }

    if !stats.shares.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  By collection:");
        let _ = writeln!(out, "  {:<30} {:>6} {:>6}", "COLLECTION", "DOCS", "SHARE");
        let _ = writeln!(out, "  {}", "-".repeat(44));
        for share in &stats.shares {
            let _ = writeln!(
                out,
                "  {:<30} {:>6} {:>5}%",
                share.name, share.count, share.percent
            );
        }
    }

    out
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
