use crate::api::ChartSource;
use crate::error::{Result, SyncError};
use crate::models::ChartEntry;
use async_trait::async_trait;
use log::{debug, warn};
use scraper::{Html, Selector};
use std::collections::HashSet;

/// Scrapes the chart page. Every chart row is a list item carrying the
/// song name in `h3 a` and the artist in `h4 a`, in document order.
pub struct HtmlChartSource {
    client: reqwest::Client,
    url: String,
}

impl HtmlChartSource {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

/// Parse chart rows out of the page HTML. Rows without a song name are
/// decorative list items and are skipped.
pub fn parse_chart_html(html: &str) -> Vec<ChartEntry> {
    let row_sel = Selector::parse("#main .chart-grid .section-content ul li").unwrap();
    let song_sel = Selector::parse("h3 a").unwrap();
    let artist_sel = Selector::parse("h4 a").unwrap();

    let doc = Html::parse_document(html);
    let mut entries = Vec::new();
    for row in doc.select(&row_sel) {
        let song = row
            .select(&song_sel)
            .next()
            .map(|e| normalize_text(&e.text().collect::<String>()))
            .unwrap_or_default();
        if song.is_empty() {
            continue;
        }
        let artist = row
            .select(&artist_sel)
            .next()
            .map(|e| normalize_text(&e.text().collect::<String>()))
            .unwrap_or_default();
        entries.push(ChartEntry::new(song, artist));
    }
    entries
}

fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop structural duplicates, keeping each pair's first occurrence so the
/// surviving entries stay in chart order.
pub fn dedup_entries(mut entries: Vec<ChartEntry>) -> Vec<ChartEntry> {
    let mut seen = HashSet::new();
    entries.retain(|e| seen.insert(e.clone()));
    entries
}

#[async_trait]
impl ChartSource for HtmlChartSource {
    async fn fetch_entries(&self) -> Result<Vec<ChartEntry>> {
        debug!("fetching chart page {}", self.url);
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let msg = format!("chart fetch failed: {}", status);
            return Err(if status.is_server_error() {
                SyncError::Http(msg)
            } else {
                SyncError::Protocol(msg)
            });
        }
        let body = resp.text().await?;
        let entries = parse_chart_html(&body);
        if entries.is_empty() {
            warn!(
                "chart page {} yielded no entries; the page layout may have changed",
                self.url
            );
        }
        Ok(entries)
    }
}
