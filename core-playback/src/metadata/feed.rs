//! Now-playing feed model and fetch.
//!
//! The feed is a JSON array of
//! `{ "station": { "listen_url": … }, "now_playing": { "song": { "title": … } } }`.
//! Records missing any of those strings are skipped.

use super::listen_url_matches;
use crate::error::{PlaybackError, Result};
use bridge_traits::http::{HttpClient, HttpRequest};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RawEntry {
    station: Option<RawStation>,
    now_playing: Option<RawNowPlaying>,
}

#[derive(Debug, Deserialize)]
struct RawStation {
    listen_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNowPlaying {
    song: Option<RawSong>,
}

#[derive(Debug, Deserialize)]
struct RawSong {
    title: Option<String>,
}

/// A validated feed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlayingRecord {
    pub listen_url: String,
    /// Raw song title, possibly in `prefix|||Artist - Title.mp3` form.
    pub song_title: String,
}

impl RawEntry {
    fn validate(self) -> Option<NowPlayingRecord> {
        let listen_url = self.station?.listen_url?;
        let song_title = self.now_playing?.song?.title?;
        Some(NowPlayingRecord {
            listen_url,
            song_title,
        })
    }
}

/// Parse a feed body, keeping only well-formed records.
pub fn parse_feed(body: &[u8]) -> Result<Vec<NowPlayingRecord>> {
    let entries: Vec<serde_json::Value> = serde_json::from_slice(body)
        .map_err(|e| PlaybackError::Feed(format!("expected a JSON array: {}", e)))?;

    let total = entries.len();
    let records: Vec<NowPlayingRecord> = entries
        .into_iter()
        .filter_map(|value| serde_json::from_value::<RawEntry>(value).ok())
        .filter_map(RawEntry::validate)
        .collect();

    if records.len() < total {
        debug!(skipped = total - records.len(), "Skipped malformed feed records");
    }
    Ok(records)
}

/// GET the feed and parse it.
pub async fn fetch_now_playing(
    http: &dyn HttpClient,
    feed_url: &str,
    timeout: Duration,
) -> Result<Vec<NowPlayingRecord>> {
    let request = HttpRequest::get(feed_url)
        .header("Accept", "application/json")
        .timeout(timeout);
    let response = http.execute(request).await?;

    if !response.is_success() {
        return Err(PlaybackError::Feed(format!(
            "feed returned HTTP {}",
            response.status
        )));
    }
    parse_feed(&response.body)
}

/// The record whose listen URL belongs to `stream_url`, if any.
pub fn find_station<'a>(records: &'a [NowPlayingRecord], stream_url: &str) -> Option<&'a NowPlayingRecord> {
    records
        .iter()
        .find(|record| listen_url_matches(&record.listen_url, stream_url))
}
