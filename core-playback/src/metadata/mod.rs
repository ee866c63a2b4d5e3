//! # Now-Playing Metadata
//!
//! Two sources feed the snapshot's `stream_metadata`:
//!
//! - **push**: in-band (ICY) metadata forwarded by native transports
//! - **poll**: the station's HTTP now-playing feed
//!
//! [`MetadataArbitrator`] gives pushed values priority for a window after each
//! push; [`NowPlayingPoller`] drives the feed with an adaptive interval.

pub mod arbitrator;
pub mod feed;
pub mod poller;

pub use arbitrator::{Arbitration, MetadataArbitrator};
pub use feed::{fetch_now_playing, find_station, parse_feed, NowPlayingRecord};
pub use poller::{NowPlayingPoller, PollCadence};

use crate::state::StreamMetadata;
use bridge_traits::media::InBandMetadata;

/// Placeholder for a missing artist or title.
pub const UNKNOWN_FIELD: &str = "-";

const COMPOSITE_SEPARATOR: &str = "|||";
const ARTIST_SEPARATOR: &str = " - ";

/// Artist and title parsed from a feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongTitle {
    pub artist: String,
    pub title: String,
}

impl SongTitle {
    fn unknown() -> Self {
        Self {
            artist: UNKNOWN_FIELD.to_string(),
            title: UNKNOWN_FIELD.to_string(),
        }
    }
}

impl From<SongTitle> for StreamMetadata {
    fn from(song: SongTitle) -> Self {
        StreamMetadata {
            title: Some(song.title),
            artist: Some(song.artist),
        }
    }
}

fn or_unknown(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        UNKNOWN_FIELD.to_string()
    } else {
        value.to_string()
    }
}

/// Parse a feed title such as `"WKRP|||Daft Punk - One More Time.mp3"`.
///
/// Uses the text after the last `|||`, drops a trailing `.mp3`, and splits on
/// the first `" - "`. Missing parts become `"-"`.
pub fn parse_song_title(raw: &str) -> SongTitle {
    let tail = raw
        .rsplit_once(COMPOSITE_SEPARATOR)
        .map_or(raw, |(_, tail)| tail)
        .trim();

    let tail = match tail.len().checked_sub(4) {
        Some(cut) if tail.is_char_boundary(cut) && tail[cut..].eq_ignore_ascii_case(".mp3") => &tail[..cut],
        _ => tail,
    };

    match tail.split_once(ARTIST_SEPARATOR) {
        Some((artist, title)) => SongTitle {
            artist: or_unknown(artist),
            title: or_unknown(title),
        },
        None => SongTitle::unknown(),
    }
}

/// Turn in-band metadata into snapshot metadata.
///
/// Hosts that deliver only the raw `StreamTitle` get it split on `" - "`.
/// Returns `None` when nothing usable arrived.
pub fn parse_in_band(metadata: &InBandMetadata) -> Option<StreamMetadata> {
    let clean = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let title = clean(&metadata.title);
    let artist = clean(&metadata.artist);
    if title.is_some() || artist.is_some() {
        return Some(StreamMetadata { title, artist });
    }

    let raw = clean(&metadata.raw)?;
    Some(match raw.split_once(ARTIST_SEPARATOR) {
        Some((artist, title)) => StreamMetadata {
            title: Some(or_unknown(title)),
            artist: Some(or_unknown(artist)),
        },
        None => StreamMetadata {
            title: Some(raw),
            artist: None,
        },
    })
}

/// Whether a feed `listen_url` belongs to the station behind `stream_url`.
///
/// For `.../radio/<mount>/...` stream URLs the mount must appear as a path
/// segment of the listen URL; otherwise the listen URL must contain the
/// stream's path.
pub fn listen_url_matches(listen_url: &str, stream_url: &str) -> bool {
    let Ok(stream) = url::Url::parse(stream_url) else {
        return listen_url.contains(stream_url);
    };

    let segments: Vec<&str> = stream
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    if let Some(mount) = segments
        .iter()
        .position(|segment| *segment == "radio")
        .and_then(|index| segments.get(index + 1))
    {
        return match url::Url::parse(listen_url) {
            Ok(listen) => listen
                .path_segments()
                .is_some_and(|mut parts| parts.any(|part| part == *mount)),
            Err(_) => listen_url.split('/').any(|part| part == *mount),
        };
    }

    let path = stream.path().trim_end_matches('/');
    !path.is_empty() && listen_url.contains(path)
}
