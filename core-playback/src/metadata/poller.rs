//! Now-playing feed poller with an adaptive interval.
//!
//! Polling runs only while the engine is `playing` a stream served from the
//! feed's origin. The first poll fires immediately; after that the interval
//! starts at `base_interval` and grows by `backoff_factor` once the title has
//! stayed the same for `unchanged_threshold` polls. Any change snaps it back.

use super::arbitrator::MetadataArbitrator;
use super::feed::{fetch_now_playing, find_station, NowPlayingRecord};
use super::parse_song_title;
use crate::config::MetadataConfig;
use crate::engine::PlaybackEngine;
use crate::error::Result;
use crate::state::{PlaybackSnapshot, PlaybackStatus, StreamMetadata};
use bridge_traits::http::HttpClient;
use core_runtime::config::NowPlayingFeed;
use futures::future::{BoxFuture, FutureExt, OptionFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Interval bookkeeping for one polling session.
#[derive(Debug, Clone)]
pub struct PollCadence {
    base: Duration,
    max: Duration,
    factor: f64,
    threshold: u32,
    interval: Duration,
    last_key: Option<String>,
    unchanged: u32,
}

impl PollCadence {
    pub fn new(config: &MetadataConfig) -> Self {
        Self {
            base: config.base_interval,
            max: config.max_interval,
            factor: config.backoff_factor,
            threshold: config.unchanged_threshold,
            interval: config.base_interval,
            last_key: None,
            unchanged: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record a polled value and return the interval until the next poll.
    pub fn observe(&mut self, metadata: &StreamMetadata) -> Duration {
        let key = metadata.change_key();
        if self.last_key.as_deref() != Some(key.as_str()) {
            self.last_key = Some(key);
            self.unchanged = 0;
            self.interval = self.base;
            return self.interval;
        }

        self.unchanged += 1;
        if self.unchanged >= self.threshold {
            self.interval = Duration::try_from_secs_f64(self.interval.as_secs_f64() * self.factor)
                .map_or(self.max, |next| next.min(self.max));
        }
        self.interval
    }
}

type FeedFetch = BoxFuture<'static, Result<Vec<NowPlayingRecord>>>;

/// Background poller feeding [`MetadataArbitrator::on_poll`].
pub struct NowPlayingPoller {
    engine: Arc<PlaybackEngine>,
    arbitrator: Arc<MetadataArbitrator>,
    http: Arc<dyn HttpClient>,
    feed: NowPlayingFeed,
    config: MetadataConfig,
}

impl NowPlayingPoller {
    pub fn new(
        engine: Arc<PlaybackEngine>,
        arbitrator: Arc<MetadataArbitrator>,
        http: Arc<dyn HttpClient>,
        feed: NowPlayingFeed,
        config: MetadataConfig,
    ) -> Self {
        Self {
            engine,
            arbitrator,
            http,
            feed,
            config,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// The stream to poll for, if polling applies to `snapshot`.
    fn target(&self, snapshot: &PlaybackSnapshot) -> Option<String> {
        if snapshot.status != PlaybackStatus::Playing {
            return None;
        }
        snapshot
            .current_stream_url
            .clone()
            .filter(|url| url.contains(&self.feed.origin))
    }

    async fn run(self, cancel: CancellationToken) {
        let mut snapshots = self.engine.subscribe();
        loop {
            let target = self.target(&snapshots.borrow_and_update());
            if let Some(stream_url) = target {
                if !self.poll_session(&stream_url, &mut snapshots, &cancel).await {
                    break;
                }
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Now-playing poller stopped");
    }

    /// Poll for `stream_url` until the target changes. Returns `false` when
    /// the poller should exit.
    async fn poll_session(
        &self,
        stream_url: &str,
        snapshots: &mut watch::Receiver<PlaybackSnapshot>,
        cancel: &CancellationToken,
    ) -> bool {
        let mut cadence = PollCadence::new(&self.config);
        let next_poll = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(next_poll);
        let mut in_flight: Option<FeedFetch> = None;
        debug!("Now-playing polling started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                    let target = self.target(&snapshots.borrow_and_update());
                    if target.as_deref() != Some(stream_url) {
                        debug!("Now-playing polling paused");
                        return true;
                    }
                }
                () = &mut next_poll => {
                    // Replacing an unfinished fetch drops it.
                    in_flight = Some(self.start_fetch());
                    next_poll.as_mut().reset(Instant::now() + cadence.interval());
                }
                Some(result) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                    in_flight = None;
                    let interval = self.handle_result(stream_url, result, &mut cadence);
                    next_poll.as_mut().reset(Instant::now() + interval);
                }
            }
        }
    }

    fn start_fetch(&self) -> FeedFetch {
        let http = Arc::clone(&self.http);
        let feed_url = self.feed.url.clone();
        let timeout = self.config.request_timeout;
        async move { fetch_now_playing(http.as_ref(), &feed_url, timeout).await }.boxed()
    }

    fn handle_result(
        &self,
        stream_url: &str,
        result: Result<Vec<NowPlayingRecord>>,
        cadence: &mut PollCadence,
    ) -> Duration {
        let records = match result {
            Ok(records) => records,
            Err(e) => {
                debug!(error = %e, "Now-playing fetch failed");
                return cadence.interval();
            }
        };

        let Some(record) = find_station(&records, stream_url) else {
            trace!(records = records.len(), "No feed entry for current stream");
            return cadence.interval();
        };

        let metadata = StreamMetadata::from(parse_song_title(&record.song_title));
        let interval = cadence.observe(&metadata);
        let outcome = self.arbitrator.on_poll(stream_url, metadata);
        trace!(?outcome, interval_ms = interval.as_millis() as u64, "Now-playing poll handled");
        interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cadence() -> PollCadence {
        PollCadence::new(&MetadataConfig::default())
    }

    #[test]
    fn test_interval_backs_off_after_unchanged_polls() {
        let mut cadence = cadence();
        let same = StreamMetadata::new("One More Time", "Daft Punk");

        let intervals: Vec<f64> = (0..5)
            .map(|_| cadence.observe(&same).as_secs_f64())
            .collect();
        assert_eq!(intervals, vec![5.0, 5.0, 5.0, 7.5, 11.25]);
    }

    #[test]
    fn test_interval_capped_and_reset_on_change() {
        let mut cadence = cadence();
        let same = StreamMetadata::new("One More Time", "Daft Punk");
        for _ in 0..20 {
            cadence.observe(&same);
        }
        assert_eq!(cadence.interval(), Duration::from_secs(30));

        let next = cadence.observe(&StreamMetadata::new("Aerodynamic", "Daft Punk"));
        assert_eq!(next, Duration::from_secs(5));
    }

    #[test]
    fn test_oversized_factor_saturates_at_cap() {
        let config = MetadataConfig {
            backoff_factor: 1e300,
            ..MetadataConfig::default()
        };
        let mut cadence = PollCadence::new(&config);
        let same = StreamMetadata::new("One More Time", "Daft Punk");
        for _ in 0..6 {
            cadence.observe(&same);
        }
        assert_eq!(cadence.interval(), config.max_interval);
    }
}
