//! # Configuration Hot Reload
//!
//! Polls the configuration file's modification time. When it changes, the
//! topic section is re-read and swapped in:
//!
//! ```text
//! mtime changed? ──no──► wait
//!       │ yes
//!       ▼
//!  parse file ──err──► warn, keep current snapshot
//!       │
//!       ▼
//!  diff(current, next)
//!       │
//!       ├── replace snapshot         (new requests see the new topics)
//!       ├── revoke removed/refiltered push subscribers
//!       └── drop removed pull queues
//!
//! next tick: sweep removed pairs once more
//! ```
//!
//! A publish that read the old snapshot just before the swap can still
//! create a signal or queue for a removed subscriber after the teardown ran.
//! The sweep on the following tick tears those down again.
//!
//! Only `topics` is reloaded; listener, pull and delivery settings need a
//! restart.

use eg_03_api_gateway::{ApiGatewayService, ConfigError, GatewayConfig};
use shared_bus::{CancellationRegistry, TopicSubscriptions};
use shared_types::{SharedTopics, TopicConfigSource, TopicsConfig, TopicsDiff};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors from a reload attempt. The previous snapshot stays in place.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("cannot stat {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Applies configuration file changes to the running engine.
pub struct TopicReloader {
    path: PathBuf,
    topics: Arc<SharedTopics>,
    registry: Arc<CancellationRegistry>,
    subscriptions: Arc<TopicSubscriptions>,
    last_modified: Option<SystemTime>,
    /// Pairs removed by the last reload, swept again on the next tick.
    stale: TopicsDiff,
}

impl TopicReloader {
    pub fn new(path: impl Into<PathBuf>, service: &ApiGatewayService) -> Self {
        let path = path.into();
        let last_modified = modified(&path).ok();
        Self {
            path,
            topics: service.topics(),
            registry: service.registry(),
            subscriptions: service.subscriptions(),
            last_modified,
            stale: TopicsDiff::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Swap in `next` and tear down whatever it removed.
    pub fn apply(&mut self, next: TopicsConfig) -> TopicsDiff {
        let diff = self.topics.snapshot().diff(&next);
        let topics = next.topic_count();
        self.topics.replace(next);

        for (topic, endpoint) in &diff.revoked_push {
            self.registry.revoke(topic, endpoint);
        }
        for (topic, subscription) in &diff.removed_pull {
            self.subscriptions.remove(topic, subscription);
        }

        info!(
            topics = topics,
            revoked_push = diff.revoked_push.len(),
            removed_pull = diff.removed_pull.len(),
            "Configuration reloaded"
        );
        self.stale = diff.clone();
        diff
    }

    /// Tear down anything a late request re-created for a subscriber the
    /// last reload removed. Pairs present again in the live snapshot are
    /// left alone. Returns how many signals and queues were dropped.
    pub fn sweep(&mut self) -> usize {
        let stale = std::mem::take(&mut self.stale);
        if stale.is_empty() {
            return 0;
        }

        let snapshot = self.topics.snapshot();
        let mut swept = 0;
        for (topic, endpoint) in &stale.revoked_push {
            let live = snapshot
                .push_subscribers(topic)
                .any(|(url, _)| url == endpoint.as_str());
            if !live && self.registry.revoke(topic, endpoint) {
                swept += 1;
            }
        }
        for (topic, subscription) in &stale.removed_pull {
            if !snapshot.has_pull_subscription(topic, subscription)
                && self.subscriptions.remove(topic, subscription)
            {
                swept += 1;
            }
        }

        if swept > 0 {
            info!(swept = swept, "Dropped state re-created for removed subscribers");
        }
        swept
    }

    /// Reload if the file changed since the last check.
    ///
    /// Returns `Ok(None)` when nothing changed. A file that fails to parse
    /// is not retried until it changes again.
    pub fn check(&mut self) -> Result<Option<TopicsDiff>, ReloadError> {
        let current = modified(&self.path)?;
        if self.last_modified == Some(current) {
            return Ok(None);
        }
        self.last_modified = Some(current);

        debug!(path = %self.path.display(), "Configuration file changed");
        let config = GatewayConfig::from_file(&self.path)?;
        Ok(Some(self.apply(config.topics)))
    }

    /// Poll every `interval` until `shutdown` fires.
    pub async fn run(mut self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            path = %self.path.display(),
            interval_ms = interval.as_millis() as u64,
            "Watching configuration file"
        );

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep();
                    if let Err(e) = self.check() {
                        warn!(error = %e, "Configuration reload failed, keeping previous configuration");
                    }
                }
            }
        }

        debug!("Configuration watcher stopped");
    }
}

fn modified(path: &Path) -> Result<SystemTime, ReloadError> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|source| ReloadError::Metadata {
            path: path.to_path_buf(),
            source,
        })
}
