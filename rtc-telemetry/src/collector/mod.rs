//! The monitoring session.
//!
//! [`Collector`] wires the channel registry, the sample ingestor, the
//! compactor and the upload coordinator together. It is plain owned state
//! driven from the outside: the instrumentation hook reports lifecycle
//! events through the `notify_*` methods, and the host either calls
//! [`Collector::collect_tick`] on its own schedule or drives
//! [`Collector::poll_timeout`] / [`Collector::handle_timeout`] from a timer.
//!
//! ```no_run
//! # use rtc_telemetry::collector::Collector;
//! # use rtc_telemetry::config::TelemetryConfig;
//! # use rtc_telemetry::observer::{ConnectionObserver, StatsSnapshot};
//! # use rtc_telemetry::transport::Transport;
//! # async fn run<O: ConnectionObserver, T: Transport>(observer: O, transport: T)
//! #     -> rtc_telemetry::error::Result<()> {
//! let mut collector = Collector::new(TelemetryConfig::default(), observer, transport);
//! collector.init().await?;
//!
//! let channel_id = collector.create_channel();
//! loop {
//!     let deadline = match collector.poll_timeout() {
//!         Some(deadline) => deadline,
//!         None => break,
//!     };
//!     // sleep until `deadline`, then
//!     collector.handle_timeout(deadline);
//! #   break;
//! }
//! collector.notify_channel_closed(channel_id);
//! collector.request_upload(true).await?;
//! # Ok(())
//! # }
//! ```


use crate::channel::{ChannelId, ChannelRegistry, PeerMetadata};
use crate::compactor::{CompactedBuffer, TimeSeriesCompactor};
use crate::config::TelemetryConfig;
use crate::error::{Error, Result, flatten_errs};
use crate::ingest::ingest;
use crate::observer::{
    ConnectionObserver, IceConnectionState, OneShot, SessionCapture, StatsSnapshot,
    find_active_local_candidate,
};
use crate::transport::Transport;
use crate::upload::{UploadCoordinator, UploadPayload, UploadState};
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::time::{Instant, SystemTime};

/// Outcome of one collection tick.
#[derive(Debug, Default, PartialEq)]
pub struct TickSummary {
    /// Channels asked for stats.
    pub polled: usize,
    /// Channels whose sample was merged.
    pub merged: usize,
    /// Per-channel failures; none of them interrupted the tick.
    pub errors: Vec<Error>,
}

impl TickSummary {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    /// Folds the per-channel failures into one error, if any.
    pub fn into_result(self) -> Result<()> {
        flatten_errs(self.errors)
    }
}

/// One monitoring session.
pub struct Collector<O: ConnectionObserver, T: Transport> {
    config: TelemetryConfig,
    observer: O,
    registry: ChannelRegistry,
    compactor: TimeSeriesCompactor,
    captures: HashMap<ChannelId, OneShot<SessionCapture, IceConnectionState>>,
    uploader: UploadCoordinator<T>,
    next_tick: Instant,
}

impl<O: ConnectionObserver, T: Transport> Collector<O, T> {
    pub fn new(config: TelemetryConfig, observer: O, transport: T) -> Self {
        Self {
            config,
            observer,
            registry: ChannelRegistry::new(),
            compactor: TimeSeriesCompactor::new(),
            captures: HashMap::new(),
            uploader: UploadCoordinator::new(transport),
            next_tick: Instant::now(),
        }
    }

    /// Allocates a fresh channel id and starts monitoring it.
    pub fn create_channel(&mut self) -> ChannelId {
        let id = self.registry.allocate();
        self.watch(id);
        id
    }

    /// Starts monitoring a channel whose id was chosen by the hook.
    /// Returns false if the channel was already known.
    pub fn notify_channel_created(&mut self, id: ChannelId) -> bool {
        if !self.registry.on_create(id) {
            trace!("channel {} already monitored", id);
            return false;
        }
        self.watch(id);
        true
    }

    fn watch(&mut self, id: ChannelId) {
        debug!("monitoring channel {}", id);
        self.captures.insert(id, SessionCapture::subscriptions());
    }

    /// Stops polling a channel. Whatever was collected for it is kept and
    /// still uploaded.
    pub fn notify_channel_closed(&mut self, id: ChannelId) -> bool {
        self.captures.remove(&id);
        let closed = self.registry.on_close(id);
        if closed {
            debug!("channel {} closed", id);
        }
        closed
    }

    /// Attaches session metadata to a channel.
    pub fn notify_peer_metadata(&mut self, id: ChannelId, metadata: PeerMetadata) {
        if let Some(buffer) = self.compactor.get_mut(id) {
            buffer.extra.merge(metadata.clone());
        }
        self.registry.set_extra(id, metadata);
    }

    /// Feeds an ICE connection state change of a channel to its pending
    /// session captures.
    pub fn notify_ice_connection_state(
        &mut self,
        id: ChannelId,
        state: IceConnectionState,
    ) -> Result<()> {
        if !self.registry.is_active(id) {
            return Err(Error::ErrUnknownChannel(id));
        }
        let Some(subscriptions) = self.captures.get_mut(&id) else {
            return Ok(());
        };

        let fired = subscriptions.dispatch(&state);
        if subscriptions.is_empty() {
            self.captures.remove(&id);
        }

        let mut metadata = PeerMetadata::default();
        for capture in fired {
            trace!("channel {} captures {:?} on {}", id, capture, state);
            match capture {
                SessionCapture::ActiveCandidate => {
                    metadata.local_cand = self
                        .observer
                        .get_stats(id)
                        .and_then(|snapshot| find_active_local_candidate(&snapshot.report));
                    if metadata.local_cand.is_none() {
                        debug!("channel {} has no active candidate pair", id);
                    }
                }
                SessionCapture::Descriptions => {
                    metadata.local_description = self.observer.local_description(id);
                    metadata.remote_description = self.observer.remote_description(id);
                }
            }
        }

        if !metadata.is_empty() {
            self.notify_peer_metadata(id, metadata);
        }
        Ok(())
    }

    /// Polls every open channel once and merges the samples.
    ///
    /// A channel that cannot be polled or whose report cannot be ingested
    /// is skipped; the others are still processed.
    pub fn collect_tick(&mut self, now: SystemTime) -> TickSummary {
        let mut summary = TickSummary::default();

        for id in self.registry.list_active() {
            summary.polled += 1;
            let result = match self.observer.get_stats(id) {
                Some(snapshot) => self.ingest_snapshot(id, snapshot, now),
                None => Err(Error::ErrNoStats(id)),
            };
            match result {
                Ok(()) => summary.merged += 1,
                Err(err) => {
                    warn!("channel {} skipped: {}", id, err);
                    summary.errors.push(err);
                }
            }
        }

        trace!(
            "tick polled {} channels, merged {}, failed {}",
            summary.polled,
            summary.merged,
            summary.failed()
        );
        summary
    }

    /// Ingests one snapshot of an open channel and merges it into the
    /// channel's buffer. On error the buffer is left untouched.
    pub fn ingest_snapshot(
        &mut self,
        id: ChannelId,
        snapshot: StatsSnapshot,
        now: SystemTime,
    ) -> Result<()> {
        if !self.registry.is_active(id) {
            return Err(Error::ErrUnknownChannel(id));
        }

        let sample = ingest(id, &snapshot.report, &snapshot.client, now)?;
        let registry = &self.registry;
        self.compactor.merge(&sample, || registry.extra(id));
        Ok(())
    }

    /// Snapshot of every buffer collected so far, closed channels included.
    pub fn upload_payload(&self) -> UploadPayload {
        UploadPayload::new(self.compactor.snapshot())
    }

    pub fn buffer(&self, id: ChannelId) -> Option<&CompactedBuffer> {
        self.compactor.get(id)
    }

    /// Creates the remote test run named after the configuration.
    pub async fn init(&mut self) -> Result<String> {
        self.uploader.init(&self.config.name).await
    }

    /// Uploads everything collected so far.
    pub async fn request_upload(&mut self, is_final: bool) -> Result<()> {
        let payload = self.upload_payload();
        self.uploader.upload(&payload, is_final).await
    }

    /// Deadline of the next tick, `None` once the test run is finalized.
    pub fn poll_timeout(&self) -> Option<Instant> {
        if self.uploader.is_finalized() {
            None
        } else {
            Some(self.next_tick)
        }
    }

    /// Runs a tick if its deadline has passed and arms the next one.
    pub fn handle_timeout(&mut self, now: Instant) -> Option<TickSummary> {
        if self.uploader.is_finalized() || now < self.next_tick {
            return None;
        }
        self.next_tick = now + self.config.poll_interval;
        Some(self.collect_tick(SystemTime::now()))
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn upload_state(&self) -> UploadState {
        self.uploader.state()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.uploader.run_id()
    }

    pub fn transport(&self) -> &T {
        self.uploader.transport()
    }
}
