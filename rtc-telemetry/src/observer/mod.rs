//! Boundary to the instrumentation hook.
//!
//! The platform-specific adapter that intercepts connection creation and
//! statistics retrieval implements [`ConnectionObserver`]. It normalizes
//! whatever report objects the media stack produces into a plain
//! [`RawStatsReport`] before handing them over.

#[cfg(test)]
mod observer_test;

mod ice_connection_state;
mod subscription;

pub use ice_connection_state::IceConnectionState;
pub use subscription::{OneShot, SubscriptionId};

use crate::channel::{ChannelId, SessionDescription};
use crate::ingest::RawStatsReport;
use serde_json::{Map, Value};

/// One raw statistics report of a channel together with the tag of the
/// report format it was produced in.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub client: String,
    pub report: RawStatsReport,
}

impl StatsSnapshot {
    pub fn new(client: impl Into<String>, report: RawStatsReport) -> Self {
        Self {
            client: client.into(),
            report,
        }
    }
}

/// Capability the collector needs from the instrumentation hook.
pub trait ConnectionObserver {
    /// Retrieves the current statistics of a channel, `None` if the
    /// connection cannot report anymore.
    fn get_stats(&mut self, channel_id: ChannelId) -> Option<StatsSnapshot>;

    fn local_description(&self, _channel_id: ChannelId) -> Option<SessionDescription> {
        None
    }

    fn remote_description(&self, _channel_id: ChannelId) -> Option<SessionDescription> {
        None
    }
}

/// Session metadata captured once per channel when its ICE state allows.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionCapture {
    /// Local candidate of the active pair, once connected.
    ActiveCandidate,
    /// Local and remote descriptions, once connected or failed.
    Descriptions,
}

impl SessionCapture {
    fn accepts_active_candidate(state: &IceConnectionState) -> bool {
        state.is_established()
    }

    fn accepts_descriptions(state: &IceConnectionState) -> bool {
        state.is_established() || *state == IceConnectionState::Failed
    }

    /// One-shot subscriptions for every capture of a new channel.
    pub fn subscriptions() -> OneShot<SessionCapture, IceConnectionState> {
        let mut subs = OneShot::new();
        subs.subscribe(
            SessionCapture::ActiveCandidate,
            SessionCapture::accepts_active_candidate,
        );
        subs.subscribe(
            SessionCapture::Descriptions,
            SessionCapture::accepts_descriptions,
        );
        subs
    }
}

/// Finds the local candidate of the active candidate pair in `report`.
///
/// Understands the legacy `googCandidatePair` entries flagged with
/// `googActiveConnection` as well as standard `candidate-pair` entries that
/// are selected, or nominated and succeeded.
pub fn find_active_local_candidate(report: &RawStatsReport) -> Option<Map<String, Value>> {
    report
        .values()
        .filter_map(Value::as_object)
        .find(|entry| is_active_pair(entry))
        .and_then(|pair| pair.get("localCandidateId"))
        .and_then(Value::as_str)
        .and_then(|id| report.get(id))
        .and_then(Value::as_object)
        .cloned()
}

fn is_active_pair(entry: &Map<String, Value>) -> bool {
    match entry.get("type").and_then(Value::as_str) {
        Some("googCandidatePair") => is_true(entry.get("googActiveConnection")),
        Some("candidate-pair") => {
            is_true(entry.get("selected"))
                || (is_true(entry.get("nominated"))
                    && entry.get("state").and_then(Value::as_str) == Some("succeeded"))
        }
        _ => false,
    }
}

// Legacy reports carry every field as a string.
fn is_true(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}
