//! Channel registry.
//!
//! A channel is one monitored peer connection. The registry hands out
//! process-unique ids, tracks which channels are still open and keeps the
//! session metadata captured for each of them. Closing a channel only stops
//! it from being polled; everything already collected for it stays.


use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Process-local identifier of a monitored connection.
pub type ChannelId = u64;

/// Type of a session description.
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum SdpType {
    #[default]
    #[serde(rename = "")]
    Unspecified,
    #[serde(rename = "offer")]
    Offer,
    #[serde(rename = "pranswer")]
    Pranswer,
    #[serde(rename = "answer")]
    Answer,
    #[serde(rename = "rollback")]
    Rollback,
}

const SDP_TYPE_OFFER_STR: &str = "offer";
const SDP_TYPE_PRANSWER_STR: &str = "pranswer";
const SDP_TYPE_ANSWER_STR: &str = "answer";
const SDP_TYPE_ROLLBACK_STR: &str = "rollback";

impl From<&str> for SdpType {
    fn from(raw: &str) -> Self {
        match raw {
            SDP_TYPE_OFFER_STR => SdpType::Offer,
            SDP_TYPE_PRANSWER_STR => SdpType::Pranswer,
            SDP_TYPE_ANSWER_STR => SdpType::Answer,
            SDP_TYPE_ROLLBACK_STR => SdpType::Rollback,
            _ => SdpType::Unspecified,
        }
    }
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            SdpType::Offer => SDP_TYPE_OFFER_STR,
            SdpType::Pranswer => SDP_TYPE_PRANSWER_STR,
            SdpType::Answer => SDP_TYPE_ANSWER_STR,
            SdpType::Rollback => SDP_TYPE_ROLLBACK_STR,
            SdpType::Unspecified => "Unspecified",
        };
        write!(f, "{s}")
    }
}

/// A local or remote session description as exposed by the connection.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn new(sdp_type: SdpType, sdp: impl Into<String>) -> Self {
        Self {
            sdp_type,
            sdp: sdp.into(),
        }
    }
}

/// Session metadata attached to a channel.
///
/// Every key is optional: it is filled in opportunistically once the
/// connection gets far enough to expose it.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_description: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_description: Option<SessionDescription>,
    /// Raw fields of the local candidate of the active candidate pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_cand: Option<serde_json::Map<String, serde_json::Value>>,
}

impl PeerMetadata {
    /// Merges `other` into `self`. Keys present in `other` win.
    pub fn merge(&mut self, other: PeerMetadata) {
        if other.local_description.is_some() {
            self.local_description = other.local_description;
        }
        if other.remote_description.is_some() {
            self.remote_description = other.remote_description;
        }
        if other.local_cand.is_some() {
            self.local_cand = other.local_cand;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.local_description.is_none()
            && self.remote_description.is_none()
            && self.local_cand.is_none()
    }
}

/// Bookkeeping of known channels.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    next_channel_id: ChannelId,
    known: BTreeSet<ChannelId>,
    extra: HashMap<ChannelId, PeerMetadata>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next free id and registers it.
    pub fn allocate(&mut self) -> ChannelId {
        let id = self.next_channel_id;
        self.on_create(id);
        id
    }

    /// Registers `id` as known. Returns false if it was already known.
    pub fn on_create(&mut self, id: ChannelId) -> bool {
        if id >= self.next_channel_id {
            self.next_channel_id = id.saturating_add(1);
        }
        if !self.known.insert(id) {
            return false;
        }
        self.extra.entry(id).or_default();
        true
    }

    /// Forgets `id` for polling purposes. Returns false if it was not known.
    pub fn on_close(&mut self, id: ChannelId) -> bool {
        self.known.remove(&id)
    }

    /// Currently known channel ids in ascending order.
    pub fn list_active(&self) -> Vec<ChannelId> {
        self.known.iter().copied().collect()
    }

    pub fn is_active(&self, id: ChannelId) -> bool {
        self.known.contains(&id)
    }

    pub fn set_extra(&mut self, id: ChannelId, metadata: PeerMetadata) {
        self.extra.entry(id).or_default().merge(metadata);
    }

    /// Metadata captured so far for `id`, empty if none.
    pub fn extra(&self, id: ChannelId) -> PeerMetadata {
        self.extra.get(&id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
