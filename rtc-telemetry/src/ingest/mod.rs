//! Sample ingestion.
//!
//! Turns one raw statistics report of a channel into a [`Sample`] holding
//! only the subchannels the client's report format is known to expose.


use crate::channel::ChannelId;
use crate::error::{Error, Result};
use log::trace;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A raw statistics report normalized at the adapter boundary:
/// report id -> report fields.
pub type RawStatsReport = Map<String, Value>;

lazy_static! {
    static ref WEBKIT_CHANNEL_PATTERN: Regex =
        Regex::new(r"(?i)^(ssrc_\w+_(recv|send))|(Conn-(data|audio|video)-\w+.*)$").unwrap();
    static ref FIREFOX_CHANNEL_PATTERN: Regex = Regex::new(r"^(in|out)bound_rtp").unwrap();
}

const CLIENT_TYPE_WEBKIT_STR: &str = "webkit";
const CLIENT_TYPE_FIREFOX_STR: &str = "firefox";

/// Report format of the media stack a channel's stats come from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientType {
    /// Legacy callback-based `getStats` (`ssrc_*_send`, `Conn-audio-*`, ...).
    #[serde(rename = "webkit")]
    Webkit,
    /// Standard stats naming (`inbound_rtp_*`, `outbound_rtp_*`).
    #[serde(rename = "firefox")]
    Firefox,
}

impl ClientType {
    /// Returns true if `name` is a subchannel entry for this report format.
    pub fn matches_subchannel(&self, name: &str) -> bool {
        match self {
            ClientType::Webkit => WEBKIT_CHANNEL_PATTERN.is_match(name),
            ClientType::Firefox => FIREFOX_CHANNEL_PATTERN.is_match(name),
        }
    }
}

impl FromStr for ClientType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            CLIENT_TYPE_WEBKIT_STR => Ok(ClientType::Webkit),
            CLIENT_TYPE_FIREFOX_STR => Ok(ClientType::Firefox),
            _ => Err(Error::ErrUnsupportedClient(s.to_owned())),
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ClientType::Webkit => CLIENT_TYPE_WEBKIT_STR,
            ClientType::Firefox => CLIENT_TYPE_FIREFOX_STR,
        };
        write!(f, "{s}")
    }
}

/// One poll's worth of subchannel statistics for a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub channel_id: ChannelId,
    /// Report format the sample was extracted with.
    pub client: ClientType,
    /// Milliseconds since the unix epoch.
    pub timestamp: u64,
    /// Subchannel names seen in this poll, in report order.
    pub active_subchannels: Vec<String>,
    /// Raw fields of every active subchannel.
    pub raw_fields: Map<String, Value>,
}

impl Sample {
    /// Fields reported for `name` in this poll.
    pub fn fields(&self, name: &str) -> Option<&Map<String, Value>> {
        self.raw_fields.get(name).and_then(Value::as_object)
    }
}

/// Extracts the recognized subchannels of `report` into a [`Sample`].
///
/// Only object-valued entries whose id matches the subchannel naming of
/// `client` are kept. Fails with [`Error::ErrUnsupportedClient`] when the
/// client tag is not recognized.
pub fn ingest(
    channel_id: ChannelId,
    report: &RawStatsReport,
    client: &str,
    now: SystemTime,
) -> Result<Sample> {
    let client = ClientType::from_str(client)?;

    let mut active_subchannels = vec![];
    let mut raw_fields = Map::new();
    for (name, entry) in report {
        if !entry.is_object() || !client.matches_subchannel(name) {
            continue;
        }
        active_subchannels.push(name.clone());
        raw_fields.insert(name.clone(), entry.clone());
    }

    trace!(
        "channel {} ingested {} of {} report entries",
        channel_id,
        active_subchannels.len(),
        report.len()
    );

    Ok(Sample {
        channel_id,
        client,
        timestamp: unix_millis(now),
        active_subchannels,
        raw_fields,
    })
}

/// Milliseconds elapsed since the unix epoch, zero for earlier times.
pub fn unix_millis(now: SystemTime) -> u64 {
    now.duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis() as u64
}
