//! Time-series compaction of per-channel samples.
//!
//! Every channel owns one [`CompactedBuffer`]. Samples are merged into it one
//! poll at a time:
//!
//! - `time` gets one entry per poll with the timestamp and the subchannels
//!   that were active in that poll
//! - a field whose value never changes is stored once as a scalar
//! - a field is promoted to a sequence the first time its value changes;
//!   the sequence is back-filled with the old scalar for every earlier poll
//!   in which the subchannel was active, so position *i* of every sequence
//!   of a subchannel refers to the *i*-th poll in which that subchannel was
//!   active
//! - a sequence whose field is missing from a poll in which its subchannel
//!   is active repeats its last value; a scalar is left as is
//!
//! Nothing is ever removed from a buffer.

#[cfg(test)]
mod compactor_test;

use crate::channel::{ChannelId, PeerMetadata};
use crate::ingest::{ClientType, Sample};
use log::trace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One poll of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    /// Milliseconds since the unix epoch.
    pub timestamp: u64,
    /// Subchannels active in this poll.
    pub channels: Vec<String>,
}

/// Stored value of one subchannel field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Value changed at least once; one element per active poll.
    Series(Vec<Value>),
    /// Value never changed.
    Scalar(Value),
}

impl FieldValue {
    pub fn is_series(&self) -> bool {
        matches!(self, FieldValue::Series(_))
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            FieldValue::Series(_) => None,
        }
    }

    pub fn as_series(&self) -> Option<&[Value]> {
        match self {
            FieldValue::Series(values) => Some(values),
            FieldValue::Scalar(_) => None,
        }
    }
}

/// Fields of one subchannel keyed by field name.
pub type SubchannelStats = BTreeMap<String, FieldValue>;

/// Diff-encoded telemetry of one channel, ready for upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactedBuffer {
    pub channel_id: ChannelId,
    pub time: Vec<TimeEntry>,
    pub stat: BTreeMap<String, SubchannelStats>,
    pub extra: PeerMetadata,
    pub client: ClientType,
}

impl CompactedBuffer {
    pub fn new(channel_id: ChannelId, client: ClientType, extra: PeerMetadata) -> Self {
        Self {
            channel_id,
            time: vec![],
            stat: BTreeMap::new(),
            extra,
            client,
        }
    }

    /// Number of polls merged so far.
    pub fn sample_count(&self) -> usize {
        self.time.len()
    }

    /// Index in `time` of the first poll in which `name` was active.
    pub fn first_index(&self, name: &str) -> Option<usize> {
        self.time
            .iter()
            .position(|entry| entry.channels.iter().any(|c| c == name))
    }

    /// Number of polls in which `name` was active.
    pub fn active_count(&self, name: &str) -> usize {
        active_ticks(&self.time, name)
    }

    pub fn field(&self, name: &str, field: &str) -> Option<&FieldValue> {
        self.stat.get(name).and_then(|fields| fields.get(field))
    }

    /// Merges one poll into the buffer.
    pub fn merge(&mut self, sample: &Sample) {
        let previous_sample_count = self.time.len();

        self.time.push(TimeEntry {
            timestamp: sample.timestamp,
            channels: sample.active_subchannels.clone(),
        });

        for name in &sample.active_subchannels {
            let dest = self.stat.entry(name.clone()).or_default();
            let src = sample.fields(name);

            for (field, value) in src.into_iter().flatten() {
                let previous = match dest.get_mut(field) {
                    Some(FieldValue::Series(values)) => {
                        values.push(value.clone());
                        continue;
                    }
                    Some(FieldValue::Scalar(previous)) if *previous == *value => continue,
                    Some(FieldValue::Scalar(previous)) => Some(previous.clone()),
                    None => None,
                };

                let stored = match previous {
                    Some(previous) => {
                        let count = active_ticks(&self.time[..previous_sample_count], name);
                        trace!(
                            "channel {} promotes {}.{} with {} back-filled samples",
                            self.channel_id, name, field, count
                        );
                        let mut values = vec![previous; count];
                        values.push(value.clone());
                        FieldValue::Series(values)
                    }
                    None => FieldValue::Scalar(value.clone()),
                };
                dest.insert(field.clone(), stored);
            }

            // a sequence missing from an active poll repeats its last value
            for (field, stored) in dest.iter_mut() {
                let FieldValue::Series(values) = stored else {
                    continue;
                };
                if src.is_some_and(|src| src.contains_key(field)) {
                    continue;
                }
                if let Some(last) = values.last().cloned() {
                    values.push(last);
                }
            }
        }
    }
}

fn active_ticks(time: &[TimeEntry], name: &str) -> usize {
    time.iter()
        .filter(|entry| entry.channels.iter().any(|c| c == name))
        .count()
}

/// Compacted buffers of every channel that produced at least one sample.
///
/// Buffers of closed channels are kept until the process ends.
#[derive(Debug, Default)]
pub struct TimeSeriesCompactor {
    buffers: BTreeMap<ChannelId, CompactedBuffer>,
}

impl TimeSeriesCompactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `sample` into its channel's buffer, creating the buffer on the
    /// channel's first sample with the given session metadata.
    pub fn merge<F>(&mut self, sample: &Sample, extra: F) -> &CompactedBuffer
    where
        F: FnOnce() -> PeerMetadata,
    {
        let buffer = self
            .buffers
            .entry(sample.channel_id)
            .or_insert_with(|| CompactedBuffer::new(sample.channel_id, sample.client, extra()));
        buffer.merge(sample);
        buffer
    }

    pub fn get(&self, channel_id: ChannelId) -> Option<&CompactedBuffer> {
        self.buffers.get(&channel_id)
    }

    pub fn get_mut(&mut self, channel_id: ChannelId) -> Option<&mut CompactedBuffer> {
        self.buffers.get_mut(&channel_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelId, &CompactedBuffer)> {
        self.buffers.iter()
    }

    /// Copy of every buffer keyed by channel id.
    pub fn snapshot(&self) -> BTreeMap<ChannelId, CompactedBuffer> {
        self.buffers.clone()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
