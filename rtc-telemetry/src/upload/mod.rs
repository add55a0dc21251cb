//! Upload coordination.
//!
//! The coordinator owns the transport and the finalize-once state of the
//! remote test run. A final upload that succeeds closes the run; any later
//! final upload is refused without reaching the network.


use crate::channel::ChannelId;
use crate::compactor::CompactedBuffer;
use crate::error::{Error, Result};
use crate::transport::Transport;
use log::{debug, error};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Snapshot of every channel's buffer, serialized as a JSON object keyed
/// by channel id.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UploadPayload(BTreeMap<ChannelId, CompactedBuffer>);

impl UploadPayload {
    pub fn new(buffers: BTreeMap<ChannelId, CompactedBuffer>) -> Self {
        Self(buffers)
    }

    pub fn get(&self, channel_id: ChannelId) -> Option<&CompactedBuffer> {
        self.0.get(&channel_id)
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelId> {
        self.0.keys()
    }

    pub fn buffers(&self) -> &BTreeMap<ChannelId, CompactedBuffer> {
        &self.0
    }

    pub fn into_inner(self) -> BTreeMap<ChannelId, CompactedBuffer> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<ChannelId, CompactedBuffer>> for UploadPayload {
    fn from(buffers: BTreeMap<ChannelId, CompactedBuffer>) -> Self {
        Self(buffers)
    }
}

/// State of the remote test run.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum UploadState {
    #[default]
    Open,
    Finalized,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            UploadState::Open => "open",
            UploadState::Finalized => "finalized",
        };
        write!(f, "{s}")
    }
}

/// Enforces that a test run is finalized at most once.
#[derive(Debug)]
pub struct UploadCoordinator<T: Transport> {
    transport: T,
    state: UploadState,
    run_id: Option<String>,
}

impl<T: Transport> UploadCoordinator<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: UploadState::Open,
            run_id: None,
        }
    }

    /// Creates the remote test run.
    pub async fn init(&mut self, run_name: &str) -> Result<String> {
        let run_id = self.transport.init(run_name).await.inspect_err(|err| {
            error!("failed to create test run {run_name:?}: {err}");
        })?;
        debug!("test run {run_name:?} created with id {run_id}");
        self.run_id = Some(run_id.clone());
        Ok(run_id)
    }

    /// Sends `payload`. With `is_final` a successful upload finalizes the
    /// run; a failed one leaves the state untouched so the caller may retry.
    pub async fn upload(&mut self, payload: &UploadPayload, is_final: bool) -> Result<()> {
        if is_final && self.state == UploadState::Finalized {
            debug!("final upload refused, test run already finalized");
            return Err(Error::ErrAlreadyFinalized);
        }

        match self.transport.upload(payload, is_final).await {
            Ok(_) => {
                debug!(
                    "uploaded {} channels (final: {})",
                    payload.len(),
                    is_final
                );
                if is_final {
                    self.state = UploadState::Finalized;
                }
                Ok(())
            }
            Err(err) => {
                error!("upload of {} channels failed: {}", payload.len(), err);
                Err(err)
            }
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state == UploadState::Finalized
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
