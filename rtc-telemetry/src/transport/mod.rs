//! Network client contract used to ship compacted telemetry.
//!
//! A transport first creates a remote test run with [`Transport::init`] and
//! then receives payload chunks with [`Transport::upload`]. Timeouts and
//! retries are the transport's and the caller's business; the collector
//! only reports failures.

#[cfg(feature = "https")]
mod https;

#[cfg(feature = "https")]
pub use https::HttpsTransport;

use crate::error::{Error, Result};
use crate::upload::UploadPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::str::FromStr;

/// Acknowledgement of an upload, holding the collector's response body.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Ack {
    pub body: Value,
}

/// Network client of the remote telemetry collector.
pub trait Transport {
    /// Creates a remote test run named `run_name` and returns its id.
    fn init(&mut self, run_name: &str) -> impl Future<Output = Result<String>> + Send;

    /// Sends one chunk of telemetry. `is_last_chunk` closes the test run.
    fn upload(
        &mut self,
        payload: &UploadPayload,
        is_last_chunk: bool,
    ) -> impl Future<Output = Result<Ack>> + Send;
}

const TRANSPORT_KIND_HTTPS_STR: &str = "https";
const TRANSPORT_KIND_WEBSOCKET_STR: &str = "websocket";

/// Wire protocol used to reach the collector.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    #[default]
    #[serde(rename = "https")]
    Https,
    /// Reserved, not implemented by any transport yet.
    #[serde(rename = "websocket")]
    WebSocket,
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            TRANSPORT_KIND_HTTPS_STR => Ok(TransportKind::Https),
            TRANSPORT_KIND_WEBSOCKET_STR => Ok(TransportKind::WebSocket),
            _ => Err(Error::ErrTransportNotImplemented(s.to_owned())),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            TransportKind::Https => TRANSPORT_KIND_HTTPS_STR,
            TransportKind::WebSocket => TRANSPORT_KIND_WEBSOCKET_STR,
        };
        write!(f, "{s}")
    }
}
