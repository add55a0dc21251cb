//! # RTC Telemetry - Connection Statistics Collector and Compactor
//!
//! Periodically polls the statistics of monitored real-time communication
//! connections, compacts them into diff-encoded time series and ships them
//! to a remote collector.
//!
//! ## Data Flow
//!
//! ```text
//! ConnectionObserver ──get_stats──▶ ingest ──Sample──▶ compactor ──CompactedBuffer──┐
//!                                                                                    │
//!                            Transport ◀──UploadPayload── upload coordinator ◀──────┘
//! ```
//!
//! - [`observer::ConnectionObserver`] is implemented by the platform adapter
//!   that hooks connection creation and exposes raw statistics reports
//! - [`ingest::ingest`] keeps only the subchannels a report format is known
//!   to expose
//! - [`compactor::TimeSeriesCompactor`] stores a field once while it stays
//!   constant and as a sequence after its first change
//! - [`upload::UploadCoordinator`] guarantees a test run is finalized once
//! - [`transport::Transport`] ships the payload; an HTTPS implementation is
//!   available behind the `https` feature
//!
//! Everything is tied together by [`collector::Collector`], an owned
//! session object with no global state. It never performs I/O on its own
//! except through the injected transport, and it never sleeps: the host
//! schedules ticks either directly with [`collector::Collector::collect_tick`]
//! or through the `poll_timeout` / `handle_timeout` pair.
//!
//! ## Wire Format
//!
//! Each channel's buffer serializes as
//!
//! ```json
//! {
//!   "channelId": 0,
//!   "time": [{"timestamp": 1700000000000, "channels": ["ssrc_1_send"]}],
//!   "stat": {"ssrc_1_send": {"ssrc": "1", "bytesSent": [100, 250]}},
//!   "extra": {"localDescription": {"type": "offer", "sdp": "v=0..."}},
//!   "client": "webkit"
//! }
//! ```
//!
//! and an upload payload is a JSON object of buffers keyed by channel id.

#![warn(rust_2018_idioms)]

#[macro_use]
extern crate lazy_static;

pub mod channel;
pub mod collector;
pub mod compactor;
pub mod config;
pub mod error;
pub mod ingest;
pub mod observer;
pub mod transport;
pub mod upload;

pub use collector::{Collector, TickSummary};
pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::{Error, Result};
