use anyhow::Result;
use clap::Parser;
use env_logger::Target;
use log::{error, info, trace};
use rand::Rng;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::Write;
use std::str::FromStr;
use std::time::{Duration, Instant};
use telemetry::channel::{ChannelId, SdpType, SessionDescription};
use telemetry::observer::{ConnectionObserver, IceConnectionState, StatsSnapshot};
use telemetry::transport::{Ack, HttpsTransport, Transport};
use telemetry::upload::UploadPayload;
use telemetry::{Collector, TelemetryConfig, TelemetryConfigBuilder};
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "monitor")]
#[command(author = "Rusty Rain <y@liu.mx>")]
#[command(version = "0.0.0")]
#[command(about = "Monitors simulated connections and uploads their compacted stats.")]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(short, long, default_value_t = format!("INFO"))]
    log_level: String,
    /// Collector API key. Without it payloads are only logged.
    #[arg(long, default_value_t = format!(""))]
    api_key: String,
    #[arg(long, default_value_t = format!(""))]
    api_url: String,
    #[arg(long, default_value_t = format!(""))]
    name: String,
    #[arg(long, default_value_t = 2)]
    channels: usize,
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
    /// Stop after this many ticks, 0 runs until Ctrl-C.
    #[arg(long, default_value_t = 10)]
    ticks: usize,
    /// Send an intermediate chunk every N ticks, 0 disables.
    #[arg(long, default_value_t = 0)]
    upload_every: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;
    if cli.debug {
        env_logger::Builder::new()
            .target(Target::Stdout)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{}:{} [{}] {} - {}",
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.level(),
                    chrono::Local::now().format("%H:%M:%S.%6f"),
                    record.args()
                )
            })
            .filter(None, log_level)
            .init();
    }

    let opts = RunOptions {
        channels: cli.channels,
        ticks: cli.ticks,
        upload_every: cli.upload_every,
    };
    let config = TelemetryConfigBuilder::new()
        .with_api_key(cli.api_key)
        .with_api_url(cli.api_url)
        .with_name(cli.name)
        .with_debug(cli.debug)
        .with_poll_interval(Duration::from_millis(cli.interval_ms))
        .build();
    if !config.inject {
        println!("monitoring disabled");
        return Ok(());
    }

    let (stop_tx, stop_rx) = broadcast::channel::<()>(1);

    println!("Press Ctrl-C to stop");
    std::thread::spawn(move || {
        let mut stop_tx = Some(stop_tx);
        ctrlc::set_handler(move || {
            if let Some(stop_tx) = stop_tx.take() {
                let _ = stop_tx.send(());
            }
        })
        .expect("Error setting Ctrl-C handler");
    });

    let result = if config.api_key.is_empty() {
        run(stop_rx, config, LoggingTransport::default(), &opts).await
    } else {
        let transport = HttpsTransport::new(&config)?;
        run(stop_rx, config, transport, &opts).await
    };
    if let Err(err) = result {
        eprintln!("run got error: {}", err);
    }

    Ok(())
}

struct RunOptions {
    channels: usize,
    ticks: usize,
    upload_every: usize,
}

async fn run<T: Transport>(
    mut stop_rx: broadcast::Receiver<()>,
    config: TelemetryConfig,
    transport: T,
    opts: &RunOptions,
) -> Result<()> {
    let mut collector = Collector::new(config, SimulatedObserver::default(), transport);
    let run_id = collector.init().await?;
    println!("test run {run_id} created");

    for _ in 0..opts.channels {
        let channel_id = collector.create_channel();
        println!("channel {channel_id} created");
    }

    let mut ticks = 0;
    'EventLoop: loop {
        let Some(eto) = collector.poll_timeout() else {
            break 'EventLoop;
        };
        let delay_from_now = eto
            .checked_duration_since(Instant::now())
            .unwrap_or(Duration::from_secs(0));

        let timer = tokio::time::sleep(delay_from_now);
        tokio::pin!(timer);

        tokio::select! {
            biased;

            _ = stop_rx.recv() => {
                trace!("monitor exit loop");
                break 'EventLoop;
            }
            _ = timer.as_mut() => {
                let Some(summary) = collector.handle_timeout(Instant::now()) else {
                    continue;
                };
                ticks += 1;
                info!(
                    "tick {}: polled {}, merged {}, failed {}",
                    ticks,
                    summary.polled,
                    summary.merged,
                    summary.failed()
                );

                // connections come up after the first poll
                if ticks == 1 {
                    for channel_id in collector.registry().list_active() {
                        collector
                            .notify_ice_connection_state(channel_id, IceConnectionState::Checking)?;
                        collector
                            .notify_ice_connection_state(channel_id, IceConnectionState::Connected)?;
                    }
                }

                if opts.upload_every > 0 && ticks % opts.upload_every == 0 {
                    if let Err(err) = collector.request_upload(false).await {
                        error!("intermediate upload failed: {}", err);
                    }
                }

                if opts.ticks > 0 && ticks >= opts.ticks {
                    break 'EventLoop;
                }
            }
        }
    }

    for channel_id in collector.registry().list_active() {
        collector.notify_channel_closed(channel_id);
    }
    collector.request_upload(true).await?;
    println!("test run {run_id} finalized after {ticks} ticks");

    Ok(())
}

/// Stands in for an instrumented media stack: every channel exposes one
/// audio send stream and one active candidate pair.
#[derive(Default)]
struct SimulatedObserver {
    bytes_sent: HashMap<ChannelId, u64>,
}

impl ConnectionObserver for SimulatedObserver {
    fn get_stats(&mut self, channel_id: ChannelId) -> Option<StatsSnapshot> {
        let mut rng = rand::rng();
        let bytes_sent = self.bytes_sent.entry(channel_id).or_default();
        *bytes_sent += rng.random_range(1000..2000);

        let send = format!("ssrc_{channel_id}_send");
        let cand = format!("Cand-{channel_id}");
        let report = json!({
            send: {
                "ssrc": channel_id.to_string(),
                "mediaType": "audio",
                "googCodecName": "opus",
                "bytesSent": bytes_sent.to_string(),
                "audioInputLevel": rng.random_range(0..100).to_string(),
            },
            "Conn-audio-1-0": {
                "type": "googCandidatePair",
                "googActiveConnection": "true",
                "googRtt": rng.random_range(10..40).to_string(),
                "localCandidateId": cand.clone(),
            },
            cand: {
                "type": "localcandidate",
                "ipAddress": "192.168.1.100",
                "candidateType": "host",
            },
        });

        match report {
            Value::Object(report) => Some(StatsSnapshot::new("webkit", report)),
            _ => None,
        }
    }

    fn local_description(&self, channel_id: ChannelId) -> Option<SessionDescription> {
        Some(SessionDescription::new(
            SdpType::Offer,
            format!("v=0\r\no=- {channel_id} 2 IN IP4 127.0.0.1\r\n"),
        ))
    }

    fn remote_description(&self, channel_id: ChannelId) -> Option<SessionDescription> {
        Some(SessionDescription::new(
            SdpType::Answer,
            format!("v=0\r\no=- {channel_id} 3 IN IP4 127.0.0.1\r\n"),
        ))
    }
}

/// Prints payloads instead of sending them.
#[derive(Default)]
struct LoggingTransport {
    chunks: usize,
}

impl Transport for LoggingTransport {
    async fn init(&mut self, run_name: &str) -> telemetry::Result<String> {
        info!("creating local test run {:?}", run_name);
        Ok(format!("local-{}", std::process::id()))
    }

    async fn upload(
        &mut self,
        payload: &UploadPayload,
        is_last_chunk: bool,
    ) -> telemetry::Result<Ack> {
        self.chunks += 1;
        let body = serde_json::to_string_pretty(payload)?;
        println!(
            "==== chunk {} (last: {}, {} bytes) ====\n{}",
            self.chunks,
            is_last_chunk,
            body.len(),
            body
        );
        Ok(Ack::default())
    }
}
