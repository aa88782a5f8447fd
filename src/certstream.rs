//! Certstream feed client.
//!
//! Keeps a websocket open to a certstream-compatible Certificate
//! Transparency feed and hands decoded messages to the caller over a
//! channel. Faults never end the client: each one is reported on a second
//! channel, the socket is dropped, and the client reconnects after a fixed
//! backoff.

use crate::error::StreamError;
use futures::stream::SplitStream;
use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, timeout_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

pub const DEFAULT_ENDPOINT: &str = "wss://certstream.calidog.io";
pub const HEARTBEAT: &str = "heartbeat";
pub const CERTIFICATE_UPDATE: &str = "certificate_update";

const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(15);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One message from the feed, either a heartbeat or a certificate update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertStreamMessage {
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CertificateUpdate>,
}

impl CertStreamMessage {
    pub fn is_heartbeat(&self) -> bool {
        self.message_type == HEARTBEAT
    }

    /// Every name on the leaf certificate, or nothing for heartbeats.
    pub fn domains(&self) -> Vec<&str> {
        self.data
            .as_ref()
            .map(|data| data.leaf_cert.domains())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateUpdate {
    #[serde(deserialize_with = "null_as_default")]
    pub update_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub leaf_cert: LeafCertificate,
    #[serde(deserialize_with = "null_as_default")]
    pub chain: Vec<ChainCertificate>,
    #[serde(deserialize_with = "null_as_default")]
    pub cert_index: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_link: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub seen: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub source: LogSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeafCertificate {
    #[serde(deserialize_with = "null_as_default")]
    pub subject: Subject,
    #[serde(deserialize_with = "null_as_default")]
    pub extensions: BTreeMap<String, serde_json::Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub not_before: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub not_after: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub serial_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_der: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub all_domains: Vec<String>,
}

impl LeafCertificate {
    /// Subject alternative names plus the common name when the feed left it
    /// out of `all_domains`.
    pub fn domains(&self) -> Vec<&str> {
        let mut domains: Vec<&str> = self.all_domains.iter().map(String::as_str).collect();
        if let Some(common_name) = self.subject.common_name.as_deref() {
            if !domains.contains(&common_name) {
                domains.push(common_name);
            }
        }
        domains
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainCertificate {
    #[serde(deserialize_with = "null_as_default")]
    pub subject: Subject,
    #[serde(deserialize_with = "null_as_default")]
    pub extensions: BTreeMap<String, serde_json::Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub not_before: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub not_after: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub serial_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_der: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subject {
    pub aggregated: Option<String>,
    #[serde(rename = "C")]
    pub country: Option<String>,
    #[serde(rename = "ST")]
    pub state: Option<String>,
    #[serde(rename = "L")]
    pub locality: Option<String>,
    #[serde(rename = "O")]
    pub organization: Option<String>,
    #[serde(rename = "OU")]
    pub organizational_unit: Option<String>,
    #[serde(rename = "CN")]
    pub common_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSource {
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

// The feed sends `null` for absent values as often as it omits the key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// What to do with a message that fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeFailurePolicy {
    /// Treat it like a transport fault: drop the socket and reconnect.
    #[default]
    Reconnect,
    /// Report it and keep reading from the same connection.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub backoff: Duration,
    /// Connection attempts before the client gives up. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            backoff: DEFAULT_BACKOFF,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub endpoint: String,
    pub skip_heartbeats: bool,
    pub ping_interval: Duration,
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub on_decode_failure: DecodeFailurePolicy,
    pub channel_capacity: usize,
}

impl StreamConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            skip_heartbeats: false,
            ping_interval: DEFAULT_PING_INTERVAL,
            read_timeout: DEFAULT_READ_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            on_decode_failure: DecodeFailurePolicy::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

/// The two output sequences of a running client plus its task handle.
pub struct CertStream {
    pub records: mpsc::Receiver<CertStreamMessage>,
    pub errors: mpsc::Receiver<StreamError>,
    task: JoinHandle<()>,
}

impl CertStream {
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<CertStreamMessage>,
        mpsc::Receiver<StreamError>,
        JoinHandle<()>,
    ) {
        (self.records, self.errors, self.task)
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

enum ConnectionState {
    Connecting,
    Streaming(Box<Socket>),
    Disconnected,
}

enum Delivery {
    Disconnected,
    ReceiverDropped,
}

pub struct CertStreamClient {
    config: StreamConfig,
}

impl CertStreamClient {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    /// Starts the connection task. It runs until the record receiver is
    /// dropped or, when configured, the attempt budget is used up.
    pub fn spawn(self) -> CertStream {
        let capacity = self.config.channel_capacity.max(1);
        let (record_tx, records) = mpsc::channel(capacity);
        let (error_tx, errors) = mpsc::channel(capacity);
        let task = tokio::spawn(self.run(record_tx, error_tx));

        CertStream {
            records,
            errors,
            task,
        }
    }

    async fn run(
        self,
        records: mpsc::Sender<CertStreamMessage>,
        errors: mpsc::Sender<StreamError>,
    ) {
        let mut attempts: u32 = 0;
        let mut state = ConnectionState::Connecting;

        loop {
            state = match state {
                ConnectionState::Connecting => {
                    if let Some(max) = self.config.reconnect.max_attempts {
                        if attempts >= max {
                            info!(attempts, "certstream attempt budget exhausted, stopping");
                            return;
                        }
                    }
                    attempts += 1;

                    debug!(attempt = attempts, endpoint = %self.config.endpoint, "connecting to certstream");
                    match self.connect().await {
                        Ok(socket) => {
                            info!(endpoint = %self.config.endpoint, "connected to certstream");
                            ConnectionState::Streaming(Box::new(socket))
                        }
                        Err(error) => {
                            report(&errors, error);
                            ConnectionState::Disconnected
                        }
                    }
                }
                ConnectionState::Streaming(socket) => {
                    match self.stream(*socket, &records, &errors).await {
                        Delivery::Disconnected => ConnectionState::Disconnected,
                        Delivery::ReceiverDropped => {
                            info!("certstream record receiver dropped, stopping");
                            return;
                        }
                    }
                }
                ConnectionState::Disconnected => {
                    if records.is_closed() {
                        return;
                    }
                    debug!(backoff = ?self.config.reconnect.backoff, "waiting before reconnecting to certstream");
                    sleep(self.config.reconnect.backoff).await;
                    ConnectionState::Connecting
                }
            };
        }
    }

    async fn connect(&self) -> Result<Socket, StreamError> {
        let endpoint = self.config.endpoint.as_str();
        match timeout(self.config.connect_timeout, connect_async(endpoint)).await {
            Err(_) => Err(StreamError::ConnectTimeout(self.config.connect_timeout)),
            Ok(Err(source)) => Err(StreamError::Connect {
                endpoint: endpoint.to_string(),
                source,
            }),
            Ok(Ok((socket, _response))) => Ok(socket),
        }
    }

    async fn stream(
        &self,
        socket: Socket,
        records: &mpsc::Sender<CertStreamMessage>,
        errors: &mpsc::Sender<StreamError>,
    ) -> Delivery {
        let (sink, mut source) = socket.split();
        let (stop_tx, stop_rx) = oneshot::channel();
        let liveness = tokio::spawn(keep_alive(
            sink,
            self.config.ping_interval,
            self.config.connect_timeout,
            errors.clone(),
            stop_rx,
        ));

        let delivery = self.read_messages(&mut source, records, errors).await;

        let _ = stop_tx.send(());
        if let Err(e) = liveness.await {
            warn!("certstream keepalive task failed: {}", e);
        }

        delivery
    }

    async fn read_messages(
        &self,
        source: &mut SplitStream<Socket>,
        records: &mpsc::Sender<CertStreamMessage>,
        errors: &mpsc::Sender<StreamError>,
    ) -> Delivery {
        let mut last_message = Instant::now();

        loop {
            let payload = match next_payload(source, self.config.read_timeout).await {
                Ok(payload) => payload,
                Err(error) => {
                    debug!(since_last_message = ?last_message.elapsed(), "certstream connection lost: {}", error);
                    report(errors, error);
                    return Delivery::Disconnected;
                }
            };
            last_message = Instant::now();

            let message: CertStreamMessage = match serde_json::from_slice(&payload) {
                Ok(message) => message,
                Err(e) => {
                    report(errors, StreamError::Decode(e));
                    match self.config.on_decode_failure {
                        DecodeFailurePolicy::Reconnect => return Delivery::Disconnected,
                        DecodeFailurePolicy::Skip => continue,
                    }
                }
            };

            if self.config.skip_heartbeats && message.is_heartbeat() {
                continue;
            }

            if records.send(message).await.is_err() {
                return Delivery::ReceiverDropped;
            }
        }
    }
}

// Waits for the next data frame. Control frames do not extend the deadline.
async fn next_payload(
    source: &mut SplitStream<Socket>,
    read_timeout: Duration,
) -> Result<Vec<u8>, StreamError> {
    let deadline = Instant::now() + read_timeout;

    loop {
        let frame = match timeout_at(deadline, source.next()).await {
            Err(_) => return Err(StreamError::ReadTimeout(read_timeout)),
            Ok(None) => return Err(StreamError::Closed),
            Ok(Some(Err(e))) => return Err(StreamError::Read(e)),
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => return Ok(text.into_bytes()),
            Message::Binary(bytes) => return Ok(bytes),
            Message::Close(_) => return Err(StreamError::Closed),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        }
    }
}

// Sole writer on the socket for the lifetime of one connection.
async fn keep_alive<S>(
    mut sink: S,
    period: Duration,
    write_timeout: Duration,
    errors: mpsc::Sender<StreamError>,
    mut stop: oneshot::Receiver<()>,
) where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let sent = match timeout(write_timeout, sink.send(Message::Ping(Vec::new()))).await {
                    Ok(result) => result,
                    Err(_) => Err(tungstenite::Error::Io(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "ping write timed out",
                    ))),
                };
                if let Err(e) = sent {
                    report(&errors, StreamError::Ping(e));
                }
            }
            _ = &mut stop => break,
        }
    }

    if timeout(write_timeout, sink.close()).await.is_err() {
        debug!("timed out closing certstream socket");
    }
}

// Errors are observability only, so a full or closed error channel never
// holds up the record path.
fn report(errors: &mpsc::Sender<StreamError>, error: StreamError) {
    match errors.try_send(error) {
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(error)) => {
            warn!("certstream error channel full, dropping: {}", error);
        }
    }
}
