use crate::certstream::CertificateUpdate;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_WEBHOOK_QUEUE: usize = 1024;

/// A certificate whose names include a lookalike of the protected domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchEvent {
    pub timestamp: DateTime<Utc>,
    /// The label that matched a candidate.
    pub domain: String,
    pub original_domain: String,
    /// The certificate name the label was found in.
    pub certificate_domain: String,
    pub data: CertificateUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateEvent {
    pub timestamp: DateTime<Utc>,
    pub data: CertificateUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    DomainMatch(MatchEvent),
    Certificate(CertificateEvent),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::DomainMatch(_) => "domain_match",
            Event::Certificate(_) => "certificate",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::DomainMatch(event) => event.timestamp,
            Event::Certificate(event) => event.timestamp,
        }
    }
}

/// Destination for events. Delivery is fire-and-forget: implementations log
/// their own failures instead of returning them.
pub trait EventSink: Send {
    fn publish(&mut self, event: Event);

    fn close(&mut self) {}
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_event(&mut self, event: &Event) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn publish(&mut self, event: Event) {
        if let Err(e) = self.write_event(&event) {
            warn!("failed to write {} event: {}", event.kind(), e);
        }
    }

    fn close(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("failed to flush event output: {}", e);
        }
    }
}

/// POSTs each event as JSON to a webhook. Events are queued and delivered by
/// a background task, so this must be created inside a tokio runtime.
pub struct WebhookSink {
    queue: Option<mpsc::Sender<Event>>,
    worker: JoinHandle<()>,
}

impl WebhookSink {
    pub fn new(url: Url, capacity: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .user_agent(concat!("phishwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let (queue, pending) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(deliver(client, url, pending));

        Ok(Self {
            queue: Some(queue),
            worker,
        })
    }

    /// Waits for queued events to be delivered after `close`.
    pub async fn finished(mut self) {
        self.queue.take();
        if let Err(e) = self.worker.await {
            warn!("webhook delivery task failed: {}", e);
        }
    }

    /// Like `finished`, but gives up after `grace` and drops whatever is still
    /// queued. Returns whether every queued event was attempted.
    pub async fn finish_within(mut self, grace: Duration) -> bool {
        self.queue.take();
        match timeout(grace, &mut self.worker).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("webhook delivery task failed: {}", e);
                true
            }
            Err(_) => {
                self.worker.abort();
                warn!(grace = ?grace, "webhook delivery did not finish in time, dropping queued events");
                false
            }
        }
    }
}

impl EventSink for WebhookSink {
    fn publish(&mut self, event: Event) {
        let Some(queue) = self.queue.as_ref() else {
            warn!("webhook sink is closed, dropping {} event", event.kind());
            return;
        };

        match queue.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("webhook queue full, dropping {} event", event.kind());
            }
            Err(TrySendError::Closed(event)) => {
                warn!("webhook worker stopped, dropping {} event", event.kind());
            }
        }
    }

    fn close(&mut self) {
        self.queue.take();
    }
}

async fn deliver(client: reqwest::Client, url: Url, mut pending: mpsc::Receiver<Event>) {
    while let Some(event) = pending.recv().await {
        match client.post(url.clone()).json(&event).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(status = %response.status(), "delivered {} event", event.kind());
            }
            Ok(response) => {
                warn!(status = %response.status(), "webhook rejected {} event", event.kind());
            }
            Err(e) => {
                warn!("failed to deliver {} event to webhook: {}", event.kind(), e);
            }
        }
    }
}
