use crate::certstream::CertStreamMessage;
use crate::error::StreamError;
use crate::permutation::CandidateSet;
use crate::sink::{CertificateEvent, Event, EventSink, MatchEvent};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Emit an event for every certificate label found in the candidate set.
    #[default]
    Candidates,
    /// Skip matching and forward every certificate.
    CertificateOnly,
}

pub struct Matcher {
    candidates: Arc<CandidateSet>,
    mode: MatchMode,
}

impl Matcher {
    pub fn new(candidates: Arc<CandidateSet>, mode: MatchMode) -> Self {
        Self { candidates, mode }
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Turns one feed message into the events it should produce. Heartbeats
    /// and messages without certificate data produce nothing.
    pub fn evaluate(&self, record: &CertStreamMessage) -> Vec<Event> {
        if record.is_heartbeat() {
            return Vec::new();
        }
        let Some(data) = record.data.as_ref() else {
            return Vec::new();
        };

        let timestamp = Utc::now();

        if self.mode == MatchMode::CertificateOnly {
            return vec![Event::Certificate(CertificateEvent {
                timestamp,
                data: data.clone(),
            })];
        }

        let mut events = Vec::new();
        for certificate_domain in data.leaf_cert.domains() {
            let certificate_domain = certificate_domain.to_lowercase();
            for segment in certificate_domain.split('.') {
                if !self.candidates.contains(segment) {
                    continue;
                }
                info!(certificate_domain = %certificate_domain, "Found match for domain: {}", segment);
                events.push(Event::DomainMatch(MatchEvent {
                    timestamp,
                    domain: segment.to_string(),
                    original_domain: self.candidates.protected_domain().to_string(),
                    certificate_domain: certificate_domain.clone(),
                    data: data.clone(),
                }));
            }
        }
        events
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub records: u64,
    /// Every event handed to the sink.
    pub events: u64,
    /// Only `DomainMatch` events; stays zero in certificate-only mode.
    pub matches: u64,
    pub errors: u64,
}

/// Consumes feed records and feed errors one at a time, whichever arrives
/// first, until `shutdown` resolves or both inputs close. The sink is closed
/// on the way out.
pub async fn dispatch<S, F>(
    matcher: &Matcher,
    mut records: mpsc::Receiver<CertStreamMessage>,
    mut errors: mpsc::Receiver<StreamError>,
    sink: &mut S,
    shutdown: F,
) -> DispatchStats
where
    S: EventSink + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut stats = DispatchStats::default();
    let mut records_open = true;
    let mut errors_open = true;

    while records_open || errors_open {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested, stopping dispatcher");
                break;
            }
            record = records.recv(), if records_open => match record {
                Some(record) => {
                    stats.records += 1;
                    if record.is_heartbeat() {
                        debug!("certstream heartbeat");
                    }
                    for event in matcher.evaluate(&record) {
                        stats.events += 1;
                        if let Event::DomainMatch(_) = event {
                            stats.matches += 1;
                        }
                        sink.publish(event);
                    }
                }
                None => records_open = false,
            },
            error = errors.recv(), if errors_open => match error {
                Some(error) => {
                    stats.errors += 1;
                    warn!("certstream: {}", error);
                }
                None => errors_open = false,
            },
        }
    }

    sink.close();
    stats
}
