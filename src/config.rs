use crate::attacks::Attack;
use crate::certstream::{DecodeFailurePolicy, ReconnectPolicy, StreamConfig, DEFAULT_ENDPOINT};
use crate::error::ConfigError;
use crate::matcher::MatchMode;
use crate::permutation::{normalize_domain, CandidateSet};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_DOMAIN: &str = "example.com";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The protected domain.
    pub domain: String,
    pub certstream: CertStreamSettings,
    pub permutations: PermutationSettings,
    pub sink: SinkSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CertStreamSettings {
    pub endpoint: String,
    pub skip_heartbeats: bool,
    /// Forward every certificate instead of matching.
    pub cert_only: bool,
    pub ping_interval_secs: u64,
    pub read_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub backoff_secs: u64,
    pub decode_failure: DecodeFailurePolicy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermutationSettings {
    pub attacks: Vec<Attack>,
    pub valid_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkSettings {
    pub webhook_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            certstream: CertStreamSettings::default(),
            permutations: PermutationSettings::default(),
            sink: SinkSettings::default(),
        }
    }
}

impl Default for CertStreamSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            skip_heartbeats: false,
            cert_only: false,
            ping_interval_secs: 15,
            read_timeout_secs: 15,
            connect_timeout_secs: 15,
            backoff_secs: 5,
            decode_failure: DecodeFailurePolicy::default(),
        }
    }
}

impl Default for PermutationSettings {
    fn default() -> Self {
        Self {
            attacks: Attack::ALL.to_vec(),
            valid_only: false,
        }
    }
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub domain: Option<String>,
    pub endpoint: Option<String>,
    pub skip_heartbeats: bool,
    pub cert_only: bool,
    pub attacks: Option<Vec<Attack>>,
    pub webhook_url: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Flags only ever switch a boolean on; an unset flag leaves the file
    /// value alone.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(domain) = overrides.domain {
            self.domain = domain;
        }
        if let Some(endpoint) = overrides.endpoint {
            self.certstream.endpoint = endpoint;
        }
        if overrides.skip_heartbeats {
            self.certstream.skip_heartbeats = true;
        }
        if overrides.cert_only {
            self.certstream.cert_only = true;
        }
        if let Some(attacks) = overrides.attacks {
            self.permutations.attacks = attacks;
        }
        if let Some(url) = overrides.webhook_url {
            self.sink.webhook_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_domain(&self.domain)?;
        self.endpoint()?;
        self.webhook_url()?;

        let durations = [
            ("certstream.ping_interval_secs", self.certstream.ping_interval_secs),
            ("certstream.read_timeout_secs", self.certstream.read_timeout_secs),
            ("certstream.connect_timeout_secs", self.certstream.connect_timeout_secs),
            ("certstream.backoff_secs", self.certstream.backoff_secs),
        ];
        for (name, secs) in durations {
            if secs == 0 {
                return Err(ConfigError::ZeroDuration(name));
            }
        }

        Ok(())
    }

    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let endpoint = &self.certstream.endpoint;
        let invalid = |reason: String| ConfigError::Endpoint {
            endpoint: endpoint.clone(),
            reason,
        };

        let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(invalid(format!("scheme must be ws or wss, got {}", other))),
        }
    }

    pub fn webhook_url(&self) -> Result<Option<Url>, ConfigError> {
        let Some(raw) = self.sink.webhook_url.as_deref() else {
            return Ok(None);
        };
        let invalid = |reason: String| ConfigError::Webhook {
            url: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(Some(url)),
            other => Err(invalid(format!("scheme must be http or https, got {}", other))),
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        let settings = &self.certstream;
        StreamConfig {
            skip_heartbeats: settings.skip_heartbeats,
            ping_interval: Duration::from_secs(settings.ping_interval_secs),
            read_timeout: Duration::from_secs(settings.read_timeout_secs),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            reconnect: ReconnectPolicy {
                backoff: Duration::from_secs(settings.backoff_secs),
                max_attempts: None,
            },
            on_decode_failure: settings.decode_failure,
            ..StreamConfig::new(settings.endpoint.clone())
        }
    }

    pub fn match_mode(&self) -> MatchMode {
        if self.certstream.cert_only {
            MatchMode::CertificateOnly
        } else {
            MatchMode::Candidates
        }
    }

    pub fn candidate_set(&self) -> Result<CandidateSet, ConfigError> {
        let mut candidates = CandidateSet::build_with(&self.domain, &self.permutations.attacks)?;
        if self.permutations.valid_only {
            candidates.retain_valid_hostnames();
        }
        Ok(candidates)
    }
}
