//! Watches Certificate Transparency logs for certificates issued to
//! lookalikes of a protected domain.

#[macro_use]
extern crate lazy_static;

pub mod attacks;
pub mod certstream;
pub mod config;
pub mod constants;
pub mod error;
pub mod matcher;
pub mod permutation;
pub mod sink;

pub use attacks::Attack;
pub use certstream::{CertStream, CertStreamClient, CertStreamMessage, StreamConfig};
pub use config::Config;
pub use error::{ConfigError, DomainError, StreamError};
pub use matcher::{dispatch, DispatchStats, MatchMode, Matcher};
pub use permutation::CandidateSet;
pub use sink::{Event, EventSink, JsonLinesSink, WebhookSink};
