use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use phishwatch::attacks::Attack;
use phishwatch::certstream::CertStreamClient;
use phishwatch::config::{Config, Overrides};
use phishwatch::matcher::{dispatch, Matcher};
use phishwatch::permutation::CandidateSet;
use phishwatch::sink::{JsonLinesSink, WebhookSink, DEFAULT_WEBHOOK_QUEUE};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const WEBHOOK_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "phishwatch")]
#[command(about = "Watches Certificate Transparency logs for typosquats of a protected domain")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream new certificates and report names that look like the protected domain
    Watch(WatchArgs),
    /// Print the lookalike labels generated for a domain
    Generate(GenerateArgs),
}

#[derive(Args)]
struct WatchArgs {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Protected domain (overrides the config file)
    #[arg(long)]
    domain: Option<String>,

    /// Certstream websocket endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Drop heartbeat messages in the stream client
    #[arg(long)]
    skip_heartbeats: bool,

    /// Forward every certificate without matching
    #[arg(long)]
    cert_only: bool,

    /// Comma-separated attacks to generate candidates with (default: all)
    #[arg(long, value_enum, value_delimiter = ',')]
    attacks: Option<Vec<Attack>>,

    /// POST events to this URL instead of printing them
    #[arg(long)]
    webhook: Option<String>,
}

#[derive(Args)]
struct GenerateArgs {
    /// Domain to generate variations for
    domain: String,

    /// Enable character addition at the end of the label
    #[arg(long)]
    addition: bool,

    /// Enable character omission variations
    #[arg(long)]
    omission: bool,

    /// Enable Unicode homoglyph variations
    #[arg(long)]
    homograph: bool,

    /// Enable subdomain (dot) injection variations
    #[arg(long)]
    subdomain: bool,

    /// Enable vowel swapping variations
    #[arg(long)]
    vowel_swap: bool,

    /// Enable repetition variations
    #[arg(long)]
    repetition: bool,

    /// Enable hyphenation variations
    #[arg(long)]
    hyphenation: bool,

    /// Enable keyboard proximity replacement variations
    #[arg(long)]
    replacement: bool,

    /// Enable bitsquatting variations
    #[arg(long)]
    bitsquatting: bool,

    /// Enable adjacent character transposition variations
    #[arg(long)]
    transposition: bool,

    /// Enable all variation types
    #[arg(long)]
    all: bool,

    /// Keep only variations that are valid LDH hostnames
    #[arg(long)]
    valid_only: bool,

    /// Maximum number of variations to output (unlimited if not specified)
    #[arg(long)]
    max_variations: Option<usize>,
}

impl GenerateArgs {
    fn attacks(&self) -> Vec<Attack> {
        let selected = [
            (self.addition, Attack::Addition),
            (self.omission, Attack::Omission),
            (self.homograph, Attack::Homograph),
            (self.subdomain, Attack::Subdomain),
            (self.vowel_swap, Attack::VowelSwap),
            (self.repetition, Attack::Repetition),
            (self.hyphenation, Attack::Hyphenation),
            (self.replacement, Attack::Replacement),
            (self.bitsquatting, Attack::Bitsquatting),
            (self.transposition, Attack::Transposition),
        ];

        let enable_all = self.all || selected.iter().all(|(enabled, _)| !enabled);
        if enable_all {
            return Attack::ALL.to_vec();
        }

        selected
            .into_iter()
            .filter_map(|(enabled, attack)| enabled.then_some(attack))
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("phishwatch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Watch(args) => watch(args).await,
        Command::Generate(args) => generate(args),
    }
}

fn generate(args: GenerateArgs) -> Result<()> {
    let mut candidates = CandidateSet::build_with(&args.domain, &args.attacks())
        .with_context(|| format!("cannot generate variations for {:?}", args.domain))?;
    if args.valid_only {
        candidates.retain_valid_hostnames();
    }

    let sorted_variations = candidates.sorted();
    let output_count = match args.max_variations {
        Some(max) => max.min(sorted_variations.len()),
        None => sorted_variations.len(),
    };

    for variation in sorted_variations.iter().take(output_count) {
        println!("{}", variation);
    }

    eprintln!("Generated {} variations", sorted_variations.len());
    Ok(())
}

async fn watch(args: WatchArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply(Overrides {
        domain: args.domain,
        endpoint: args.endpoint,
        skip_heartbeats: args.skip_heartbeats,
        cert_only: args.cert_only,
        attacks: args.attacks,
        webhook_url: args.webhook,
    });
    config.validate().context("invalid configuration")?;

    let candidates = config
        .candidate_set()
        .context("failed to build candidate set")?;
    info!(
        domain = candidates.protected_domain(),
        label = candidates.label(),
        candidates = candidates.len(),
        "protecting domain"
    );
    for candidate in candidates.sorted() {
        debug!("candidate: {}", candidate);
    }

    let matcher = Matcher::new(Arc::new(candidates), config.match_mode());
    let webhook = config.webhook_url()?;

    let stream = CertStreamClient::new(config.stream_config()).spawn();
    let (records, errors, client) = stream.into_parts();

    let stats = match webhook {
        Some(url) => {
            info!(url = %url, "publishing events to webhook");
            let mut sink = WebhookSink::new(url, DEFAULT_WEBHOOK_QUEUE)
                .context("failed to build webhook client")?;
            let stats = dispatch(&matcher, records, errors, &mut sink, shutdown_signal()).await;
            sink.finish_within(WEBHOOK_SHUTDOWN_GRACE).await;
            stats
        }
        None => {
            let mut sink = JsonLinesSink::stdout();
            dispatch(&matcher, records, errors, &mut sink, shutdown_signal()).await
        }
    };

    client.abort();
    info!(
        records = stats.records,
        events = stats.events,
        matches = stats.matches,
        errors = stats.errors,
        "stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Shutdown signal received, stopping");
}
