//! Proof Anchor CLI
//!
//! Anchors documents in the consensus log and verifies transaction
//! references against it. Results go to stdout as JSON, logs to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use proof_anchor::{
    core::{ContentHash, DocumentHasher},
    log::{mirror::MAX_PAGE_LIMIT, EntryPage, GatewayWriter, InMemoryLog, LogReader, MirrorNodeClient},
    notary::Notary,
    proof::{AnchorSubmitter, FingerprintComputer, ProofRecord},
    verify::{VerificationOrchestrator, Verdict},
    NotaryConfig, VERSION,
};

/// Anchor document fingerprints in a consensus log and verify them later.
#[derive(Debug, Parser)]
#[command(name = "proof-anchor", version, about, long_about = None)]
struct Cli {
    /// Log read service base URL
    #[arg(long, env = "MIRROR_NODE", global = true)]
    mirror_node: Option<String>,

    /// Log address (topic) to anchor to and list
    #[arg(long, env = "TOPIC_ID", global = true)]
    topic: Option<String>,

    /// Account id submissions are issued under
    #[arg(long, env = "ACCOUNT_ID", global = true)]
    account: Option<String>,

    /// Submission relay base URL
    #[arg(long, env = "SUBMIT_GATEWAY", global = true)]
    gateway: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fingerprint a file and anchor it
    Anchor {
        /// Document to anchor
        file: PathBuf,
    },
    /// Verify a transaction reference (exit code 0 only if valid)
    Verify {
        /// Transaction reference, `<account>@<seconds>.<nanos>`
        reference: String,
        /// Also check the anchored hash against this file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// List recent entries of the log address
    Messages {
        /// Number of entries to show (1-100, one page of the log service)
        #[arg(
            short,
            long,
            default_value_t = 10,
            value_parser = clap::value_parser!(u16).range(1..=MAX_PAGE_LIMIT as i64)
        )]
        limit: u16,
    },
    /// Print the content hash of a file
    Hash {
        /// Document to hash
        file: PathBuf,
    },
    /// Anchor and verify a generated document against an in-memory log
    Demo,
}

/// One decoded entry for `messages` output.
#[derive(Serialize)]
struct EntryView {
    sequence_number: u64,
    consensus_timestamp: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    proof: Option<ProofRecord>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!("Proof Anchor v{}", VERSION);

    match cli.command {
        Command::Anchor { file } => anchor(&config, &file).await,
        Command::Verify { reference, file } => verify(&config, &reference, file.as_deref()).await,
        Command::Messages { limit } => messages(&config, usize::from(limit)).await,
        Command::Hash { file } => {
            println!("{}", hash_file(&file).await?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Demo => demo(&config).await,
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn load_config(cli: &Cli) -> Result<NotaryConfig> {
    let mut config = NotaryConfig::from_env().context("Invalid configuration")?;

    if let Some(mirror_node) = &cli.mirror_node {
        config.mirror_node = mirror_node.clone();
    }
    if let Some(topic) = &cli.topic {
        config.topic_id = topic.clone();
    }
    if let Some(account) = &cli.account {
        config.account_id = Some(account.clone());
    }
    if let Some(gateway) = &cli.gateway {
        config.submit_gateway = Some(gateway.clone());
    }
    if let Some(secs) = cli.timeout {
        config.request_timeout = std::time::Duration::from_secs(secs);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn mirror_client(config: &NotaryConfig) -> Result<MirrorNodeClient> {
    MirrorNodeClient::with_timeout(&config.mirror_node, config.request_timeout)
        .context("Failed to create mirror node client")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn anchor(config: &NotaryConfig, file: &Path) -> Result<ExitCode> {
    let account = config.require_account()?;
    let gateway = config.require_gateway()?;

    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let writer = GatewayWriter::with_timeout(gateway, config.request_timeout)
        .context("Failed to create gateway writer")?;
    let notary = Notary::new(
        FingerprintComputer::new(account),
        AnchorSubmitter::new(Arc::new(writer), &config.topic_id)
            .with_timeout(config.request_timeout),
        VerificationOrchestrator::with_config(Arc::new(mirror_client(config)?), config.verify_config()),
    );

    let anchored = notary.anchor(&name, &bytes).await?;
    print_json(&anchored)?;
    Ok(ExitCode::SUCCESS)
}

async fn verify(config: &NotaryConfig, reference: &str, file: Option<&Path>) -> Result<ExitCode> {
    let orchestrator =
        VerificationOrchestrator::with_config(Arc::new(mirror_client(config)?), config.verify_config());

    let mut verdict = orchestrator.verify(reference).await;
    if let Some(file) = file {
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        verdict = verdict.confirm_document(&bytes);
    }

    print_json(&verdict)?;
    Ok(exit_code(&verdict))
}

async fn messages(config: &NotaryConfig, limit: usize) -> Result<ExitCode> {
    let client = mirror_client(config)?;
    let entries = client
        .fetch_recent_entries(&config.topic_id, &EntryPage::latest(limit))
        .await
        .with_context(|| format!("Failed to list messages of {}", config.topic_id))?;

    let views: Vec<EntryView> = entries
        .iter()
        .map(|entry| {
            let message = BASE64
                .decode(&entry.payload_base64)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_else(|_| entry.payload_base64.clone());
            EntryView {
                sequence_number: entry.sequence_number,
                consensus_timestamp: entry.consensus_timestamp.to_string(),
                message,
                proof: ProofRecord::from_base64(&entry.payload_base64).ok(),
            }
        })
        .collect();

    print_json(&views)?;
    Ok(ExitCode::SUCCESS)
}

async fn hash_file(file: &Path) -> Result<ContentHash> {
    let mut reader = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let mut hasher = DocumentHasher::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize())
}

/// Offline self-check: anchor, verify, then verify a tampered copy.
async fn demo(config: &NotaryConfig) -> Result<ExitCode> {
    let account = config.account_id.as_deref().unwrap_or("0.0.1001");
    let log = Arc::new(InMemoryLog::new(account));
    let notary = Notary::over(log.clone(), account, &config.topic_id, config.verify_config());

    // Foreign traffic on the same log address
    for i in 0..3 {
        log.append_payload(&config.topic_id, format!("unrelated message {i}").as_bytes());
    }

    let document = format!("Demo document generated by proof-anchor v{VERSION}\n");
    let anchored = notary.anchor("demo.txt", document.as_bytes()).await?;
    info!("Anchored as {}", anchored.reference.external_tx_id);
    print_json(&anchored)?;

    let verdict = notary
        .verify_document(&anchored.reference.external_tx_id, document.as_bytes())
        .await;
    print_json(&verdict)?;

    let tampered = notary
        .verify_document(&anchored.reference.external_tx_id, b"tampered")
        .await;
    if tampered.is_valid() {
        warn!("Tampered document passed verification");
        return Ok(ExitCode::FAILURE);
    }

    info!(
        "Tampered copy rejected: {:?}",
        tampered.failure_reason()
    );
    Ok(exit_code(&verdict))
}

fn exit_code(verdict: &Verdict) -> ExitCode {
    if verdict.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_messages_limit_bounds() {
        let cli = Cli::try_parse_from(["proof-anchor", "messages", "--limit", "100"]).unwrap();
        assert!(matches!(cli.command, Command::Messages { limit: 100 }));

        let cli = Cli::try_parse_from(["proof-anchor", "messages"]).unwrap();
        assert!(matches!(cli.command, Command::Messages { limit: 10 }));

        assert!(Cli::try_parse_from(["proof-anchor", "messages", "--limit", "101"]).is_err());
        assert!(Cli::try_parse_from(["proof-anchor", "messages", "--limit", "0"]).is_err());
    }
}
