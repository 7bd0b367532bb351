//! Audit Anchor CLI
//!
//! Inspect blockchain anchors, fetch and verify Merkle inclusion proofs,
//! and export compliance reports from the audit service.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use audit_anchor::audit::{
    AnchorFilter, AnchorRecord, AnchorStatus, ProofInput, ProofVerifier, VerificationMode,
};
use audit_anchor::client::RecordKind;
use audit_anchor::export::{self, ExportRequest, ReportKind};
use audit_anchor::{AppConfig, AuditClient};

const EXIT_INVALID: i32 = 1;
const EXIT_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "audit-anchor")]
#[command(about = "Verify blockchain-anchored audit trails")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./audit-anchor.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Audit service base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect blockchain anchors
    #[command(subcommand)]
    Anchors(AnchorCommands),

    /// Fetch or verify inclusion proofs
    #[command(subcommand)]
    Proof(ProofCommands),

    /// Export a compliance report
    Export(ExportArgs),
}

#[derive(Subcommand)]
enum AnchorCommands {
    /// List anchors
    List {
        /// Filter by status (pending, submitted, confirmed, failed)
        #[arg(short, long)]
        status: Option<AnchorStatus>,

        /// Filter by network
        #[arg(short, long)]
        network: Option<String>,

        /// Page size
        #[arg(short, long)]
        limit: Option<u32>,

        /// Fetch every page instead of the first one
        #[arg(long)]
        all: bool,
    },

    /// Show one anchor
    Show {
        /// Anchor ID
        id: String,
    },

    /// Poll an anchor until it is confirmed or failed
    Watch {
        /// Anchor ID
        id: String,

        /// Seconds between polls
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ProofCommands {
    /// Fetch the inclusion proof for a record
    Fetch {
        /// Record ID
        record_id: String,

        /// Record type (audit-log, ai-audit-log)
        #[arg(short, long, default_value = "audit-log")]
        record_type: RecordKind,

        /// Save the proof document to this file instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify an inclusion proof given as JSON text or a path to a JSON file
    Verify {
        /// Proof JSON or path
        proof: ProofInput,

        /// Verify through the audit service, including the on-chain anchor
        #[arg(long)]
        remote: bool,

        /// Leaf count of the anchored batch, to check the proof's shape
        #[arg(long)]
        leaf_count: Option<u64>,
    },
}

#[derive(Args)]
struct ExportArgs {
    /// Report kind (audit-trail, eu-ai-act)
    kind: ReportKind,

    /// First day covered (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,

    /// Last day covered (YYYY-MM-DD)
    #[arg(long)]
    end: NaiveDate,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(EXIT_ERROR);
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("audit_anchor=debug")
    } else if quiet {
        EnvFilter::new("audit_anchor=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "audit_anchor=info".into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config =
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(timeout) = cli.timeout {
        config.request_timeout_secs = timeout;
    }
    config.validate()?;

    let client = AuditClient::from_config(&config)?;

    match cli.command {
        Commands::Anchors(command) => run_anchors(&client, &config, command).await,
        Commands::Proof(command) => run_proof(client, command).await,
        Commands::Export(args) => {
            let request = ExportRequest::new(args.kind, args.start, args.end);
            let path =
                export::export_report(&client, &request, args.output.as_deref(), &config.export_dir)
                    .await?;
            println!("Report saved to {}", path.display());
            Ok(0)
        }
    }
}

async fn run_anchors(
    client: &AuditClient,
    config: &AppConfig,
    command: AnchorCommands,
) -> Result<i32> {
    match command {
        AnchorCommands::List {
            status,
            network,
            limit,
            all,
        } => {
            let mut filter = AnchorFilter::new().with_limit(limit.unwrap_or(config.page_size()));
            if let Some(status) = status {
                filter = filter.with_status(status);
            }
            if let Some(network) = network {
                filter = filter.with_network(network);
            }

            if all {
                let anchors = client.list_all_anchors(&filter).await?;
                print_anchors(&anchors);
            } else {
                let page = client.list_anchors(&filter, 1).await?;
                print_anchors(&page.anchors);
                println!(
                    "\nPage {} of {} ({} anchors total)",
                    page.pagination.page, page.pagination.total_pages, page.pagination.total
                );
            }
            Ok(0)
        }

        AnchorCommands::Show { id } => {
            let anchor = client.get_anchor(&id).await?;
            print_anchor_details(&anchor);
            Ok(0)
        }

        AnchorCommands::Watch { id, interval } => {
            let period = interval
                .filter(|secs| *secs > 0)
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| config.poll_interval());
            let anchor = client.watch_anchor(&id, period).await?;
            print_anchor_details(&anchor);
            Ok(if anchor.status == AnchorStatus::Confirmed {
                0
            } else {
                EXIT_INVALID
            })
        }
    }
}

async fn run_proof(client: AuditClient, command: ProofCommands) -> Result<i32> {
    match command {
        ProofCommands::Fetch {
            record_id,
            record_type,
            output,
        } => {
            if let Some(path) = output {
                let document = client.fetch_proof_document(&record_id, record_type).await?;
                export::persist_document(&path, &document).await?;
                println!("Proof saved to {}", path.display());
            } else {
                let proof = client.fetch_proof(&record_id, record_type).await?;
                println!("{}", serde_json::to_string_pretty(&proof)?);
            }
            Ok(0)
        }

        ProofCommands::Verify {
            proof,
            remote,
            leaf_count,
        } => {
            let mode = if remote {
                VerificationMode::Remote
            } else {
                VerificationMode::Local
            };

            let parsed = proof.parse()?;
            if let Some(leaf_count) = leaf_count {
                for warning in parsed.shape_warnings(leaf_count) {
                    warn!("{}", warning);
                }
            }

            let verifier = ProofVerifier::new(client);
            let outcome = verifier.verify(&parsed, mode).await?;
            println!("{}", outcome.summary());

            Ok(if outcome.valid { 0 } else { EXIT_INVALID })
        }
    }
}

fn print_anchors(anchors: &[AnchorRecord]) {
    if anchors.is_empty() {
        println!("No anchors found");
        return;
    }

    println!(
        "{:<12} {:<10} {:<8} {:<16} {:<20} {:<20}",
        "ID", "Status", "Leaves", "Network", "Created", "Tx Hash"
    );
    println!("{}", "-".repeat(92));

    for anchor in anchors {
        println!(
            "{:<12} {:<10} {:<8} {:<16} {:<20} {:<20}",
            anchor.id,
            anchor.status,
            anchor.leaf_count,
            anchor.network,
            anchor.created_at.format("%Y-%m-%d %H:%M:%S"),
            anchor.tx_hash.as_deref().map(short_hash).unwrap_or("-")
        );
    }
}

fn print_anchor_details(anchor: &AnchorRecord) {
    println!("Anchor Details:");
    println!("  ID: {}", anchor.id);
    println!("  Status: {}", anchor.status);
    println!("  Merkle Root: {}", anchor.merkle_root_hex());
    println!("  Leaves: {}", anchor.leaf_count);
    println!("  Network: {}", anchor.network);
    println!("  Created: {}", anchor.created_at);
    if let Some(tx_hash) = &anchor.tx_hash {
        println!("  Tx Hash: {}", tx_hash);
    }
    if let Some(url) = &anchor.explorer_url {
        println!("  Explorer: {}", url);
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..18).unwrap_or(hash)
}
