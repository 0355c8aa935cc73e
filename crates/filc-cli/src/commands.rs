//! Command implementations

use crate::state::AppState;
use anyhow::Context;
use chrono::Local;
use clap::Subcommand;
use filc_blockstore::{parse_cid, FlexibleBlockStore, Importer};
use filc_core::{
    DealEvent, DealRecord, DealStore, NewContent, ProviderAddress, ProviderClient, ProviderStats,
    QueryResponse, StorageAsk, TransferStatusCode,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, watch};
use tracing::debug;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a file or directory and make a storage deal for it
    Deal {
        path: PathBuf,
        /// Provider to deal with; the best ranked provider when omitted
        #[arg(long)]
        provider: Option<String>,
        /// Use verified deal pricing
        #[arg(long)]
        verified: bool,
    },
    /// Show a provider's storage ask
    GetAsk { provider: String },
    /// Ask a provider whether it can serve a root
    QueryRetrieval {
        cid: String,
        #[arg(long)]
        provider: String,
    },
    /// List recorded deals
    List,
    /// Rank providers by deal success
    Rank,
    /// Classify a root in the local block store as file or directory
    Classify { cid: String },
    /// Delete the local block store
    ClearBlockstore,
}

/// Run one command to completion
pub async fn run(
    state: &AppState,
    command: Command,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    match command {
        Command::Deal {
            path,
            provider,
            verified,
        } => deal(state, &path, provider.as_deref(), verified, shutdown).await,
        Command::GetAsk { provider } => {
            let provider: ProviderAddress = provider.parse()?;
            let ask = state.client.get_ask(&provider).await?;
            print!("{}", format_ask(&ask));
            Ok(())
        }
        Command::QueryRetrieval { cid, provider } => {
            let provider: ProviderAddress = provider.parse()?;
            let root = parse_cid(&cid)?;
            let query = state.client.retrieval_query(&provider, &root).await?;
            print!("{}", format_query(&query));
            Ok(())
        }
        Command::List => {
            let deals = state.deals.all_deals().await?;
            print!("{}", format_deals(&deals));
            Ok(())
        }
        Command::Rank => {
            let stats = state.ranker.ranked_stats().await?;
            print!("{}", format_ranking(&stats));
            Ok(())
        }
        Command::Classify { cid } => {
            let root = parse_cid(&cid)?;
            let content_type = state.catalog.classify_content(Some(&root)).await;
            println!("{}: {}", root, content_type);
            Ok(())
        }
        Command::ClearBlockstore => {
            let FlexibleBlockStore::Fs(store) = state.blockstore.as_ref() else {
                anyhow::bail!("clear-blockstore only applies to the local block store");
            };
            println!("clearing blockstore...");
            store.clear().await?;
            println!("done");
            Ok(())
        }
    }
}

/// Print with a wall-clock prefix
fn tpr(msg: impl AsRef<str>) {
    println!("[{}] {}", Local::now().format("%H:%M:%S"), msg.as_ref());
}

async fn deal(
    state: &AppState,
    path: &Path,
    provider: Option<&str>,
    verified: bool,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let provider = provider.map(str::parse::<ProviderAddress>).transpose()?;

    tpr("importing file...");
    let importer = Importer::with_config(&*state.blockstore, state.config.chunker_config()?);
    let imported = importer
        .import_path(path)
        .await
        .with_context(|| format!("importing {}", path.display()))?;
    tpr(format!("File CID: {}", imported.root));

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content_id = state
        .catalog
        .add_classified_content(NewContent::new(imported.root, name, imported.size))
        .await;
    debug!(content_id, blocks = imported.blocks, "content recorded");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            tpr(describe_event(&event));
        }
    });

    let orchestrator = state.orchestrator(shutdown).with_events(tx);
    let result = orchestrator.make_deal(provider, imported.root, verified).await;
    drop(orchestrator);
    let _ = printer.await;

    let outcome = result?;
    tpr(format!(
        "transfer completed, provider: {}, propcid: {} {}",
        outcome.provider, outcome.provider_proposal, outcome.proposal_cid
    ));
    Ok(())
}

/// One progress line per deal event
pub fn describe_event(event: &DealEvent) -> String {
    match event {
        DealEvent::ProposalSubmitted {
            record_id,
            proposal_cid,
            provider,
        } => format!("proposal cid: {} (deal {} with {})", proposal_cid, record_id, provider),
        DealEvent::ProposalAccepted { state } => {
            format!("provider accepted the deal! (state {})", state.code())
        }
        DealEvent::TransferStarted { channel } => format!("starting data transfer... {}", channel),
        DealEvent::Transition { to, .. } => match to {
            TransferStatusCode::Requested => "data transfer requested".to_string(),
            TransferStatusCode::Failing => "data transfer failing...".to_string(),
            TransferStatusCode::Completed => "transfer complete!".to_string(),
            TransferStatusCode::Other(code) => format!("unexpected data transfer state: {}", code),
            other => format!("current state: {}", other),
        },
        DealEvent::Completed { bytes_sent } => format!("sent {} bytes", bytes_sent),
    }
}

pub fn format_ask(ask: &StorageAsk) -> String {
    format!(
        "ASK RESPONSE
-----
Provider: {}
Price (Unverified): {}
Price (Verified): {}
Min Piece Size: {}
Max Piece Size: {}
",
        ask.provider, ask.price, ask.verified_price, ask.min_piece_size, ask.max_piece_size,
    )
}

pub fn format_query(query: &QueryResponse) -> String {
    let mut out = format!(
        "QUERY RESPONSE
-----
Status:                        {}
Size:                          {}
Unseal Price:                  {}
Min Price Per Byte:            {}
Payment Address:               {}
Max Payment Interval:          {}
Max Payment Interval Increase: {}
Piece CID Found:               {}
",
        query.status,
        query.size,
        query.unseal_price,
        query.min_price_per_byte,
        query.payment_address,
        query.max_payment_interval,
        query.max_payment_interval_increase,
        query.piece_cid_found,
    );
    if !query.message.is_empty() {
        let _ = writeln!(out, "Message:\n\t{}", query.message);
    }
    out
}

pub fn format_deals(deals: &[DealRecord]) -> String {
    let mut out = String::new();
    for deal in deals {
        let proposal = deal
            .proposal_cid
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{:?}\t{}",
            deal.id,
            deal.provider,
            deal.content_root,
            proposal,
            deal.state(),
            deal.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    out
}

pub fn format_ranking(stats: &[ProviderStats]) -> String {
    let mut out = String::from("PROVIDER\tTOTAL\tCONFIRMED\tFAILED\tFAULTS\tRATIO\n");
    for s in stats {
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{:.3}",
            s.provider,
            s.total,
            s.confirmed,
            s.failed_deals,
            s.deal_faults,
            s.success_ratio().unwrap_or(0.0),
        );
    }
    out
}
