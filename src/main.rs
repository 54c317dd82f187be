//! CodeDiff - compare verified contract source across an upgrade
//!
//! Resolves the current implementation behind a (proxy) address, fetches
//! verified source for it and for a candidate implementation, and reports
//! which files changed.
//!
//! Usage:
//!   codediff <ADDRESS> <NEW_IMPLEMENTATION> [--chain-id 1] [--show-diff]

use clap::Parser;
use eyre::{eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use codediff::core::{Comparator, Comparison, ContractService};
use codediff::models::types::ConstructorInfo;
use codediff::utils::constants::{explorer_address_url, get_chain_name, APP_NAME, APP_VERSION};
use codediff::{CacheStore, ExplorerClient, ExplorerConfig, FileStore, KeyValueStore, MemoryStore};

#[derive(Debug, Parser)]
#[command(name = "codediff", version, about = "Compare verified contract source across an upgrade")]
struct Cli {
    /// Proxy or currently deployed implementation
    address: String,

    /// Candidate implementation to compare against
    new_implementation: String,

    /// Chain to query
    #[arg(long, env = "CODEDIFF_CHAIN_ID")]
    chain_id: Option<String>,

    /// Use this explorer key instead of the configured pool (persisted with --cache-dir)
    #[arg(long)]
    api_key: Option<String>,

    /// Keep the cache (and a user key) on disk in this directory
    #[arg(long, env = "CODEDIFF_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Print the full comparison as JSON
    #[arg(long)]
    json: bool,

    /// Print unified diffs of changed files
    #[arg(long)]
    show_diff: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut config = ExplorerConfig::from_env()?;
    if let Some(chain_id) = &cli.chain_id {
        config.chain_id = chain_id.trim().to_string();
    }

    let store: Arc<dyn KeyValueStore> = match &cli.cache_dir {
        Some(dir) => Arc::new(FileStore::open(dir)?),
        None => Arc::new(MemoryStore::new()),
    };
    let cache = CacheStore::with_settings(store, &config.cache_version, config.cache_ttl);
    let client = Arc::new(ExplorerClient::new(&config)?);

    let service = ContractService::new(client, cache, &config.chain_id);
    service.set_chain_id(&config.chain_id)?;
    if let Some(key) = cli.api_key.clone() {
        service.set_api_key_override(Some(key));
    }
    let comparator = Comparator::new(Arc::new(service));

    info!("🚀 {} v{} on {}", APP_NAME, APP_VERSION, get_chain_name(&config.chain_id));

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n🛑 Cancelling...");
            on_ctrl_c.cancel();
        }
    });

    let comparison = comparator
        .compare(&cli.address, &cli.new_implementation, &cancel)
        .await
        .map_err(|e| eyre!("❌ [{}] {}", e.code().as_str(), e))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        print_report(&comparison, cli.show_diff);
    }

    Ok(())
}

fn print_report(comparison: &Comparison, show_diff: bool) {
    let chain_id = &comparison.chain_id;
    println!();
    println!("🔗 Chain: {} ({})", get_chain_name(chain_id), chain_id);

    if let Some(proxy) = &comparison.proxy {
        println!(
            "🔀 Proxy: {} ({})",
            proxy.proxy_address.as_deref().unwrap_or_default(),
            proxy.proxy_contract_name.as_deref().unwrap_or("unnamed")
        );
    }

    for (label, source, constructor) in [
        ("Old", &comparison.old_source, &comparison.old_constructor),
        ("New", &comparison.new_source, &comparison.new_constructor),
    ] {
        println!(
            "📄 {} implementation: {} {} ({}, {} files)",
            label,
            source.address,
            source.contract_name,
            source.compiler_version,
            source.files.len()
        );
        if let Some(url) = explorer_address_url(chain_id, &source.address) {
            println!("   {}", url);
        }
        print_constructor(constructor);
    }

    let totals = comparison.cache_totals();
    println!("💾 Files from cache: {}, fetched: {}", totals.cached, totals.fetched);

    let changed: Vec<_> = comparison.changed_files().collect();
    println!();
    if changed.is_empty() {
        println!("✅ No differences in {} files", comparison.diffs.len());
        return;
    }

    println!("📝 {} of {} files changed:", changed.len(), comparison.diffs.len());
    for diff in &changed {
        println!("  {} {}", diff.change().marker(), diff.file_name);
    }

    if show_diff {
        for diff in changed {
            println!();
            println!("{}", diff.unified_diff);
        }
    }
}

fn print_constructor(constructor: &ConstructorInfo) {
    match (&constructor.decoded_params, &constructor.arguments) {
        (Some(params), _) => {
            println!("   Constructor:");
            for param in params {
                println!("     {} ({}): {}", param.name, param.ty, param.value);
            }
        }
        (None, Some(raw)) => println!("   Constructor (raw): 0x{}", raw.trim_start_matches("0x")),
        (None, None) => {}
    }
}
