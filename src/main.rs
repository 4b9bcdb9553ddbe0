//! Vaultwatch - Uniswap V3 liquidity manager snapshots
//!
//! Run with: cargo run
//!
//! Each run reads every configured G-UNI, Gamma, Lixir, Charm and Popsicle
//! vault, values it in USD and appends one row per vault to the store.

use clap::{Parser, Subcommand};
use console::style;
use eyre::{Result, WrapErr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod chain;
mod config;
mod error;
mod explorer;
mod orchestrator;
mod pricing;
mod store;
mod tokens;
mod vaults;

#[cfg(test)]
mod test_utils;

use chain::{account_from_key, checksum_address, ChainAccessor};
use config::{Config, QueryConfig};
use explorer::TransferKind;
use orchestrator::{Orchestrator, RunReport};
use pricing::CoinGeckoClient;
use store::{JsonTableStore, TableStore};
use tokens::{scale_units, TokenTable};

#[derive(Parser)]
#[command(name = "vaultwatch", version, about = "Snapshot Uniswap V3 liquidity manager vaults")]
struct Cli {
    /// TOML settings file (otherwise environment and .env)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Query every configured vault and append the rows to the store (default)
    Run,
    /// Show configuration, gas prices and the configured wallet
    Diagnose,
    /// List an address's transactions from the block explorer
    History {
        address: String,
        #[arg(long, value_enum, default_value_t = TransferKind::Normal)]
        kind: TransferKind,
    },
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 📸 VAULTWATCH - Uniswap V3 Liquidity Manager Snapshots").cyan().bold()
    );
    println!(
        "{}",
        style("    G-UNI | Gamma | Lixir | Charm | Popsicle").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vaultwatch=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.settings {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config).await,
        Command::Diagnose => diagnose(&config).await,
        Command::History { address, kind } => history(&config, &address, kind).await,
    }
}

/// One full query-and-persist cycle
async fn run(config: &Config) -> Result<()> {
    print_banner();

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file");
        return Err(e.into());
    }
    config.print_summary();
    println!();

    // everything structural is checked before the first request
    let query = QueryConfig::load(&config.query_config_path).wrap_err("invalid query config")?;
    let tokens = TokenTable::load(&config.token_table_path).wrap_err("invalid token table")?;
    info!(
        "{} pools, {} vaults, {} known tokens",
        query.pools.len(),
        query.vault_count(),
        tokens.len()
    );
    if tokens.is_empty() {
        warn!("token table {} is empty, no pool can be priced", config.token_table_path);
    }

    let accessor = ChainAccessor::connect(config.chain, config.rpc_url(), config.abi_loader()?);
    let prices = CoinGeckoClient::new(
        config.coingecko_api_url.clone(),
        config.coingecko_api_key.clone(),
    )?;
    let store = JsonTableStore::new(&config.store_path);

    let started = Instant::now();
    let orchestrator = Orchestrator::new(
        accessor,
        Arc::new(prices),
        tokens,
        query,
        config.failure_policy,
    );
    let report = orchestrator.run(&store).await?;

    print_summary(&report, store.name(), started.elapsed().as_secs_f64());
    Ok(())
}

fn print_summary(report: &RunReport, store_name: &str, elapsed_secs: f64) {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").green()
    );
    println!("{}", style(" ✅ SNAPSHOT COMPLETE").green().bold());
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").green()
    );
    println!();
    println!("Summary:");
    println!("  • Vaults snapshotted: {}", report.snapshots.len());
    println!("  • Failures skipped: {}", report.failures.len());
    match report.stored_rows {
        Some(rows) => println!("  • Store '{}': {} rows", store_name, rows),
        None => println!("  • Store '{}': unchanged", store_name),
    }
    println!("  • Elapsed: {:.1}s", elapsed_secs);
    println!();

    for snapshot in &report.snapshots {
        println!(
            "  {:<6} {:<9} ${:>14.2}  share ${:>12.4}  [{}, {}]",
            snapshot.pool_id,
            style(snapshot.manager).cyan(),
            snapshot.vault_value,
            snapshot.vault_token_price,
            snapshot.lower_bound,
            snapshot.upper_bound
        );
    }

    if !report.failures.is_empty() {
        println!();
        for failure in &report.failures {
            println!("  {} {}", style("✗").red(), failure);
        }
    }
}

async fn diagnose(config: &Config) -> Result<()> {
    println!("🔍 VAULTWATCH DIAGNOSTIC CHECK\n");
    config.print_summary();
    println!();

    match config.validate() {
        Ok(()) => println!("  Settings:  {}", style("✅ Valid").green()),
        Err(e) => println!("  Settings:  {} {}", style("❌").red(), e),
    }

    let explorer = match config.explorer() {
        Ok(explorer) => Some(explorer),
        Err(e) => {
            warn!("explorer unavailable: {}", e);
            None
        }
    };

    if let Some(explorer) = &explorer {
        match explorer.gas_oracle().await {
            Ok(gas) => {
                println!(
                    "  Gas (block {}): safe {:.2} | propose {:.2} | fast {:.2} gwei",
                    gas.last_block, gas.safe_gwei, gas.propose_gwei, gas.fast_gwei
                );
                if let Some(base_fee) = gas.base_fee_gwei {
                    println!("  Base fee: {:.3} gwei", base_fee);
                }
            }
            Err(e) => println!("  Gas oracle: {} {}", style("❌").red(), e),
        }
    }

    match &config.wallet_private_key {
        Some(key) => {
            let wallet = account_from_key(key)?;
            println!("  Wallet:    {}", wallet.address());
            if let Some(explorer) = &explorer {
                let balance = explorer.native_balance(wallet.address()).await?;
                println!("  Balance:   {:.6}", scale_units(balance, 18));
            }
        }
        None => println!("  Wallet:    {}", style("not configured").yellow()),
    }

    Ok(())
}

async fn history(config: &Config, address: &str, kind: TransferKind) -> Result<()> {
    let address = checksum_address(address)?;
    let explorer = config.explorer()?;

    let transfers = match kind {
        TransferKind::Normal => explorer.normal_transactions(address).await?,
        TransferKind::Internal => explorer.internal_transactions(address).await?,
        TransferKind::Token => explorer.token_transfers(address).await?,
        TransferKind::Nft => explorer.nft_transfers(address).await?,
    };
    println!("{} {:?} entries for {}", transfers.len(), kind, address);

    for tx in &transfers {
        let status = match tx.is_error.as_deref() {
            Some("1") => style("✗").red(),
            _ => style("✓").green(),
        };
        println!(
            "  {} #{:<10} {}  {} → {}  {} {}",
            status,
            tx.block_number,
            tx.hash,
            tx.from,
            tx.to,
            tx.value,
            tx.token_symbol.as_deref().unwrap_or("")
        );
    }

    Ok(())
}
