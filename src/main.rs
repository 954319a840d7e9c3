//! Thresher: threshold-driven brokerage rebalancing bot.
//!
//! Sells holdings whose profit has cleared a threshold and pulled back from
//! their 52-week high; buys the day's losers inside a configured band of
//! their high. Order sizing respects portfolio concentration, buying-power,
//! and dollar-floor limits.

mod api;
mod models;
mod trading;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::BrokerClient;
use crate::trading::{AppConfig, BatchRunner, SymbolReport};

/// Thresher CLI.
#[derive(Parser)]
#[command(name = "thresher")]
#[command(about = "Threshold-driven rebalancing against a brokerage account", long_about = None)]
struct Cli {
    /// Policy file path
    #[arg(short, long, default_value = "thresher.json")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sell pass over current holdings
    Sell {
        /// Only evaluate crypto positions
        #[arg(long)]
        only_crypto: bool,

        /// Skip crypto positions
        #[arg(long)]
        no_crypto: bool,

        /// Override the configured sell limit for this pass
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Run one buy pass over the worst movers
    Buy {
        /// Only evaluate the crypto watch set
        #[arg(long)]
        only_crypto: bool,

        /// Skip the crypto watch set
        #[arg(long)]
        no_crypto: bool,

        /// Max purchases this pass
        #[arg(short, long)]
        limit: Option<u32>,

        /// Evaluate symbols already in the portfolio too
        #[arg(long)]
        include_held: bool,

        /// How many top movers to scan
        #[arg(short, long, default_value = "100")]
        movers: usize,
    },

    /// Run sell then buy passes on an interval
    Run {
        /// Seconds between rebalancing passes
        #[arg(short, long, default_value = "3600")]
        interval: u64,

        /// Run a single rebalance and exit
        #[arg(long)]
        once: bool,

        /// Max purchases per buy pass
        #[arg(long)]
        buy_limit: Option<u32>,

        /// How many top movers to scan per buy pass
        #[arg(short, long, default_value = "100")]
        movers: usize,
    },

    /// Show sorted period price changes for the scan set
    Movers {
        /// How many top movers to scan
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Show gainers instead of losers
        #[arg(long)]
        gainers: bool,
    },

    /// Print the validated policy
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // A bad policy file aborts here, before anything trades.
    let config = AppConfig::load(&cli.config)?;

    let client = BrokerClient::from_env(&config)?;
    let runner = BatchRunner::new(client, config.thresholds.clone());

    match cli.command {
        Commands::Sell {
            only_crypto,
            no_crypto,
            limit,
        } => {
            let symbols = sell_symbols(&runner, only_crypto, no_crypto).await?;
            let limit = limit.or(config.thresholds.sell_limit);

            info!(symbols = symbols.len(), "Starting sell pass");
            let reports = runner.run_sell_pass(&symbols, limit).await?;
            print_reports(&reports);
        }

        Commands::Buy {
            only_crypto,
            no_crypto,
            limit,
            include_held,
            movers,
        } => {
            let symbols = buy_symbols(&runner, only_crypto, no_crypto, movers).await?;

            info!(symbols = symbols.len(), "Starting buy pass");
            let reports = runner.run_buy_pass(&symbols, limit, !include_held).await?;
            print_reports(&reports);
        }

        Commands::Run {
            interval,
            once,
            buy_limit,
            movers,
        } => {
            println!("\n=== Thresher Rebalancing ===");
            println!("Policy file:  {}", cli.config.display());
            println!("Interval:     {}s", interval);
            println!(
                "Sell limit:   {}",
                config
                    .thresholds
                    .sell_limit
                    .map_or("unlimited".to_string(), |l| l.to_string())
            );
            if !once {
                println!("\nPress Ctrl+C to stop.");
            }

            loop {
                println!(
                    "\n--- Rebalance at {} ---",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
                );

                match rebalance(&runner, &config, buy_limit, movers).await {
                    Ok(reports) => print_reports(&reports),
                    Err(e) => tracing::error!(error = %e, "Rebalance pass failed"),
                }

                if once {
                    break;
                }

                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        println!("\nStopping.");
                        break;
                    }
                    _ = tokio::time::sleep(std::time::Duration::from_secs(interval)) => {}
                }
            }
        }

        Commands::Movers { limit, gainers } => {
            let symbols = runner.broker().movers_with_crypto(limit).await?;
            let changes = runner.broker().price_changes(&symbols).await;
            let sorted = BrokerClient::sort_movers(changes, gainers);

            if sorted.is_empty() {
                println!(
                    "No {} for the scanned symbols.",
                    if gainers { "gainers" } else { "losers" }
                );
                return Ok(());
            }

            println!("\n{:<10} {:>10}", "SYMBOL", "CHANGE");
            println!("{}", "-".repeat(21));
            for (symbol, change) in sorted {
                let pct = format!("{:.2}%", change * rust_decimal::Decimal::from(100));
                println!("{:<10} {:>10}", symbol, pct);
            }
        }

        Commands::Config => {
            let t = &config.thresholds;

            println!("\n=== Threshold Policy ===\n");
            println!("Sell Rules:");
            println!("  Profit Threshold:        {}", t.profit_threshold);
            println!("  Sell Year Threshold:     {}", t.sell_year_threshold);
            println!("  Portfolio Sell Cap:      {}", t.portfolio_sell_threshold);
            println!("  Sell Dollar Floor:       ${}", t.sell_dollar_floor);
            println!(
                "  Sell Limit:              {}",
                t.sell_limit.map_or("unlimited".to_string(), |l| l.to_string())
            );
            println!("  Fractional Sells:        {}", t.sell_fractional);

            println!("\nBuy Rules:");
            println!("  Buy Threshold:           {}", t.buy_threshold);
            println!("  Avoid Year Threshold:    {}", t.avoid_year_threshold);
            println!("  Buy Year Threshold:      {}", t.buy_year_threshold);
            println!("  Buying Power Limit:      {}", t.buying_power_limit);
            println!("  Portfolio Buy Cap:       {}", t.portfolio_buy_threshold);
            println!("  Buy Dollar Floor:        ${}", t.buy_dollar_floor);

            println!("\nMarket Data:");
            println!("  Interval:                {}", config.interval);
            println!("  Span:                    {}", config.span);
            println!("  Data Point:              {}", config.data_point);
            println!("  Crypto Watchlist:        {}", config.crypto_watchlist.join(", "));
        }
    }

    Ok(())
}

/// Holdings to evaluate in a sell pass, honoring the crypto flags.
async fn sell_symbols(
    runner: &BatchRunner<BrokerClient>,
    only_crypto: bool,
    no_crypto: bool,
) -> Result<Vec<String>> {
    let broker = runner.broker();
    if only_crypto {
        broker.portfolio_crypto_symbols().await
    } else {
        broker.portfolio_symbols(!no_crypto).await
    }
}

/// Buy candidates: the worst movers of the scan set, most negative first.
async fn buy_symbols(
    runner: &BatchRunner<BrokerClient>,
    only_crypto: bool,
    no_crypto: bool,
    movers: usize,
) -> Result<Vec<String>> {
    let broker = runner.broker();
    let scan = if only_crypto {
        broker.crypto_list().await?
    } else if no_crypto {
        broker.top_movers(movers).await?
    } else {
        broker.movers_with_crypto(movers).await?
    };

    let changes = broker.price_changes(&scan).await;
    Ok(BrokerClient::sort_movers(changes, false)
        .into_iter()
        .map(|(symbol, _)| symbol)
        .collect())
}

/// One full rebalance: sell pass over holdings, then buy pass over losers.
async fn rebalance(
    runner: &BatchRunner<BrokerClient>,
    config: &AppConfig,
    buy_limit: Option<u32>,
    movers: usize,
) -> Result<Vec<SymbolReport>> {
    let held = sell_symbols(runner, false, false).await?;
    let mut reports = runner
        .run_sell_pass(&held, config.thresholds.sell_limit)
        .await?;

    let candidates = buy_symbols(runner, false, false, movers).await?;
    reports.extend(runner.run_buy_pass(&candidates, buy_limit, true).await?);

    Ok(reports)
}

fn print_reports(reports: &[SymbolReport]) {
    for report in reports {
        println!("{}", report);
    }
}
