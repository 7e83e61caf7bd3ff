//! KalshiTrader - Main Entry Point
//!
//! Command-line access to the Kalshi trading API. Results are printed to
//! stdout as pretty JSON; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use kalshi_trader::config::loader::load_config;
use kalshi_trader::{
    Action, KalshiClient, PlaceOrderParams, RateLimiter, SearchMarketsParams, SeriesParams, Side,
    TrendingParams,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search open markets by keyword
    Search {
        query: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Open markets ranked by liquidity
    Trending {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Market metadata and top of book
    Market { ticker: String },
    /// Balance and open positions
    Portfolio,
    /// Open markets in a series
    Series { series_ticker: String },
    /// Place a limit order
    Order {
        ticker: String,
        /// yes or no
        side: Side,
        quantity: u32,
        /// Limit price in cents (1-99)
        price_cents: u32,
        /// buy or sell
        #[arg(long, default_value = "buy")]
        action: Action,
        /// Idempotency key; a UUID is generated when omitted
        #[arg(long)]
        client_order_id: Option<String>,
    },
    /// Cancel a resting order
    Cancel { order_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let config = load_config(Some(&args.config)).context("failed to load configuration")?;

    // Initialize logging
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    init_logging(&level, args.log_json)?;

    info!("Starting KalshiTrader");
    debug!("Configuration file: {}", args.config);

    let rate_limiter = Arc::new(RateLimiter::new(config.kalshi.min_request_interval()));
    let client = KalshiClient::from_config(&config.kalshi, rate_limiter)
        .context("failed to build Kalshi client")?;

    match args.command {
        Command::Search { query, limit } => {
            print_json(&client.search_markets(&SearchMarketsParams { query, limit }).await?)
        }
        Command::Trending { limit } => {
            print_json(&client.trending_markets(&TrendingParams { limit }).await?)
        }
        Command::Market { ticker } => print_json(&client.get_market_details(&ticker).await?),
        Command::Portfolio => print_json(&client.get_portfolio().await?),
        Command::Series { series_ticker } => {
            print_json(&client.series_markets(&SeriesParams { series_ticker }).await?)
        }
        Command::Order {
            ticker,
            side,
            quantity,
            price_cents,
            action,
            client_order_id,
        } => {
            let params = PlaceOrderParams {
                ticker,
                side,
                action,
                quantity,
                price_cents,
                client_order_id,
            };
            print_json(&client.place_order(&params).await?)
        }
        Command::Cancel { order_id } => print_json(&client.cancel_order(&order_id).await?),
    }
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
