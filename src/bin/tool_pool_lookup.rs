/// Pool lookup tool
///
/// Lists the pools GeckoTerminal reports for a token and shows which one the
/// backfill engine would pick as canonical. Does not touch the database.
use clap::Parser;
use colored::Colorize;
use ohlcv_backfill::{
    apis::{FetchOutcome, GeckoTerminalClient},
    chains::Chain,
    config::{apply_env_overrides, load_config_from_path, validate_config, CONFIG_FILE_PATH},
    logger::{self, LoggerConfig},
    ohlcvs::select_canonical_pool,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(name = "tool_pool_lookup")]
#[clap(about = "Show candidate pools and the canonical pick for a token")]
struct Args {
    /// Chain (solana, ethereum, base, bsc, arbitrum)
    chain: String,

    /// Token contract address
    token: String,

    /// Maximum rows to print
    #[clap(long, default_value = "15")]
    limit: usize,

    /// TOML configuration file
    #[clap(long)]
    config: Option<PathBuf>,

    /// Enable debug output for a log tag
    #[clap(long = "debug")]
    debug: Vec<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logger::init(LoggerConfig::from_flags(&args.debug, false));
    dotenv::dotenv().ok();

    let chain: Chain = match args.chain.parse() {
        Ok(chain) => chain,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    let path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_PATH));
    let mut config = match load_config_from_path(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    if let Err(e) = apply_env_overrides(&mut config).and_then(|_| validate_config(&config)) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    let client = match GeckoTerminalClient::from_config(&config.geckoterminal) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    println!("\n{}", "Pool Lookup".bold().green());
    println!("{}", "=".repeat(60).green());
    println!("Chain: {}  Token: {}\n", chain.as_str().yellow(), args.token.yellow());

    let pools = match client.fetch_pools(chain, &args.token).await {
        FetchOutcome::Data(pools) if !pools.is_empty() => pools,
        FetchOutcome::Data(_) | FetchOutcome::NotFound => {
            println!("{}", "No pools found".yellow());
            return;
        }
        FetchOutcome::RateLimited(attempts) => {
            eprintln!("{} rate limited after {} attempts", "Error:".red().bold(), attempts);
            std::process::exit(1);
        }
        FetchOutcome::Failed(message) => {
            eprintln!("{} {}", "Error:".red().bold(), message);
            std::process::exit(1);
        }
    };

    let selected = select_canonical_pool(chain, &args.token, &pools).map(|p| p.address.clone());

    let mut sorted: Vec<_> = pools.iter().collect();
    sorted.sort_by(|a, b| {
        b.reserve_usd
            .partial_cmp(&a.reserve_usd)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    println!(
        "{:<3} {:<46} {:<14} {:<8} {:>14}",
        "", "POOL", "DEX", "QUOTE", "RESERVE USD"
    );
    for pool in sorted.iter().take(args.limit) {
        let marker = if Some(&pool.address) == selected.as_ref() {
            "*".green().bold().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{:<3} {:<46} {:<14} {:<8} {:>14.2}",
            marker,
            pool.address,
            pool.dex_id,
            pool.quote_symbol.as_deref().unwrap_or("?"),
            pool.reserve_usd
        );
    }

    if let Some(address) = selected {
        println!("\n{} {}", "Canonical pool:".bold(), address.green());
    }
    println!("{} pools total", pools.len());
}
