use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ohlcv_backfill::{
    apis::GeckoTerminalClient,
    chains::Chain,
    config::{
        apply_env_overrides, load_config_from_path, validate_config, Config, CONFIG_FILE_PATH,
    },
    logger::{self, LogTag, LoggerConfig},
    ohlcvs::{Backfiller, OhlcvDatabase, SeriesKey, Timeframe},
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(name = "ohlcv-backfill")]
#[clap(about = "Backfill and validate OHLCV bar series from GeckoTerminal")]
struct Cli {
    /// TOML configuration file
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides config and OHLCV_DB_PATH)
    #[clap(long, global = true)]
    db: Option<String>,

    /// Enable debug output for a log tag (api, pools, ohlcv, database, lifecycle, all)
    #[clap(long = "debug", global = true)]
    debug: Vec<String>,

    /// Verbose output for every tag
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, validate and store one bar series
    Backfill {
        chain: String,
        token_contract: String,
        /// 1m, 15m, 1h or 4h
        timeframe: String,
        lookback_minutes: Option<i64>,
    },
    /// Show stored bar count, gaps and position state for a series
    Status {
        chain: String,
        token_contract: String,
        timeframe: String,
    },
    /// Register a dormant position so its pool and bar count are tracked
    Track {
        chain: String,
        token_contract: String,
        timeframe: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init(LoggerConfig::from_flags(&cli.debug, cli.verbose));

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            logger::error(LogTag::System, &format!("{:#}", e));
            1
        }
    };
    std::process::exit(code);
}

fn load_configuration(cli: &Cli) -> Result<Config> {
    dotenv::dotenv().ok();

    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_PATH));
    let mut config = load_config_from_path(&path).map_err(|e| anyhow!(e))?;
    apply_env_overrides(&mut config).map_err(|e| anyhow!(e))?;
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }
    validate_config(&config).map_err(|e| anyhow!(e))?;

    logger::debug(
        LogTag::Config,
        &format!(
            "Config loaded: target_bars={}, min_bars={}, db={}",
            config.backfill.target_bars, config.backfill.min_bars, config.database.path
        ),
    );
    Ok(config)
}

fn parse_series(chain: &str, token: &str, timeframe: &str) -> Result<SeriesKey> {
    let chain: Chain = chain.parse()?;
    let timeframe: Timeframe = timeframe.parse()?;
    let token = token.trim();
    if token.is_empty() {
        return Err(anyhow!("token_contract cannot be empty"));
    }
    Ok(SeriesKey::new(token, chain, timeframe))
}

fn open_database(config: &Config) -> Result<Arc<OhlcvDatabase>> {
    let db = OhlcvDatabase::new(&config.database.path)
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    Ok(Arc::new(db))
}

async fn run(cli: Cli) -> Result<i32> {
    let config = load_configuration(&cli)?;

    match &cli.command {
        Command::Backfill {
            chain,
            token_contract,
            timeframe,
            lookback_minutes,
        } => {
            let key = parse_series(chain, token_contract, timeframe)?;
            let db = open_database(&config)?;
            let source = Arc::new(GeckoTerminalClient::from_config(&config.geckoterminal)?);
            let backfiller = Backfiller::new(&config, db, source);

            let result = backfiller
                .run(&key.token_contract, key.chain, key.timeframe, *lookback_minutes)
                .await;
            println!("{}", serde_json::to_string(&result)?);
            Ok(if result.is_success() { 0 } else { 1 })
        }
        Command::Status {
            chain,
            token_contract,
            timeframe,
        } => {
            let key = parse_series(chain, token_contract, timeframe)?;
            let db = open_database(&config)?;

            let bars = db.count_bars(&key)?;
            let gaps = db.find_gaps(&key)?;
            let missing: i64 = gaps.iter().map(|g| g.missing_bars(key.timeframe)).sum();
            let position = db
                .get_position(&key.token_contract, key.chain)?
                .filter(|p| p.timeframe == key.timeframe);

            let status = json!({
                "token_contract": key.token_contract,
                "chain": key.chain,
                "timeframe": key.timeframe,
                "bars": bars,
                "target_bars": config.backfill.target_bars,
                "gaps": gaps,
                "missing_bars": missing,
                "position": position,
            });
            println!("{}", serde_json::to_string(&status)?);
            Ok(0)
        }
        Command::Track {
            chain,
            token_contract,
            timeframe,
        } => {
            let key = parse_series(chain, token_contract, timeframe)?;
            let db = open_database(&config)?;
            let position = db.insert_position(&key)?;
            if position.timeframe != key.timeframe {
                logger::warning(
                    LogTag::System,
                    &format!(
                        "{} is already tracked on {}, timeframe left unchanged",
                        key.token_contract, position.timeframe
                    ),
                );
            }
            println!("{}", serde_json::to_string(&position)?);
            Ok(0)
        }
    }
}
