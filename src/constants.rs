/// Constants shared across the engine
///
/// Values here are protocol facts, not tuning knobs; tunables live in `config`.

// ============================================================================
// WRAPPED NATIVE ASSETS
// ============================================================================

/// Wrapped SOL mint
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// WETH on Ethereum mainnet
pub const WETH_ETHEREUM: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

/// WETH on Base
pub const WETH_BASE: &str = "0x4200000000000000000000000000000000000006";

/// WBNB on BNB Smart Chain
pub const WBNB_BSC: &str = "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c";

/// WETH on Arbitrum One
pub const WETH_ARBITRUM: &str = "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1";

// ============================================================================
// QUOTE ASSETS
// ============================================================================

/// Quote symbols treated as USD stablecoins when picking a pool for a native token
pub const STABLE_QUOTE_SYMBOLS: &[&str] = &["USDC", "USDT", "USD"];

// ============================================================================
// UPSTREAM LIMITS
// ============================================================================

/// GeckoTerminal returns at most this many candles per OHLCV request
pub const MAX_OHLCV_LIMIT: usize = 1000;

/// Page size requested from the pools-for-token endpoint
pub const POOLS_PER_PAGE: u32 = 50;

/// Suffix appended to the source tag of synthetic (interpolated) rows
pub const INTERPOLATED_SOURCE_SUFFIX: &str = ":interpolated";
