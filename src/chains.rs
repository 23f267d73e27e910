//! Supported networks and their per-chain lookup data

use crate::constants::{WBNB_BSC, WETH_ARBITRUM, WETH_BASE, WETH_ETHEREUM, WSOL_MINT};
use crate::errors::BackfillError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Solana,
    Ethereum,
    Base,
    Bsc,
    Arbitrum,
}

impl Chain {
    pub fn all() -> [Chain; 5] {
        [
            Chain::Solana,
            Chain::Ethereum,
            Chain::Base,
            Chain::Bsc,
            Chain::Arbitrum,
        ]
    }

    /// Name used in storage and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Ethereum => "ethereum",
            Chain::Base => "base",
            Chain::Bsc => "bsc",
            Chain::Arbitrum => "arbitrum",
        }
    }

    /// GeckoTerminal network identifier
    pub fn network_id(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Ethereum => "eth",
            Chain::Base => "base",
            Chain::Bsc => "bsc",
            Chain::Arbitrum => "arbitrum",
        }
    }

    /// Address of the chain's wrapped native asset
    pub fn wrapped_native_address(&self) -> &'static str {
        match self {
            Chain::Solana => WSOL_MINT,
            Chain::Ethereum => WETH_ETHEREUM,
            Chain::Base => WETH_BASE,
            Chain::Bsc => WBNB_BSC,
            Chain::Arbitrum => WETH_ARBITRUM,
        }
    }

    /// Quote symbols that denote the native asset
    pub fn native_symbols(&self) -> &'static [&'static str] {
        match self {
            Chain::Solana => &["SOL", "WSOL"],
            Chain::Ethereum | Chain::Base | Chain::Arbitrum => &["ETH", "WETH"],
            Chain::Bsc => &["BNB", "WBNB"],
        }
    }

    /// EVM addresses are hex and case-insensitive; Solana base58 is not
    pub fn same_address(&self, a: &str, b: &str) -> bool {
        match self {
            Chain::Solana => a == b,
            _ => a.eq_ignore_ascii_case(b),
        }
    }

    pub fn is_wrapped_native(&self, address: &str) -> bool {
        self.same_address(address, self.wrapped_native_address())
    }

    pub fn is_native_symbol(&self, symbol: &str) -> bool {
        let symbol = symbol.trim();
        self.native_symbols()
            .iter()
            .any(|s| s.eq_ignore_ascii_case(symbol))
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Chain {
    type Err = BackfillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "solana" | "sol" => Ok(Chain::Solana),
            "ethereum" | "eth" => Ok(Chain::Ethereum),
            "base" => Ok(Chain::Base),
            "bsc" | "bnb" => Ok(Chain::Bsc),
            "arbitrum" | "arb" => Ok(Chain::Arbitrum),
            other => Err(BackfillError::unsupported("chain", other)),
        }
    }
}
