//! Canonical pool resolution with a staleness-checked cache

use crate::apis::{FetchOutcome, MarketDataSource};
use crate::chains::Chain;
use crate::constants::STABLE_QUOTE_SYMBOLS;
use crate::errors::{BackfillError, BackfillResult};
use crate::logger::{self, LogTag};
use crate::ohlcvs::database::OhlcvDatabase;
use crate::ohlcvs::types::{CanonicalPool, PoolCandidate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Storage for the per-token canonical pool
#[async_trait]
pub trait PoolCache: Send + Sync {
    async fn load_pool(&self, token: &str, chain: Chain) -> BackfillResult<Option<CanonicalPool>>;

    /// Returns false when there is nowhere to store the pool for this token
    async fn save_pool(&self, token: &str, chain: Chain, pool: &CanonicalPool)
        -> BackfillResult<bool>;
}

#[async_trait]
impl PoolCache for OhlcvDatabase {
    async fn load_pool(&self, token: &str, chain: Chain) -> BackfillResult<Option<CanonicalPool>> {
        self.load_canonical_pool(token, chain)
    }

    async fn save_pool(
        &self,
        token: &str,
        chain: Chain,
        pool: &CanonicalPool,
    ) -> BackfillResult<bool> {
        self.save_canonical_pool(token, chain, pool)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PoolResolution {
    Found(CanonicalPool),
    NotFound,
}

fn is_stable_quote(candidate: &PoolCandidate) -> bool {
    candidate
        .quote_symbol
        .as_deref()
        .map(|symbol| {
            STABLE_QUOTE_SYMBOLS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(symbol.trim()))
        })
        .unwrap_or(false)
}

fn is_native_quote(chain: Chain, candidate: &PoolCandidate) -> bool {
    let by_address = candidate
        .quote_address
        .as_deref()
        .map(|a| chain.is_wrapped_native(a))
        .unwrap_or(false);
    let by_symbol = candidate
        .quote_symbol
        .as_deref()
        .map(|s| chain.is_native_symbol(s))
        .unwrap_or(false);
    by_address || by_symbol
}

fn most_liquid<'a, I>(candidates: I) -> Option<&'a PoolCandidate>
where
    I: Iterator<Item = &'a PoolCandidate>,
{
    // first candidate wins ties
    candidates.fold(None::<&'a PoolCandidate>, |best, c| match best {
        Some(b) if b.reserve_usd >= c.reserve_usd => Some(b),
        _ => Some(c),
    })
}

/// Pick the pool that represents `token`'s USD price
///
/// The wrapped native token prefers stablecoin quotes; every other token
/// prefers native quotes. The most liquid pool of the preferred set wins,
/// or of the whole list when nothing is preferred.
pub fn select_canonical_pool<'a>(
    chain: Chain,
    token: &str,
    candidates: &'a [PoolCandidate],
) -> Option<&'a PoolCandidate> {
    let preferred: Box<dyn Fn(&PoolCandidate) -> bool> = if chain.is_wrapped_native(token) {
        Box::new(is_stable_quote)
    } else {
        Box::new(move |c| is_native_quote(chain, c))
    };

    most_liquid(candidates.iter().filter(|c| preferred(c)))
        .or_else(|| most_liquid(candidates.iter()))
}

pub struct PoolResolver {
    cache: Arc<dyn PoolCache>,
    source: Arc<dyn MarketDataSource>,
    refresh_days: i64,
}

impl PoolResolver {
    pub fn new(
        cache: Arc<dyn PoolCache>,
        source: Arc<dyn MarketDataSource>,
        refresh_days: i64,
    ) -> Self {
        Self {
            cache,
            source,
            refresh_days,
        }
    }

    /// Cached pool when fresh, otherwise rediscover and persist
    ///
    /// A failed refresh falls back to the stale cached pool. Without a cache
    /// entry, no pools upstream is `NotFound` and a failed call is an error.
    pub async fn resolve(
        &self,
        chain: Chain,
        token: &str,
        now: DateTime<Utc>,
    ) -> BackfillResult<PoolResolution> {
        let cached = match self.cache.load_pool(token, chain).await {
            Ok(cached) => cached,
            Err(e) => {
                logger::warning(
                    LogTag::Pools,
                    &format!("Failed to load cached pool for {}: {}", token, e),
                );
                None
            }
        };

        if let Some(pool) = &cached {
            if pool.is_fresh(now, self.refresh_days) {
                logger::debug(
                    LogTag::Pools,
                    &format!("Using cached pool {} for {}", pool.pool_address, token),
                );
                return Ok(PoolResolution::Found(pool.clone()));
            }
        }

        let failure = match self.source.fetch_pools(chain, token).await {
            FetchOutcome::Data(candidates) if !candidates.is_empty() => {
                return Ok(self.adopt(chain, token, &candidates, now).await);
            }
            FetchOutcome::Data(_) | FetchOutcome::NotFound => None,
            FetchOutcome::RateLimited(attempts) => Some(BackfillError::RateLimited {
                endpoint: "pools".to_string(),
                attempts,
            }),
            FetchOutcome::Failed(message) => Some(BackfillError::Upstream {
                endpoint: "pools".to_string(),
                message,
            }),
        };

        if let Some(stale) = cached {
            logger::warning(
                LogTag::Pools,
                &format!(
                    "Pool refresh for {} failed, serving stale pool {}",
                    token, stale.pool_address
                ),
            );
            return Ok(PoolResolution::Found(stale));
        }

        match failure {
            Some(err) => Err(err),
            None => {
                logger::info(LogTag::Pools, &format!("No pools found for {} on {}", token, chain));
                Ok(PoolResolution::NotFound)
            }
        }
    }

    async fn adopt(
        &self,
        chain: Chain,
        token: &str,
        candidates: &[PoolCandidate],
        now: DateTime<Utc>,
    ) -> PoolResolution {
        let Some(selected) = select_canonical_pool(chain, token, candidates) else {
            return PoolResolution::NotFound;
        };

        let pool = CanonicalPool {
            pool_address: selected.address.clone(),
            dex_id: selected.dex_id.clone(),
            quote_symbol: selected.quote_symbol.clone(),
            last_checked_at: now,
        };
        logger::info(
            LogTag::Pools,
            &format!(
                "Selected pool {} ({}, quote={}, reserve=${:.0}) for {} out of {} candidates",
                pool.pool_address,
                pool.dex_id,
                pool.quote_symbol.as_deref().unwrap_or("?"),
                selected.reserve_usd,
                token,
                candidates.len()
            ),
        );

        match self.cache.save_pool(token, chain, &pool).await {
            Ok(true) => {}
            Ok(false) => logger::debug(
                LogTag::Pools,
                &format!("No position for {}, pool not cached", token),
            ),
            Err(e) => logger::warning(
                LogTag::Pools,
                &format!("Failed to cache pool for {}: {}", token, e),
            ),
        }

        PoolResolution::Found(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::{OhlcvBatch, OhlcvQuery};
    use crate::constants::WSOL_MINT;
    use crate::ohlcvs::types::{SeriesKey, Timeframe};
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn candidate(address: &str, quote_symbol: &str, reserve_usd: f64) -> PoolCandidate {
        PoolCandidate {
            address: address.to_string(),
            name: format!("TOKEN / {}", quote_symbol),
            dex_id: "raydium".to_string(),
            base_address: Some("Token111".to_string()),
            quote_address: None,
            quote_symbol: Some(quote_symbol.to_string()),
            reserve_usd,
        }
    }

    struct ScriptedPools {
        outcome: FetchOutcome<Vec<PoolCandidate>>,
        calls: AtomicUsize,
    }

    impl ScriptedPools {
        fn new(outcome: FetchOutcome<Vec<PoolCandidate>>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MarketDataSource for ScriptedPools {
        async fn fetch_pools(&self, _chain: Chain, _token: &str) -> FetchOutcome<Vec<PoolCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }

        async fn fetch_ohlcv(
            &self,
            _chain: Chain,
            _pool: &str,
            _query: &OhlcvQuery,
        ) -> FetchOutcome<OhlcvBatch> {
            FetchOutcome::NotFound
        }
    }

    fn db_with_position() -> Arc<OhlcvDatabase> {
        let db = Arc::new(OhlcvDatabase::in_memory().unwrap());
        db.insert_position(&SeriesKey::new("Token111", Chain::Solana, Timeframe::Minute1))
            .unwrap();
        db
    }

    #[test]
    fn test_native_quote_preferred_over_liquidity() {
        let pools = vec![candidate("native", "SOL", 1000.0), candidate("usdc", "USDC", 5000.0)];
        let selected = select_canonical_pool(Chain::Solana, "Token111", &pools).unwrap();
        assert_eq!(selected.address, "native");
    }

    #[test]
    fn test_fallback_to_most_liquid() {
        let pools = vec![
            candidate("usdc", "USDC", 5000.0),
            candidate("bonk", "BONK", 9000.0),
            candidate("usdt", "USDT", 100.0),
        ];
        let selected = select_canonical_pool(Chain::Solana, "Token111", &pools).unwrap();
        assert_eq!(selected.address, "bonk");
        assert!(select_canonical_pool(Chain::Solana, "Token111", &[]).is_none());
    }

    #[test]
    fn test_native_token_prefers_stable_quote() {
        let pools = vec![
            candidate("sol-bonk", "BONK", 90_000.0),
            candidate("sol-usdt", "USDT", 1_000.0),
            candidate("sol-usdc", "USDC", 50_000.0),
        ];
        let selected = select_canonical_pool(Chain::Solana, WSOL_MINT, &pools).unwrap();
        assert_eq!(selected.address, "sol-usdc");
    }

    #[test]
    fn test_native_quote_by_address_on_evm() {
        let mut weth = candidate("weth-pool", "???", 10.0);
        weth.quote_address = Some(Chain::Base.wrapped_native_address().to_lowercase());
        let pools = vec![candidate("usdc-pool", "USDC", 1e6), weth];
        let selected = select_canonical_pool(Chain::Base, "0xtoken", &pools).unwrap();
        assert_eq!(selected.address, "weth-pool");
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_network() {
        let db = db_with_position();
        let now = Utc::now();
        let cached = CanonicalPool {
            pool_address: "cached".to_string(),
            dex_id: "raydium".to_string(),
            quote_symbol: Some("SOL".to_string()),
            last_checked_at: now - Duration::days(2),
        };
        db.save_canonical_pool("Token111", Chain::Solana, &cached).unwrap();

        let source = ScriptedPools::new(FetchOutcome::Data(vec![candidate("new", "SOL", 1.0)]));
        let resolver = PoolResolver::new(db.clone(), source.clone(), 7);
        let resolution = resolver.resolve(Chain::Solana, "Token111", now).await.unwrap();

        assert_eq!(resolution, PoolResolution::Found(cached));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_cache_is_refreshed_and_persisted() {
        let db = db_with_position();
        let now = Utc::now();
        let cached = CanonicalPool {
            pool_address: "old".to_string(),
            dex_id: "raydium".to_string(),
            quote_symbol: Some("SOL".to_string()),
            last_checked_at: now - Duration::days(8),
        };
        db.save_canonical_pool("Token111", Chain::Solana, &cached).unwrap();

        let source = ScriptedPools::new(FetchOutcome::Data(vec![candidate("new", "SOL", 1.0)]));
        let resolver = PoolResolver::new(db.clone(), source.clone(), 7);
        let resolution = resolver.resolve(Chain::Solana, "Token111", now).await.unwrap();

        let PoolResolution::Found(pool) = resolution else {
            panic!("expected a pool");
        };
        assert_eq!(pool.pool_address, "new");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let stored = db.load_canonical_pool("Token111", Chain::Solana).unwrap().unwrap();
        assert_eq!(stored.pool_address, "new");
        assert_eq!(stored.last_checked_at, now);
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_stale_pool() {
        let db = db_with_position();
        let now = Utc::now();
        let stale = CanonicalPool {
            pool_address: "old".to_string(),
            dex_id: "raydium".to_string(),
            quote_symbol: None,
            last_checked_at: now - Duration::days(1),
        };
        db.save_canonical_pool("Token111", Chain::Solana, &stale).unwrap();

        for outcome in [
            FetchOutcome::RateLimited(3),
            FetchOutcome::Failed("boom".to_string()),
            FetchOutcome::Data(vec![]),
        ] {
            let source = ScriptedPools::new(outcome);
            let resolver = PoolResolver::new(db.clone(), source.clone(), 7);
            let resolution = resolver.resolve(Chain::Solana, "Token111", now).await.unwrap();
            assert_eq!(resolution, PoolResolution::Found(stale.clone()));
            assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_not_found_and_error_without_cache() {
        let db = Arc::new(OhlcvDatabase::in_memory().unwrap());
        let now = Utc::now();

        let resolver = PoolResolver::new(db.clone(), ScriptedPools::new(FetchOutcome::Data(vec![])), 7);
        assert_eq!(
            resolver.resolve(Chain::Solana, "Token111", now).await.unwrap(),
            PoolResolution::NotFound
        );

        let resolver = PoolResolver::new(db.clone(), ScriptedPools::new(FetchOutcome::NotFound), 7);
        assert_eq!(
            resolver.resolve(Chain::Solana, "Token111", now).await.unwrap(),
            PoolResolution::NotFound
        );

        let resolver = PoolResolver::new(db.clone(), ScriptedPools::new(FetchOutcome::RateLimited(3)), 7);
        let err = resolver.resolve(Chain::Solana, "Token111", now).await.unwrap_err();
        assert!(err.is_transient());

        // no position row: the pool is still returned, just not cached
        let resolver = PoolResolver::new(
            db.clone(),
            ScriptedPools::new(FetchOutcome::Data(vec![candidate("p", "SOL", 1.0)])),
            7,
        );
        assert!(matches!(
            resolver.resolve(Chain::Solana, "Token111", now).await.unwrap(),
            PoolResolution::Found(_)
        ));
        assert!(db.load_canonical_pool("Token111", Chain::Solana).unwrap().is_none());
    }
}
