/// GeckoTerminal API client
///
/// API Documentation: https://www.geckoterminal.com/dex-api
///
/// Endpoints implemented:
/// 1. /networks/{network}/tokens/{token}/pools - Pools trading a token
/// 2. /networks/{network}/pools/{pool}/ohlcv/{granularity} - OHLCV bars
pub mod types;

use self::types::{
    base_symbol_from_name, decode_ohlcv_rows, quote_symbol_from_name, strip_network_prefix,
    value_as_f64, OhlcvResponse, PoolData, PoolsResponse, Relationship,
};
use crate::apis::client::{HttpClient, RetryPolicy};
use crate::apis::{FetchOutcome, MarketDataSource, OhlcvBatch, OhlcvQuery};
use crate::chains::Chain;
use crate::config::GeckoTerminalConfig;
use crate::constants::{MAX_OHLCV_LIMIT, POOLS_PER_PAGE};
use crate::errors::BackfillResult;
use crate::logger::{self, LogTag};
use crate::ohlcvs::types::PoolCandidate;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// GeckoTerminal API client with rate limiting and retry
pub struct GeckoTerminalClient {
    http: HttpClient,
    base_url: String,
    pools_timeout: Duration,
    ohlcv_timeout: Duration,
}

impl GeckoTerminalClient {
    pub fn from_config(config: &GeckoTerminalConfig) -> BackfillResult<Self> {
        Ok(Self {
            http: HttpClient::new(
                config.rate_limit_per_minute,
                RetryPolicy::from_config(config),
            )?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            pools_timeout: Duration::from_secs(config.pools_timeout_secs),
            ohlcv_timeout: Duration::from_secs(config.ohlcv_timeout_secs),
        })
    }

    async fn get_json<T>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> FetchOutcome<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        match self.http.get_text(endpoint, &url, query, timeout).await {
            FetchOutcome::Data(body) => match serde_json::from_str::<T>(&body) {
                Ok(value) => FetchOutcome::Data(value),
                Err(e) => FetchOutcome::Failed(format!(
                    "Failed to parse {} response: {}",
                    endpoint, e
                )),
            },
            FetchOutcome::NotFound => FetchOutcome::NotFound,
            FetchOutcome::RateLimited(attempts) => FetchOutcome::RateLimited(attempts),
            FetchOutcome::Failed(message) => FetchOutcome::Failed(message),
        }
    }

    /// Fetch all pools for a single token address
    pub async fn fetch_pools(&self, chain: Chain, token: &str) -> FetchOutcome<Vec<PoolCandidate>> {
        let network = chain.network_id();
        let endpoint = format!("networks/{}/tokens/{}/pools", network, token);
        let query = [
            ("include", "dex,base_token,quote_token".to_string()),
            ("per_page", POOLS_PER_PAGE.to_string()),
        ];

        logger::debug(
            LogTag::Api,
            &format!("[GECKOTERMINAL] Fetching pools: token={}, network={}", token, network),
        );

        self.get_json::<PoolsResponse>(&endpoint, &query, self.pools_timeout)
            .await
            .map(|response| {
                let candidates: Vec<PoolCandidate> = response
                    .data
                    .iter()
                    .filter_map(|pool| to_candidate(&response, pool, chain, token))
                    .collect();
                logger::debug(
                    LogTag::Api,
                    &format!(
                        "[GECKOTERMINAL] {} pools returned for {} ({} usable)",
                        response.data.len(),
                        token,
                        candidates.len()
                    ),
                );
                candidates
            })
    }

    /// Fetch OHLCV candlestick data for a pool, USD denominated
    pub async fn fetch_ohlcv(
        &self,
        chain: Chain,
        pool_address: &str,
        query: &OhlcvQuery,
    ) -> FetchOutcome<OhlcvBatch> {
        let network = chain.network_id();
        let endpoint = format!(
            "networks/{}/pools/{}/ohlcv/{}",
            network,
            pool_address,
            query.granularity.as_str()
        );

        let mut params = vec![
            ("aggregate", query.aggregate.to_string()),
            ("limit", query.limit.clamp(1, MAX_OHLCV_LIMIT).to_string()),
            ("currency", "usd".to_string()),
        ];
        if let Some(ts) = query.before_timestamp {
            params.push(("before_timestamp", ts.to_string()));
        }

        logger::debug(
            LogTag::Api,
            &format!(
                "[GECKOTERMINAL] Fetching OHLCV: network={}, pool={}, granularity={}, aggregate={}, limit={}",
                network,
                pool_address,
                query.granularity.as_str(),
                query.aggregate,
                query.limit
            ),
        );

        self.get_json::<OhlcvResponse>(&endpoint, &params, self.ohlcv_timeout)
            .await
            .map(|response| {
                let batch = decode_ohlcv_rows(&response.data.attributes.ohlcv_list);
                if batch.malformed > 0 {
                    logger::warning(
                        LogTag::Api,
                        &format!(
                            "[GECKOTERMINAL] Skipped {} malformed OHLCV rows for pool {}",
                            batch.malformed, pool_address
                        ),
                    );
                }
                batch
            })
    }
}

#[async_trait]
impl MarketDataSource for GeckoTerminalClient {
    async fn fetch_pools(&self, chain: Chain, token: &str) -> FetchOutcome<Vec<PoolCandidate>> {
        GeckoTerminalClient::fetch_pools(self, chain, token).await
    }

    async fn fetch_ohlcv(
        &self,
        chain: Chain,
        pool: &str,
        query: &OhlcvQuery,
    ) -> FetchOutcome<OhlcvBatch> {
        GeckoTerminalClient::fetch_ohlcv(self, chain, pool, query).await
    }
}

/// Side of a pool resolved through the `included` section
struct TokenSide {
    address: Option<String>,
    symbol: Option<String>,
}

fn resolve_side(
    response: &PoolsResponse,
    relationship: Option<&Relationship>,
    network: &str,
) -> TokenSide {
    let reference = relationship.and_then(|r| r.data.as_ref());
    let included = reference.and_then(|r| response.find_included(r));

    let address = included
        .and_then(|item| item.attribute_str("address"))
        .map(|s| s.to_string())
        .or_else(|| reference.map(|r| strip_network_prefix(&r.id, network).to_string()));
    let symbol = included
        .and_then(|item| item.attribute_str("symbol"))
        .map(|s| s.to_string());

    TokenSide { address, symbol }
}

/// Normalize one pool so that `quote_*` always describes the asset paired against `token`
fn to_candidate(
    response: &PoolsResponse,
    pool: &PoolData,
    chain: Chain,
    token: &str,
) -> Option<PoolCandidate> {
    let network = chain.network_id();
    let address = pool
        .attributes
        .address
        .clone()
        .unwrap_or_else(|| strip_network_prefix(&pool.id, network).to_string());
    if address.trim().is_empty() {
        return None;
    }

    let name = pool.attributes.name.clone().unwrap_or_default();
    let dex_id = pool
        .relationships
        .dex
        .as_ref()
        .and_then(|r| r.id())
        .unwrap_or("unknown")
        .to_string();

    let mut base = resolve_side(response, pool.relationships.base_token.as_ref(), network);
    let mut quote = resolve_side(response, pool.relationships.quote_token.as_ref(), network);
    base.symbol = base.symbol.or_else(|| base_symbol_from_name(&name));
    quote.symbol = quote.symbol.or_else(|| quote_symbol_from_name(&name));

    let token_is_quote = quote
        .address
        .as_deref()
        .map(|a| chain.same_address(a, token))
        .unwrap_or(false);
    if token_is_quote {
        std::mem::swap(&mut base, &mut quote);
    }

    let reserve_usd = pool
        .attributes
        .reserve_in_usd
        .as_ref()
        .and_then(value_as_f64)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0);

    Some(PoolCandidate {
        address,
        name,
        dex_id,
        base_address: base.address,
        quote_address: quote.address,
        quote_symbol: quote.symbol,
        reserve_usd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ohlcvs::types::{RawBar, Timeframe};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct Stub {
        base_url: String,
        hits: Arc<AtomicUsize>,
        requests: Arc<parking_lot::Mutex<Vec<String>>>,
    }

    /// Serve the scripted (status, body) pairs in order, one per connection
    async fn spawn_stub(responses: Vec<(u16, String)>) -> Stub {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let server_hits = hits.clone();
        let server_requests = requests.clone();
        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&buf);
                if let Some(line) = request.lines().next() {
                    server_requests.lock().push(line.to_string());
                }
                server_hits.fetch_add(1, Ordering::SeqCst);

                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Stub {
            base_url: format!("http://{}/api/v2", addr),
            hits,
            requests,
        }
    }

    fn client_for(stub: &Stub) -> GeckoTerminalClient {
        let config = GeckoTerminalConfig {
            base_url: stub.base_url.clone(),
            rate_limit_per_minute: 0,
            backoff_unit_ms: 1,
            pools_timeout_secs: 5,
            ohlcv_timeout_secs: 5,
            ..Default::default()
        };
        GeckoTerminalClient::from_config(&config).unwrap()
    }

    fn pools_body() -> String {
        json!({
            "data": [
                {
                    "id": "solana_PoolNative",
                    "type": "pool",
                    "attributes": {
                        "address": "PoolNative",
                        "name": "BONK / SOL 0.25%",
                        "reserve_in_usd": "1000.5"
                    },
                    "relationships": {
                        "dex": {"data": {"id": "raydium", "type": "dex"}},
                        "base_token": {"data": {"id": "solana_Bonk111", "type": "token"}},
                        "quote_token": {"data": {"id": "solana_So11111111111111111111111111111111111111112", "type": "token"}}
                    }
                },
                {
                    "id": "solana_PoolFlipped",
                    "type": "pool",
                    "attributes": {
                        "address": "PoolFlipped",
                        "name": "USDC / BONK",
                        "reserve_in_usd": 5000
                    },
                    "relationships": {
                        "dex": {"data": {"id": "orca", "type": "dex"}},
                        "base_token": {"data": {"id": "solana_EPjUSDC", "type": "token"}},
                        "quote_token": {"data": {"id": "solana_Bonk111", "type": "token"}}
                    }
                }
            ],
            "included": [
                {"id": "solana_Bonk111", "type": "token", "attributes": {"address": "Bonk111", "symbol": "BONK"}},
                {"id": "solana_So11111111111111111111111111111111111111112", "type": "token",
                 "attributes": {"address": "So11111111111111111111111111111111111111112", "symbol": "SOL"}},
                {"id": "raydium", "type": "dex", "attributes": {"name": "Raydium"}}
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_fetch_pools_retries_after_rate_limit() {
        let stub = spawn_stub(vec![
            (429, "{}".to_string()),
            (200, pools_body()),
        ])
        .await;
        let client = client_for(&stub);

        let outcome = client.fetch_pools(Chain::Solana, "Bonk111").await;
        let pools = match outcome {
            FetchOutcome::Data(pools) => pools,
            other => panic!("expected pools, got {:?}", other),
        };
        assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
        assert_eq!(pools.len(), 2);

        assert_eq!(pools[0].address, "PoolNative");
        assert_eq!(pools[0].dex_id, "raydium");
        assert_eq!(pools[0].quote_symbol.as_deref(), Some("SOL"));
        assert_eq!(pools[0].reserve_usd, 1000.5);

        // token sits on the quote side here, so the sides are swapped
        assert_eq!(pools[1].quote_address.as_deref(), Some("EPjUSDC"));
        assert_eq!(pools[1].quote_symbol.as_deref(), Some("USDC"));
        assert_eq!(pools[1].reserve_usd, 5000.0);

        let request = stub.requests.lock()[1].clone();
        assert!(request.contains("/networks/solana/tokens/Bonk111/pools"));
        assert!(request.contains("per_page=50"));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let stub = spawn_stub(vec![(404, "{}".to_string()), (200, pools_body())]).await;
        let client = client_for(&stub);

        let outcome = client.fetch_pools(Chain::Solana, "Bonk111").await;
        assert_eq!(outcome, FetchOutcome::NotFound);
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_attempts() {
        let stub = spawn_stub(vec![
            (500, "{}".to_string()),
            (502, "{}".to_string()),
            (503, "{}".to_string()),
            (200, pools_body()),
        ])
        .await;
        let client = client_for(&stub);

        let outcome = client.fetch_pools(Chain::Solana, "Bonk111").await;
        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        assert_eq!(stub.hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_is_reported() {
        let stub = spawn_stub(vec![
            (429, "{}".to_string()),
            (429, "{}".to_string()),
            (429, "{}".to_string()),
        ])
        .await;
        let client = client_for(&stub);

        let query = OhlcvQuery::for_timeframe(Timeframe::Minute1, 10, None);
        let outcome = client.fetch_ohlcv(Chain::Solana, "PoolNative", &query).await;
        assert_eq!(outcome, FetchOutcome::RateLimited(3));
    }

    #[tokio::test]
    async fn test_client_error_fails_immediately() {
        let stub = spawn_stub(vec![(400, "{\"error\":\"bad\"}".to_string())]).await;
        let client = client_for(&stub);

        let outcome = client.fetch_pools(Chain::Ethereum, "0xabc").await;
        match outcome {
            FetchOutcome::Failed(message) => assert!(message.contains("400")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_ohlcv_query_and_decoding() {
        let body = json!({
            "data": {
                "id": "ohlcv",
                "type": "ohlcv_request_response",
                "attributes": {
                    "ohlcv_list": [
                        [1700003600, 2.0, 2.2, 1.9, 2.1, 50.0],
                        [1700000000, "1.0", "1.1", "0.9", "1.05", "10"],
                        ["garbage"]
                    ]
                }
            },
            "meta": {}
        })
        .to_string();
        let stub = spawn_stub(vec![(200, body)]).await;
        let client = client_for(&stub);

        let query = OhlcvQuery::for_timeframe(Timeframe::Hour4, 676, Some(1_700_010_000));
        let outcome = client.fetch_ohlcv(Chain::Ethereum, "0xpool", &query).await;
        let batch = match outcome {
            FetchOutcome::Data(batch) => batch,
            other => panic!("expected bars, got {:?}", other),
        };
        assert_eq!(batch.malformed, 1);
        assert_eq!(
            batch.bars[1],
            RawBar::new(1_700_000_000, 1.0, 1.1, 0.9, 1.05, 10.0)
        );

        let request = stub.requests.lock()[0].clone();
        assert!(request.contains("/networks/eth/pools/0xpool/ohlcv/hour"));
        assert!(request.contains("aggregate=4"));
        assert!(request.contains("limit=676"));
        assert!(request.contains("currency=usd"));
        assert!(request.contains("before_timestamp=1700010000"));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_a_failure() {
        let stub = spawn_stub(vec![(200, "not json".to_string())]).await;
        let client = client_for(&stub);

        let query = OhlcvQuery::for_timeframe(Timeframe::Minute1, 10, None);
        let outcome = client.fetch_ohlcv(Chain::Solana, "PoolNative", &query).await;
        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
    }
}
