/// GeckoTerminal JSON:API response shapes
///
/// Numeric fields arrive as strings or numbers depending on the endpoint, so
/// they are kept as `serde_json::Value` and converted with [`value_as_f64`].
use crate::apis::OhlcvBatch;
use crate::ohlcvs::types::RawBar;
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Pools for token
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PoolsResponse {
    #[serde(default)]
    pub data: Vec<PoolData>,
    #[serde(default)]
    pub included: Vec<IncludedResource>,
}

#[derive(Debug, Deserialize)]
pub struct PoolData {
    pub id: String,
    #[serde(default)]
    pub attributes: PoolAttributes,
    #[serde(default)]
    pub relationships: PoolRelationships,
}

#[derive(Debug, Default, Deserialize)]
pub struct PoolAttributes {
    pub address: Option<String>,
    pub name: Option<String>,
    pub reserve_in_usd: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PoolRelationships {
    pub dex: Option<Relationship>,
    pub base_token: Option<Relationship>,
    pub quote_token: Option<Relationship>,
}

#[derive(Debug, Deserialize)]
pub struct Relationship {
    pub data: Option<ResourceRef>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceRef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Side-loaded dex or token resource
#[derive(Debug, Deserialize)]
pub struct IncludedResource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Value,
}

impl PoolsResponse {
    pub fn find_included(&self, reference: &ResourceRef) -> Option<&IncludedResource> {
        self.included
            .iter()
            .find(|item| item.id == reference.id && item.kind == reference.kind)
    }
}

impl Relationship {
    pub fn id(&self) -> Option<&str> {
        self.data.as_ref().map(|r| r.id.as_str())
    }
}

impl IncludedResource {
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// Strip the `{network}_` prefix GeckoTerminal puts on resource ids
pub fn strip_network_prefix<'a>(id: &'a str, network: &str) -> &'a str {
    id.strip_prefix(network)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(id)
}

/// Quote side of a pair name such as `"BONK / SOL 0.25%"`
pub fn quote_symbol_from_name(name: &str) -> Option<String> {
    let (_, quote) = name.split_once(" / ")?;
    quote
        .split_whitespace()
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Base side of a pair name
pub fn base_symbol_from_name(name: &str) -> Option<String> {
    let (base, _) = name.split_once(" / ")?;
    let base = base.trim();
    (!base.is_empty()).then(|| base.to_string())
}

// ============================================================================
// OHLCV
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OhlcvResponse {
    pub data: OhlcvData,
}

#[derive(Debug, Deserialize)]
pub struct OhlcvData {
    pub attributes: OhlcvAttributes,
}

#[derive(Debug, Deserialize)]
pub struct OhlcvAttributes {
    #[serde(default)]
    pub ohlcv_list: Vec<Vec<Value>>,
}

/// Number or numeric string to f64
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn decode_row(row: &[Value]) -> Option<RawBar> {
    if row.len() < 6 {
        return None;
    }
    let timestamp = value_as_f64(&row[0]).filter(|t| t.is_finite())?;
    // unreadable cells become NaN and are rejected by the validator
    let cell = |i: usize| value_as_f64(&row[i]).unwrap_or(f64::NAN);

    Some(RawBar::new(
        timestamp as i64,
        cell(1),
        cell(2),
        cell(3),
        cell(4),
        cell(5),
    ))
}

/// Decode `[timestamp, open, high, low, close, volume]` rows, counting the ones that do not parse
pub fn decode_ohlcv_rows(rows: &[Vec<Value>]) -> OhlcvBatch {
    let mut batch = OhlcvBatch {
        bars: Vec::with_capacity(rows.len()),
        malformed: 0,
    };
    for row in rows {
        match decode_row(row) {
            Some(bar) => batch.bars.push(bar),
            None => batch.malformed += 1,
        }
    }
    batch
}
