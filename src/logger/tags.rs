/// Log tags identifying the subsystem a message comes from

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Api,
    Pools,
    Ohlcv,
    Database,
    Lifecycle,
    Other(String),
}

impl LogTag {
    /// Key used by `--debug <tag>` flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Api => "api".to_string(),
            LogTag::Pools => "pools".to_string(),
            LogTag::Ohlcv => "ohlcv".to_string(),
            LogTag::Database => "database".to_string(),
            LogTag::Lifecycle => "lifecycle".to_string(),
            LogTag::Other(s) => s.to_lowercase(),
        }
    }

    pub fn to_plain_string(&self) -> String {
        self.to_debug_key().to_uppercase()
    }
}
