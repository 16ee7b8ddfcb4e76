use std::fmt;

/// An asset traded on the exchange: the distinguished native asset, or an
/// issued asset identified by its code and issuing account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Asset {
    Native,
    Issued { code: String, issuer: String },
}

impl Asset {
    pub fn issued(code: impl Into<String>, issuer: impl Into<String>) -> Self {
        Asset::Issued {
            code: code.into(),
            issuer: issuer.into(),
        }
    }

    /// Key format at the system boundary: `XLM_native` for the native asset,
    /// `CODE_ISSUER` otherwise.
    pub fn key(&self) -> String {
        match self {
            Asset::Native => "XLM_native".to_string(),
            Asset::Issued { code, issuer } => format!("{code}_{issuer}"),
        }
    }

    /// Parses a two-token `code_issuer` pair as produced by [`TradingPair::key`] splitting.
    pub fn from_parts(code: &str, issuer: &str) -> Self {
        if code == "XLM" && issuer == "native" {
            Asset::Native
        } else {
            Asset::issued(code, issuer)
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// An ordered pair of assets traded against each other: `(base, counter)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TradingPair {
    pub base: Asset,
    pub counter: Asset,
}

impl TradingPair {
    pub fn new(base: Asset, counter: Asset) -> Self {
        Self { base, counter }
    }

    /// Key format: `baseCode_baseIssuer_counterCode_counterIssuer`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.base.key(), self.counter.key())
    }

    /// Inverse of [`TradingPair::key`]: splits a 4-token underscore-joined key
    /// back into base/counter assets. Returns `None` if the key is malformed.
    pub fn from_key(key: &str) -> Option<Self> {
        let parts: Vec<&str> = key.split('_').collect();
        if parts.len() != 4 {
            return None;
        }
        Some(TradingPair::new(
            Asset::from_parts(parts[0], parts[1]),
            Asset::from_parts(parts[2], parts[3]),
        ))
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_asset_key() {
        assert_eq!(Asset::Native.key(), "XLM_native");
    }

    #[test]
    fn issued_asset_key() {
        let a = Asset::issued("USD", "IssuerA");
        assert_eq!(a.key(), "USD_IssuerA");
    }

    #[test]
    fn trading_pair_key_round_trip() {
        let pair = TradingPair::new(Asset::Native, Asset::issued("USD", "IssuerA"));
        let key = pair.key();
        assert_eq!(key, "XLM_native_USD_IssuerA");
        assert_eq!(TradingPair::from_key(&key), Some(pair));
    }

    #[test]
    fn from_key_rejects_malformed_input() {
        assert_eq!(TradingPair::from_key("too_few_parts"), None);
    }
}
