use serde::{Deserialize, Serialize};

/// Consensus parameters the engine checks requests against.
///
/// Hosts usually deserialize this from their own configuration files: every
/// field has a default, so partial documents are accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Chain identifier that signed requests must carry.
    pub chain_id: String,
    /// Largest gas limit accepted for a committed transaction.
    pub max_gas_per_transaction: u64,
    /// Largest gas limit accepted for a view run.
    pub max_gas_per_view: u64,
    /// Smallest gas price accepted.
    pub gas_price: u64,
    /// Accept any gas price, even below [EngineConfig::gas_price].
    pub ignores_gas_price: bool,
    /// Allow installed code to declare self-charged methods.
    pub allows_self_charged: bool,
    /// Install jars without verifying them.
    pub skips_verification: bool,
    /// Accept requests without checking their signature.
    pub skips_signature_check: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: String::new(),
            max_gas_per_transaction: 1_000_000_000,
            max_gas_per_view: 100_000_000,
            gas_price: 1,
            ignores_gas_price: false,
            allows_self_charged: false,
            skips_verification: false,
            skips_signature_check: false,
        }
    }
}

impl EngineConfig {
    pub fn with_chain_id(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_fall_back_to_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "chain_id": "test", "gas_price": 7 }"#).unwrap();
        assert_eq!(config.chain_id, "test");
        assert_eq!(config.gas_price, 7);
        assert_eq!(
            config.max_gas_per_transaction,
            EngineConfig::default().max_gas_per_transaction
        );
        assert!(!config.skips_signature_check);
    }

    #[test]
    fn round_trips_through_json() {
        let config = EngineConfig {
            ignores_gas_price: true,
            ..EngineConfig::with_chain_id("mainnet")
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<EngineConfig>(&json).unwrap(), config);
    }
}
