use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// Unit costs of CPU, RAM and storage, and their conversion into coins.
///
/// The model is a plain value: hosts deserialize it from their configuration
/// and every transaction reads it once from the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasCostModel {
    /// CPU charged to every non-initial transaction before anything else.
    pub cpu_base_transaction_cost: u64,
    /// Storage gas charged for each byte of a persisted request or response.
    pub storage_cost_per_byte: u64,
    /// CPU charged for fetching the response of a classpath jar.
    pub cpu_cost_for_getting_response: u64,
    /// Bytes of jar that cost one unit of CPU when loaded.
    pub jar_bytes_per_cpu_unit_loaded: u64,
    /// Bytes of jar that cost one unit of RAM when loaded.
    pub jar_bytes_per_ram_unit_loaded: u64,
    /// Bytes of jar that cost one unit of CPU when installed.
    pub jar_bytes_per_cpu_unit_installed: u64,
    /// Bytes of jar that cost one unit of RAM when installed.
    pub jar_bytes_per_ram_unit_installed: u64,
    pub ram_cost_of_activation_record: u64,
    pub ram_cost_of_object: u64,
    pub ram_cost_of_field: u64,
}

impl Default for GasCostModel {
    fn default() -> Self {
        Self {
            cpu_base_transaction_cost: 10,
            storage_cost_per_byte: 1,
            cpu_cost_for_getting_response: 10,
            jar_bytes_per_cpu_unit_loaded: 2000,
            jar_bytes_per_ram_unit_loaded: 500,
            jar_bytes_per_cpu_unit_installed: 400,
            jar_bytes_per_ram_unit_installed: 40,
            ram_cost_of_activation_record: 3,
            ram_cost_of_object: 4,
            ram_cost_of_field: 1,
        }
    }
}

fn per_bytes(length: usize, bytes_per_unit: u64) -> u64 {
    1 + length as u64 / bytes_per_unit.max(1)
}

impl GasCostModel {
    pub fn cpu_base_transaction_cost(&self) -> u64 {
        self.cpu_base_transaction_cost
    }

    pub fn storage_cost_of_bytes(&self, bytes: usize) -> u64 {
        (bytes as u64).saturating_mul(self.storage_cost_per_byte)
    }

    pub fn cpu_cost_for_getting_response_at(&self) -> u64 {
        self.cpu_cost_for_getting_response
    }

    pub fn cpu_cost_for_loading_jar(&self, length: usize) -> u64 {
        per_bytes(length, self.jar_bytes_per_cpu_unit_loaded)
    }

    pub fn ram_cost_for_loading_jar(&self, length: usize) -> u64 {
        per_bytes(length, self.jar_bytes_per_ram_unit_loaded)
    }

    pub fn cpu_cost_for_installing_jar(&self, length: usize) -> u64 {
        per_bytes(length, self.jar_bytes_per_cpu_unit_installed)
    }

    pub fn ram_cost_for_installing_jar(&self, length: usize) -> u64 {
        per_bytes(length, self.jar_bytes_per_ram_unit_installed)
    }

    pub fn ram_cost_of_activation_record(&self) -> u64 {
        self.ram_cost_of_activation_record
    }

    pub fn ram_cost_of_object(&self) -> u64 {
        self.ram_cost_of_object
    }

    pub fn ram_cost_of_field(&self) -> u64 {
        self.ram_cost_of_field
    }

    /// Coins paid for `gas` units at `price` coins each.
    pub fn to_coins(gas: u64, price: u64) -> BigInt {
        BigInt::from(gas) * BigInt::from(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jar_costs_grow_with_length() {
        let model = GasCostModel::default();
        assert_eq!(model.cpu_cost_for_loading_jar(0), 1);
        assert_eq!(model.cpu_cost_for_loading_jar(4000), 3);
        assert_eq!(model.ram_cost_for_installing_jar(400), 11);
        assert_eq!(model.storage_cost_of_bytes(120), 120);
    }

    #[test]
    fn zero_divisor_does_not_panic() {
        let model = GasCostModel {
            jar_bytes_per_cpu_unit_loaded: 0,
            ..Default::default()
        };
        assert_eq!(model.cpu_cost_for_loading_jar(10), 11);
    }

    #[test]
    fn partial_configuration_keeps_defaults() {
        let model: GasCostModel =
            serde_json::from_str(r#"{ "storage_cost_per_byte": 5 }"#).unwrap();
        assert_eq!(model.storage_cost_per_byte, 5);
        assert_eq!(model.cpu_base_transaction_cost, 10);
    }

    #[test]
    fn coins_do_not_overflow() {
        let coins = GasCostModel::to_coins(u64::MAX, u64::MAX);
        assert_eq!(coins, BigInt::from(u64::MAX) * BigInt::from(u64::MAX));
    }
}
