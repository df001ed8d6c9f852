//! Gas metering and scheduling for builtin functions

use crate::{VmError, VmResult};
use serde::{Deserialize, Serialize};
use simchain_core::Gas;
use tracing::trace;

/// Gas costs of the native builtin functions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    /// Fungible token transfer
    pub dcdt_transfer: Gas,
    /// Single NFT/SFT instance transfer
    pub dcdt_nft_transfer: Gas,
    /// Each entry of a multi-transfer
    pub multi_dcdt_nft_transfer_per_transfer: Gas,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            dcdt_transfer: 200_000,
            dcdt_nft_transfer: 200_000,
            multi_dcdt_nft_transfer_per_transfer: 200_000,
        }
    }
}

impl GasSchedule {
    /// Schedule where every builtin is free
    pub fn zero() -> Self {
        Self {
            dcdt_transfer: 0,
            dcdt_nft_transfer: 0,
            multi_dcdt_nft_transfer_per_transfer: 0,
        }
    }

    /// Load gas schedule from TOML configuration
    pub fn from_toml(toml_str: &str) -> VmResult<Self> {
        toml::from_str(toml_str)
            .map_err(|e| VmError::Config(format!("Failed to parse gas schedule: {}", e)))
    }

    /// Convert to TOML string
    pub fn to_toml(&self) -> VmResult<String> {
        toml::to_string(self)
            .map_err(|e| VmError::Config(format!("Failed to serialize gas schedule: {}", e)))
    }

    /// Cost of a multi-transfer carrying `count` entries
    pub fn multi_transfer_cost(&self, count: usize) -> Gas {
        self.multi_dcdt_nft_transfer_per_transfer
            .saturating_mul(count as u64)
    }
}

/// Gas meter for one builtin invocation
#[derive(Debug, Clone)]
pub struct GasMeter {
    /// Gas provided
    limit: Gas,
    /// Gas consumed so far
    consumed: Gas,
}

impl GasMeter {
    /// Create a new gas meter
    pub fn new(limit: Gas) -> Self {
        Self {
            limit,
            consumed: 0,
        }
    }

    /// Get remaining gas
    pub fn remaining(&self) -> Gas {
        self.limit.saturating_sub(self.consumed)
    }

    /// Get consumed gas
    pub fn consumed(&self) -> Gas {
        self.consumed
    }

    /// Total consumed after spending `required`, if the limit allows it
    pub fn check_gas(&self, required: Gas) -> VmResult<Gas> {
        match self.consumed.checked_add(required) {
            Some(total) if total <= self.limit => Ok(total),
            _ => Err(VmError::OutOfGas {
                required,
                available: self.remaining(),
            }),
        }
    }

    /// Consume gas for an operation
    pub fn consume(&mut self, amount: Gas, operation: &str) -> VmResult<()> {
        self.consumed = self.check_gas(amount)?;
        trace!(operation, amount, remaining = self.remaining(), "gas consumed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_schedule_default() {
        let schedule = GasSchedule::default();
        assert_eq!(schedule.dcdt_transfer, 200_000);
        assert_eq!(schedule.multi_transfer_cost(3), 600_000);
        assert_eq!(GasSchedule::zero().multi_transfer_cost(3), 0);
    }

    #[test]
    fn test_gas_schedule_toml() {
        let schedule = GasSchedule::from_toml("dcdt_transfer = 10\n").unwrap();
        assert_eq!(schedule.dcdt_transfer, 10);
        // missing fields fall back to defaults
        assert_eq!(schedule.dcdt_nft_transfer, 200_000);

        let text = schedule.to_toml().unwrap();
        assert_eq!(GasSchedule::from_toml(&text).unwrap(), schedule);

        assert!(matches!(
            GasSchedule::from_toml("dcdt_transfer = \"lots\""),
            Err(VmError::Config(_))
        ));
    }

    #[test]
    fn test_gas_meter_basic() {
        let mut meter = GasMeter::new(100_000);

        assert_eq!(meter.remaining(), 100_000);
        assert_eq!(meter.consumed(), 0);

        meter.consume(1000, "test").unwrap();
        assert_eq!(meter.consumed(), 1000);
        assert_eq!(meter.remaining(), 99_000);
        assert_eq!(meter.check_gas(99_000).unwrap(), 100_000);
    }

    #[test]
    fn test_gas_meter_out_of_gas() {
        let mut meter = GasMeter::new(1000);

        let result = meter.consume(2000, "test");
        match result.unwrap_err() {
            VmError::OutOfGas {
                required,
                available,
            } => {
                assert_eq!(required, 2000);
                assert_eq!(available, 1000);
            }
            _ => panic!("Expected OutOfGas error"),
        }
        assert_eq!(meter.consumed(), 0);
    }

    #[test]
    fn test_gas_meter_rejects_overflow_at_max_limit() {
        let mut meter = GasMeter::new(u64::MAX);
        meter.consume(u64::MAX - 1, "a").unwrap();

        match meter.consume(2, "b").unwrap_err() {
            VmError::OutOfGas {
                required,
                available,
            } => {
                assert_eq!(required, 2);
                assert_eq!(available, 1);
            }
            _ => panic!("Expected OutOfGas error"),
        }
        assert_eq!(meter.consumed(), u64::MAX - 1);

        meter.consume(1, "c").unwrap();
        assert_eq!(meter.remaining(), 0);
    }
}
