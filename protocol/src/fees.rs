//! # Fee & Collateral Calculator
//!
//! Pure integer arithmetic over the settlement asset's smallest unit. Every
//! product is formed before the division (`value * bps / 10_000`) and the
//! division truncates, so any two implementations that follow the same order
//! of operations agree to the last unit. No floating point anywhere.
//!
//! Products are computed in `u128` and narrowed back to `u64` with a checked
//! conversion. Sums use `checked_add`. Overflow is an error, never a wrap.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{
    BPS_DENOMINATOR, COLLATERAL_BPS, INSURANCE_FEE_BPS, PROTOCOL_FEE_BPS,
};

/// Errors from fee and collateral computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeError {
    /// The result does not fit in a `u64`.
    #[error("amount overflow computing {what}")]
    Overflow {
        /// Which quantity overflowed.
        what: &'static str,
    },

    /// A value that must be strictly positive was zero.
    #[error("{what} must be greater than zero")]
    ZeroValue {
        /// Which input was zero.
        what: &'static str,
    },
}

/// Basis-point schedule used to price an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Protocol fee in basis points of the package value.
    pub protocol_fee_bps: u64,
    /// Insurance fee in basis points of the package value.
    pub insurance_fee_bps: u64,
    /// Required courier collateral in basis points of the package value.
    pub collateral_bps: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            protocol_fee_bps: PROTOCOL_FEE_BPS,
            insurance_fee_bps: INSURANCE_FEE_BPS,
            collateral_bps: COLLATERAL_BPS,
        }
    }
}

/// Everything the emitter pays into escrow, itemised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    /// Declared value of the package.
    pub package_value: u64,
    /// Fee the courier earns on successful delivery.
    pub delivery_fee: u64,
    /// Protocol fee (1% of package value by default).
    pub protocol_fee: u64,
    /// Insurance fee (0.5% of package value by default).
    pub insurance_fee: u64,
    /// Sum of the four components above.
    pub total_deposit: u64,
}

impl FeeSchedule {
    /// `package_value * protocol_fee_bps / 10_000`.
    pub fn protocol_fee(&self, package_value: u64) -> Result<u64, FeeError> {
        apply_bps(package_value, self.protocol_fee_bps, "protocol fee")
    }

    /// `package_value * insurance_fee_bps / 10_000`.
    pub fn insurance_fee(&self, package_value: u64) -> Result<u64, FeeError> {
        apply_bps(package_value, self.insurance_fee_bps, "insurance fee")
    }

    /// `package_value * collateral_bps / 10_000`.
    pub fn required_collateral(&self, package_value: u64) -> Result<u64, FeeError> {
        apply_bps(package_value, self.collateral_bps, "required collateral")
    }

    /// `package_value + delivery_fee + protocol_fee + insurance_fee`.
    pub fn total_deposit(&self, package_value: u64, delivery_fee: u64) -> Result<u64, FeeError> {
        Ok(self.quote(package_value, delivery_fee)?.total_deposit)
    }

    /// Computes the full deposit breakdown for an order.
    ///
    /// Accepts zero inputs; whether a zero package value is acceptable is
    /// the caller's decision (see [`validate_package_value`]).
    pub fn quote(&self, package_value: u64, delivery_fee: u64) -> Result<FeeBreakdown, FeeError> {
        let protocol_fee = self.protocol_fee(package_value)?;
        let insurance_fee = self.insurance_fee(package_value)?;

        let total_deposit = package_value
            .checked_add(delivery_fee)
            .and_then(|v| v.checked_add(protocol_fee))
            .and_then(|v| v.checked_add(insurance_fee))
            .ok_or(FeeError::Overflow {
                what: "total deposit",
            })?;

        Ok(FeeBreakdown {
            package_value,
            delivery_fee,
            protocol_fee,
            insurance_fee,
            total_deposit,
        })
    }
}

/// Rejects a zero package value. Orders must escrow something.
pub fn validate_package_value(package_value: u64) -> Result<(), FeeError> {
    if package_value == 0 {
        return Err(FeeError::ZeroValue {
            what: "package value",
        });
    }
    Ok(())
}

/// Protocol fee under the default schedule.
pub fn protocol_fee(package_value: u64) -> Result<u64, FeeError> {
    FeeSchedule::default().protocol_fee(package_value)
}

/// Insurance fee under the default schedule.
pub fn insurance_fee(package_value: u64) -> Result<u64, FeeError> {
    FeeSchedule::default().insurance_fee(package_value)
}

/// Total deposit under the default schedule.
pub fn total_deposit(package_value: u64, delivery_fee: u64) -> Result<u64, FeeError> {
    FeeSchedule::default().total_deposit(package_value, delivery_fee)
}

/// Required courier collateral under the default schedule.
pub fn required_collateral(package_value: u64) -> Result<u64, FeeError> {
    FeeSchedule::default().required_collateral(package_value)
}

fn apply_bps(value: u64, bps: u64, what: &'static str) -> Result<u64, FeeError> {
    let product = (value as u128) * (bps as u128);
    let quotient = product / (BPS_DENOMINATOR as u128);
    u64::try_from(quotient).map_err(|_| FeeError::Overflow { what })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_quote_five_units() {
        // 5.00 units of a 6-decimal asset with a 1.00 unit delivery fee.
        let q = FeeSchedule::default().quote(5_000_000, 1_000_000).unwrap();
        assert_eq!(q.protocol_fee, 50_000);
        assert_eq!(q.insurance_fee, 25_000);
        assert_eq!(q.total_deposit, 6_075_000);
    }

    #[test]
    fn collateral_is_110_percent() {
        assert_eq!(required_collateral(50_000_000).unwrap(), 55_000_000);
        assert_eq!(required_collateral(0).unwrap(), 0);
    }

    #[test]
    fn division_truncates_after_multiplying() {
        // 199 * 100 / 10_000 = 1.99 -> 1; dividing first would give 0.
        assert_eq!(protocol_fee(199).unwrap(), 1);
        assert_eq!(insurance_fee(199).unwrap(), 0);
        assert_eq!(required_collateral(9).unwrap(), 9);
        assert_eq!(required_collateral(10).unwrap(), 11);
    }

    #[test]
    fn total_is_sum_of_components() {
        for (pv, fee) in [(1u64, 0u64), (12_345, 678), (999_999_999, 1), (7, 7)] {
            let q = FeeSchedule::default().quote(pv, fee).unwrap();
            assert_eq!(
                q.total_deposit,
                q.package_value + q.delivery_fee + q.protocol_fee + q.insurance_fee
            );
            assert_eq!(q.total_deposit, total_deposit(pv, fee).unwrap());
        }
    }

    #[test]
    fn large_values_do_not_overflow_the_product() {
        // u64::MAX * 100 overflows u64 but not the u128 intermediate.
        let fee = protocol_fee(u64::MAX).unwrap();
        assert_eq!(fee, u64::MAX / 100);
    }

    #[test]
    fn collateral_overflow_is_reported() {
        let err = required_collateral(u64::MAX).unwrap_err();
        assert_eq!(
            err,
            FeeError::Overflow {
                what: "required collateral"
            }
        );
    }

    #[test]
    fn deposit_overflow_is_reported() {
        assert!(total_deposit(u64::MAX - 10, 100).is_err());
    }

    #[test]
    fn zero_package_value_rejected_by_validation() {
        assert!(validate_package_value(0).is_err());
        assert!(validate_package_value(1).is_ok());
    }

    #[test]
    fn custom_schedule_is_respected() {
        let schedule = FeeSchedule {
            protocol_fee_bps: 250,
            insurance_fee_bps: 0,
            collateral_bps: 15_000,
        };
        let q = schedule.quote(1_000_000, 0).unwrap();
        assert_eq!(q.protocol_fee, 25_000);
        assert_eq!(q.insurance_fee, 0);
        assert_eq!(schedule.required_collateral(1_000_000).unwrap(), 1_500_000);
    }
}
