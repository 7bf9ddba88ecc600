//! Approximate fee accounting for native balance changes.
//!
//! The estimate is tiered by the size of the raw change. Configured thresholds
//! are expressed in these fee-adjusted amounts.

/// Network base fee per signature, in SOL
pub const BASE_FEE_SOL: f64 = 0.000_005;

/// Protocol fee as a fraction of the raw change
pub const PROTOCOL_FEE_RATE: f64 = 0.02;

/// Upper bound of net/raw for large transactions
pub const LARGE_TRADE_NET_CAP: f64 = 0.88;

/// Raw changes below this are "small"
pub const SMALL_BAND_MAX_SOL: f64 = 0.1;

/// Raw changes at or above this are "large"
pub const LARGE_BAND_MIN_SOL: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeBand {
    Small,
    Medium,
    Large,
}

impl FeeBand {
    pub fn for_change(raw_change: f64) -> Self {
        if raw_change >= LARGE_BAND_MIN_SOL {
            FeeBand::Large
        } else if raw_change >= SMALL_BAND_MAX_SOL {
            FeeBand::Medium
        } else {
            FeeBand::Small
        }
    }

    /// Estimated priority fee paid by transactions of this size, in SOL
    pub fn priority_fee(&self) -> f64 {
        match self {
            FeeBand::Small => 0.000_1,
            FeeBand::Medium => 0.000_5,
            FeeBand::Large => 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeEstimate {
    pub band: FeeBand,
    pub base_fee: f64,
    pub priority_fee: f64,
    pub protocol_fee: f64,
}

impl FeeEstimate {
    pub fn total(&self) -> f64 {
        self.base_fee + self.priority_fee + self.protocol_fee
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeeEstimator;

impl FeeEstimator {
    pub fn new() -> Self {
        Self
    }

    pub fn estimate(&self, raw_change: f64) -> FeeEstimate {
        let raw_change = sanitize(raw_change);
        let band = FeeBand::for_change(raw_change);
        FeeEstimate {
            band,
            base_fee: BASE_FEE_SOL,
            priority_fee: band.priority_fee(),
            protocol_fee: raw_change * PROTOCOL_FEE_RATE,
        }
    }

    /// Fee-adjusted amount for a raw native change.
    ///
    /// Never negative. Large changes are capped at 88% of the raw change.
    pub fn net_amount(&self, raw_change: f64) -> f64 {
        let raw_change = sanitize(raw_change);
        let estimate = self.estimate(raw_change);
        let net = (raw_change - estimate.total()).max(0.0);

        let cap = raw_change * LARGE_TRADE_NET_CAP;
        if estimate.band == FeeBand::Large && net > cap {
            return cap;
        }

        net
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() { value.abs() } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(FeeBand::for_change(0.05), FeeBand::Small);
        assert_eq!(FeeBand::for_change(0.1), FeeBand::Medium);
        assert_eq!(FeeBand::for_change(0.99), FeeBand::Medium);
        assert_eq!(FeeBand::for_change(1.0), FeeBand::Large);
    }

    #[test]
    fn test_large_change_capped() {
        let net = FeeEstimator::new().net_amount(1.0);
        assert!((net - 0.88).abs() < 1e-12);
    }

    #[test]
    fn test_medium_change_not_capped() {
        let estimator = FeeEstimator::new();
        let net = estimator.net_amount(0.5);
        let expected = 0.5 - (BASE_FEE_SOL + 0.000_5 + 0.5 * PROTOCOL_FEE_RATE);
        assert!((net - expected).abs() < 1e-12);
        assert!(net > 0.5 * LARGE_TRADE_NET_CAP);
    }

    #[test]
    fn test_dust_never_negative() {
        let estimator = FeeEstimator::new();
        assert_eq!(estimator.net_amount(0.000_01), 0.0);
        assert_eq!(estimator.net_amount(0.0), 0.0);
        assert_eq!(estimator.net_amount(f64::NAN), 0.0);
    }
}
