//! Lossless conversions between chain-native 256-bit integers and the
//! `Numeric` values persisted in Postgres. USDC amounts are 6-decimal fixed
//! point; a single float round-trip loses currency, so nothing here goes
//! through `f64`.

use alloy::primitives::{I256, U256};
use bigdecimal::BigDecimal;
use bigdecimal::num_bigint::{BigInt, Sign};

/// Exact `U256` -> `BigDecimal`, via big-endian bytes rather than strings.
pub fn u256_to_bigdecimal(value: U256) -> BigDecimal {
    let bytes = value.to_be_bytes::<32>();
    BigDecimal::from(BigInt::from_bytes_be(Sign::Plus, &bytes))
}

/// Exact `I256` -> `BigDecimal`, preserving the sign.
pub fn i256_to_bigdecimal(value: I256) -> BigDecimal {
    let magnitude = value.unsigned_abs().to_be_bytes::<32>();
    let sign = if value.is_negative() {
        Sign::Minus
    } else {
        Sign::Plus
    };
    BigDecimal::from(BigInt::from_bytes_be(sign, &magnitude))
}

/// Canonical decimal-string form, used to normalize epoch ids. Parsing as
/// `U256` first means ids beyond 2^53 survive intact.
pub fn u256_to_decimal_string(value: U256) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_u256_round_trip_small() {
        let v = U256::from(50_000_000u64);
        assert_eq!(u256_to_bigdecimal(v).to_string(), "50000000");
    }

    #[test]
    fn test_u256_round_trip_past_f64_precision() {
        // 2^53 + 1 is the first integer an f64 cannot represent.
        let v = U256::from(9_007_199_254_740_993u64);
        assert_eq!(u256_to_bigdecimal(v).to_string(), "9007199254740993");
    }

    #[test]
    fn test_u256_round_trip_max() {
        let v = U256::MAX;
        let expected =
            "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        assert_eq!(u256_to_bigdecimal(v).to_string(), expected);
        assert_eq!(u256_to_decimal_string(v), expected);
    }

    #[test]
    fn test_i256_negative_flow() {
        let v = I256::from_str("-50000000").unwrap();
        assert_eq!(i256_to_bigdecimal(v).to_string(), "-50000000");
    }

    #[test]
    fn test_i256_min_does_not_overflow() {
        let v = I256::MIN;
        assert_eq!(
            i256_to_bigdecimal(v).to_string(),
            "-57896044618658097711785492504343953926634992332820282019728792003956564819968"
        );
    }

    #[test]
    fn test_epoch_id_normalization_beyond_2_53() {
        let id = U256::from_str("18014398509481984001").unwrap();
        assert_eq!(u256_to_decimal_string(id), "18014398509481984001");
    }
}
