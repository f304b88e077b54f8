use alloy::primitives::{Address, B256};

/// Lowercase `0x`-prefixed form used for every address column.
pub fn address_to_hex(address: Address) -> String {
    format!("{address:#x}")
}

/// Lowercase `0x`-prefixed form used for tx-hash and market-id columns.
pub fn b256_to_hex(value: B256) -> String {
    format!("{value:#x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_address_to_hex_is_lowercase() {
        let addr = Address::from_str("0xD8dA6BF26964aF9D7eEd9e03E53415D37aA96045").unwrap();
        assert_eq!(
            address_to_hex(addr),
            "0xd8da6bf26964af9d7eed9e03e53415d37aa96045"
        );
    }

    #[test]
    fn test_b256_to_hex_keeps_leading_zeroes() {
        let id = B256::from_str(
            "0x00000000000000000000000000000000000000000000000000000000000004d2",
        )
        .unwrap();
        assert_eq!(
            b256_to_hex(id),
            "0x00000000000000000000000000000000000000000000000000000000000004d2"
        );
    }
}
