use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Hex-quantity (`"0x1b4"`) deserialization for JSON-RPC number fields.
pub(crate) mod hex_u64 {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("bad hex quantity: {raw}")))
    }

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{value:x}"))
    }

    pub fn parse(raw: &str) -> Option<u64> {
        let stripped = raw.strip_prefix("0x").unwrap_or(raw);
        u64::from_str_radix(stripped, 16).ok()
    }
}

pub(crate) mod hex_u64_opt {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::hex_u64::parse))
    }

    pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_some(&format!("0x{v:x}")),
            None => serializer.serialize_none(),
        }
    }
}

/// One raw log exactly as `eth_getLogs` returns it. Everything stays a hex
/// string until the decoder; only block/log positions are parsed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "default_data")]
    pub data: String,
    #[serde(with = "hex_u64")]
    pub block_number: u64,
    #[serde(default)]
    pub block_hash: Option<String>,
    pub transaction_hash: String,
    #[serde(default, with = "hex_u64_opt")]
    pub transaction_index: Option<u64>,
    #[serde(with = "hex_u64")]
    pub log_index: u64,
    #[serde(default)]
    pub removed: bool,
}

fn default_data() -> String {
    "0x".to_string()
}

/// The slice of `eth_getBlockByNumber` the resolver needs.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBlockHeader {
    #[serde(with = "hex_u64")]
    pub number: u64,
    #[serde(with = "hex_u64")]
    pub timestamp: u64,
}

/// The slice of `eth_getTransactionByHash` the reward reconciler needs:
/// enough to decode calldata and attribute it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub hash: String,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    pub input: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_log_deserializes_getlogs_shape() {
        let json = r#"{
            "address": "0x87870bca3f3fd6335c3f4ce8392d69350b4fa4e2",
            "topics": ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"],
            "data": "0x00000000000000000000000000000000000000000000000000000002540be400",
            "blockNumber": "0x112a880",
            "blockHash": "0xabc0000000000000000000000000000000000000000000000000000000000001",
            "transactionHash": "0xdef0000000000000000000000000000000000000000000000000000000000002",
            "transactionIndex": "0x3",
            "logIndex": "0x1f",
            "removed": false
        }"#;

        let log: RawLog = serde_json::from_str(json).unwrap();
        assert_eq!(log.block_number, 18_000_000);
        assert_eq!(log.log_index, 31);
        assert_eq!(log.transaction_index, Some(3));
        assert!(!log.removed);
    }

    #[test]
    fn test_raw_log_defaults_for_missing_fields() {
        let json = r#"{
            "address": "0x87870bca3f3fd6335c3f4ce8392d69350b4fa4e2",
            "blockNumber": "0x10",
            "transactionHash": "0xdef0000000000000000000000000000000000000000000000000000000000002",
            "logIndex": "0x0"
        }"#;

        let log: RawLog = serde_json::from_str(json).unwrap();
        assert_eq!(log.data, "0x");
        assert!(log.topics.is_empty());
        assert!(!log.removed);
    }
}
