use crate::{EthRpc, RpcError};

/// Binary search for the earliest block whose timestamp is >= `target_ts`.
/// Used once at startup to turn a lookback window in days into a starting
/// block number. Block timestamps are monotonic, so plain bisection works.
pub async fn find_block_at_timestamp(
    rpc: &dyn EthRpc,
    target_ts: u64,
) -> Result<u64, RpcError> {
    let head = rpc.block_number().await?;
    let head_ts = rpc.get_block_timestamp(head).await?;
    if head_ts <= target_ts {
        return Ok(head);
    }

    let mut low = 1u64;
    let mut high = head;
    while low < high {
        let mid = low + (high - low) / 2;
        let mid_ts = rpc.get_block_timestamp(mid).await?;
        if mid_ts < target_ts {
            low = mid + 1;
        } else {
            high = mid;
        }
    }

    Ok(low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawLog, RawTransaction};
    use alloy::primitives::{Address, B256};
    use async_trait::async_trait;

    /// Chain where block N has timestamp 1000 + 12 * N.
    struct FixedCadenceChain {
        head: u64,
    }

    #[async_trait]
    impl EthRpc for FixedCadenceChain {
        async fn block_number(&self) -> Result<u64, RpcError> {
            Ok(self.head)
        }

        async fn get_logs(
            &self,
            _from: u64,
            _to: u64,
            _addresses: &[Address],
            _topic0: Option<Vec<B256>>,
        ) -> Result<Vec<RawLog>, RpcError> {
            unimplemented!("not used by lookup")
        }

        async fn get_block_timestamp(&self, block_number: u64) -> Result<u64, RpcError> {
            Ok(1000 + 12 * block_number)
        }

        async fn call(&self, _to: Address, _data: Vec<u8>) -> Result<Vec<u8>, RpcError> {
            unimplemented!("not used by lookup")
        }

        async fn get_transaction_by_hash(
            &self,
            _tx_hash: B256,
        ) -> Result<Option<RawTransaction>, RpcError> {
            unimplemented!("not used by lookup")
        }
    }

    #[tokio::test]
    async fn test_finds_exact_boundary_block() {
        let chain = FixedCadenceChain { head: 10_000 };
        // Block 500 has timestamp 7000.
        assert_eq!(find_block_at_timestamp(&chain, 7000).await.unwrap(), 500);
        // A timestamp between blocks resolves to the next block.
        assert_eq!(find_block_at_timestamp(&chain, 7001).await.unwrap(), 501);
    }

    #[tokio::test]
    async fn test_future_timestamp_clamps_to_head() {
        let chain = FixedCadenceChain { head: 100 };
        assert_eq!(
            find_block_at_timestamp(&chain, 10_000_000).await.unwrap(),
            100
        );
    }
}
