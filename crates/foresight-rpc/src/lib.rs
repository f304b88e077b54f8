pub mod client;
pub mod error;
pub mod lookup;
pub mod types;

pub use client::JsonRpcClient;
pub use error::{RpcError, RpcErrorKind};
pub use lookup::find_block_at_timestamp;
pub use types::{RawLog, RawTransaction};

use alloy::primitives::{Address, B256};
use async_trait::async_trait;

/// The narrow contract every component consumes the RPC collaborator
/// through. Tests substitute scripted implementations.
#[async_trait]
pub trait EthRpc: Send + Sync {
    /// `eth_blockNumber`.
    async fn block_number(&self) -> Result<u64, RpcError>;

    /// `eth_getLogs` over `[from_block, to_block]` inclusive.
    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &[Address],
        topic0: Option<Vec<B256>>,
    ) -> Result<Vec<RawLog>, RpcError>;

    /// `eth_getBlockByNumber`, reduced to the header timestamp.
    async fn get_block_timestamp(&self, block_number: u64) -> Result<u64, RpcError>;

    /// `eth_call` against `to` at the latest block.
    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, RpcError>;

    /// `eth_getTransactionByHash`; `None` for unknown hashes.
    async fn get_transaction_by_hash(
        &self,
        tx_hash: B256,
    ) -> Result<Option<RawTransaction>, RpcError>;
}
