use alloy::primitives::{Address, B256, Bytes, Signature, U64, U256};
use alloy::signers::Signer;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolCall;
use log::{debug, info};
use serde_json::json;

use super::{Account, AccountProvider, SmartAccount};
use crate::chain::Chain;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::rpc::JsonRpcClient;

sol! {
    function getAddress(address owner, uint256 salt) external view returns (address);
}

/// Creates accounts through the bundler/provider RPC of each chain.
pub struct RpcAccountProvider {
    config: Config,
}

impl RpcAccountProvider {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn owner(&self) -> Result<PrivateKeySigner> {
        PrivateKeySigner::from_bytes(&self.config.private_key)
            .map_err(|e| Error::configuration(format!("PRIVATE_KEY: {e}")))
    }
}

impl AccountProvider for RpcAccountProvider {
    type Account = RpcSmartAccount;

    async fn create_account(&self, chain: Chain) -> Result<RpcSmartAccount> {
        let url = self.config.rpc_url(chain)?;
        let owner = self.owner()?.with_chain_id(Some(chain.id()));
        let client = JsonRpcClient::new(&url);

        let remote: U64 = client
            .request("eth_chainId", json!([]))
            .await
            .map_err(Error::provider)?;
        if remote.to::<u64>() != chain.id() {
            return Err(Error::provider(Error::ChainMismatch {
                expected: chain.id(),
                actual: remote.to(),
            }));
        }

        let calldata = getAddressCall {
            owner: owner.address(),
            salt: U256::ZERO,
        }
        .abi_encode();
        let output: Bytes = client
            .request(
                "eth_call",
                json!([
                    { "to": self.config.account_factory, "data": Bytes::from(calldata) },
                    "latest"
                ]),
            )
            .await
            .map_err(Error::provider)?;
        let address = decode_address(&output).map_err(Error::provider)?;

        info!("counterfactual account {address} for owner {}", owner.address());
        Ok(RpcSmartAccount {
            account: Account {
                chain,
                address,
                owner: owner.address(),
            },
            signer: owner,
            client,
        })
    }
}

// ABI-encoded `address` return: one word, right-aligned
fn decode_address(output: &[u8]) -> Result<Address> {
    let word = output
        .get(..32)
        .ok_or("factory returned no address")?;
    let address = Address::from_slice(&word[12..]);
    if address == Address::ZERO {
        return Err("factory returned the zero address".into());
    }
    Ok(address)
}

pub struct RpcSmartAccount {
    account: Account,
    signer: PrivateKeySigner,
    client: JsonRpcClient,
}

impl SmartAccount for RpcSmartAccount {
    fn account(&self) -> &Account {
        &self.account
    }

    async fn is_deployed(&self) -> Result<bool> {
        let code: Bytes = self
            .client
            .request("eth_getCode", json!([self.account.address, "latest"]))
            .await
            .map_err(Error::provider)?;
        Ok(!code.is_empty())
    }

    async fn send_transaction(
        &self,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> Result<B256> {
        debug!("sending transaction to {to} via {}", self.client.url());
        self.client
            .request(
                "eth_sendTransaction",
                json!([{
                    "from": self.account.address,
                    "to": to,
                    "value": value,
                    "data": data,
                }]),
            )
            .await
            .map_err(Error::transaction)
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        self.signer
            .sign_message(message)
            .await
            .map_err(Error::transaction)
    }
}
