use std::{collections::HashMap, sync::Arc};

use alloy::{
    network::{Ethereum, EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{Provider, RootProvider},
    rpc::{
        client::ClientBuilder,
        types::{TransactionReceipt, TransactionRequest},
    },
    signers::local::PrivateKeySigner,
    transports::{
        http::{Client, Http},
        layers::{RetryBackoffLayer, RetryBackoffService},
        Transport,
    },
};
use async_trait::async_trait;

use crate::{
    claimer::{HypToken, HyperlaneClaim},
    constants::{require_deployment, Deployment, TX_CONFIRMATIONS, TX_CONFIRMATION_TIMEOUT},
    error::ClaimerError,
};

pub type RpcTransport = RetryBackoffService<Http<Client>>;
pub type RpcProvider = RootProvider<RpcTransport>;

/// One wallet bound to one network.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> u64;

    fn address(&self) -> Address;

    async fn is_claimed(&self, index: U256) -> eyre::Result<bool>;

    async fn token_balance(&self, owner: Address) -> eyre::Result<U256>;

    async fn quote_gas_payment(&self, destination: u32) -> eyre::Result<U256>;

    /// Signs and broadcasts a transaction, then waits for its confirmation.
    /// A reverted receipt is an error.
    async fn send_transaction(&self, to: Address, input: Bytes, value: U256) -> eyre::Result<TxHash>;
}

pub trait Connector {
    type Client: ChainClient;

    fn connect(&self, chain_id: u64, signer: &PrivateKeySigner) -> eyre::Result<Self::Client>;
}

pub async fn send_transaction<P, T>(
    provider: &P,
    wallet: &EthereumWallet,
    from: Address,
    chain_id: u64,
    to: Address,
    input: Bytes,
    value: U256,
) -> eyre::Result<TransactionReceipt>
where
    P: Provider<T, Ethereum>,
    T: Transport + Clone,
{
    let eip1559_fees = provider.estimate_eip1559_fees(None).await?;
    let nonce = provider.get_transaction_count(from).pending().await?;

    let mut tx_request = TransactionRequest::default()
        .with_max_fee_per_gas(eip1559_fees.max_fee_per_gas)
        .with_max_priority_fee_per_gas(eip1559_fees.max_priority_fee_per_gas)
        .with_to(to)
        .with_value(value)
        .with_nonce(nonce)
        .with_chain_id(chain_id)
        .with_from(from)
        .with_input(input);

    let gas_limit = provider.estimate_gas(&tx_request).await?;
    tx_request.set_gas_limit(gas_limit);

    let signed_transaction = tx_request.build(wallet).await?;
    let receipt = provider
        .send_tx_envelope(signed_transaction)
        .await?
        .with_required_confirmations(TX_CONFIRMATIONS)
        .with_timeout(Some(TX_CONFIRMATION_TIMEOUT))
        .get_receipt()
        .await?;

    Ok(receipt)
}

pub struct EvmClient {
    provider: Arc<RpcProvider>,
    wallet: EthereumWallet,
    address: Address,
    deployment: &'static Deployment,
}

#[async_trait]
impl ChainClient for EvmClient {
    fn chain_id(&self) -> u64 {
        self.deployment.chain_id()
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn is_claimed(&self, index: U256) -> eyre::Result<bool> {
        let contract = HyperlaneClaim::new(self.deployment.claim_contract, self.provider.clone());
        Ok(contract.isClaimed(index).call().await?._0)
    }

    async fn token_balance(&self, owner: Address) -> eyre::Result<U256> {
        let contract = HypToken::new(self.deployment.token_contract, self.provider.clone());
        Ok(contract.balanceOf(owner).call().await?._0)
    }

    async fn quote_gas_payment(&self, destination: u32) -> eyre::Result<U256> {
        let contract = HypToken::new(self.deployment.token_contract, self.provider.clone());
        Ok(contract.quoteGasPayment(destination).call().await?._0)
    }

    async fn send_transaction(&self, to: Address, input: Bytes, value: U256) -> eyre::Result<TxHash> {
        let receipt = send_transaction(
            self.provider.as_ref(),
            &self.wallet,
            self.address,
            self.chain_id(),
            to,
            input,
            value,
        )
        .await?;

        let tx_hash = receipt.transaction_hash;
        let link = self
            .deployment
            .explorer_tx_url(tx_hash)
            .unwrap_or_else(|| tx_hash.to_string());

        if receipt.status() {
            tracing::info!("[{}] Transaction successful: {link}", self.address);
            Ok(tx_hash)
        } else {
            Err(ClaimerError::Transaction(format!("reverted: {link}")).into())
        }
    }
}

/// Builds HTTP clients for the known deployments, honouring per-chain RPC overrides.
pub struct EvmConnector {
    rpc_overrides: HashMap<String, String>,
}

impl EvmConnector {
    pub fn new(rpc_overrides: HashMap<String, String>) -> Self {
        Self { rpc_overrides }
    }

    fn rpc_url(&self, deployment: &Deployment) -> &str {
        self.rpc_overrides
            .get(&deployment.chain_id().to_string())
            .map_or(deployment.rpc_url, String::as_str)
    }
}

impl Connector for EvmConnector {
    type Client = EvmClient;

    fn connect(&self, chain_id: u64, signer: &PrivateKeySigner) -> eyre::Result<EvmClient> {
        let deployment = require_deployment(chain_id)?;
        let retry_layer = RetryBackoffLayer::new(10, 2, 500);

        let client = ClientBuilder::default()
            .layer(retry_layer)
            .transport(Http::new(self.rpc_url(deployment).parse()?), false);

        Ok(EvmClient {
            provider: Arc::new(RootProvider::new(client)),
            wallet: EthereumWallet::new(signer.clone()),
            address: signer.address(),
            deployment,
        })
    }
}
