use std::future::Future;

use alloy::{
    primitives::{utils::format_ether, Address, Bytes, TxHash, B256, U256},
    sol,
    sol_types::SolCall,
};

use HypToken::{transferCall, transferRemoteCall};
use HyperlaneClaim::claimCall;

use crate::{
    allocations::Allocation,
    client::ChainClient,
    constants::{deployment, require_deployment, TOKEN_SYMBOL, TX_ATTEMPTS, TX_RETRY_DELAY},
    error::ClaimerError,
    retry::RetryPolicy,
};

sol! {
    #[sol(rpc)]
    contract HyperlaneClaim {
        function claim(uint256 index, address account, uint256 amount, bytes32[] calldata merkleProof) external;
        function isClaimed(uint256 index) external view returns (bool);
    }

    #[sol(rpc)]
    #[derive(Debug, PartialEq, Eq)]
    contract HypToken {
        function balanceOf(address _account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function quoteGasPayment(uint32 _destinationDomain) external view returns (uint256);
        function transferRemote(uint32 _destination, bytes32 _recipient, uint256 _amountOrId) external payable returns (bytes32 messageId);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed(TxHash),
    /// Nothing to do on-chain; no transaction was sent.
    Skipped,
}

/// Left-pads an account address to the 32-byte recipient format of cross-chain transfers.
pub fn recipient_bytes32(address: Address) -> B256 {
    address.into_word()
}

/// Submits claim, withdraw and bridge transactions with bounded retry.
pub struct TransactionExecutor {
    policy: RetryPolicy,
}

impl Default for TransactionExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::new(TX_ATTEMPTS, TX_RETRY_DELAY))
    }
}

impl TransactionExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub async fn claim<C: ChainClient>(&self, client: &C, allocation: &Allocation) -> eyre::Result<TxOutcome> {
        let wallet = client.address();
        let contracts = require_deployment(client.chain_id())?;
        let index = U256::from(allocation.index);

        if client.is_claimed(index).await? {
            tracing::info!("[{wallet}] Already claimed!");
            return Ok(TxOutcome::Skipped);
        }

        let input = claimCall {
            index,
            account: allocation.address,
            amount: allocation.amount,
            merkleProof: allocation.proof.clone(),
        }
        .abi_encode();

        let outcome = self
            .submit("Claim", client, contracts.claim_contract, input.into(), U256::ZERO, || {
                client.is_claimed(index)
            })
            .await?;

        if outcome != TxOutcome::Skipped {
            tracing::info!(
                "[{wallet}] Claimed {} {TOKEN_SYMBOL} successfully!",
                format_ether(allocation.amount)
            );
        }

        Ok(outcome)
    }

    pub async fn withdraw<C: ChainClient>(&self, client: &C, recipient: Address) -> eyre::Result<TxOutcome> {
        let wallet = client.address();
        let contracts = require_deployment(client.chain_id())?;

        let balance = client.token_balance(wallet).await?;
        if balance.is_zero() {
            tracing::info!("[{wallet}] Nothing to withdraw!");
            return Ok(TxOutcome::Skipped);
        }

        tracing::info!("[{wallet}] Withdraw to {recipient}");

        let input = transferCall {
            to: recipient,
            amount: balance,
        }
        .abi_encode();

        let outcome = self
            .submit("Withdraw", client, contracts.token_contract, input.into(), U256::ZERO, || {
                balance_spent(client)
            })
            .await?;

        if outcome != TxOutcome::Skipped {
            tracing::info!(
                "[{wallet}] Withdrawn {} {TOKEN_SYMBOL} to {recipient} successfully!",
                format_ether(balance)
            );
        }

        Ok(outcome)
    }

    /// Moves the whole token balance to `recipient` on the `destination` chain.
    /// The interchain gas quote is fetched once and attached as the value.
    pub async fn bridge<C: ChainClient>(
        &self,
        client: &C,
        destination: u64,
        recipient: Address,
    ) -> eyre::Result<TxOutcome> {
        let wallet = client.address();
        let unknown_destination =
            || ClaimerError::Configuration(format!("Unknown bridge destination {destination}"));

        deployment(destination).ok_or_else(unknown_destination)?;
        let domain = u32::try_from(destination).map_err(|_| unknown_destination())?;
        let contracts = require_deployment(client.chain_id())?;

        let balance = client.token_balance(wallet).await?;
        if balance.is_zero() {
            tracing::info!("[{wallet}] Nothing to bridge!");
            return Ok(TxOutcome::Skipped);
        }

        let gas_payment = client.quote_gas_payment(domain).await?;

        tracing::info!("[{wallet}] Bridging to {recipient} (ChainID: {destination})");

        let input = transferRemoteCall {
            _destination: domain,
            _recipient: recipient_bytes32(recipient),
            _amountOrId: balance,
        }
        .abi_encode();

        let outcome = self
            .submit("Bridge", client, contracts.token_contract, input.into(), gas_payment, || {
                balance_spent(client)
            })
            .await?;

        if outcome != TxOutcome::Skipped {
            tracing::info!(
                "[{wallet}] Bridged {} {TOKEN_SYMBOL} to {recipient} (ChainID: {destination}) successfully!",
                format_ether(balance)
            );
        }

        Ok(outcome)
    }

    /// Sends the transaction under the retry policy. Before every retry the
    /// `settled` check runs again, so a transaction that landed after its
    /// confirmation timed out is not sent twice.
    async fn submit<C, F, Fut>(
        &self,
        operation: &str,
        client: &C,
        to: Address,
        input: Bytes,
        value: U256,
        settled: F,
    ) -> eyre::Result<TxOutcome>
    where
        C: ChainClient,
        F: Fn() -> Fut,
        Fut: Future<Output = eyre::Result<bool>>,
    {
        let wallet = client.address();
        let settled = &settled;
        let input = &input;

        self.policy
            .run(&format!("[{wallet}] {operation}"), move |attempt| async move {
                if attempt > 1 && settled().await? {
                    tracing::info!("[{wallet}] {operation} already landed on-chain");
                    return Ok(TxOutcome::Skipped);
                }

                client
                    .send_transaction(to, input.clone(), value)
                    .await
                    .map(TxOutcome::Confirmed)
            })
            .await
            .map_err(|e| ClaimerError::categorize(e, ClaimerError::Transaction))
            .inspect_err(|e| tracing::error!("[{wallet}] {operation} error: {e}"))
    }
}

async fn balance_spent<C: ChainClient>(client: &C) -> eyre::Result<bool> {
    Ok(client.token_balance(client.address()).await?.is_zero())
}
