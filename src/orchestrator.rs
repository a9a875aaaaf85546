use alloy::primitives::{utils::format_ether, Address};
use eyre::WrapErr;

use crate::{
    allocations::Allocation,
    claimer::TransactionExecutor,
    client::Connector,
    constants::TOKEN_SYMBOL,
    eligibility::EligibilityApi,
    error::ClaimerError,
    resolver::AllocationResolver,
    solver::ChallengeSolver,
    utils::Pacing,
    wallet::WalletTask,
};

/// Per-wallet pipeline: `Resolving -> Claiming -> (Bridging | Withdrawing | Done)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletState {
    Resolving,
    Claiming(Allocation),
    Bridging {
        allocation: Allocation,
        destination: u64,
        recipient: Address,
    },
    Withdrawing {
        allocation: Allocation,
        recipient: Address,
    },
    Done,
}

impl WalletState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::Claiming(_) => "claiming",
            Self::Bridging { .. } => "bridging",
            Self::Withdrawing { .. } => "withdrawing",
            Self::Done => "done",
        }
    }
}

/// Where a wallet goes once its claim is settled.
///
/// A cross-chain bridge ends the run for the wallet even when a withdraw
/// address is set; the tokens arrive at the recipient on the destination chain.
pub fn after_claim(
    allocation: Allocation,
    bridge_destination: Option<u64>,
    withdraw_address: Option<Address>,
    wallet: Address,
) -> WalletState {
    match (bridge_destination, withdraw_address) {
        (Some(destination), withdraw) if destination != allocation.chain_id => WalletState::Bridging {
            allocation,
            destination,
            recipient: withdraw.unwrap_or(wallet),
        },
        (_, Some(recipient)) => WalletState::Withdrawing {
            allocation,
            recipient,
        },
        (_, None) => WalletState::Done,
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: usize,
    pub not_eligible: usize,
    pub failed: usize,
}

pub struct Orchestrator<A, S, N> {
    resolver: AllocationResolver<A, S>,
    executor: TransactionExecutor,
    connector: N,
    bridge_destination: Option<u64>,
    pacing: Pacing,
}

impl<A, S, N> Orchestrator<A, S, N>
where
    A: EligibilityApi,
    S: ChallengeSolver,
    N: Connector,
{
    pub fn new(
        resolver: AllocationResolver<A, S>,
        executor: TransactionExecutor,
        connector: N,
        bridge_destination: Option<u64>,
        pacing: Pacing,
    ) -> Self {
        Self {
            resolver,
            executor,
            connector,
            bridge_destination,
            pacing,
        }
    }

    /// Processes every wallet in order. A failing wallet never stops the batch.
    pub async fn run(&mut self, wallets: &[WalletTask]) -> BatchReport {
        let mut report = BatchReport::default();

        for (position, task) in wallets.iter().enumerate() {
            let address = task.address();
            tracing::info!("[{address}] Processing wallet {}/{}", position + 1, wallets.len());

            match self.process_wallet(task).await {
                Ok(()) => report.completed += 1,
                Err(err) if ClaimerError::is_not_eligible(&err) => {
                    tracing::warn!("[{address}] Not eligible!");
                    report.not_eligible += 1;
                }
                Err(err) => {
                    tracing::error!("[{address}] Wallet aborted: {err:#}");
                    report.failed += 1;
                }
            }

            if position + 1 < wallets.len() {
                self.pacing.sleep().await;
            }
        }

        report
    }

    pub async fn process_wallet(&mut self, task: &WalletTask) -> eyre::Result<()> {
        let mut state = WalletState::Resolving;

        loop {
            tracing::debug!("[{}] State: {}", task.address(), state.name());

            state = match state {
                WalletState::Done => return Ok(()),
                state => {
                    let name = state.name();
                    self.step(task, state)
                        .await
                        .wrap_err_with(|| format!("{name} failed"))?
                }
            };
        }
    }

    async fn step(&mut self, task: &WalletTask, state: WalletState) -> eyre::Result<WalletState> {
        let wallet = task.address();

        let next = match state {
            WalletState::Resolving => {
                let allocation = self.resolver.resolve(wallet, task.proxy.as_deref()).await?;
                tracing::info!(
                    "[{wallet}] Allocation of {} {TOKEN_SYMBOL} loaded!",
                    format_ether(allocation.amount)
                );
                WalletState::Claiming(allocation)
            }
            WalletState::Claiming(allocation) => {
                let client = self.connector.connect(allocation.chain_id, &task.signer)?;
                self.executor.claim(&client, &allocation).await?;
                after_claim(allocation, self.bridge_destination, task.withdraw_address, wallet)
            }
            WalletState::Bridging {
                allocation,
                destination,
                recipient,
            } => {
                let client = self.connector.connect(allocation.chain_id, &task.signer)?;
                self.executor.bridge(&client, destination, recipient).await?;
                WalletState::Done
            }
            WalletState::Withdrawing {
                allocation,
                recipient,
            } => {
                let client = self.connector.connect(allocation.chain_id, &task.signer)?;
                self.executor.withdraw(&client, recipient).await?;
                WalletState::Done
            }
            WalletState::Done => WalletState::Done,
        };

        Ok(next)
    }
}
