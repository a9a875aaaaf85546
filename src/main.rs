use allocations::AllocationCache;
use claimer::TransactionExecutor;
use client::EvmConnector;
use config::Config;
use constants::{ALLOCATIONS_FILE_PATH, PROXIES_FILE_PATH, WALLETS_FILE_PATH};
use eligibility::HyperlaneApi;
use orchestrator::Orchestrator;
use resolver::AllocationResolver;
use solver::Solvium;
use wallet::read_wallets;

use logger::init_default_logger;

mod allocations;
mod claimer;
mod client;
mod config;
mod constants;
mod eligibility;
mod error;
mod logger;
mod orchestrator;
mod resolver;
mod retry;
mod solver;
mod utils;
mod wallet;

#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let _guard = init_default_logger();

    let config = Config::read_default().await?;
    let wallets = read_wallets(WALLETS_FILE_PATH, PROXIES_FILE_PATH).await?;
    tracing::info!("Loaded {} wallets", wallets.len());

    let cache = AllocationCache::load(ALLOCATIONS_FILE_PATH).await;
    tracing::info!("Loaded {} cached allocations", cache.len());
    let solver = Solvium::new(&config.solvium_api_key)?;
    let resolver = AllocationResolver::new(HyperlaneApi::default(), solver, cache);

    let mut orchestrator = Orchestrator::new(
        resolver,
        TransactionExecutor::default(),
        EvmConnector::new(config.rpc_urls.clone()),
        config.bridge_destination(),
        config.pacing(),
    );

    let report = orchestrator.run(&wallets).await;

    tracing::info!(
        "All wallets processed! Completed: {}, not eligible: {}, failed: {}",
        report.completed,
        report.not_eligible,
        report.failed
    );

    Ok(())
}
