use std::time::Duration;

use alloy::primitives::{address, Address};
use alloy_chains::NamedChain;

use crate::error::ClaimerError;

pub const CLAIMS_URL: &str = "https://claim.hyperlane.foundation/api/claims";
pub const CLAIMS_REFERER: &str = "https://claim.hyperlane.foundation/";
pub const CHALLENGE_VERIFY_URL: &str =
    "https://claim.hyperlane.foundation/.well-known/vercel/security/request-challenge";
pub const SOLVIUM_API_URL: &str = "https://captcha.solvium.io/api/v1";

pub const TOKEN_SYMBOL: &str = "HYPER";

// FILES
pub const CONFIG_FILE_PATH: &str = "data/config.json";
pub const WALLETS_FILE_PATH: &str = "data/wallets.txt";
pub const PROXIES_FILE_PATH: &str = "data/proxies.txt";
pub const ALLOCATIONS_FILE_PATH: &str = "data/allocations.json";
pub const LOGS_DIR: &str = "logs";

// RETRIES
pub const ELIGIBILITY_ATTEMPTS: u32 = 4;
pub const SOLVER_POLL_ATTEMPTS: u32 = 30;
pub const SOLVER_POLL_DELAY: Duration = Duration::from_secs(5);
pub const TX_ATTEMPTS: u32 = 5;
pub const TX_RETRY_DELAY: Duration = Duration::from_secs(3);
pub const TX_CONFIRMATIONS: u64 = 1;
pub const TX_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub chain: NamedChain,
    pub rpc_url: &'static str,
    pub claim_contract: Address,
    pub token_contract: Address,
}

impl Deployment {
    pub fn chain_id(&self) -> u64 {
        self.chain as u64
    }

    pub fn explorer_tx_url(&self, tx_hash: impl std::fmt::Display) -> Option<String> {
        self.chain
            .etherscan_urls()
            .map(|(_, base)| format!("{}/tx/{tx_hash}", base.trim_end_matches('/')))
    }
}

pub static DEPLOYMENTS: [Deployment; 5] = [
    Deployment {
        chain: NamedChain::Mainnet,
        rpc_url: "https://ethereum-rpc.publicnode.com",
        claim_contract: address!("e5d5e5891a11b3948d84307af7651d684b87e730"),
        token_contract: address!("93a2db22b7c736b341c32ff666307f4a9ed910f5"),
    },
    Deployment {
        chain: NamedChain::Optimism,
        rpc_url: "https://optimism-rpc.publicnode.com",
        claim_contract: address!("93a2db22b7c736b341c32ff666307f4a9ed910f5"),
        token_contract: address!("9923db8d7fbacc2e69e87fad19b886c81cd74979"),
    },
    Deployment {
        chain: NamedChain::BinanceSmartChain,
        rpc_url: "https://bsc-rpc.publicnode.com",
        claim_contract: address!("a7d7422cf603e40854d26af151043e73c1201563"),
        token_contract: address!("c9d23ed2adb0f551369946bd377f8644ce1ca5c4"),
    },
    Deployment {
        chain: NamedChain::Base,
        rpc_url: "https://base-rpc.publicnode.com",
        claim_contract: address!("3d115377ec8e55a5c18ad620102286ecd068a36c"),
        token_contract: address!("c9d23ed2adb0f551369946bd377f8644ce1ca5c4"),
    },
    Deployment {
        chain: NamedChain::Arbitrum,
        rpc_url: "https://arbitrum-one-rpc.publicnode.com",
        claim_contract: address!("3d115377ec8e55a5c18ad620102286ecd068a36c"),
        token_contract: address!("c9d23ed2adb0f551369946bd377f8644ce1ca5c4"),
    },
];

pub fn deployment(chain_id: u64) -> Option<&'static Deployment> {
    DEPLOYMENTS.iter().find(|d| d.chain_id() == chain_id)
}

pub fn require_deployment(chain_id: u64) -> Result<&'static Deployment, ClaimerError> {
    deployment(chain_id).ok_or_else(|| ClaimerError::Configuration(format!("Unknown chainId {chain_id}")))
}
