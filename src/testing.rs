//! Hand-written fakes for the eligibility endpoint, the solver service and the chain.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use alloy::{
    primitives::{Address, Bytes, TxHash, B256, U256},
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};
use async_trait::async_trait;

use crate::{
    claimer::HyperlaneClaim::claimCall,
    client::{ChainClient, Connector},
    constants::require_deployment,
    eligibility::{EligibilityApi, EligibilityBody, EligibilityResponse},
    error::ClaimerError,
    solver::ChallengeSolver,
};

pub fn claims_response(claims: serde_json::Value) -> EligibilityResponse {
    let body: EligibilityBody =
        serde_json::from_value(serde_json::json!({ "response": { "claims": claims } })).unwrap();
    EligibilityResponse::Claims(body)
}

#[derive(Default)]
pub struct FakeSession {
    cookie: Mutex<Option<String>>,
}

/// Replays scripted responses in order; once the script is exhausted every
/// fetch fails.
pub struct FakeEligibilityApi {
    script: Mutex<VecDeque<eyre::Result<EligibilityResponse>>>,
    cookies_seen: Mutex<Vec<Option<String>>>,
    proxies: Mutex<Vec<Option<String>>>,
}

impl FakeEligibilityApi {
    pub fn new(script: Vec<eyre::Result<EligibilityResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            cookies_seen: Mutex::default(),
            proxies: Mutex::default(),
        }
    }

    pub fn fetches(&self) -> usize {
        self.cookies_seen.lock().unwrap().len()
    }

    pub fn cookies_seen(&self) -> Vec<Option<String>> {
        self.cookies_seen.lock().unwrap().clone()
    }

    pub fn proxies(&self) -> Vec<Option<String>> {
        self.proxies.lock().unwrap().clone()
    }
}

#[async_trait]
impl EligibilityApi for FakeEligibilityApi {
    type Session = FakeSession;

    fn open_session(&self, proxy: Option<&str>) -> eyre::Result<FakeSession> {
        self.proxies.lock().unwrap().push(proxy.map(str::to_owned));
        Ok(FakeSession::default())
    }

    async fn fetch_claims(
        &self,
        session: &FakeSession,
        _address: Address,
    ) -> eyre::Result<EligibilityResponse> {
        let cookie = session.cookie.lock().unwrap().clone();
        self.cookies_seen.lock().unwrap().push(cookie);

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(eyre::eyre!("no scripted eligibility response left")))
    }

    async fn verify_challenge(
        &self,
        session: &FakeSession,
        _challenge_token: &str,
        solution: &str,
    ) -> eyre::Result<()> {
        *session.cookie.lock().unwrap() = Some(format!("vcrcs-{solution}"));
        Ok(())
    }
}

pub struct FakeSolver {
    solution: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeSolver {
    pub fn solving(solution: &str) -> Self {
        Self {
            solution: Some(solution.to_owned()),
            calls: Mutex::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            solution: None,
            calls: Mutex::default(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChallengeSolver for FakeSolver {
    async fn solve(&self, challenge_token: &str) -> eyre::Result<String> {
        self.calls.lock().unwrap().push(challenge_token.to_owned());

        self.solution
            .clone()
            .ok_or_else(|| ClaimerError::ChallengeResolution("Task failed".into()).into())
    }
}

#[derive(Debug, Clone)]
pub struct SentTx {
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
}

/// In-memory chain for one wallet. A confirmed claim credits the claimed
/// amount to the token balance.
pub struct FakeChain {
    chain_id: u64,
    address: Address,
    claimed: Mutex<bool>,
    balance: Mutex<U256>,
    quote: U256,
    failures_left: Mutex<u32>,
    unconfirmed_left: Mutex<u32>,
    attempts: Mutex<Vec<SentTx>>,
    quotes_requested: Mutex<Vec<u32>>,
}

impl FakeChain {
    pub fn new(chain_id: u64, address: Address) -> Self {
        Self {
            chain_id,
            address,
            claimed: Mutex::new(false),
            balance: Mutex::new(U256::ZERO),
            quote: U256::ZERO,
            failures_left: Mutex::new(0),
            unconfirmed_left: Mutex::new(0),
            attempts: Mutex::default(),
            quotes_requested: Mutex::default(),
        }
    }

    pub fn already_claimed(self) -> Self {
        *self.claimed.lock().unwrap() = true;
        self
    }

    pub fn with_balance(self, balance: U256) -> Self {
        *self.balance.lock().unwrap() = balance;
        self
    }

    pub fn with_quote(mut self, quote: U256) -> Self {
        self.quote = quote;
        self
    }

    /// The next `failures` submissions fail before reaching the chain.
    pub fn failing(self, failures: u32) -> Self {
        *self.failures_left.lock().unwrap() = failures;
        self
    }

    /// The next `timeouts` submissions are applied on-chain but their
    /// confirmation times out.
    pub fn landing_unconfirmed(self, timeouts: u32) -> Self {
        *self.unconfirmed_left.lock().unwrap() = timeouts;
        self
    }

    /// Every submission attempt, failed ones included.
    pub fn attempts(&self) -> Vec<SentTx> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn quotes_requested(&self) -> Vec<u32> {
        self.quotes_requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for Arc<FakeChain> {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn is_claimed(&self, _index: U256) -> eyre::Result<bool> {
        Ok(*self.claimed.lock().unwrap())
    }

    async fn token_balance(&self, _owner: Address) -> eyre::Result<U256> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn quote_gas_payment(&self, destination: u32) -> eyre::Result<U256> {
        self.quotes_requested.lock().unwrap().push(destination);
        Ok(self.quote)
    }

    async fn send_transaction(&self, to: Address, input: Bytes, value: U256) -> eyre::Result<TxHash> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(SentTx {
                to,
                input: input.clone(),
                value,
            });
            attempts.len()
        };

        {
            let mut failures_left = self.failures_left.lock().unwrap();
            if *failures_left > 0 {
                *failures_left -= 1;
                eyre::bail!("rpc unavailable (attempt {attempt})");
            }
        }

        if to == require_deployment(self.chain_id)?.claim_contract {
            let call = claimCall::abi_decode(&input, true)?;
            *self.claimed.lock().unwrap() = true;
            *self.balance.lock().unwrap() += call.amount;
        } else {
            *self.balance.lock().unwrap() = U256::ZERO;
        }

        {
            let mut unconfirmed_left = self.unconfirmed_left.lock().unwrap();
            if *unconfirmed_left > 0 {
                *unconfirmed_left -= 1;
                eyre::bail!("confirmation timed out (attempt {attempt})");
            }
        }

        Ok(B256::with_last_byte(attempt as u8))
    }
}

/// Hands out the fake chain registered for the signer's address.
#[derive(Default)]
pub struct FakeConnector {
    chains: HashMap<Address, Arc<FakeChain>>,
}

impl FakeConnector {
    pub fn with_chain(mut self, chain: Arc<FakeChain>) -> Self {
        self.chains.insert(chain.address, chain);
        self
    }
}

impl Connector for FakeConnector {
    type Client = Arc<FakeChain>;

    fn connect(&self, chain_id: u64, signer: &PrivateKeySigner) -> eyre::Result<Arc<FakeChain>> {
        require_deployment(chain_id)?;

        self.chains
            .get(&signer.address())
            .filter(|chain| chain.chain_id == chain_id)
            .cloned()
            .ok_or_else(|| eyre::eyre!("no fake chain {chain_id} for {}", signer.address()))
    }
}
