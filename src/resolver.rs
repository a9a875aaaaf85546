use std::time::Duration;

use alloy::primitives::Address;

use crate::{
    allocations::{Allocation, AllocationCache},
    constants::ELIGIBILITY_ATTEMPTS,
    eligibility::{EligibilityApi, EligibilityBody, EligibilityResponse},
    error::ClaimerError,
    retry::RetryPolicy,
    solver::ChallengeSolver,
};

/// Finds the allocation of an address, consulting the local cache before
/// the protected eligibility endpoint.
pub struct AllocationResolver<A, S> {
    api: A,
    solver: S,
    cache: AllocationCache,
    policy: RetryPolicy,
}

impl<A, S> AllocationResolver<A, S>
where
    A: EligibilityApi,
    S: ChallengeSolver,
{
    pub fn new(api: A, solver: S, cache: AllocationCache) -> Self {
        Self {
            api,
            solver,
            cache,
            policy: RetryPolicy::new(ELIGIBILITY_ATTEMPTS, Duration::ZERO),
        }
    }

    #[cfg(test)]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[cfg(test)]
    pub fn api(&self) -> &A {
        &self.api
    }

    #[cfg(test)]
    pub fn cache(&self) -> &AllocationCache {
        &self.cache
    }

    pub async fn resolve(&mut self, address: Address, proxy: Option<&str>) -> eyre::Result<Allocation> {
        if let Some(allocation) = self.cache.get(address) {
            tracing::debug!("[{address}] Allocation found in cache");
            return Ok(allocation.clone());
        }

        let allocation = self.fetch(address, proxy).await.inspect_err(|err| {
            if !ClaimerError::is_not_eligible(err) {
                tracing::error!("[{address}] Allocation loading error: {err}");
            }
        })?;

        self.cache.append(allocation.clone()).await?;

        Ok(allocation)
    }

    async fn fetch(&self, address: Address, proxy: Option<&str>) -> eyre::Result<Allocation> {
        let session = self.api.open_session(proxy)?;
        let session = &session;

        let body = self
            .policy
            .run("Eligibility request", move |attempt| {
                self.attempt(session, address, attempt)
            })
            .await
            .map_err(|err| ClaimerError::categorize(err, ClaimerError::Resolution))?;

        Ok(body.first_allocation(address)?)
    }

    async fn attempt(
        &self,
        session: &A::Session,
        address: Address,
        attempt: u32,
    ) -> eyre::Result<EligibilityBody> {
        match self.api.fetch_claims(session, address).await? {
            EligibilityResponse::Claims(body) => Ok(body),
            EligibilityResponse::Challenge(token) if !self.policy.is_last(attempt) => {
                tracing::info!("[{address}] Solving vercel challenge...");

                let solution = self.solver.solve(&token).await?;
                self.api.verify_challenge(session, &token, &solution).await?;

                Err(ClaimerError::ChallengeCleared.into())
            }
            EligibilityResponse::Challenge(_) => Err(ClaimerError::Resolution(format!(
                "challenge still required after {attempt} attempts"
            ))
            .into()),
            EligibilityResponse::Malformed { status, body } => {
                Err(ClaimerError::Resolution(format!("status {status}: {body}")).into())
            }
        }
    }
}
