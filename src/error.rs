use alloy::primitives::Address;

#[derive(Debug, thiserror::Error)]
pub enum ClaimerError {
    #[error("{0} is not eligible")]
    NotEligible(Address),

    #[error("Challenge resolution failed: {0}")]
    ChallengeResolution(String),

    #[error("Malformed eligibility response: {0}")]
    Resolution(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The eligibility request was challenged and the challenge was cleared.
    #[error("Eligibility request was challenged, retrying with a fresh cookie")]
    ChallengeCleared,

    #[error("Task {0} is not ready yet")]
    TaskPending(String),
}

impl ClaimerError {
    /// Errors that will not go away by repeating the same call.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NotEligible(_) | Self::ChallengeResolution(_) | Self::Configuration(_)
        )
    }

    pub fn is_transient(report: &eyre::Report) -> bool {
        report
            .downcast_ref::<Self>()
            .map_or(true, |err| !err.is_terminal())
    }

    pub fn is_not_eligible(report: &eyre::Report) -> bool {
        matches!(report.downcast_ref::<Self>(), Some(Self::NotEligible(_)))
    }

    pub fn is_pending(report: &eyre::Report) -> bool {
        matches!(report.downcast_ref::<Self>(), Some(Self::TaskPending(_)))
    }

    /// Expected intermediate outcomes that drive a retry loop forward.
    pub fn is_retry_signal(report: &eyre::Report) -> bool {
        matches!(
            report.downcast_ref::<Self>(),
            Some(Self::ChallengeCleared | Self::TaskPending(_))
        )
    }

    /// Files an untyped failure (transport, RPC, decoding) under `category`.
    /// Reports that already carry a `ClaimerError` pass through untouched.
    pub fn categorize(report: eyre::Report, category: fn(String) -> Self) -> eyre::Report {
        if report.downcast_ref::<Self>().is_some() {
            report
        } else {
            category(format!("{report:#}")).into()
        }
    }
}
