use std::sync::{Mutex, PoisonError};

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, COOKIE, REFERER, SET_COOKIE},
    Client, Proxy,
};
use serde::Deserialize;

use crate::{
    allocations::{parse_amount, Allocation},
    constants::{CHALLENGE_VERIFY_URL, CLAIMS_REFERER, CLAIMS_URL, HTTP_TIMEOUT},
    error::ClaimerError,
};

const CHALLENGE_TOKEN_HEADER: &str = "x-vercel-challenge-token";
const CHALLENGE_SOLUTION_HEADER: &str = "x-vercel-challenge-solution";
const CHALLENGE_VERSION_HEADER: &str = "x-vercel-challenge-version";
const CHALLENGE_COOKIE: &str = "_vcrcs";

/// Outcome of a single eligibility request.
#[derive(Debug)]
pub enum EligibilityResponse {
    Challenge(String),
    Claims(EligibilityBody),
    Malformed { status: u16, body: String },
}

impl EligibilityResponse {
    pub fn from_http(status: u16, challenge_token: Option<&str>, text: &str) -> Self {
        if let Some(token) = challenge_token.filter(|t| !t.is_empty()) {
            return Self::Challenge(token.to_owned());
        }

        if (200..300).contains(&status) {
            if let Ok(body) = serde_json::from_str::<EligibilityBody>(text) {
                return Self::Claims(body);
            }
        }

        Self::Malformed {
            status,
            body: text.chars().take(512).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EligibilityBody {
    #[serde(default)]
    pub response: Option<ClaimsPayload>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimsPayload {
    #[serde(default)]
    pub claims: Option<Vec<ClaimRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub merkle: Option<MerkleLeaf>,
}

#[derive(Debug, Deserialize)]
pub struct MerkleLeaf {
    #[serde(default)]
    pub index: Option<u64>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default)]
    pub proof: Option<Vec<B256>>,
}

impl EligibilityBody {
    /// Maps the first claim into an allocation. An empty claim list means
    /// the address has nothing to claim.
    pub fn first_allocation(&self, address: Address) -> Result<Allocation, ClaimerError> {
        let claim = self
            .response
            .as_ref()
            .and_then(|response| response.claims.as_deref())
            .and_then(<[ClaimRecord]>::first)
            .ok_or(ClaimerError::NotEligible(address))?;

        let incomplete = |field: &str| ClaimerError::Resolution(format!("claim for {address} has no valid {field}"));

        let merkle = claim.merkle.as_ref().ok_or_else(|| incomplete("merkle leaf"))?;
        let amount = merkle
            .amount
            .as_ref()
            .and_then(parse_amount)
            .filter(|amount| !amount.is_zero())
            .ok_or_else(|| incomplete("amount"))?;

        Ok(Allocation {
            chain_id: claim.chain_id.filter(|id| *id != 0).ok_or_else(|| incomplete("chainId"))?,
            index: merkle.index.ok_or_else(|| incomplete("index"))?,
            address: merkle.address.ok_or_else(|| incomplete("address"))?,
            amount,
            proof: merkle
                .proof
                .clone()
                .filter(|proof| !proof.is_empty())
                .ok_or_else(|| incomplete("proof"))?,
        })
    }
}

/// Eligibility endpoint behind bot protection. A session carries the
/// connection state and challenge cookie shared by the attempts of one
/// resolution.
#[async_trait]
pub trait EligibilityApi: Send + Sync {
    type Session: Send + Sync;

    fn open_session(&self, proxy: Option<&str>) -> eyre::Result<Self::Session>;

    async fn fetch_claims(
        &self,
        session: &Self::Session,
        address: Address,
    ) -> eyre::Result<EligibilityResponse>;

    async fn verify_challenge(
        &self,
        session: &Self::Session,
        challenge_token: &str,
        solution: &str,
    ) -> eyre::Result<()>;
}

pub struct HttpSession {
    client: Client,
    vcrcs: Mutex<Option<String>>,
}

impl HttpSession {
    fn cookie(&self) -> Option<String> {
        self.vcrcs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_cookie(&self, value: String) {
        *self.vcrcs.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }
}

pub struct HyperlaneApi {
    claims_url: String,
    verify_url: String,
}

impl Default for HyperlaneApi {
    fn default() -> Self {
        Self {
            claims_url: CLAIMS_URL.to_owned(),
            verify_url: CHALLENGE_VERIFY_URL.to_owned(),
        }
    }
}

#[async_trait]
impl EligibilityApi for HyperlaneApi {
    type Session = HttpSession;

    fn open_session(&self, proxy: Option<&str>) -> eyre::Result<HttpSession> {
        let mut builder = Client::builder()
            .default_headers(get_headers())
            .timeout(HTTP_TIMEOUT);

        if let Some(proxy) = proxy {
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        Ok(HttpSession {
            client: builder.build()?,
            vcrcs: Mutex::new(None),
        })
    }

    async fn fetch_claims(
        &self,
        session: &HttpSession,
        address: Address,
    ) -> eyre::Result<EligibilityResponse> {
        let mut request = session
            .client
            .get(&self.claims_url)
            .query(&[("address", address.to_checksum(None))])
            .header(REFERER, CLAIMS_REFERER);

        if let Some(vcrcs) = session.cookie() {
            request = request.header(COOKIE, format!("{CHALLENGE_COOKIE}={vcrcs}"));
        }

        let response = request
            .send()
            .await
            .inspect_err(|e| tracing::error!("Eligibility request failed: {}", e))?;

        let status = response.status().as_u16();
        let challenge_token = response
            .headers()
            .get(CHALLENGE_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let text = response
            .text()
            .await
            .inspect_err(|e| tracing::error!("Failed to retrieve response text: {}", e))?;

        Ok(EligibilityResponse::from_http(
            status,
            challenge_token.as_deref(),
            &text,
        ))
    }

    async fn verify_challenge(
        &self,
        session: &HttpSession,
        challenge_token: &str,
        solution: &str,
    ) -> eyre::Result<()> {
        let response = session
            .client
            .post(&self.verify_url)
            .header(CHALLENGE_TOKEN_HEADER, challenge_token)
            .header(CHALLENGE_SOLUTION_HEADER, solution)
            .header(CHALLENGE_VERSION_HEADER, "2")
            .send()
            .await
            .inspect_err(|e| tracing::error!("Challenge verification failed: {}", e))?;

        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok());

        match extract_vcrcs(set_cookies) {
            Some(vcrcs) => session.set_cookie(vcrcs),
            None => tracing::warn!(
                "Challenge verification (status {}) returned no {CHALLENGE_COOKIE} cookie",
                response.status()
            ),
        }

        Ok(())
    }
}

/// Picks the `_vcrcs` value out of `set-cookie` headers, dropping cookie attributes.
pub fn extract_vcrcs<'a>(set_cookies: impl IntoIterator<Item = &'a str>) -> Option<String> {
    set_cookies.into_iter().find_map(|cookie| {
        let value = cookie.strip_prefix(CHALLENGE_COOKIE)?.strip_prefix('=')?;
        let value = value.split(';').next().unwrap_or_default().trim();
        (!value.is_empty()).then(|| value.to_owned())
    })
}

fn get_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(
        HeaderName::from_static("accept"),
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        HeaderName::from_static("accept-language"),
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(
        HeaderName::from_static("cache-control"),
        HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        HeaderName::from_static("pragma"),
        HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua"),
        HeaderValue::from_static("\"Chromium\";v=\"130\", \"Not?A_Brand\";v=\"99\""),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua-mobile"),
        HeaderValue::from_static("?0"),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua-platform"),
        HeaderValue::from_static("\"Windows\""),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("empty"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("user-agent"),
        HeaderValue::from_static("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36"),
    );

    headers
}
