use std::{collections::HashMap, path::Path};

use serde::Deserialize;

use crate::{
    constants::{deployment, CONFIG_FILE_PATH},
    error::ClaimerError,
    utils::Pacing,
};

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    pub solvium_api_key: String,
    pub delay_seconds: DelaySeconds,
    #[serde(default)]
    pub bridge: bool,
    #[serde(default)]
    pub bridge_destination: Option<u64>,
    /// Chain id (as a string) to RPC endpoint.
    #[serde(default)]
    pub rpc_urls: HashMap<String, String>,
}

#[derive(Deserialize, Clone, Copy, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DelaySeconds {
    pub min: u64,
    pub max: u64,
}

impl Config {
    pub fn parse(path: &Path, contents: &str) -> eyre::Result<Self> {
        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(contents)?,
            _ => serde_json::from_str(contents)?,
        };

        Ok(config)
    }

    pub async fn read_from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let cfg_str = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(path, &cfg_str)?;
        config.validate()?;

        Ok(config)
    }

    pub async fn read_default() -> eyre::Result<Self> {
        Self::read_from_file(CONFIG_FILE_PATH).await
    }

    pub fn validate(&self) -> Result<(), ClaimerError> {
        if self.solvium_api_key.trim().is_empty() {
            return Err(ClaimerError::Configuration(format!(
                "Please configure SOLVIUM_API_KEY parameter in {CONFIG_FILE_PATH}"
            )));
        }

        if self.delay_seconds.min > self.delay_seconds.max {
            return Err(ClaimerError::Configuration(format!(
                "DELAY_SECONDS.MIN ({}) is greater than DELAY_SECONDS.MAX ({})",
                self.delay_seconds.min, self.delay_seconds.max
            )));
        }

        match (self.bridge, self.bridge_destination) {
            (true, None) => {
                return Err(ClaimerError::Configuration(
                    "BRIDGE is enabled but BRIDGE_DESTINATION is not set".into(),
                ))
            }
            (true, Some(destination)) if deployment(destination).is_none() => {
                tracing::warn!("Unknown bridge destination {destination}, bridging will fail");
            }
            _ => {}
        }

        Ok(())
    }

    pub fn bridge_destination(&self) -> Option<u64> {
        self.bridge_destination.filter(|_| self.bridge)
    }

    pub fn pacing(&self) -> Pacing {
        Pacing::from_secs(self.delay_seconds.min, self.delay_seconds.max)
    }
}
