use std::{path::Path, str::FromStr};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use reqwest::Url;

use crate::{error::ClaimerError, utils::read_file_lines};

/// One line of the wallet list, paired with the proxy on the same position.
#[derive(Debug, Clone)]
pub struct WalletTask {
    pub signer: PrivateKeySigner,
    pub withdraw_address: Option<Address>,
    pub proxy: Option<String>,
}

impl WalletTask {
    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

const PROXY_SCHEMES: [&str; 4] = ["http", "https", "socks5", "socks5h"];

/// Accepts `host:port`, `host:port:user:pass`, `user:pass@host:port` and full
/// URLs, returning a URL without a trailing slash.
pub fn normalize_proxy(raw: &str) -> eyre::Result<String> {
    let raw = raw.trim();

    let candidate = if raw.contains("://") {
        raw.to_owned()
    } else if raw.contains('@') {
        format!("http://{raw}")
    } else {
        match raw.split(':').collect::<Vec<_>>().as_slice() {
            [host, port] => format!("http://{host}:{port}"),
            [host, port, user, pass] => format!("http://{user}:{pass}@{host}:{port}"),
            _ => {
                return Err(
                    ClaimerError::Configuration(format!("Unrecognized proxy format: {raw}")).into(),
                )
            }
        }
    };

    let url = Url::parse(&candidate)
        .map_err(|e| ClaimerError::Configuration(format!("Invalid proxy {raw}: {e}")))?;

    if !PROXY_SCHEMES.contains(&url.scheme()) {
        return Err(ClaimerError::Configuration(format!(
            "Unsupported proxy scheme {} in {raw}",
            url.scheme()
        ))
        .into());
    }

    Ok(url.as_str().trim_end_matches('/').to_owned())
}

fn parse_wallet_line(line: &str, proxy: Option<&str>) -> eyre::Result<WalletTask> {
    let line = line.trim();
    let (private_key, withdraw_address) = match line.split_once(':') {
        Some((key, withdraw)) => (key.trim(), Some(withdraw.trim())),
        None => (line, None),
    };

    let signer = PrivateKeySigner::from_str(private_key)
        .map_err(|e| ClaimerError::Configuration(format!("Invalid private key: {e}")))?;

    let withdraw_address = withdraw_address
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| match Address::from_str(raw) {
            Ok(address) => Some(address),
            Err(_) => {
                tracing::warn!("[{}] Ignoring invalid withdraw address {raw}", signer.address());
                None
            }
        });

    let proxy = proxy.map(normalize_proxy).transpose()?;

    Ok(WalletTask {
        signer,
        withdraw_address,
        proxy,
    })
}

/// Pairs wallet lines with proxy lines by position. Both lists must already
/// be stripped of blank and comment lines.
pub fn parse_wallets(wallet_lines: &[String], proxy_lines: &[String]) -> eyre::Result<Vec<WalletTask>> {
    wallet_lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            parse_wallet_line(line, proxy_lines.get(index).map(String::as_str))
                .map_err(|e| eyre::eyre!("wallets line {}: {e}", index + 1))
        })
        .collect()
}

pub async fn read_wallets(
    wallets_path: impl AsRef<Path>,
    proxies_path: impl AsRef<Path>,
) -> eyre::Result<Vec<WalletTask>> {
    let wallet_lines = read_file_lines(wallets_path).await?;
    let proxy_lines = match read_file_lines(proxies_path.as_ref()).await {
        Ok(lines) => lines,
        Err(e) => {
            tracing::warn!("No proxies loaded from {}: {e}", proxies_path.as_ref().display());
            Vec::new()
        }
    };

    parse_wallets(&wallet_lines, &proxy_lines)
}
