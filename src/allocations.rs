use std::path::{Path, PathBuf};

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Eligibility record of one address. Only complete records with a positive
/// amount are ever constructed by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub chain_id: u64,
    pub index: u64,
    pub address: Address,
    #[serde(with = "decimal_u256")]
    pub amount: U256,
    pub proof: Vec<B256>,
}

/// Accepts an 18-decimal amount given either as a decimal string or as a JSON number.
pub fn parse_amount(value: &serde_json::Value) -> Option<U256> {
    match value {
        serde_json::Value::String(s) => U256::from_str_radix(s.trim(), 10).ok(),
        serde_json::Value::Number(n) => n.as_u64().map(U256::from),
        _ => None,
    }
}

mod decimal_u256 {
    use alloy::primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        super::parse_amount(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid token amount: {value}")))
    }
}

/// Append-only store of resolved allocations, mirrored to a JSON file.
#[derive(Debug)]
pub struct AllocationCache {
    path: PathBuf,
    entries: Vec<Allocation>,
}

impl AllocationCache {
    pub fn new(path: impl Into<PathBuf>, entries: Vec<Allocation>) -> Self {
        Self {
            path: path.into(),
            entries,
        }
    }

    /// Reads the cache file. A missing file yields an empty cache, an
    /// unreadable one is reported and treated as empty.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        let entries = match tokio::fs::read_to_string(path).await {
            Ok(data) => serde_json::from_str::<Vec<Allocation>>(&data).unwrap_or_else(|err| {
                tracing::warn!("Ignoring {}: {err}", path.display());
                Vec::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                tracing::warn!("Failed to read {}: {err}", path.display());
                Vec::new()
            }
        };

        Self::new(path, entries)
    }

    pub fn get(&self, address: Address) -> Option<&Allocation> {
        self.entries.iter().find(|alloc| alloc.address == address)
    }

    /// Adds an allocation and rewrites the whole file before returning.
    pub async fn append(&mut self, allocation: Allocation) -> eyre::Result<()> {
        self.entries.push(allocation);
        self.persist().await
    }

    async fn persist(&self) -> eyre::Result<()> {
        let data = serde_json::to_string_pretty(&self.entries)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, data).await?;

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[Allocation] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use serde_json::json;

    use super::*;

    fn sample() -> Allocation {
        Allocation {
            chain_id: 8453,
            index: 0,
            address: address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            amount: U256::from(1_500_000_000_000_000_000u128),
            proof: vec![B256::repeat_byte(0xab), B256::repeat_byte(0x01)],
        }
    }

    #[test]
    fn amount_is_stored_as_decimal_string() {
        let value = serde_json::to_value(sample()).unwrap();

        assert_eq!(value["amount"], json!("1500000000000000000"));
        assert_eq!(value["chainId"], json!(8453));
        assert_eq!(value["proof"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn amount_accepts_numbers_and_strings() {
        assert_eq!(parse_amount(&json!("42")), Some(U256::from(42)));
        assert_eq!(parse_amount(&json!(42)), Some(U256::from(42)));
        assert_eq!(parse_amount(&json!("0x2a")), None);
        assert_eq!(parse_amount(&json!(null)), None);
    }

    #[tokio::test]
    async fn lookup_ignores_address_casing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("allocations.json");
        let raw = json!([{
            "chainId": 1,
            "index": 7,
            "address": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "amount": "10",
            "proof": [B256::repeat_byte(1)]
        }]);
        std::fs::write(&path, raw.to_string()).unwrap();

        let cache = AllocationCache::load(&path).await;

        let hit = cache.get(address!("F39FD6E51AAD88F6F4CE6AB8827279CFFFB92266"));
        assert_eq!(hit.map(|a| a.index), Some(7));
    }

    #[tokio::test]
    async fn missing_or_garbage_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();

        let missing = AllocationCache::load(dir.path().join("nope.json")).await;
        assert_eq!(missing.len(), 0);

        let garbage_path = dir.path().join("garbage.json");
        std::fs::write(&garbage_path, "{\"not\": \"an array\"}").unwrap();
        let garbage = AllocationCache::load(&garbage_path).await;
        assert_eq!(garbage.len(), 0);
    }

    #[tokio::test]
    async fn append_rewrites_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data").join("allocations.json");

        let mut cache = AllocationCache::load(&path).await;
        cache.append(sample()).await.unwrap();

        let reloaded = AllocationCache::load(&path).await;
        assert_eq!(reloaded.entries(), &[sample()]);
        assert!(std::fs::read_to_string(&path).unwrap().contains("\n  "));
    }
}
