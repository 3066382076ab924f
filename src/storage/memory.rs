//! 内存对象存储，语义与 S3 的列表/校验行为一致

use super::{content_checksum, RemoteObject, RemoteStore};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

const DELIMITER: char = '/';

pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
    name: String,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            name: "memory://".to_string(),
        }
    }

    /// 直接放入对象，不做校验
    pub async fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.objects.write().await.insert(key.to_string(), data.into());
    }

    /// 所有 key（有序）
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    pub async fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_common_prefixes(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().await;

        let prefixes: BTreeSet<String> = objects
            .keys()
            .filter_map(|key| {
                let rest = key.strip_prefix(prefix)?;
                let end = rest.find(DELIMITER)?;
                Some(format!("{}{}", prefix, &rest[..=end]))
            })
            .collect();

        Ok(prefixes.into_iter().collect())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().await;
        Ok(objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<RemoteObject> {
        let data = self
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("NoSuchKey: {}", key))?;

        let checksum_sha256 = Some(content_checksum(&data));
        Ok(RemoteObject {
            data,
            checksum_sha256,
        })
    }

    async fn put(&self, key: &str, data: Bytes, checksum_sha256: &str) -> Result<Option<String>> {
        let actual = content_checksum(&data);
        if actual != checksum_sha256 {
            anyhow::bail!("BadDigest: {} 的内容与期望校验和不一致", key);
        }

        self.objects.write().await.insert(key.to_string(), data);
        Ok(Some(actual))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
