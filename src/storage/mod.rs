pub mod local;
pub mod memory;
pub mod s3;

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use s3::S3Store;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, list 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 从远程读取的对象
#[derive(Debug, Clone)]
pub struct RemoteObject {
    pub data: Bytes,
    /// 存储端校验过的 SHA-256（base64）
    pub checksum_sha256: Option<String>,
}

/// 远程对象存储接口
///
/// 只包含迁移需要的五个操作。所有调用都只尝试一次，不做重试。
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// 列出 prefix 下一级的公共前缀（按 `/` 分隔），分页由实现合并
    async fn list_common_prefixes(&self, prefix: &str) -> Result<Vec<String>>;

    /// 递归列出 prefix 下的所有 key
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// 仅查询元数据，判断 key 是否存在
    async fn exists(&self, key: &str) -> Result<bool>;

    /// 读取整个对象
    async fn get(&self, key: &str) -> Result<RemoteObject>;

    /// 写入整个对象
    ///
    /// `checksum_sha256` 是期望的 base64 SHA-256，存储端据此校验内容；
    /// 返回存储端计算出的校验和。
    async fn put(&self, key: &str, data: Bytes, checksum_sha256: &str) -> Result<Option<String>>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建远程存储
pub fn create_remote_store(config: &crate::config::AppConfig) -> Result<Arc<dyn RemoteStore>> {
    tracing::info!(
        "初始化S3存储: bucket={}, region={}",
        config.bucket,
        config.region
    );
    if let Some(endpoint) = &config.endpoint_override {
        tracing::info!("S3 endpoint override: {}", endpoint);
    }
    Ok(Arc::new(S3Store::new(config)?) as Arc<dyn RemoteStore>)
}

/// 计算内容的 base64 SHA-256
pub(crate) fn content_checksum(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(Sha256::digest(data))
}
