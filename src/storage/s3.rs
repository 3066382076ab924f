use super::{content_checksum, RemoteObject, RemoteStore, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use crate::config::AppConfig;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Metakey, Operator};
use std::time::Duration;

pub struct S3Store {
    operator: Operator,
    name: String,
}

impl S3Store {
    pub fn new(config: &AppConfig) -> Result<Self> {
        use opendal::services::S3;

        let mut builder = S3::default().bucket(&config.bucket).region(&config.region);

        if let Some(ref access_key) = config.access_key {
            builder = builder.access_key_id(access_key);
        }

        if let Some(ref secret_key) = config.secret_key {
            builder = builder.secret_access_key(secret_key);
        }

        // opendal 默认使用 path-style 访问，兼容 LocalStack/MinIO 等自建端点
        if let Some(ref ep) = config.endpoint_override {
            builder = builder.endpoint(ep);
        }

        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        let name = format!("s3://{}", config.bucket);

        Ok(Self { operator, name })
    }
}

#[async_trait]
impl RemoteStore for S3Store {
    async fn list_common_prefixes(&self, prefix: &str) -> Result<Vec<String>> {
        let mut prefixes = Vec::new();

        // 非递归列表对应 ListObjectsV2 的 delimiter=/，目录项即公共前缀
        let mut lister = self
            .operator
            .lister_with(prefix)
            .metakey(Metakey::Mode)
            .await?;

        while let Some(entry) = lister.try_next().await? {
            let path = entry.path();

            // 跳过前缀本身
            if path == prefix || !entry.metadata().is_dir() {
                continue;
            }

            prefixes.push(path.to_string());
        }

        Ok(prefixes)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();

        let mut lister = self
            .operator
            .lister_with(prefix)
            .recursive(true)
            .metakey(Metakey::Mode)
            .await?;

        while let Some(entry) = lister.try_next().await? {
            if entry.metadata().is_dir() {
                continue;
            }
            keys.push(entry.path().trim_start_matches('/').to_string());
        }

        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.operator.stat(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &str) -> Result<RemoteObject> {
        let data = self.operator.read(key).await?.to_bytes();

        // opendal 不暴露 x-amz-checksum-sha256，按收到的内容计算
        let checksum_sha256 = Some(content_checksum(&data));

        Ok(RemoteObject {
            data,
            checksum_sha256,
        })
    }

    async fn put(&self, key: &str, data: Bytes, checksum_sha256: &str) -> Result<Option<String>> {
        // 与 S3 的 x-amz-checksum-sha256 语义一致：内容与期望校验和不符时拒绝写入
        let actual = content_checksum(&data);
        if actual != checksum_sha256 {
            anyhow::bail!(
                "BadDigest: 内容校验和 {} 与期望值 {} 不一致",
                actual,
                checksum_sha256
            );
        }

        self.operator.write(key, data).await?;
        Ok(Some(actual))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
