//! LFS 对象标识（OID）与层级 ID
//!
//! OID 是对象内容的 SHA-256 摘要。文件名和远程 key 使用十六进制形式，
//! 向 S3 传递校验和时使用 base64 形式。

use crate::error::{MigrationError, Result};
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::LazyLock;

/// 层级 ID：20 位小写十六进制
pub static HIERARCHY_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9a-f]{20}$").expect("hierarchy pattern"));

/// 完整 OID：64 位小写十六进制
pub static OID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9a-f]{64}$").expect("oid pattern"));

/// 分片目录名：OID 前 2 位
pub static OID_SHARD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9a-f]{2}$").expect("shard pattern"));

/// 分片目录中的文件名：OID 后 62 位
pub static OID_REMAINDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9a-f]{62}$").expect("remainder pattern"));

/// SHA-256 摘要长度（字节）
const DIGEST_LEN: usize = 32;

/// LFS 对象标识
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    pub fn parse(value: &str) -> Result<Self> {
        if OID_PATTERN.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(MigrationError::malformed_identifier(value))
        }
    }

    /// 由分片目录名和文件名拼出 OID
    pub fn from_parts(shard: &str, remainder: &str) -> Result<Self> {
        if !OID_SHARD_PATTERN.is_match(shard) || !OID_REMAINDER_PATTERN.is_match(remainder) {
            return Err(MigrationError::malformed_identifier(format!(
                "{}{}",
                shard, remainder
            )));
        }
        Ok(Self(format!("{}{}", shard, remainder)))
    }

    /// 计算内容的 OID
    pub fn for_content(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// 从 base64 校验和还原 OID
    pub fn from_base64(value: &str) -> Result<Self> {
        base64_to_hex(value).map(Self)
    }

    /// 转成 S3 使用的 base64 校验和
    pub fn to_base64(&self) -> String {
        // 构造时已校验格式，解码不会失败
        let digest = hex::decode(&self.0).unwrap_or_default();
        base64::engine::general_purpose::STANDARD.encode(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 分片目录名（前 2 位）
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }

    /// 分片内文件名（后 62 位）
    pub fn remainder(&self) -> &str {
        &self.0[2..]
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Oid {
    type Error = MigrationError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

/// 层级 ID
///
/// 由 fork 关联起来的仓库共享一个层级，其 LFS 对象存放在同一个集合中。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HierarchyId(String);

impl HierarchyId {
    pub fn parse(value: &str) -> Result<Self> {
        if HIERARCHY_ID_PATTERN.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(MigrationError::malformed_identifier(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HierarchyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for HierarchyId {
    type Error = MigrationError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<HierarchyId> for String {
    fn from(id: HierarchyId) -> Self {
        id.0
    }
}

/// 十六进制 OID 转 base64
pub fn hex_to_base64(hex: &str) -> Result<String> {
    Oid::parse(hex).map(|oid| oid.to_base64())
}

/// base64 校验和转十六进制
///
/// 日志和文件名统一使用十六进制，和 LFS API 保持一致。
pub fn base64_to_hex(value: &str) -> Result<String> {
    let digest = base64::engine::general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|_| MigrationError::malformed_identifier(value))?;
    if digest.len() != DIGEST_LEN {
        return Err(MigrationError::malformed_identifier(value));
    }
    Ok(hex::encode(digest))
}
