//! 本地目录布局与远程 key 之间的映射
//!
//! 本地：`<root>/<hierarchy>/<oid[0:2]>/<oid[2:]>`，前两位作为分片目录，
//! 每个层级最多 256 个分片。
//! 远程：`git-lfs/<hierarchy>/<oid>`，没有分片。

use super::oid::{HierarchyId, Oid};
use crate::error::{MigrationError, Result};
use std::path::{Path, PathBuf};

/// 远程 key 的命名空间前缀，使 LFS 对象可以和同一个 bucket 的其他用途共存
pub const BUCKET_KEY_PREFIX: &str = "git-lfs";

/// 远程 key 的分隔符
pub const KEY_DELIMITER: char = '/';

/// Bitbucket home 下的 LFS 存储目录
pub const LFS_STORAGE_DIR: &str = "shared/data/git-lfs/storage";

/// 由本地对象路径的最后两段拼出 OID
pub fn path_to_oid(path: &Path) -> Result<Oid> {
    let malformed = || MigrationError::MalformedPath {
        path: path.to_path_buf(),
    };

    let remainder = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(malformed)?;
    let shard = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .ok_or_else(malformed)?;

    Oid::from_parts(shard, remainder).map_err(|_| malformed())
}

/// 对象的远程 key
pub fn to_remote_key(hierarchy: &HierarchyId, oid: &Oid) -> String {
    format!(
        "{}{}{}{}{}",
        BUCKET_KEY_PREFIX, KEY_DELIMITER, hierarchy, KEY_DELIMITER, oid
    )
}

/// 层级在远程的前缀（以分隔符结尾）
pub fn hierarchy_prefix(hierarchy: &HierarchyId) -> String {
    format!(
        "{}{}{}{}",
        BUCKET_KEY_PREFIX, KEY_DELIMITER, hierarchy, KEY_DELIMITER
    )
}

/// 命名空间前缀（以分隔符结尾）
pub fn namespace_prefix() -> String {
    format!("{}{}", BUCKET_KEY_PREFIX, KEY_DELIMITER)
}

/// 对象在本地的存放路径
pub fn to_local_shard_path(root: &Path, hierarchy: &HierarchyId, oid: &Oid) -> PathBuf {
    root.join(hierarchy.as_str())
        .join(oid.shard())
        .join(oid.remainder())
}

/// 从远程 key 的最后一段解析 OID
pub fn remote_key_to_oid(key: &str) -> Result<Oid> {
    let last = key
        .trim_end_matches(KEY_DELIMITER)
        .rsplit(KEY_DELIMITER)
        .next()
        .unwrap_or_default();
    Oid::parse(last).map_err(|_| MigrationError::malformed_identifier(key))
}

/// 从公共前缀（如 `git-lfs/<hierarchy>/`）解析层级 ID
pub fn prefix_to_hierarchy(prefix: &str) -> Result<HierarchyId> {
    let segment = prefix
        .trim_start_matches(KEY_DELIMITER)
        .strip_prefix(BUCKET_KEY_PREFIX)
        .and_then(|rest| rest.strip_prefix(KEY_DELIMITER))
        .map(|rest| rest.trim_end_matches(KEY_DELIMITER))
        .ok_or_else(|| MigrationError::malformed_identifier(prefix))?;
    HierarchyId::parse(segment).map_err(|_| MigrationError::malformed_identifier(prefix))
}
