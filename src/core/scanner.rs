//! 层级与对象枚举
//!
//! 本地和远程两侧各有一组对称的枚举操作。不符合命名格式的目录、文件和 key
//! 直接过滤掉，不计入任何统计。

use super::layout;
use super::oid::{HierarchyId, Oid, OID_REMAINDER_PATTERN, OID_SHARD_PATTERN};
use crate::error::{MigrationError, Result};
use crate::storage::local::EntryKind;
use crate::storage::{LocalStore, RemoteStore};
use std::path::Path;
use tracing::{debug, info};

/// 列出本地所有层级（有序）
pub async fn list_local_hierarchies(local: &LocalStore) -> Result<Vec<HierarchyId>> {
    let names = local.list_entries(Path::new(""), EntryKind::Dir).await?;
    let total = names.len();

    let mut hierarchies: Vec<HierarchyId> = names
        .iter()
        .filter_map(|name| HierarchyId::parse(name).ok())
        .collect();
    hierarchies.sort();

    info!(
        "扫描本地层级完成: {} 个层级, {} 个目录被忽略",
        hierarchies.len(),
        total - hierarchies.len()
    );
    Ok(hierarchies)
}

/// 列出远程所有层级（有序）
///
/// 列表失败说明枚举结果不可信，调用方应中止整次运行。
pub async fn list_remote_hierarchies(remote: &dyn RemoteStore) -> Result<Vec<HierarchyId>> {
    let prefix = layout::namespace_prefix();
    let prefixes = remote
        .list_common_prefixes(&prefix)
        .await
        .map_err(|e| MigrationError::listing(&prefix, e))?;

    let mut hierarchies = Vec::with_capacity(prefixes.len());
    for p in &prefixes {
        match layout::prefix_to_hierarchy(p) {
            Ok(h) => hierarchies.push(h),
            Err(_) => debug!("忽略远程前缀: {}", p),
        }
    }
    hierarchies.sort();
    hierarchies.dedup();

    info!(
        "扫描远程层级完成: {} ({} 个层级)",
        remote.name(),
        hierarchies.len()
    );
    Ok(hierarchies)
}

/// 列出本地层级下的所有对象
///
/// 两级遍历：先匹配 2 位十六进制的分片目录，再匹配其中 62 位十六进制的文件。
pub async fn list_local_objects(local: &LocalStore, hierarchy: &HierarchyId) -> Result<Vec<Oid>> {
    let hierarchy_dir = Path::new(hierarchy.as_str());
    let mut shards = local.list_entries(hierarchy_dir, EntryKind::Dir).await?;
    shards.retain(|name| OID_SHARD_PATTERN.is_match(name));
    shards.sort();

    let mut oids = Vec::new();
    for shard in &shards {
        let mut files = local
            .list_entries(&hierarchy_dir.join(shard), EntryKind::File)
            .await?;
        files.sort();

        oids.extend(
            files
                .iter()
                .filter(|name| OID_REMAINDER_PATTERN.is_match(name))
                .filter_map(|name| Oid::from_parts(shard, name).ok()),
        );
    }

    debug!(
        "层级 {}: 本地 {} 个分片目录, {} 个对象",
        hierarchy,
        shards.len(),
        oids.len()
    );
    Ok(oids)
}

/// 列出远程层级下的所有对象及其 key
pub async fn list_remote_objects(
    remote: &dyn RemoteStore,
    hierarchy: &HierarchyId,
) -> Result<Vec<(Oid, String)>> {
    let prefix = layout::hierarchy_prefix(hierarchy);
    let keys = remote
        .list_keys(&prefix)
        .await
        .map_err(|e| MigrationError::listing(&prefix, e))?;

    let total = keys.len();
    let objects: Vec<(Oid, String)> = keys
        .into_iter()
        .filter_map(|key| match layout::remote_key_to_oid(&key) {
            Ok(oid) => Some((oid, key)),
            Err(_) => {
                debug!("忽略远程 key: {}", key);
                None
            }
        })
        .collect();

    debug!(
        "层级 {}: 远程 {} 个 key, {} 个对象",
        hierarchy,
        total,
        objects.len()
    );
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::fs;

    const HIERARCHY: &str = "1234567890abcdef1234";

    fn write_object(root: &Path, hierarchy: &str, content: &[u8]) -> Oid {
        let oid = Oid::for_content(content);
        let dir = root.join(hierarchy).join(oid.shard());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(oid.remainder()), content).unwrap();
        oid
    }

    #[tokio::test]
    async fn test_local_hierarchies_filters_names() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join(HIERARCHY)).unwrap();
        fs::create_dir(root.join("abcde")).unwrap();
        fs::create_dir(root.join("1234567890ABCDEF1234")).unwrap();
        // 名字合法但不是目录
        fs::write(root.join("ffffffffffffffffffff"), b"").unwrap();

        let hierarchies = list_local_hierarchies(&LocalStore::new(root)).await.unwrap();
        assert_eq!(hierarchies, vec![HierarchyId::parse(HIERARCHY).unwrap()]);
    }

    #[tokio::test]
    async fn test_local_objects_ignores_stray_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let a = write_object(root, HIERARCHY, b"first");
        let b = write_object(root, HIERARCHY, b"second");

        let h_dir = root.join(HIERARCHY);
        fs::create_dir_all(h_dir.join("zz")).unwrap();
        fs::write(h_dir.join("zz").join(a.remainder()), b"stray").unwrap();
        fs::write(h_dir.join(a.shard()).join("README"), b"stray").unwrap();
        fs::write(h_dir.join(a.shard()).join(".tmp-upload"), b"stray").unwrap();
        // 目录名符合 62 位格式，但不是文件
        fs::create_dir_all(h_dir.join(b.shard()).join("0".repeat(62))).unwrap();

        let h = HierarchyId::parse(HIERARCHY).unwrap();
        let mut oids = list_local_objects(&LocalStore::new(root), &h).await.unwrap();
        oids.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(oids, expected);
    }

    #[tokio::test]
    async fn test_remote_hierarchies_and_objects() {
        let store = MemoryStore::new();
        let oid = Oid::for_content(b"remote");
        store
            .insert(&format!("git-lfs/{}/{}", HIERARCHY, oid), "remote")
            .await;
        store
            .insert(&format!("git-lfs/{}/ab/cdef", HIERARCHY), "stray")
            .await;
        store.insert("git-lfs/12345/whatever", "stray").await;
        store.insert("unrelated/ffffffffffffffffffff/x", "stray").await;

        let h = HierarchyId::parse(HIERARCHY).unwrap();
        let hierarchies = list_remote_hierarchies(&store).await.unwrap();
        assert_eq!(hierarchies, vec![h.clone()]);

        let objects = list_remote_objects(&store, &h).await.unwrap();
        assert_eq!(
            objects,
            vec![(oid.clone(), format!("git-lfs/{}/{}", HIERARCHY, oid))]
        );
    }
}
