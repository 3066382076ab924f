use crate::core::layout;
use crate::core::oid::{HierarchyId, Oid};
use crate::error::{MigrationError, Result};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

/// 目录项类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

/// 本地 LFS 对象存储
///
/// 目录结构为 `<root>/<hierarchy>/<oid[0:2]>/<oid[2:]>`。
pub struct LocalStore {
    base_path: PathBuf,
    name: String,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let base_path = path.into();
        let name = format!("local:{}", base_path.display());
        Self { base_path, name }
    }

    pub fn root(&self) -> &Path {
        &self.base_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 对象的本地路径
    pub fn object_path(&self, hierarchy: &HierarchyId, oid: &Oid) -> PathBuf {
        layout::to_local_shard_path(&self.base_path, hierarchy, oid)
    }

    /// 列出目录下指定类型的直接子项名称（不跟随符号链接）
    pub async fn list_entries(&self, relative: &Path, kind: EntryKind) -> Result<Vec<String>> {
        let dir = self.base_path.join(relative);

        // 使用 spawn_blocking 避免阻塞 async runtime
        let blocking_dir = dir.clone();
        let entries = tokio::task::spawn_blocking(move || {
            let mut names = Vec::new();
            for entry in WalkDir::new(&blocking_dir)
                .min_depth(1)
                .max_depth(1)
                .follow_links(false)
            {
                let entry = entry.map_err(|e| {
                    let path = e.path().unwrap_or(&blocking_dir).to_path_buf();
                    MigrationError::io(path, e.into())
                })?;

                let file_type = entry.file_type();
                let matches = match kind {
                    EntryKind::Dir => file_type.is_dir(),
                    EntryKind::File => file_type.is_file(),
                };
                if !matches {
                    continue;
                }

                // 非 UTF-8 文件名不可能是合法的 OID
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
            Ok::<_, MigrationError>(names)
        })
        .await
        .map_err(|e| MigrationError::io(&dir, std::io::Error::other(e)))??;

        Ok(entries)
    }

    /// 对象是否已存在
    pub async fn contains(&self, hierarchy: &HierarchyId, oid: &Oid) -> Result<bool> {
        let path = self.object_path(hierarchy, oid);
        fs::try_exists(&path)
            .await
            .map_err(|e| MigrationError::io(&path, e))
    }

    /// 读取整个对象
    pub async fn read_object(&self, hierarchy: &HierarchyId, oid: &Oid) -> Result<Bytes> {
        let path = self.object_path(hierarchy, oid);
        let data = fs::read(&path)
            .await
            .map_err(|e| MigrationError::io(&path, e))?;
        Ok(Bytes::from(data))
    }

    /// 写入对象
    ///
    /// 先写入同目录下的临时文件再原子重命名，中途失败不会留下半个对象。
    /// 临时文件名不符合 OID 格式，残留时也不会被当成已存在的对象。
    pub async fn write_object(&self, hierarchy: &HierarchyId, oid: &Oid, data: &[u8]) -> Result<()> {
        let full_path = self.object_path(hierarchy, oid);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MigrationError::io(parent, e))?;
        }

        let temp_path = full_path.with_file_name(format!(
            ".{}.{}.tmp",
            oid.remainder(),
            uuid::Uuid::new_v4().simple()
        ));

        // 失败时清理临时文件
        let guard = scopeguard::guard(temp_path.clone(), |path| {
            let _ = std::fs::remove_file(path);
        });

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| MigrationError::io(&temp_path, e))?;
        file.write_all(data)
            .await
            .map_err(|e| MigrationError::io(&temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| MigrationError::io(&temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &full_path)
            .await
            .map_err(|e| MigrationError::io(&full_path, e))?;

        scopeguard::ScopeGuard::into_inner(guard);
        Ok(())
    }
}
