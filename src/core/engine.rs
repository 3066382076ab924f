use super::layout;
use super::oid::{HierarchyId, Oid};
use super::scanner;
use super::summary::{TransferOutcome, TransferSummary};
use crate::error::{MigrationError, Result};
use crate::storage::{LocalStore, RemoteStore};
use futures::{future, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// 迁移方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// 本地 -> 远程
    Upload,
    /// 远程 -> 本地
    Download,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Upload => write!(f, "upload"),
            Direction::Download => write!(f, "download"),
        }
    }
}

/// 迁移配置
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// 同一层级内的最大并发对象数，1 表示严格顺序执行
    pub max_concurrent_transfers: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: 1,
        }
    }
}

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

/// 单个层级的处理结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyReport {
    pub hierarchy: HierarchyId,
    pub summary: TransferSummary,
    /// 是否处理完了层级内的所有对象（取消时为 false）
    pub complete: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl HierarchyReport {
    fn new(hierarchy: HierarchyId) -> Self {
        Self {
            hierarchy,
            summary: TransferSummary::new(),
            complete: true,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn absorb(mut self, result: ObjectResult) -> Self {
        self.summary.record(result.outcome);
        self.warnings.extend(result.warning);
        self.errors.extend(result.error);
        self
    }
}

/// 整次运行的报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub direction: Direction,
    pub status: RunStatus,
    pub start_time: i64,
    pub end_time: i64,
    pub hierarchies: Vec<HierarchyReport>,
    pub summary: TransferSummary,
    /// 中止运行的错误
    pub errors: Vec<String>,
}

impl RunReport {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            status: RunStatus::Completed,
            start_time: chrono::Utc::now().timestamp(),
            end_time: 0,
            hierarchies: Vec::new(),
            summary: TransferSummary::new(),
            errors: Vec::new(),
        }
    }

    fn finish(mut self, status: RunStatus) -> Self {
        self.status = status;
        self.end_time = chrono::Utc::now().timestamp();
        self.summary = self.hierarchies.iter().map(|h| h.summary).sum();
        self
    }

    fn fail(mut self, err: &MigrationError) -> Self {
        self.errors.push(err.to_string());
        self.finish(RunStatus::Failed)
    }

    /// 所有层级的警告
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.hierarchies
            .iter()
            .flat_map(|h| h.warnings.iter().map(String::as_str))
    }
}

/// 进度事件
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    HierarchyStarted {
        hierarchy: HierarchyId,
        index: usize,
        total: usize,
    },
    HierarchyFinished(HierarchyReport),
}

/// 单个对象的处理结果
struct ObjectResult {
    outcome: TransferOutcome,
    warning: Option<String>,
    error: Option<String>,
}

impl ObjectResult {
    fn transferred() -> Self {
        Self {
            outcome: TransferOutcome::Transferred,
            warning: None,
            error: None,
        }
    }

    fn skipped() -> Self {
        Self {
            outcome: TransferOutcome::SkippedExists,
            warning: None,
            error: None,
        }
    }

    fn failed(err: MigrationError) -> Self {
        warn!("  Error: {}", err);
        Self {
            outcome: TransferOutcome::Failed,
            warning: None,
            error: Some(err.to_string()),
        }
    }

    fn with_warning(mut self, warning: String) -> Self {
        warn!("  Warning: {}", warning);
        self.warning = Some(warning);
        self
    }
}

/// 迁移引擎
///
/// 按方向逐个层级对账：目标端已存在的对象跳过，缺失的对象传输并校验。
/// 两个方向都只新增，不会覆盖或删除目标端的任何对象。
pub struct TransferReconciler {
    remote: Arc<dyn RemoteStore>,
    config: ReconcileConfig,
    cancelled: Arc<AtomicBool>,
}

impl TransferReconciler {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            config: ReconcileConfig::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_config(remote: Arc<dyn RemoteStore>, config: ReconcileConfig) -> Self {
        Self {
            remote,
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 取消迁移：正在处理的对象会完成，之后不再开始新的对象
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// 取消标志，可交给信号处理任务
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 把本地对象上传到远程
    pub async fn upload(
        &self,
        root: &Path,
        progress_tx: Option<mpsc::Sender<ProgressEvent>>,
    ) -> RunReport {
        self.run(Direction::Upload, root, progress_tx).await
    }

    /// 把远程对象下载到本地
    pub async fn download(
        &self,
        root: &Path,
        progress_tx: Option<mpsc::Sender<ProgressEvent>>,
    ) -> RunReport {
        self.run(Direction::Download, root, progress_tx).await
    }

    /// 运行迁移
    ///
    /// 枚举失败会中止运行，但已完成层级的统计仍保留在报告中。
    pub async fn run(
        &self,
        direction: Direction,
        root: &Path,
        progress_tx: Option<mpsc::Sender<ProgressEvent>>,
    ) -> RunReport {
        let local = LocalStore::new(root);
        let mut report = RunReport::new(direction);

        info!(
            "开始迁移: {} ({} <-> {})",
            direction,
            local.name(),
            self.remote.name()
        );

        let hierarchies = match direction {
            Direction::Upload => scanner::list_local_hierarchies(&local).await,
            Direction::Download => scanner::list_remote_hierarchies(self.remote.as_ref()).await,
        };

        let hierarchies = match hierarchies {
            Ok(h) => h,
            Err(e) => {
                error!("枚举层级失败: {}", e);
                return report.fail(&e);
            }
        };

        if hierarchies.is_empty() {
            info!("没有需要迁移的层级");
            return report.finish(RunStatus::Completed);
        }

        let total = hierarchies.len();

        for (i, hierarchy) in hierarchies.into_iter().enumerate() {
            if self.is_cancelled() {
                info!("迁移已取消");
                return report.finish(RunStatus::Cancelled);
            }

            info!("处理层级 {} ({}/{})", hierarchy, i + 1, total);
            send_progress(
                &progress_tx,
                ProgressEvent::HierarchyStarted {
                    hierarchy: hierarchy.clone(),
                    index: i + 1,
                    total,
                },
            )
            .await;

            match self.reconcile_hierarchy(direction, &local, &hierarchy).await {
                Ok(hierarchy_report) => {
                    info!(
                        "层级 {} 完成: 成功 {}, 跳过 {}, 失败 {}",
                        hierarchy,
                        hierarchy_report.summary.successful,
                        hierarchy_report.summary.skipped,
                        hierarchy_report.summary.failed
                    );
                    let complete = hierarchy_report.complete;
                    send_progress(
                        &progress_tx,
                        ProgressEvent::HierarchyFinished(hierarchy_report.clone()),
                    )
                    .await;
                    report.hierarchies.push(hierarchy_report);

                    if !complete {
                        info!("迁移已取消");
                        return report.finish(RunStatus::Cancelled);
                    }
                }
                Err(e) => {
                    error!("层级 {} 枚举失败，中止迁移: {}", hierarchy, e);
                    return report.fail(&e);
                }
            }
        }

        let report = report.finish(RunStatus::Completed);
        info!(
            "迁移完成: 成功 {}, 跳过 {}, 失败 {}",
            report.summary.successful, report.summary.skipped, report.summary.failed
        );
        report
    }

    /// 处理单个层级
    ///
    /// 只有枚举失败会返回错误；单个对象的失败记入统计。
    pub async fn reconcile_hierarchy(
        &self,
        direction: Direction,
        local: &LocalStore,
        hierarchy: &HierarchyId,
    ) -> Result<HierarchyReport> {
        let concurrency = self.config.max_concurrent_transfers.max(1);

        let report = match direction {
            Direction::Upload => {
                let oids = scanner::list_local_objects(local, hierarchy).await?;
                let expected = oids.len();
                let report = futures::stream::iter(oids)
                    .take_while(|_| future::ready(!self.is_cancelled()))
                    .map(|oid| self.upload_object(local, hierarchy, oid))
                    .buffer_unordered(concurrency)
                    .fold(HierarchyReport::new(hierarchy.clone()), |report, result| {
                        future::ready(report.absorb(result))
                    })
                    .await;
                mark_complete(report, expected)
            }
            Direction::Download => {
                let objects = scanner::list_remote_objects(self.remote.as_ref(), hierarchy).await?;
                let expected = objects.len();
                let report = futures::stream::iter(objects)
                    .take_while(|_| future::ready(!self.is_cancelled()))
                    .map(|(oid, key)| self.download_object(local, hierarchy, oid, key))
                    .buffer_unordered(concurrency)
                    .fold(HierarchyReport::new(hierarchy.clone()), |report, result| {
                        future::ready(report.absorb(result))
                    })
                    .await;
                mark_complete(report, expected)
            }
        };

        Ok(report)
    }

    /// 上传单个对象
    async fn upload_object(&self, local: &LocalStore, hierarchy: &HierarchyId, oid: Oid) -> ObjectResult {
        let key = layout::to_remote_key(hierarchy, &oid);

        // 已存在的对象不再上传，也不会被覆盖
        match self.remote.exists(&key).await {
            Ok(true) => {
                debug!("远程已存在，跳过: {}", key);
                return ObjectResult::skipped();
            }
            Ok(false) => {}
            Err(e) => return ObjectResult::failed(MigrationError::transfer(&key, e)),
        }

        let data = match local.read_object(hierarchy, &oid).await {
            Ok(data) => data,
            Err(e) => return ObjectResult::failed(e),
        };

        debug!("上传: {} ({}字节)", key, data.len());
        match self.remote.put(&key, data, &oid.to_base64()).await {
            Ok(Some(checksum)) => match Oid::from_base64(&checksum) {
                Ok(actual) if actual == oid => ObjectResult::transferred(),
                Ok(actual) => ObjectResult::transferred().with_warning(format!(
                    "Object uploaded but has wrong checksum. Expected: {} Actual: {}",
                    oid, actual
                )),
                Err(_) => ObjectResult::transferred().with_warning(format!(
                    "Object {} uploaded but store returned unreadable checksum: {}",
                    oid, checksum
                )),
            },
            Ok(None) => ObjectResult::transferred(),
            Err(e) => ObjectResult::failed(MigrationError::transfer(&key, e)),
        }
    }

    /// 下载单个对象
    async fn download_object(
        &self,
        local: &LocalStore,
        hierarchy: &HierarchyId,
        oid: Oid,
        key: String,
    ) -> ObjectResult {
        // 本地已有的对象视为完整可信，不再校验
        match local.contains(hierarchy, &oid).await {
            Ok(true) => {
                debug!("本地已存在，跳过: {}", oid);
                return ObjectResult::skipped();
            }
            Ok(false) => {}
            Err(e) => return ObjectResult::failed(e),
        }

        let object = match self.remote.get(&key).await {
            Ok(object) => object,
            Err(e) => return ObjectResult::failed(MigrationError::transfer(&key, e)),
        };

        let actual = match object.checksum_sha256.as_deref().map(Oid::from_base64) {
            Some(Ok(actual)) => actual,
            Some(Err(e)) => return ObjectResult::failed(MigrationError::transfer(&key, e)),
            None => Oid::for_content(&object.data),
        };
        if actual != oid {
            return ObjectResult::failed(MigrationError::ChecksumMismatch {
                expected: oid.to_string(),
                actual: actual.to_string(),
            });
        }

        debug!("下载: {} ({}字节)", key, object.data.len());
        match local.write_object(hierarchy, &oid, &object.data).await {
            Ok(()) => ObjectResult::transferred(),
            Err(e) => ObjectResult::failed(e),
        }
    }
}

fn mark_complete(mut report: HierarchyReport, expected: usize) -> HierarchyReport {
    report.complete = report.summary.total() == expected as u64;
    report
}

/// 发送进度更新
async fn send_progress(tx: &Option<mpsc::Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, RemoteObject};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::fs;

    const H1: &str = "1234567890abcdef1234";
    const H2: &str = "abcdefabcdefabcdef00";

    /// 包装内存存储，按需注入故障
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_listing_for: Option<String>,
        fail_put_for: Option<String>,
        bogus_checksum: bool,
    }

    #[async_trait]
    impl RemoteStore for FlakyStore {
        async fn list_common_prefixes(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
            self.inner.list_common_prefixes(prefix).await
        }

        async fn list_keys(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
            if let Some(h) = &self.fail_listing_for {
                if prefix.contains(h.as_str()) {
                    anyhow::bail!("connection reset");
                }
            }
            self.inner.list_keys(prefix).await
        }

        async fn exists(&self, key: &str) -> anyhow::Result<bool> {
            self.inner.exists(key).await
        }

        async fn get(&self, key: &str) -> anyhow::Result<RemoteObject> {
            self.inner.get(key).await
        }

        async fn put(
            &self,
            key: &str,
            data: Bytes,
            checksum_sha256: &str,
        ) -> anyhow::Result<Option<String>> {
            if self.fail_put_for.as_deref() == Some(key) {
                anyhow::bail!("503 Slow Down");
            }
            let stored = self.inner.put(key, data, checksum_sha256).await?;
            if self.bogus_checksum {
                return Ok(Some(Oid::for_content(b"bogus").to_base64()));
            }
            Ok(stored)
        }

        fn name(&self) -> &str {
            "flaky://"
        }
    }

    fn write_local(root: &Path, hierarchy: &str, content: &[u8]) -> Oid {
        let oid = Oid::for_content(content);
        let dir = root.join(hierarchy).join(oid.shard());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(oid.remainder()), content).unwrap();
        oid
    }

    fn key(hierarchy: &str, oid: &Oid) -> String {
        format!("git-lfs/{}/{}", hierarchy, oid)
    }

    fn summary(successful: u64, skipped: u64, failed: u64) -> TransferSummary {
        TransferSummary {
            successful,
            skipped,
            failed,
        }
    }

    #[tokio::test]
    async fn test_upload_single_object() {
        let dir = tempfile::tempdir().unwrap();
        let oid = write_local(dir.path(), H1, b"some lfs content");
        let store = Arc::new(MemoryStore::new());

        let reconciler = TransferReconciler::new(store.clone());
        let report = reconciler.upload(dir.path(), None).await;

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.summary, summary(1, 0, 0));
        assert_eq!(store.keys().await, vec![key(H1, &oid)]);
        assert_eq!(
            store.object(&key(H1, &oid)).await.unwrap().as_ref(),
            b"some lfs content"
        );
    }

    #[tokio::test]
    async fn test_upload_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_local(dir.path(), H1, b"one");
        write_local(dir.path(), H1, b"two");
        write_local(dir.path(), H2, b"three");
        let store = Arc::new(MemoryStore::new());
        let reconciler = TransferReconciler::new(store.clone());

        let first = reconciler.upload(dir.path(), None).await;
        assert_eq!(first.summary, summary(3, 0, 0));

        let second = reconciler.upload(dir.path(), None).await;
        assert_eq!(second.summary, summary(0, 3, 0));
        assert_eq!(second.hierarchies.len(), 2);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_upload_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let oid = write_local(dir.path(), H1, b"local content");
        let store = Arc::new(MemoryStore::new());
        store.insert(&key(H1, &oid), "remote content").await;

        let report = TransferReconciler::new(store.clone())
            .upload(dir.path(), None)
            .await;

        assert_eq!(report.summary, summary(0, 1, 0));
        assert_eq!(
            store.object(&key(H1, &oid)).await.unwrap().as_ref(),
            b"remote content"
        );
    }

    #[tokio::test]
    async fn test_upload_ignores_malformed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let oid = write_local(root, H1, b"valid");
        // 不合法的层级名和分片名
        write_local(root, "abcde", b"short hierarchy");
        fs::create_dir_all(root.join(H1).join("zz")).unwrap();
        fs::write(root.join(H1).join("zz").join(oid.remainder()), b"x").unwrap();
        fs::write(root.join(H1).join(oid.shard()).join("notes.txt"), b"x").unwrap();

        let store = Arc::new(MemoryStore::new());
        let report = TransferReconciler::new(store.clone()).upload(root, None).await;

        assert_eq!(report.summary, summary(1, 0, 0));
        assert_eq!(report.hierarchies.len(), 1);
        assert_eq!(store.keys().await, vec![key(H1, &oid)]);
    }

    #[tokio::test]
    async fn test_upload_rejects_corrupt_local_object() {
        let dir = tempfile::tempdir().unwrap();
        let oid = Oid::for_content(b"expected");
        let shard = dir.path().join(H1).join(oid.shard());
        fs::create_dir_all(&shard).unwrap();
        fs::write(shard.join(oid.remainder()), b"corrupted").unwrap();

        let store = Arc::new(MemoryStore::new());
        let report = TransferReconciler::new(store.clone())
            .upload(dir.path(), None)
            .await;

        assert_eq!(report.summary, summary(0, 0, 1));
        assert_eq!(report.hierarchies[0].errors.len(), 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_upload_failure_does_not_stop_run() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_local(dir.path(), H1, b"bad");
        write_local(dir.path(), H1, b"good");
        write_local(dir.path(), H2, b"other");

        let store = Arc::new(FlakyStore {
            fail_put_for: Some(key(H1, &bad)),
            ..Default::default()
        });
        let report = TransferReconciler::new(store.clone())
            .upload(dir.path(), None)
            .await;

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.summary, summary(2, 0, 1));
        assert_eq!(store.inner.len().await, 2);
    }

    #[tokio::test]
    async fn test_upload_checksum_mismatch_is_warning() {
        let dir = tempfile::tempdir().unwrap();
        write_local(dir.path(), H1, b"content");

        let store = Arc::new(FlakyStore {
            bogus_checksum: true,
            ..Default::default()
        });
        let report = TransferReconciler::new(store).upload(dir.path(), None).await;

        assert_eq!(report.summary, summary(1, 0, 0));
        let warnings: Vec<&str> = report.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("wrong checksum"));
    }

    #[tokio::test]
    async fn test_upload_with_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            write_local(dir.path(), H1, format!("object {}", i).as_bytes());
        }
        let store = Arc::new(MemoryStore::new());
        let reconciler = TransferReconciler::with_config(
            store.clone(),
            ReconcileConfig {
                max_concurrent_transfers: 4,
            },
        );

        let report = reconciler.upload(dir.path(), None).await;
        assert_eq!(report.summary, summary(20, 0, 0));
        assert_eq!(store.len().await, 20);

        let again = reconciler.upload(dir.path(), None).await;
        assert_eq!(again.summary, summary(0, 20, 0));
    }

    #[tokio::test]
    async fn test_upload_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let report = TransferReconciler::new(Arc::new(MemoryStore::new()))
            .upload(dir.path(), None)
            .await;

        assert_eq!(report.status, RunStatus::Completed);
        assert!(report.hierarchies.is_empty());
        assert_eq!(report.summary, TransferSummary::new());
    }

    #[tokio::test]
    async fn test_download_objects() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let a = Oid::for_content(b"alpha");
        let b = Oid::for_content(b"beta");
        store.insert(&key(H1, &a), "alpha").await;
        store.insert(&key(H2, &b), "beta").await;
        // 不合法的 key 不参与统计
        store.insert(&format!("git-lfs/{}/ab/cd", H1), "stray").await;

        let reconciler = TransferReconciler::new(store);
        let report = reconciler.download(dir.path(), None).await;

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.summary, summary(2, 0, 0));
        let path = dir.path().join(H1).join(a.shard()).join(a.remainder());
        assert_eq!(fs::read(path).unwrap(), b"alpha");

        let again = reconciler.download(dir.path(), None).await;
        assert_eq!(again.summary, summary(0, 2, 0));
    }

    #[tokio::test]
    async fn test_download_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let oid = Oid::for_content(b"remote");
        let path = dir.path().join(H1).join(oid.shard()).join(oid.remainder());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"already here").unwrap();

        let store = Arc::new(MemoryStore::new());
        store.insert(&key(H1, &oid), "remote").await;

        let report = TransferReconciler::new(store)
            .download(dir.path(), None)
            .await;

        assert_eq!(report.summary, summary(0, 1, 0));
        assert_eq!(fs::read(&path).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn test_download_checksum_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let oid = Oid::for_content(b"expected");
        let store = Arc::new(MemoryStore::new());
        store.insert(&key(H1, &oid), "tampered").await;

        let report = TransferReconciler::new(store)
            .download(dir.path(), None)
            .await;

        assert_eq!(report.summary, summary(0, 0, 1));
        assert!(!dir.path().join(H1).join(oid.shard()).join(oid.remainder()).exists());
    }

    #[tokio::test]
    async fn test_listing_failure_keeps_completed_hierarchies() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlakyStore {
            fail_listing_for: Some(H2.to_string()),
            ..Default::default()
        };
        let a = Oid::for_content(b"first hierarchy");
        let b = Oid::for_content(b"second hierarchy");
        store.inner.insert(&key(H1, &a), "first hierarchy").await;
        store.inner.insert(&key(H2, &b), "second hierarchy").await;

        let report = TransferReconciler::new(Arc::new(store))
            .download(dir.path(), None)
            .await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.hierarchies.len(), 1);
        assert_eq!(report.summary, summary(1, 0, 0));
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("connection reset"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        write_local(dir.path(), H1, b"content");
        let store = Arc::new(MemoryStore::new());

        let reconciler = TransferReconciler::new(store.clone());
        reconciler.cancel();
        let report = reconciler.upload(dir.path(), None).await;

        assert_eq!(report.status, RunStatus::Cancelled);
        assert!(report.hierarchies.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let dir = tempfile::tempdir().unwrap();
        write_local(dir.path(), H1, b"one");
        write_local(dir.path(), H2, b"two");

        let (tx, mut rx) = mpsc::channel(16);
        let report = TransferReconciler::new(Arc::new(MemoryStore::new()))
            .upload(dir.path(), Some(tx))
            .await;
        assert_eq!(report.status, RunStatus::Completed);

        let mut started = 0;
        let mut finished = TransferSummary::new();
        while let Some(event) = rx.recv().await {
            match event {
                ProgressEvent::HierarchyStarted { total, .. } => {
                    assert_eq!(total, 2);
                    started += 1;
                }
                ProgressEvent::HierarchyFinished(h) => finished += h.summary,
            }
        }
        assert_eq!(started, 2);
        assert_eq!(finished, report.summary);
    }
}
