use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lfsmigrate_lib::config::AppConfig;
use lfsmigrate_lib::core::scanner;
use lfsmigrate_lib::logging::{get_log_dir, SizeRotatingWriter};
use lfsmigrate_lib::{
    create_remote_store, Direction, ProgressEvent, ReconcileConfig, RunStatus, TransferReconciler,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tracing_subscriber::prelude::*;

/// 在本地文件系统和 S3 之间迁移 Git LFS 对象
#[derive(Parser, Debug)]
#[command(name = "lfsmigrate", version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// 配置文件（.properties 或 .json）
    config: Option<PathBuf>,

    /// 从 S3 迁移回本地，覆盖配置中的 reverse-migration
    #[arg(long)]
    reverse: bool,

    /// 同一层级内的最大并发对象数
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 检查本地目录和 S3 连接
    Check {
        config: PathBuf,
    },
}

/// 初始化日志系统
fn init_logging(config: &AppConfig) {
    let level = config.log.tracing_level();
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
        .add_directive("hyper=warn".parse().unwrap_or_else(|_| level.into()))
        .add_directive("reqwest=warn".parse().unwrap_or_else(|_| level.into()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let file_writer = if config.log.enabled {
        match SizeRotatingWriter::new(&get_log_dir(), config.log.max_size_mb) {
            Ok(w) => Some(w),
            Err(e) => {
                eprintln!("无法创建日志文件，只输出到控制台: {}", e);
                None
            }
        }
    } else {
        None
    };

    let file_layer = file_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let config = AppConfig::load(path)?;
    init_logging(&config);
    tracing::info!("已加载配置: {}", path.display());
    Ok(config)
}

fn ensure_storage_dir(config: &AppConfig) -> Result<PathBuf> {
    if !config.home_dir.is_dir() {
        anyhow::bail!("Bitbucket home 目录不存在: {}", config.home_dir.display());
    }
    let storage_dir = config.storage_dir();
    if !storage_dir.is_dir() {
        anyhow::bail!("LFS 存储目录不存在: {}", storage_dir.display());
    }
    Ok(storage_dir)
}

async fn check(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let storage_dir = ensure_storage_dir(&config)?;
    println!("Local storage: {}", storage_dir.display());

    let remote = create_remote_store(&config).context("创建 S3 存储失败")?;
    let hierarchies = scanner::list_remote_hierarchies(remote.as_ref())
        .await
        .context("S3 连接测试失败")?;
    println!(
        "Connected to bucket {} ({} hierarchies)",
        config.bucket,
        hierarchies.len()
    );
    Ok(())
}

async fn migrate(path: &Path, reverse: bool, concurrency: Option<usize>) -> Result<bool> {
    let config = load_config(path)?;
    let storage_dir = ensure_storage_dir(&config)?;

    let direction = if reverse || config.reverse_migration {
        Direction::Download
    } else {
        Direction::Upload
    };
    let max_concurrent_transfers = concurrency.unwrap_or(config.max_concurrent_transfers);
    if max_concurrent_transfers == 0 {
        anyhow::bail!("--concurrency 必须大于 0");
    }

    let remote = create_remote_store(&config).context("创建 S3 存储失败")?;
    let reconciler = TransferReconciler::with_config(
        remote,
        ReconcileConfig {
            max_concurrent_transfers,
        },
    );

    // Ctrl-C 时停止派发新对象，已开始的传输继续完成
    let cancel_flag = reconciler.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("收到中断信号，正在停止...");
            cancel_flag.store(true, Ordering::SeqCst);
        }
    });

    let (tx, mut rx) = mpsc::channel::<ProgressEvent>(16);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ProgressEvent::HierarchyStarted {
                    hierarchy,
                    index,
                    total,
                } => println!("Processing hierarchy {} ({} of {})", hierarchy, index, total),
                ProgressEvent::HierarchyFinished(report) => {
                    println!("Hierarchy {} summary:\n{}", report.hierarchy, report.summary)
                }
            }
        }
    });

    println!("Migrating LFS objects ({}) from {}", direction, storage_dir.display());
    let report = reconciler.run(direction, &storage_dir, Some(tx)).await;
    let _ = printer.await;

    println!("Overall summary:\n{}", report.summary);
    for warning in report.warnings() {
        println!("Warning: {}", warning);
    }
    for error in &report.errors {
        eprintln!("Error: {}", error);
    }

    match report.status {
        RunStatus::Completed => Ok(true),
        RunStatus::Cancelled => {
            eprintln!("Migration cancelled");
            Ok(false)
        }
        RunStatus::Failed => {
            eprintln!("Migration failed");
            Ok(false)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match (cli.command, cli.config) {
        (Some(Command::Check { config }), _) => check(&config).await.map(|_| true),
        (None, Some(config)) => migrate(&config, cli.reverse, cli.concurrency).await,
        (None, None) => Err(anyhow::anyhow!("缺少配置文件路径")),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
