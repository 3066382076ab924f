pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::AppConfig;
pub use core::{
    Direction, HierarchyReport, ProgressEvent, ReconcileConfig, RunReport, RunStatus,
    TransferReconciler, TransferSummary,
};
pub use error::{MigrationError, Result};
pub use storage::{create_remote_store, LocalStore, RemoteStore};
