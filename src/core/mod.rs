pub mod engine;
pub mod layout;
pub mod oid;
pub mod scanner;
pub mod summary;

pub use engine::{
    Direction, HierarchyReport, ProgressEvent, ReconcileConfig, RunReport, RunStatus,
    TransferReconciler,
};
pub use oid::{HierarchyId, Oid};
pub use summary::{TransferOutcome, TransferSummary};
