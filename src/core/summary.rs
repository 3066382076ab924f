//! 传输结果统计

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// 单个对象的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    /// 已传输
    Transferred,
    /// 目标端已存在，跳过
    SkippedExists,
    /// 传输失败
    Failed,
}

/// 传输统计
///
/// 值对象：每个层级各自统计，最后通过 [`TransferSummary::merge`] 合并，
/// 合并顺序不影响结果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSummary {
    pub successful: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl TransferSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个对象的结果，恰好增加一个计数
    pub fn record(&mut self, outcome: TransferOutcome) {
        match outcome {
            TransferOutcome::Transferred => self.successful += 1,
            TransferOutcome::SkippedExists => self.skipped += 1,
            TransferOutcome::Failed => self.failed += 1,
        }
    }

    /// 逐项相加
    pub fn merge(self, other: Self) -> Self {
        Self {
            successful: self.successful + other.successful,
            skipped: self.skipped + other.skipped,
            failed: self.failed + other.failed,
        }
    }

    pub fn total(&self) -> u64 {
        self.successful + self.skipped + self.failed
    }
}

impl Add for TransferSummary {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.merge(rhs)
    }
}

impl AddAssign for TransferSummary {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.merge(rhs);
    }
}

impl Sum for TransferSummary {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::new(), Self::merge)
    }
}

impl FromIterator<TransferOutcome> for TransferSummary {
    fn from_iter<I: IntoIterator<Item = TransferOutcome>>(iter: I) -> Self {
        let mut summary = Self::new();
        for outcome in iter {
            summary.record(outcome);
        }
        summary
    }
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- Successful: {}", self.successful)?;
        writeln!(f, "- Skipped (already exists): {}", self.skipped)?;
        write!(f, "- Failed: {}", self.failed)
    }
}
