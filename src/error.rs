//! 迁移错误类型

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, MigrationError>;

/// 迁移过程中的错误
///
/// 只有枚举类错误（`RemoteListing`，以及无法读取目录的 `LocalIo`）会中止整次运行，
/// 其余错误都只影响单个对象。
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("无效的对象标识: {value}")]
    MalformedIdentifier { value: String },

    #[error("无效的对象路径: {}", path.display())]
    MalformedPath { path: PathBuf },

    #[error("列出远程对象失败 (prefix={prefix}): {message}")]
    RemoteListing { prefix: String, message: String },

    #[error("远程传输失败 ({key}): {message}")]
    RemoteTransfer { key: String, message: String },

    #[error("校验和不匹配: 期望 {expected}, 实际 {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("本地 I/O 错误 ({}): {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrationError {
    pub fn malformed_identifier(value: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            value: value.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }

    pub fn listing(prefix: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::RemoteListing {
            prefix: prefix.into(),
            message: err.to_string(),
        }
    }

    pub fn transfer(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::RemoteTransfer {
            key: key.into(),
            message: err.to_string(),
        }
    }
}
