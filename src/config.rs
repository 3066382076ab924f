//! 应用配置模块
//!
//! 支持 JSON 配置文件，也支持 `key=value` 形式的 `.properties` 文件。
//! 两种格式使用同一套 key，例如 `bitbucket.home`、`s3.bucket`。

use crate::core::layout::LFS_STORAGE_DIR;
use crate::logging::LogConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// 迁移配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bitbucket home 目录
    #[serde(rename = "bitbucket.home")]
    pub home_dir: PathBuf,
    #[serde(rename = "s3.bucket")]
    pub bucket: String,
    #[serde(rename = "s3.region")]
    pub region: String,
    #[serde(rename = "s3.access-key", default, skip_serializing)]
    pub access_key: Option<String>,
    #[serde(rename = "s3.secret-key", default, skip_serializing)]
    pub secret_key: Option<String>,
    #[serde(
        rename = "s3.endpoint-override",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub endpoint_override: Option<String>,
    /// 为 true 时从 S3 迁移回本地
    #[serde(
        rename = "reverse-migration",
        default,
        deserialize_with = "lenient_bool"
    )]
    pub reverse_migration: bool,
    /// 同一层级内的最大并发对象数
    #[serde(
        rename = "max-concurrent-transfers",
        default = "default_max_concurrent_transfers",
        deserialize_with = "lenient_usize"
    )]
    pub max_concurrent_transfers: usize,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_max_concurrent_transfers() -> usize {
    1
}

impl AppConfig {
    /// 从配置文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;

        let is_properties = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("properties"))
            .unwrap_or(false);

        let value = if is_properties {
            parse_properties(&content)
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("配置文件不是合法的 JSON: {}", path.display()))?
        };

        let config: AppConfig = serde_json::from_value(value)
            .with_context(|| format!("配置文件内容无效: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.home_dir.as_os_str().is_empty() {
            anyhow::bail!("缺少配置项: bitbucket.home");
        }
        if self.bucket.trim().is_empty() {
            anyhow::bail!("缺少配置项: s3.bucket");
        }
        if self.region.trim().is_empty() {
            anyhow::bail!("缺少配置项: s3.region");
        }
        if self.max_concurrent_transfers == 0 {
            anyhow::bail!("max-concurrent-transfers 必须大于 0");
        }
        Ok(())
    }

    /// LFS 对象存储目录
    pub fn storage_dir(&self) -> PathBuf {
        self.home_dir.join(LFS_STORAGE_DIR)
    }
}

/// 解析 `.properties` 内容
///
/// `log.` 开头的 key 放入 `log` 子对象，其余 key 原样保留，值一律为字符串。
fn parse_properties(content: &str) -> Value {
    let mut root = Map::new();
    let mut log = Map::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let Some(idx) = line.find(['=', ':']) else {
            continue;
        };
        let key = line[..idx].trim();
        let value = Value::String(line[idx + 1..].trim().to_string());

        match key.strip_prefix("log.") {
            Some(log_key) => {
                log.insert(log_key.to_string(), value);
            }
            None => {
                root.insert(key.to_string(), value);
            }
        }
    }

    if !log.is_empty() {
        root.insert("log".to_string(), Value::Object(log));
    }
    Value::Object(root)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    String(String),
}

/// 接受 `true` 或 `"true"`
pub(crate) fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!("无效的布尔值: {}", other))),
        },
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

/// 接受 `4` 或 `"4"`
pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("无效的数字: {}", s))),
    }
}

fn lenient_usize<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let n = lenient_u64(deserializer)?;
    usize::try_from(n).map_err(|_| serde::de::Error::custom(format!("数字过大: {}", n)))
}
