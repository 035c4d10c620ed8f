//! 错误类型
use std::path::PathBuf;

use thiserror::Error;

/// 配置文件加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// 缓冲区编辑错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("edit at {offset}+{length} is outside buffer of length {buffer_length}")]
    OutOfRange { offset: u64, length: u64, buffer_length: u64 },
}
