//! 索引选项与统计信息（模块）
use serde::Deserialize;

use crate::scanner::MIN_STRING_LENGTH;

/// 单个扫描窗口的最大字节数
pub const WINDOW_SIZE: u64 = 2 * 1024 * 1024; // 2 MiB
/// 脏区总量不超过该值时直接在调用线程上扫描，避免频繁启停后台线程
pub const INLINE_THRESHOLD: u64 = 256 * 1024; // 256 KiB

/// 索引选项（可由 TOML 配置文件覆盖，缺省字段取默认值）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// 最短字符串长度
    pub min_string_length: usize,
    /// 单个窗口最大字节数
    pub window_size: u64,
    /// 内联扫描阈值（字节）
    pub inline_threshold: u64,
    /// 最大线程数：None 表示自动（等于 CPU 核数）
    pub threads: Option<usize>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            min_string_length: MIN_STRING_LENGTH,
            window_size: WINDOW_SIZE,
            inline_threshold: INLINE_THRESHOLD,
            threads: None,
        }
    }
}

impl IndexOptions {
    /// 实际可用的最大 worker 数
    pub fn max_threads(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// 索引统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub strings: usize,
    pub dirty_bytes: u64,
    pub spawned_workers: usize,
    pub running_workers: usize,
}
