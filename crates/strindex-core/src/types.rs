//! 公共类型（对外暴露）
use serde::Serialize;

/// 半开字节区间 `[offset, offset + length)`，length 恒大于 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Range {
    pub offset: u64,
    pub length: u64,
}

impl Range {
    pub fn new(offset: u64, length: u64) -> Self {
        assert!(length > 0, "Range length must be positive");
        Self { offset, length }
    }

    /// 区间结束位置（不含）
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    #[inline]
    pub fn contains(&self, pos: u64) -> bool {
        self.offset <= pos && pos < self.end()
    }
}

/// 输出项结构（导出 JSON 数组的单个元素）
#[derive(Debug, Clone, Serialize)]
pub struct OutputItem<'a> {
    pub offset: u64,
    pub length: u64,
    pub text: &'a str,
}

/// 索引变化信号（推送通道中的消息）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexUpdate;
