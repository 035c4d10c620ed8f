//! 有序集合的第 n 个元素访问（带位置缓存）
//!
//! 缓存上一次访问的 (序号, offset)，顺序访问时只需从缓存位置前后移动 delta 步。
//! 缓存记录集合的 `generation`，集合一旦被修改即视为失效，从起点、缓存位置、终点中最近的一处重新遍历。
use crate::range_set::RangeSet;
use crate::types::Range;

#[derive(Debug, Clone, Copy)]
struct Cached {
    generation: u64,
    index: usize,
    offset: u64,
}

#[derive(Debug, Clone, Default)]
pub struct IndexAccessor {
    cached: Option<Cached>,
}

impl IndexAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// 返回 `set` 中第 `n` 个区间；`n >= set.len()` 属于调用方错误，直接 panic
    pub fn nth(&mut self, set: &RangeSet, n: usize) -> Range {
        let count = set.len();
        assert!(n < count, "nth({n}) out of range (count {count})");

        let cached = self.cached.filter(|c| c.generation == set.generation());
        let from_start = n;
        let from_end = count - 1 - n;

        let found = match cached {
            Some(c) if c.index.abs_diff(n) <= from_start.min(from_end) => {
                if n >= c.index {
                    set.iter_from(c.offset).nth(n - c.index)
                } else {
                    set.iter_back_from(c.offset).nth(c.index - n)
                }
            }
            _ if from_start <= from_end => set.iter().nth(from_start),
            _ => set.iter().rev().nth(from_end),
        };
        let range = found.expect("RangeSet yielded fewer ranges than len()");

        self.cached = Some(Cached { generation: set.generation(), index: n, offset: range.offset });
        range
    }

    /// 与 `nth` 相同，但越界时返回 None（消费方可能看到尚未刷新的计数）
    pub fn get(&mut self, set: &RangeSet, n: usize) -> Option<Range> {
        if n < set.len() {
            Some(self.nth(set, n))
        } else {
            None
        }
    }
}
