//! 有序区间集合（脏区跟踪与字符串索引共用）
//!
//! 不变量：区间按 offset 升序、两两不重叠且不相邻（重叠或首尾相接的区间在写入时立即合并）。
//! 每个修改操作返回前都会恢复该不变量，并递增 `generation`，供随机访问游标判断缓存是否失效。
//! 类型本身不加锁，由调用方串行化访问。
use std::collections::BTreeMap;

use crate::types::Range;

#[derive(Debug, Clone, Default)]
pub struct RangeSet {
    /// offset -> length
    ranges: BTreeMap<u64, u64>,
    generation: u64,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// 修改计数；任何修改操作都会使其递增
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Range> + '_ {
        self.ranges.iter().map(|(&offset, &length)| Range { offset, length })
    }

    /// 从起点为 `offset` 的区间（含）开始正向遍历
    pub(crate) fn iter_from(&self, offset: u64) -> impl Iterator<Item = Range> + '_ {
        self.ranges.range(offset..).map(|(&offset, &length)| Range { offset, length })
    }

    /// 从起点为 `offset` 的区间（含）开始反向遍历
    pub(crate) fn iter_back_from(&self, offset: u64) -> impl Iterator<Item = Range> + '_ {
        self.ranges.range(..=offset).rev().map(|(&offset, &length)| Range { offset, length })
    }

    pub fn first(&self) -> Option<Range> {
        self.ranges.first_key_value().map(|(&offset, &length)| Range { offset, length })
    }

    pub fn to_vec(&self) -> Vec<Range> {
        self.iter().collect()
    }

    /// 所有区间的字节总数
    pub fn total_length(&self) -> u64 {
        self.ranges.values().sum()
    }

    /// 与 `[lo, hi)` 相交或相邻的全部区间（lo == hi 时即包含或紧贴该点的区间）
    pub fn touching(&self, lo: u64, hi: u64) -> Vec<Range> {
        let mut out: Vec<Range> = self
            .ranges
            .range(..=hi)
            .rev()
            .map(|(&offset, &length)| Range { offset, length })
            .take_while(|r| r.end() >= lo)
            .collect();
        out.reverse();
        out
    }

    /// 并入 `[offset, offset + length)`，与重叠/相邻区间合并
    pub fn set_range(&mut self, offset: u64, length: u64) {
        if length == 0 {
            return;
        }

        let mut start = offset;
        let mut end = offset + length;

        let prev = self.ranges.range(..=offset).next_back().map(|(&s, &l)| (s, l));
        if let Some((s, l)) = prev {
            if s + l >= offset {
                start = s;
                end = end.max(s + l);
                self.ranges.remove(&s);
            }
        }

        // 吞并起点落在 [start, end] 内的后续区间
        while let Some((s, l)) = self.ranges.range(start..=end).next().map(|(&s, &l)| (s, l)) {
            self.ranges.remove(&s);
            end = end.max(s + l);
        }

        self.ranges.insert(start, end - start);
        self.touch();
    }

    /// 移除 `[offset, offset + length)`，部分重叠的区间被截断或拆分
    pub fn clear_range(&mut self, offset: u64, length: u64) {
        if length == 0 {
            return;
        }

        let end = offset + length;

        let prev = self.ranges.range(..offset).next_back().map(|(&s, &l)| (s, l));
        if let Some((s, l)) = prev {
            let e = s + l;
            if e > offset {
                self.ranges.insert(s, offset - s);
                if e > end {
                    self.ranges.insert(end, e - end);
                }
            }
        }

        let inner: Vec<(u64, u64)> = self.ranges.range(offset..end).map(|(&s, &l)| (s, l)).collect();
        for (s, l) in inner {
            self.ranges.remove(&s);
            let e = s + l;
            if e > end {
                self.ranges.insert(end, e - end);
            }
        }

        self.touch();
    }

    /// 取出首个区间的前 `max` 个字节（并从集合中移除）
    pub fn take_front(&mut self, max: u64) -> Option<Range> {
        let first = self.first()?;
        let length = first.length.min(max);
        if length == 0 {
            return None;
        }
        self.clear_range(first.offset, length);
        Some(Range { offset: first.offset, length })
    }

    /// 缓冲区删除了 `[offset, offset + length)`：去掉被删字节，其后的区间整体左移
    pub fn data_erased(&mut self, offset: u64, length: u64) {
        if length == 0 {
            return;
        }

        self.clear_range(offset, length);

        let end = offset + length;
        let tail = self.ranges.split_off(&end);
        for (s, l) in tail {
            self.ranges.insert(s - length, l);
        }

        // 删除点两侧的区间可能首尾相接
        let joined = self.ranges.get(&offset).copied();
        let prev = self.ranges.range(..offset).next_back().map(|(&s, &l)| (s, l));
        if let (Some(l), Some((ps, pl))) = (joined, prev) {
            if ps + pl == offset {
                self.ranges.remove(&offset);
                self.ranges.insert(ps, pl + l);
            }
        }

        self.touch();
    }

    /// 缓冲区在 `offset` 处插入了 `length` 字节：起点不小于 `offset` 的区间右移，跨越插入点的区间被拆分。
    ///
    /// 插入点恰好等于某区间起点时，新字节位于该区间之前，不并入该区间。
    pub fn data_inserted(&mut self, offset: u64, length: u64) {
        if length == 0 {
            return;
        }

        let mut tail = self.ranges.split_off(&offset);

        let prev = self.ranges.last_key_value().map(|(&s, &l)| (s, l));
        if let Some((s, l)) = prev {
            if s + l > offset {
                self.ranges.insert(s, offset - s);
                tail.insert(offset, s + l - offset);
            }
        }

        for (s, l) in tail {
            self.ranges.insert(s + length, l);
        }

        self.touch();
    }

    /// 检查有序、不重叠、不相邻且长度为正
    pub fn is_normalized(&self) -> bool {
        let mut prev_end: Option<u64> = None;
        for r in self.iter() {
            if r.length == 0 {
                return false;
            }
            if let Some(pe) = prev_end {
                if pe >= r.offset {
                    return false;
                }
            }
            prev_end = Some(r.end());
        }
        true
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        debug_assert!(self.is_normalized(), "RangeSet invariant broken: {:?}", self.ranges);
    }
}
