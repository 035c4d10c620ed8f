//! 字节级可打印串扫描（可在字节边界中断）
use crate::types::Range;

/// 最短字符串长度（默认值，可由 `IndexOptions` 覆盖）
pub const MIN_STRING_LENGTH: usize = 4;

/// 单个扫描窗口：从脏区取出的 `[base, base + length)`，两端各外扩 `pad` 字节读取
/// （低端在缓冲区起点处截断），保证跨窗口边界的字符串至少被相邻窗口之一完整覆盖。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub base: u64,
    pub length: u64,
    pub read_base: u64,
    pub read_length: u64,
}

impl Window {
    pub fn padded(range: Range, pad: usize) -> Self {
        let pad = pad as u64;
        let pre = range.offset.min(pad);
        Self {
            base: range.offset,
            length: range.length,
            read_base: range.offset - pre,
            read_length: range.length + pre + pad,
        }
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.base + self.length
    }
}

/// 一次窗口扫描的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// 已确认的匹配（按 offset 升序）
    pub matches: Vec<Range>,
    /// 被暂停打断时尚未确认的窗口剩余部分，需要重新标记为脏
    pub remainder: Option<Range>,
    /// 是否因暂停请求而提前结束
    pub interrupted: bool,
}

/// 7 位可打印 ASCII（0x20..=0x7E）
#[inline]
pub fn is_printable(b: u8) -> bool {
    b.is_ascii() && (b.is_ascii_graphic() || b == b' ')
}

/// 扫描 `data`（即 `window` 的读取区间，允许短读）中长度不小于 `min_len` 的可打印串。
///
/// `should_pause` 在延伸每个字节前都会被调用；一旦返回 true，立即停止并把
/// 当前串起点（不早于 `window.base`）到窗口末尾的部分作为 remainder 返回。
pub fn scan_window<F>(window: &Window, data: &[u8], min_len: usize, mut should_pause: F) -> ScanOutcome
where
    F: FnMut() -> bool,
{
    let mut out = ScanOutcome::default();
    let mut i = 0usize;

    while i < data.len() {
        let run_start = i;

        loop {
            if should_pause() {
                out.interrupted = true;
                out.remainder = remainder_from(window, window.read_base + run_start as u64);
                return out;
            }
            if i < data.len() && is_printable(data[i]) {
                i += 1;
            } else {
                break;
            }
        }

        let run_len = i - run_start;
        if run_len >= min_len {
            out.matches.push(Range::new(window.read_base + run_start as u64, run_len as u64));
        }

        // 跳过终止该串的不可打印字节
        i += 1;
    }

    out
}

fn remainder_from(window: &Window, stopped_at: u64) -> Option<Range> {
    let from = stopped_at.max(window.base);
    let end = window.end();
    if from < end {
        Some(Range::new(from, end - from))
    } else {
        None
    }
}
