//! 结果导出（流式 JSON 数组）
use std::io::{self, Write};

use crate::index::StringIndex;
use crate::types::OutputItem;

/// 将当前索引中的全部字符串以 JSON 数组流式写入 `out`，返回写出的条目数。
/// 顺序：按 offset 升序；文本按有损 UTF-8 输出（只含 7 位可打印字符时无损）。
pub fn write_json(index: &StringIndex, out: &mut dyn Write) -> io::Result<usize> {
    // 先取快照，读文本时不持有字符串集合的锁
    let ranges = index.snapshot();

    write!(out, "[")?;
    let mut first = true;
    for r in &ranges {
        let text = index.text_of(r.offset, r.length);
        if !first { write!(out, ",")?; } else { first = false; }
        let item = OutputItem { offset: r.offset, length: r.length, text: &text };
        serde_json::to_writer(&mut *out, &item).map_err(io::Error::from)?;
    }
    write!(out, "]")?;
    Ok(ranges.len())
}
