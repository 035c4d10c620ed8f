//! 可打印串增量索引
//!
//! 编辑通知状态机：Idle → Modifying →（Aborted | Committed）
//! - Modifying（erasing/inserting）：暂停全部 worker
//! - Aborted：缓冲区未变，直接恢复扫描
//! - Committed：对字符串集合与脏区做同样的偏移变换，重新校验编辑点附近的字符串后恢复扫描
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::{debug, warn};

use crate::options::{IndexOptions, IndexStats};
use crate::pool::{Shared, WorkerPool};
use crate::source::{DataSource, EditEvent, EditObserver, MemoryBuffer};
use crate::types::{IndexUpdate, Range};

/// 编辑通知所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPhase {
    Idle,
    Modifying,
}

pub struct StringIndex {
    shared: Arc<Shared>,
    pool: WorkerPool,
    phase: Mutex<EditPhase>,
}

impl StringIndex {
    /// 建立索引：整个缓冲区标记为脏并立即开始扫描
    pub fn new(source: Arc<dyn DataSource>, opts: IndexOptions) -> Self {
        let shared = Arc::new(Shared::new(source, opts));
        {
            let len = shared.source.buffer_length();
            shared.lock_dirty().set_range(0, len);
        }
        let pool = WorkerPool::new(Arc::clone(&shared));
        let index = Self { shared, pool, phase: Mutex::new(EditPhase::Idle) };
        index.pool.start();
        index
    }

    /// 为内存缓冲区建立索引并订阅其编辑通知
    pub fn attach(buffer: &Arc<MemoryBuffer>, opts: IndexOptions) -> Arc<Self> {
        let index = Arc::new(Self::new(Arc::clone(buffer) as Arc<dyn DataSource>, opts));
        let observer: Arc<dyn EditObserver> = index.clone();
        buffer.subscribe(Arc::downgrade(&observer));
        index
    }

    pub fn options(&self) -> &IndexOptions {
        &self.shared.opts
    }

    pub fn phase(&self) -> EditPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 恢复扫描（若有脏区）
    pub fn start(&self) {
        self.pool.start();
    }

    /// 终止全部 worker 并等待其退出
    pub fn stop(&self) {
        self.pool.stop();
    }

    /// 阻塞直到所有 worker 让出，此后可以安全地修改缓冲区
    pub fn pause(&self) {
        self.shared.pause.pause();
    }

    pub fn resume(&self) {
        self.shared.pause.resume();
    }

    /// 处理一条编辑通知
    pub fn handle(&self, event: &EditEvent) {
        match *event {
            EditEvent::Erasing { .. } | EditEvent::Inserting { .. } => {
                self.set_phase(EditPhase::Modifying);
                self.pause();
            }
            EditEvent::EraseAborted { .. } | EditEvent::InsertAborted { .. } => {
                self.set_phase(EditPhase::Idle);
                self.start();
            }
            EditEvent::Erased { offset, length } => {
                self.expect_modifying(event);
                self.pause();
                {
                    let mut strings = self.shared.lock_strings();
                    strings.set.data_erased(offset, length);
                    strings.accessor.invalidate();
                }
                self.shared.lock_dirty().data_erased(offset, length);

                // 删除点两侧的短串可能拼接成新串：删除点前后各一字节重新扫描
                let len = self.shared.source.buffer_length();
                let lo = offset.saturating_sub(1);
                let hi = offset.saturating_add(1).min(len);
                self.revalidate(offset, offset);
                if hi > lo {
                    self.shared.lock_dirty().set_range(lo, hi - lo);
                }
                self.commit();
            }
            EditEvent::Inserted { offset, length } => {
                self.expect_modifying(event);
                self.pause();
                {
                    let mut strings = self.shared.lock_strings();
                    strings.set.data_inserted(offset, length);
                    strings.accessor.invalidate();
                }
                {
                    let mut dirty = self.shared.lock_dirty();
                    dirty.data_inserted(offset, length);
                    dirty.set_range(offset, length);
                }
                self.revalidate(offset, offset + length);
                self.commit();
            }
            EditEvent::Overwritten { offset, length } => {
                // 覆盖没有预通知：先让 worker 让出，再清除可能已失效的结果
                self.pause();
                self.shared.lock_dirty().set_range(offset, length);
                self.revalidate(offset, offset + length);
                self.commit();
            }
        }
    }

    /// 已确认字符串数量
    pub fn count(&self) -> usize {
        self.shared.lock_strings().set.len()
    }

    /// 第 n 个字符串（按 offset 升序）；越界 panic
    pub fn nth(&self, n: usize) -> Range {
        let mut guard = self.shared.lock_strings();
        let strings = &mut *guard;
        strings.accessor.nth(&strings.set, n)
    }

    /// 与 `nth` 相同，越界返回 None（计数可能已被 worker 改变）
    pub fn get(&self, n: usize) -> Option<Range> {
        let mut guard = self.shared.lock_strings();
        let strings = &mut *guard;
        strings.accessor.get(&strings.set, n)
    }

    /// 读取区间文本（有损转换为 UTF-8）
    pub fn text_of(&self, offset: u64, length: u64) -> String {
        let data = self.shared.read(offset, length);
        String::from_utf8_lossy(&data).into_owned()
    }

    /// 当前字符串集合的拷贝
    pub fn snapshot(&self) -> Vec<Range> {
        self.shared.lock_strings().set.to_vec()
    }

    pub fn dirty_ranges(&self) -> Vec<Range> {
        self.shared.lock_dirty().to_vec()
    }

    /// 轮询：自上次调用以来索引是否有变化
    pub fn take_update(&self) -> bool {
        self.shared.take_update()
    }

    /// 推送：索引变化时收到一条 `IndexUpdate`（未消费的信号会合并）
    pub fn updates(&self) -> Receiver<IndexUpdate> {
        self.shared.updates()
    }

    /// 等待所有 worker 完成或挂起
    pub fn wait_idle(&self) {
        self.shared.pause.wait_idle(None);
    }

    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        self.shared.pause.wait_idle(Some(timeout))
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            strings: self.count(),
            dirty_bytes: self.shared.lock_dirty().total_length(),
            spawned_workers: self.shared.pause.spawned(),
            running_workers: self.shared.pause.running(),
        }
    }

    fn set_phase(&self, phase: EditPhase) {
        let mut p = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        debug!(from = ?*p, to = ?phase, "edit phase");
        *p = phase;
    }

    fn expect_modifying(&self, event: &EditEvent) {
        if self.phase() != EditPhase::Modifying {
            warn!(?event, "commit without a preceding modify notification");
        }
    }

    /// 移除与 `[lo, hi)` 相交或相邻的字符串并把它们连同该区间一起标记为脏
    fn revalidate(&self, lo: u64, hi: u64) {
        let stale = {
            let mut strings = self.shared.lock_strings();
            let stale = strings.set.touching(lo, hi);
            for r in &stale {
                strings.set.clear_range(r.offset, r.length);
            }
            strings.accessor.invalidate();
            stale
        };

        let mut dirty = self.shared.lock_dirty();
        for r in &stale {
            dirty.set_range(r.offset, r.length);
        }
        if hi > lo {
            dirty.set_range(lo, hi - lo);
        }
    }

    fn commit(&self) {
        self.set_phase(EditPhase::Idle);
        self.shared.signal_update();
        self.start();
    }
}

impl EditObserver for StringIndex {
    fn on_edit(&self, event: &EditEvent) {
        self.handle(event);
    }
}

impl Drop for StringIndex {
    fn drop(&mut self) {
        self.pool.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_opts() -> IndexOptions {
        IndexOptions { threads: Some(2), ..IndexOptions::default() }
    }

    fn texts(index: &StringIndex) -> Vec<String> {
        index.snapshot().iter().map(|r| index.text_of(r.offset, r.length)).collect()
    }

    #[test]
    fn scans_initial_buffer_inline() {
        let buf = Arc::new(MemoryBuffer::new(b"\x00hello\x00\x01world!\x02ab".to_vec()));
        let index = StringIndex::attach(&buf, small_opts());
        index.wait_idle();
        assert_eq!(index.snapshot(), vec![Range::new(1, 5), Range::new(8, 6)]);
        assert_eq!(texts(&index), vec!["hello", "world!"]);
        assert!(index.take_update());
        assert!(!index.take_update());
    }

    #[test]
    fn empty_buffer_has_no_strings() {
        let buf = Arc::new(MemoryBuffer::default());
        let index = StringIndex::attach(&buf, small_opts());
        index.wait_idle();
        assert_eq!(index.count(), 0);
        assert_eq!(index.stats(), IndexStats::default());
    }

    #[test]
    fn overwrite_invalidates_stale_string() {
        let buf = Arc::new(MemoryBuffer::new(b"\x00ABCDEFGH\x00".to_vec()));
        let index = StringIndex::attach(&buf, small_opts());
        index.wait_idle();
        assert_eq!(index.snapshot(), vec![Range::new(1, 8)]);

        buf.overwrite(4, b"\x00").unwrap();
        index.wait_idle();
        assert_eq!(texts(&index), vec!["EFGH"]);
    }

    #[test]
    fn insert_splitting_a_string_drops_short_halves() {
        let buf = Arc::new(MemoryBuffer::new(b"ABCDEF".to_vec()));
        let index = StringIndex::attach(&buf, small_opts());
        index.wait_idle();
        assert_eq!(index.count(), 1);

        buf.insert(3, b"\x00").unwrap();
        index.wait_idle();
        assert_eq!(index.count(), 0);
        assert_eq!(index.phase(), EditPhase::Idle);

        buf.insert(3, b"xyz").unwrap();
        index.wait_idle();
        assert_eq!(texts(&index), vec!["ABCxyz"]);
    }

    #[test]
    fn erase_joins_short_runs() {
        let buf = Arc::new(MemoryBuffer::new(b"\x00AB\x01CD\x00".to_vec()));
        let index = StringIndex::attach(&buf, small_opts());
        index.wait_idle();
        assert_eq!(index.count(), 0);

        buf.erase(3, 1).unwrap();
        index.wait_idle();
        assert_eq!(index.snapshot(), vec![Range::new(1, 4)]);
        assert_eq!(index.text_of(1, 4), "ABCD");
    }

    #[test]
    fn aborted_edit_leaves_index_unchanged() {
        let buf = Arc::new(MemoryBuffer::new(b"some text".to_vec()));
        let index = StringIndex::attach(&buf, small_opts());
        index.wait_idle();
        let before = index.snapshot();

        assert!(buf.erase(5, 100).is_err());
        assert!(buf.insert(100, b"zz").is_err());
        index.wait_idle();
        assert_eq!(index.snapshot(), before);
        assert_eq!(index.phase(), EditPhase::Idle);
        assert!(index.dirty_ranges().is_empty());
    }

    #[test]
    fn stop_without_work_is_a_no_op() {
        let buf = Arc::new(MemoryBuffer::default());
        let index = StringIndex::attach(&buf, small_opts());
        index.stop();
        index.stop();
    }

    #[test]
    fn updates_channel_coalesces() {
        let buf = Arc::new(MemoryBuffer::new(b"alpha\x00beta\x00gamma".to_vec()));
        let index = StringIndex::attach(&buf, small_opts());
        let rx = index.updates();
        index.wait_idle();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
