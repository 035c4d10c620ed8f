//! 后台扫描线程池
//!
//! - 脏区总量较小时直接在调用线程上扫描一遍（避免每次小修改都启停线程）
//! - 否则按 `ceil(脏区字节数 / 窗口大小)` 启动 worker，上限为 CPU 核数；已启动的线程复用，不缩减
//! - worker 循环：锁脏区取一个窗口 → 解锁读数据并扫描 → 只在合并结果时锁字符串集合，直到脏区为空
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::accessor::IndexAccessor;
use crate::options::IndexOptions;
use crate::pause::PauseController;
use crate::range_set::RangeSet;
use crate::scanner::{scan_window, Window};
use crate::source::DataSource;
use crate::types::{IndexUpdate, Range};

/// 已确认的字符串集合及其随机访问游标（同一把锁保护）
#[derive(Debug, Default)]
pub(crate) struct Strings {
    pub(crate) set: RangeSet,
    pub(crate) accessor: IndexAccessor,
}

/// 索引实例内所有线程共享的状态
pub(crate) struct Shared {
    pub(crate) source: Arc<dyn DataSource>,
    pub(crate) opts: IndexOptions,
    pub(crate) dirty: Mutex<RangeSet>,
    pub(crate) strings: Mutex<Strings>,
    pub(crate) pause: PauseController,
    update_needed: AtomicBool,
    updates_tx: Sender<IndexUpdate>,
    updates_rx: Receiver<IndexUpdate>,
}

impl Shared {
    pub(crate) fn new(source: Arc<dyn DataSource>, mut opts: IndexOptions) -> Self {
        opts.min_string_length = opts.min_string_length.max(1);
        opts.window_size = opts.window_size.max(1);
        // 容量为 1：未被消费的变化信号合并为一条
        let (updates_tx, updates_rx) = crossbeam_channel::bounded(1);
        Self {
            source,
            opts,
            dirty: Mutex::new(RangeSet::new()),
            strings: Mutex::new(Strings::default()),
            pause: PauseController::default(),
            update_needed: AtomicBool::new(false),
            updates_tx,
            updates_rx,
        }
    }

    pub(crate) fn lock_dirty(&self) -> MutexGuard<'_, RangeSet> {
        self.dirty.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn lock_strings(&self) -> MutexGuard<'_, Strings> {
        self.strings.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn updates(&self) -> Receiver<IndexUpdate> {
        self.updates_rx.clone()
    }

    pub(crate) fn take_update(&self) -> bool {
        self.update_needed.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn signal_update(&self) {
        self.update_needed.store(true, Ordering::Release);
        let _ = self.updates_tx.try_send(IndexUpdate);
    }

    /// 读取数据；读失败按“该区域无数据”处理
    pub(crate) fn read(&self, offset: u64, length: u64) -> Vec<u8> {
        match self.source.read_data(offset, length) {
            Ok(data) => data,
            Err(e) => {
                warn!(offset, length, error = %e, "read_data failed, treating as empty");
                Vec::new()
            }
        }
    }

    fn merge_matches(&self, matches: &[Range]) {
        if matches.is_empty() {
            return;
        }
        {
            let mut strings = self.lock_strings();
            for m in matches {
                strings.set.set_range(m.offset, m.length);
            }
            strings.accessor.invalidate();
        }
        self.signal_update();
    }
}

pub(crate) struct WorkerPool {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicUsize,
}

impl WorkerPool {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared, threads: Mutex::new(Vec::new()), next_id: AtomicUsize::new(0) }
    }

    /// 解除暂停并按脏区大小决定内联扫描或启动后台线程
    pub(crate) fn start(&self) {
        let shared = &self.shared;
        shared.pause.resume();

        let dirty_total = shared.lock_dirty().total_length();
        if dirty_total == 0 {
            return;
        }

        shared.pause.clear_exit();

        if dirty_total <= shared.opts.inline_threshold {
            trace!(dirty_total, "scanning inline");
            self.run_inline();
            return;
        }

        let max_threads = shared.opts.max_threads();
        let want = dirty_total.div_ceil(shared.opts.window_size).clamp(1, max_threads as u64) as usize;

        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        threads.retain(|h| !h.is_finished());

        while shared.pause.spawned() < want {
            shared.pause.register_thread();
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let worker_shared = Arc::clone(shared);
            let spawned = thread::Builder::new().name(format!("strindex-worker-{id}")).spawn(move || {
                debug!(id, "worker started");
                let _exit = ThreadExit(&worker_shared.pause);
                worker_main(&worker_shared);
                debug!(id, "worker exited");
            });
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    shared.pause.unregister_thread();
                    warn!(error = %e, "failed to spawn worker thread");
                    break;
                }
            }
        }

        if shared.pause.spawned() == 0 {
            drop(threads);
            self.run_inline();
        }
    }

    /// 通知退出、唤醒挂起的 worker 并等待全部线程结束；未启动过线程时为空操作
    pub(crate) fn stop(&self) {
        self.shared.pause.request_exit();
        let handles: Vec<_> = std::mem::take(&mut *self.threads.lock().unwrap_or_else(|e| e.into_inner()));
        for h in handles {
            if h.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }

    fn run_inline(&self) {
        self.shared.pause.enter_inline();
        let _inline = InlineExit(&self.shared.pause);
        worker_main(&self.shared);
    }
}

/// 后台线程退出（含 panic 展开）时注销计数
struct ThreadExit<'a>(&'a PauseController);

impl Drop for ThreadExit<'_> {
    fn drop(&mut self) {
        self.0.thread_exited();
    }
}

/// 内联扫描结束（含 panic 展开）时注销计数
struct InlineExit<'a>(&'a PauseController);

impl Drop for InlineExit<'_> {
    fn drop(&mut self) {
        self.0.leave_inline();
    }
}

/// 单个 worker 的主循环；返回时脏区已空或收到退出请求
fn worker_main(shared: &Shared) {
    let min_len = shared.opts.min_string_length;

    loop {
        if shared.pause.should_yield() {
            if shared.pause.is_exiting() || !shared.pause.park() {
                break;
            }
            continue;
        }

        let range = match shared.lock_dirty().take_front(shared.opts.window_size) {
            Some(r) => r,
            None => break,
        };

        let window = Window::padded(range, min_len);
        let data = shared.read(window.read_base, window.read_length);
        let outcome = scan_window(&window, &data, min_len, || shared.pause.should_yield());

        shared.merge_matches(&outcome.matches);

        // 窗口可能因插入/删除而失效：退还未处理部分，下一轮从脏区重新取
        if let Some(rem) = outcome.remainder {
            trace!(offset = rem.offset, length = rem.length, "returning unscanned remainder");
            shared.lock_dirty().set_range(rem.offset, rem.length);
        }
    }
}
