//! 暂停/恢复屏障
//!
//! 结构性修改（插入/删除）前调用 `pause()`：置位暂停标志并阻塞，直到所有运行中的 worker
//! 都观察到标志、退还未完成的窗口并挂起（running == 0）。修改完成后 `resume()` 唤醒全部 worker。
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

#[derive(Debug, Default)]
struct PauseState {
    paused: bool,
    exit: bool,
    /// 已启动且尚未退出的后台线程数
    spawned: usize,
    /// 正在处理数据（未挂起）的 worker 数，含调用线程上的内联扫描
    running: usize,
    /// 已挂起、等待恢复的 worker 数
    parked: usize,
    /// 每次恢复/退出时递增；挂起的 worker 据此判断是否已被唤醒
    epoch: u64,
}

impl PauseState {
    /// 唤醒挂起者之前先把它们计回 running，避免唤醒间隙被误判为空闲
    fn release_parked(&mut self) {
        self.running += self.parked;
        self.parked = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

#[derive(Debug, Default)]
pub(crate) struct PauseController {
    state: Mutex<PauseState>,
    paused_cv: Condvar,
    resume_cv: Condvar,
    /// 扫描内层循环逐字节轮询的快速标志（paused || exit）
    flag: AtomicBool,
}

impl PauseController {
    fn lock(&self) -> MutexGuard<'_, PauseState> {
        // worker 线程 panic 不应让整个索引失效
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 扫描循环中调用：是否应当立即让出
    #[inline]
    pub(crate) fn should_yield(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub(crate) fn is_exiting(&self) -> bool {
        self.lock().exit
    }

    /// 置位暂停标志并等待全部 worker 挂起
    pub(crate) fn pause(&self) {
        let mut st = self.lock();
        st.paused = true;
        self.flag.store(true, Ordering::Release);
        debug!(running = st.running, "pausing workers");
        while st.running > 0 {
            st = self.paused_cv.wait(st).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// 清除暂停标志并唤醒全部 worker
    pub(crate) fn resume(&self) {
        {
            let mut st = self.lock();
            if st.paused {
                debug!("resuming workers");
            }
            st.paused = false;
            st.release_parked();
            self.flag.store(st.exit, Ordering::Release);
        }
        self.resume_cv.notify_all();
    }

    /// 请求所有 worker 退出（同时解除暂停）
    pub(crate) fn request_exit(&self) {
        {
            let mut st = self.lock();
            st.exit = true;
            st.paused = false;
            st.release_parked();
            self.flag.store(true, Ordering::Release);
        }
        self.resume_cv.notify_all();
    }

    /// 重新允许 worker 运行（`stop` 之后再次 `start`）
    pub(crate) fn clear_exit(&self) {
        let mut st = self.lock();
        st.exit = false;
        self.flag.store(st.paused, Ordering::Release);
    }

    pub(crate) fn spawned(&self) -> usize {
        self.lock().spawned
    }

    pub(crate) fn running(&self) -> usize {
        self.lock().running
    }

    /// 为即将启动的后台线程登记
    pub(crate) fn register_thread(&self) {
        let mut st = self.lock();
        st.spawned += 1;
        st.running += 1;
    }

    /// 登记失败（线程未能启动）时回滚
    pub(crate) fn unregister_thread(&self) {
        let mut st = self.lock();
        st.spawned -= 1;
        st.running -= 1;
        self.paused_cv.notify_all();
    }

    /// 内联扫描开始：计入 running，使 `pause()` 会等待它
    pub(crate) fn enter_inline(&self) {
        self.lock().running += 1;
    }

    pub(crate) fn leave_inline(&self) {
        let mut st = self.lock();
        st.running -= 1;
        self.paused_cv.notify_all();
    }

    /// worker 已退还窗口：挂起直到恢复。返回 false 表示应当退出
    pub(crate) fn park(&self) -> bool {
        let mut st = self.lock();
        if !st.paused || st.exit {
            return !st.exit;
        }
        st.running -= 1;
        st.parked += 1;
        self.paused_cv.notify_all();
        let epoch = st.epoch;
        while st.epoch == epoch {
            st = self.resume_cv.wait(st).unwrap_or_else(|e| e.into_inner());
        }
        !st.exit
    }

    /// 后台线程退出前调用
    pub(crate) fn thread_exited(&self) {
        let mut st = self.lock();
        st.running -= 1;
        st.spawned -= 1;
        self.paused_cv.notify_all();
    }

    /// 等待没有任何 worker 在处理数据；超时返回 false
    pub(crate) fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut st = self.lock();
        while st.running > 0 {
            match deadline {
                None => st = self.paused_cv.wait(st).unwrap_or_else(|e| e.into_inner()),
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return false;
                    }
                    st = self.paused_cv.wait_timeout(st, d - now).unwrap_or_else(|e| e.into_inner()).0;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn pause_without_workers_returns_immediately() {
        let pc = PauseController::default();
        pc.pause();
        assert!(pc.should_yield());
        pc.resume();
        assert!(!pc.should_yield());
    }

    #[test]
    fn pause_waits_for_parked_worker() {
        let pc = Arc::new(PauseController::default());
        pc.register_thread();

        let worker = {
            let pc = Arc::clone(&pc);
            thread::spawn(move || {
                while !pc.should_yield() {
                    thread::yield_now();
                }
                let keep_going = pc.park();
                pc.thread_exited();
                keep_going
            })
        };

        pc.pause();
        assert_eq!(pc.running(), 0);
        pc.resume();
        assert!(worker.join().unwrap());
        assert_eq!(pc.spawned(), 0);
    }

    #[test]
    fn exit_releases_parked_worker() {
        let pc = Arc::new(PauseController::default());
        pc.register_thread();
        pc.pause_flag_for_test();

        let worker = {
            let pc = Arc::clone(&pc);
            thread::spawn(move || {
                let keep_going = pc.park();
                pc.thread_exited();
                keep_going
            })
        };

        pc.pause();
        pc.request_exit();
        assert!(!worker.join().unwrap());
        assert!(pc.is_exiting());
        pc.clear_exit();
        assert!(!pc.should_yield());
    }

    #[test]
    fn wait_idle_times_out_while_running() {
        let pc = PauseController::default();
        pc.enter_inline();
        assert!(!pc.wait_idle(Some(Duration::from_millis(10))));
        pc.leave_inline();
        assert!(pc.wait_idle(Some(Duration::from_millis(10))));
    }

    impl PauseController {
        fn pause_flag_for_test(&self) {
            let mut st = self.lock();
            st.paused = true;
            self.flag.store(true, Ordering::Release);
        }
    }
}
