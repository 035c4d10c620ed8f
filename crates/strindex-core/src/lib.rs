//! 可打印串增量索引（核心库）
//!
//! 设计要点：
//! - 两个独立加锁的区间集合：dirty（待重新扫描的区域）与 strings（已确认的可打印串）。
//! - 后台 worker 从 dirty 中按窗口取数、无锁读取字节并扫描，结果合并进 strings。
//! - 插入/删除前暂停全部 worker（已扫描到的结果保留，未处理部分退还 dirty），修改完成后对两个集合做相同的偏移变换再恢复。
//! - 消费方只通过 `count`/`nth`/`text_of` 等窄接口访问结果，可能看到尚未扫描完成的部分索引。

mod accessor;
mod config;
mod error;
mod export;
mod index;
mod options;
mod pause;
mod pool;
mod range_set;
mod scanner;
mod source;
mod types;

// 对外暴露
pub use accessor::IndexAccessor;
pub use config::load_options;
pub use error::{BufferError, ConfigError};
pub use export::write_json;
pub use index::{EditPhase, StringIndex};
pub use options::{IndexOptions, IndexStats, INLINE_THRESHOLD, WINDOW_SIZE};
pub use range_set::RangeSet;
pub use scanner::{is_printable, scan_window, ScanOutcome, Window, MIN_STRING_LENGTH};
pub use source::{DataSource, EditEvent, EditObserver, MemoryBuffer};
pub use types::{IndexUpdate, OutputItem, Range};
