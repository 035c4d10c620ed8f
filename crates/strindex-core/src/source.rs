//! 外部数据源与编辑通知
//!
//! 索引只通过 `DataSource` 读取字节，通过 `EditEvent` 获知修改。`MemoryBuffer` 是一个
//! 内存实现：修改前后向观察者发送通知，预通知（erasing/inserting）发送时不持有缓冲区锁。
use std::io;
use std::sync::{Mutex, MutexGuard, RwLock, Weak};

use tracing::debug;

use crate::error::BufferError;

/// 被索引的字节来源
pub trait DataSource: Send + Sync {
    /// 读取从 `offset` 开始至多 `length` 字节；越界部分返回短读
    fn read_data(&self, offset: u64, length: u64) -> io::Result<Vec<u8>>;

    /// 当前总字节数
    fn buffer_length(&self) -> u64;
}

/// 缓冲区编辑通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditEvent {
    Erasing { offset: u64, length: u64 },
    EraseAborted { offset: u64, length: u64 },
    Erased { offset: u64, length: u64 },
    Inserting { offset: u64, length: u64 },
    InsertAborted { offset: u64, length: u64 },
    Inserted { offset: u64, length: u64 },
    Overwritten { offset: u64, length: u64 },
}

/// 编辑通知的接收方；可能在任意线程上被调用
pub trait EditObserver: Send + Sync {
    fn on_edit(&self, event: &EditEvent);
}

/// 内存缓冲区
#[derive(Default)]
pub struct MemoryBuffer {
    data: RwLock<Vec<u8>>,
    observers: Mutex<Vec<Weak<dyn EditObserver>>>,
    /// 从预通知到提交通知整段持有，不同线程的编辑互不交叠
    edits: Mutex<()>,
}

impl MemoryBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data: RwLock::new(data), observers: Mutex::new(Vec::new()), edits: Mutex::new(()) }
    }

    fn lock_edits(&self) -> MutexGuard<'_, ()> {
        self.edits.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 订阅编辑通知（弱引用，观察者释放后自动移除）
    pub fn subscribe(&self, observer: Weak<dyn EditObserver>) {
        self.observers.lock().unwrap_or_else(|e| e.into_inner()).push(observer);
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 在 `offset` 处插入 `bytes`
    ///
    /// 观察者不得在 `on_edit` 中再次编辑同一缓冲区（编辑锁不可重入）。
    pub fn insert(&self, offset: u64, bytes: &[u8]) -> Result<(), BufferError> {
        let _edit = self.lock_edits();
        let length = bytes.len() as u64;
        self.notify(EditEvent::Inserting { offset, length });

        {
            let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
            let buffer_length = data.len() as u64;
            if offset > buffer_length {
                drop(data);
                self.notify(EditEvent::InsertAborted { offset, length });
                return Err(BufferError::OutOfRange { offset, length, buffer_length });
            }
            let at = offset as usize;
            data.splice(at..at, bytes.iter().copied());
        }

        self.notify(EditEvent::Inserted { offset, length });
        Ok(())
    }

    /// 删除 `[offset, offset + length)`
    pub fn erase(&self, offset: u64, length: u64) -> Result<(), BufferError> {
        let _edit = self.lock_edits();
        self.notify(EditEvent::Erasing { offset, length });

        {
            let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
            let buffer_length = data.len() as u64;
            if offset.checked_add(length).map_or(true, |end| end > buffer_length) {
                drop(data);
                self.notify(EditEvent::EraseAborted { offset, length });
                return Err(BufferError::OutOfRange { offset, length, buffer_length });
            }
            let at = offset as usize;
            data.drain(at..at + length as usize);
        }

        self.notify(EditEvent::Erased { offset, length });
        Ok(())
    }

    /// 用 `bytes` 覆盖 `offset` 起的同长度数据
    pub fn overwrite(&self, offset: u64, bytes: &[u8]) -> Result<(), BufferError> {
        let _edit = self.lock_edits();
        let length = bytes.len() as u64;
        {
            let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
            let buffer_length = data.len() as u64;
            if offset.checked_add(length).map_or(true, |end| end > buffer_length) {
                return Err(BufferError::OutOfRange { offset, length, buffer_length });
            }
            let at = offset as usize;
            data[at..at + bytes.len()].copy_from_slice(bytes);
        }

        self.notify(EditEvent::Overwritten { offset, length });
        Ok(())
    }

    fn notify(&self, event: EditEvent) {
        let live: Vec<_> = {
            let mut obs = self.observers.lock().unwrap_or_else(|e| e.into_inner());
            obs.retain(|w| w.strong_count() > 0);
            obs.iter().filter_map(Weak::upgrade).collect()
        };
        debug!(?event, observers = live.len(), "edit notification");
        for o in live {
            o.on_edit(&event);
        }
    }
}

impl DataSource for MemoryBuffer {
    fn read_data(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        let len = data.len() as u64;
        if offset >= len {
            return Ok(Vec::new());
        }
        let end = offset.saturating_add(length).min(len);
        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn buffer_length(&self) -> u64 {
        self.data.read().unwrap_or_else(|e| e.into_inner()).len() as u64
    }
}

impl From<Vec<u8>> for MemoryBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EditEvent>>);

    impl EditObserver for Recorder {
        fn on_edit(&self, event: &EditEvent) {
            self.0.lock().unwrap().push(*event);
        }
    }

    fn observed() -> (MemoryBuffer, Arc<Recorder>) {
        let buf = MemoryBuffer::new(b"0123456789".to_vec());
        let rec = Arc::new(Recorder::default());
        let weak: Weak<dyn EditObserver> = Arc::downgrade(&rec) as Weak<dyn EditObserver>;
        buf.subscribe(weak);
        (buf, rec)
    }

    #[test]
    fn read_data_short_reads_at_end() {
        let buf = MemoryBuffer::new(b"abcdef".to_vec());
        assert_eq!(buf.read_data(4, 10).unwrap(), b"ef");
        assert!(buf.read_data(6, 4).unwrap().is_empty());
        assert!(buf.read_data(100, 4).unwrap().is_empty());
        assert_eq!(buf.buffer_length(), 6);
    }

    #[test]
    fn insert_emits_pre_and_post_events() {
        let (buf, rec) = observed();
        buf.insert(2, b"xy").unwrap();
        assert_eq!(buf.to_vec(), b"01xy23456789");
        assert_eq!(
            *rec.0.lock().unwrap(),
            vec![EditEvent::Inserting { offset: 2, length: 2 }, EditEvent::Inserted { offset: 2, length: 2 }]
        );
    }

    #[test]
    fn out_of_range_insert_is_aborted() {
        let (buf, rec) = observed();
        let err = buf.insert(11, b"x").unwrap_err();
        assert_eq!(err, BufferError::OutOfRange { offset: 11, length: 1, buffer_length: 10 });
        assert_eq!(
            *rec.0.lock().unwrap(),
            vec![EditEvent::Inserting { offset: 11, length: 1 }, EditEvent::InsertAborted { offset: 11, length: 1 }]
        );
    }

    #[test]
    fn erase_and_abort() {
        let (buf, rec) = observed();
        buf.erase(8, 2).unwrap();
        assert!(buf.erase(7, 2).is_err());
        assert_eq!(buf.to_vec(), b"01234567");
        assert_eq!(
            *rec.0.lock().unwrap(),
            vec![
                EditEvent::Erasing { offset: 8, length: 2 },
                EditEvent::Erased { offset: 8, length: 2 },
                EditEvent::Erasing { offset: 7, length: 2 },
                EditEvent::EraseAborted { offset: 7, length: 2 },
            ]
        );
    }

    #[test]
    fn overwrite_has_no_pre_event() {
        let (buf, rec) = observed();
        buf.overwrite(0, b"ab").unwrap();
        assert!(buf.overwrite(9, b"ab").is_err());
        assert_eq!(buf.to_vec(), b"ab23456789");
        assert_eq!(*rec.0.lock().unwrap(), vec![EditEvent::Overwritten { offset: 0, length: 2 }]);
    }

    #[test]
    fn concurrent_edits_notify_in_pairs() {
        let buf = Arc::new(MemoryBuffer::new(Vec::new()));
        let rec = Arc::new(Recorder::default());
        buf.subscribe(Arc::downgrade(&rec) as Weak<dyn EditObserver>);

        let editors: Vec<_> = (0..4)
            .map(|t| {
                let buf = Arc::clone(&buf);
                std::thread::spawn(move || {
                    for i in 0..50u64 {
                        buf.insert(0, &[b'a' + t as u8]).unwrap();
                        if i % 3 == 0 {
                            let _ = buf.erase(i % 7, 2);
                        }
                    }
                })
            })
            .collect();
        for e in editors {
            e.join().unwrap();
        }

        // 每个预通知后紧跟同一编辑的提交或中止通知
        let events = rec.0.lock().unwrap();
        for pair in events.chunks(2) {
            match *pair {
                [EditEvent::Inserting { offset, length }, EditEvent::Inserted { offset: o, length: l }]
                | [EditEvent::Erasing { offset, length }, EditEvent::Erased { offset: o, length: l }]
                | [EditEvent::Erasing { offset, length }, EditEvent::EraseAborted { offset: o, length: l }] => {
                    assert_eq!((offset, length), (o, l));
                }
                _ => panic!("interleaved notifications: {pair:?}"),
            }
        }
    }

    #[test]
    fn dropped_observers_are_pruned() {
        let (buf, rec) = observed();
        drop(rec);
        buf.insert(0, b"z").unwrap();
        assert!(buf.observers.lock().unwrap().is_empty());
    }
}
