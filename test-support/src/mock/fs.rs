//! 文件系统的 Mock 实现
//!
//! [`MockInode`] 是底层文件对象，[`MockFile`] 是打开的句柄；
//! `reopen` 产生共享同一个 inode 的独立句柄，并增加 inode 的打开计数。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 底层文件对象
pub struct MockInode {
    data: Mutex<Vec<u8>>,
    dup_count: AtomicUsize,
    mapping_count: AtomicUsize,
    writes: Mutex<Vec<(usize, usize)>>,
    reads: AtomicUsize,
    fail_io: AtomicBool,
}

/// 打开的文件句柄
pub struct MockFile {
    inode: Arc<MockInode>,
    closed: AtomicBool,
}

impl MockFile {
    /// 以给定内容创建文件并打开第一个句柄
    pub fn open(data: &[u8]) -> Arc<MockFile> {
        let inode = Arc::new(MockInode {
            data: Mutex::new(data.to_vec()),
            dup_count: AtomicUsize::new(1),
            mapping_count: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
            fail_io: AtomicBool::new(false),
        });
        Arc::new(MockFile {
            inode,
            closed: AtomicBool::new(false),
        })
    }

    pub fn reopen(&self) -> Option<Arc<MockFile>> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        self.inode.dup_count.fetch_add(1, Ordering::SeqCst);
        Some(Arc::new(MockFile {
            inode: self.inode.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.inode.dup_count.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 读取不超过文件末尾；越过末尾返回 0
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Option<usize> {
        if self.inode.fail_io.load(Ordering::SeqCst) {
            return None;
        }
        let data = self.inode.data.lock().unwrap();
        self.inode.reads.fetch_add(1, Ordering::SeqCst);
        if offset >= data.len() {
            return Some(0);
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Some(n)
    }

    /// 不扩展文件：越过末尾的部分被截断
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> Option<usize> {
        if self.inode.fail_io.load(Ordering::SeqCst) {
            return None;
        }
        let mut data = self.inode.data.lock().unwrap();
        self.inode.writes.lock().unwrap().push((offset, buf.len()));
        if offset >= data.len() {
            return Some(0);
        }
        let n = buf.len().min(data.len() - offset);
        data[offset..offset + n].copy_from_slice(&buf[..n]);
        Some(n)
    }

    pub fn length(&self) -> usize {
        self.inode.data.lock().unwrap().len()
    }

    pub fn dup_count(&self) -> usize {
        self.inode.dup_count.load(Ordering::SeqCst)
    }

    pub fn mapping_count(&self) -> usize {
        self.inode.mapping_count.load(Ordering::SeqCst)
    }

    pub fn inc_mapping(&self) {
        self.inode.mapping_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn dec_mapping(&self) {
        let _ = self
            .inode
            .mapping_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// 文件当前内容的副本
    pub fn contents(&self) -> Vec<u8> {
        self.inode.data.lock().unwrap().clone()
    }

    /// 所有写请求的 `(offset, len)` 记录
    pub fn write_log(&self) -> Vec<(usize, usize)> {
        self.inode.writes.lock().unwrap().clone()
    }

    pub fn read_calls(&self) -> usize {
        self.inode.reads.load(Ordering::SeqCst)
    }

    /// 让后续读写全部失败
    pub fn set_fail_io(&self, fail: bool) {
        self.inode.fail_io.store(fail, Ordering::SeqCst);
    }
}
