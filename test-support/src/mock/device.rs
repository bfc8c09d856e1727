//! 交换盘的 Mock 实现

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Mock 扇区大小
pub const MOCK_SECTOR_SIZE: usize = 512;

/// 内存模拟的交换盘
pub struct MockSwapDisk {
    sectors: Mutex<Vec<[u8; MOCK_SECTOR_SIZE]>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MockSwapDisk {
    /// 创建 `sectors` 个扇区的交换盘
    pub fn new(sectors: usize) -> Self {
        Self {
            sectors: Mutex::new(vec![[0u8; MOCK_SECTOR_SIZE]; sectors]),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn sector_count(&self) -> usize {
        self.sectors.lock().unwrap().len()
    }

    pub fn read_sector(&self, sector: usize, buf: &mut [u8]) -> bool {
        let sectors = self.sectors.lock().unwrap();
        let Some(data) = sectors.get(sector) else {
            return false;
        };
        if buf.len() != MOCK_SECTOR_SIZE {
            return false;
        }
        buf.copy_from_slice(data);
        self.reads.fetch_add(1, Ordering::SeqCst);
        true
    }

    pub fn write_sector(&self, sector: usize, buf: &[u8]) -> bool {
        if self.fail_writes.load(Ordering::SeqCst) {
            return false;
        }
        let mut sectors = self.sectors.lock().unwrap();
        let Some(data) = sectors.get_mut(sector) else {
            return false;
        };
        if buf.len() != MOCK_SECTOR_SIZE {
            return false;
        }
        data.copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// 让后续写入全部失败（模拟坏盘）
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn sector_reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn sector_writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}
