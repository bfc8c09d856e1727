//! 交换槽位管理
//!
//! 交换盘被切分为页大小的槽位，每个槽位占 [`SECTORS_PER_SLOT`] 个扇区。
//!
//! ## 分配策略（位图）
//!
//! 与物理帧分配器相同，用位图跟踪槽位占用：
//!
//! - **bitmap**：每个 bit 表示一个槽位（0=空闲，1=已占用）
//! - **last_alloc_hint**：上次分配位置提示，利用局部性加速查找
//!
//! 位图由自旋锁保护；设备 I/O 在睡眠锁下进行，因为交换盘驱动不可重入。

use alloc::sync::Arc;
use alloc::vec::Vec;

use sync::{SleepLock, SpinLock};

use crate::address::PAGE_SIZE;
use crate::error::{VmError, VmResult};
use crate::ops::SwapDevice;

/// 扇区大小（字节）
pub const SECTOR_SIZE: usize = 512;

/// 每个交换槽位占用的扇区数
pub const SECTORS_PER_SLOT: usize = PAGE_SIZE / SECTOR_SIZE;

/// 交换槽位位图
struct SlotBitmap {
    bitmap: Vec<u64>,
    total_slots: usize,
    used: usize,
    last_alloc_hint: usize,
}

impl SlotBitmap {
    fn new(total_slots: usize) -> Self {
        SlotBitmap {
            bitmap: alloc::vec![0u64; total_slots.div_ceil(64)],
            total_slots,
            used: 0,
            last_alloc_hint: 0,
        }
    }

    #[inline]
    fn is_free(&self, slot: usize) -> bool {
        (self.bitmap[slot / 64] & (1u64 << (slot % 64))) == 0
    }

    #[inline]
    fn mark_allocated(&mut self, slot: usize) {
        self.bitmap[slot / 64] |= 1u64 << (slot % 64);
    }

    #[inline]
    fn mark_free(&mut self, slot: usize) {
        self.bitmap[slot / 64] &= !(1u64 << (slot % 64));
    }

    /// 从 last_alloc_hint 开始循环查找第一个空闲位
    fn alloc(&mut self) -> Option<usize> {
        let words = self.bitmap.len();
        for offset in 0..words {
            let idx = (self.last_alloc_hint + offset) % words;
            let word = self.bitmap[idx];
            if word == u64::MAX {
                continue;
            }
            let slot = idx * 64 + (!word).trailing_zeros() as usize;
            // 最后一个字的高位不对应真实槽位
            if slot >= self.total_slots {
                continue;
            }
            self.mark_allocated(slot);
            self.used += 1;
            self.last_alloc_hint = idx;
            return Some(slot);
        }
        None
    }

    fn free(&mut self, slot: usize) -> bool {
        if slot >= self.total_slots || self.is_free(slot) {
            return false;
        }
        self.mark_free(slot);
        self.used -= 1;
        true
    }
}

/// 交换表
pub struct SwapTable {
    device: Arc<dyn SwapDevice>,
    slots: SpinLock<SlotBitmap>,
    io: SleepLock<()>,
}

impl SwapTable {
    /// 以交换盘的全部容量创建交换表
    pub fn new(device: Arc<dyn SwapDevice>) -> Self {
        let total = device.sector_count() / SECTORS_PER_SLOT;
        SwapTable {
            device,
            slots: SpinLock::new(SlotBitmap::new(total)),
            io: SleepLock::new(()),
        }
    }

    /// 槽位总数
    pub fn total_slots(&self) -> usize {
        self.slots.lock().total_slots
    }

    /// 空闲槽位数
    pub fn free_slots(&self) -> usize {
        let slots = self.slots.lock();
        slots.total_slots - slots.used
    }

    /// 把一页内容写入新分配的槽位，返回槽位号
    ///
    /// 写盘失败时槽位会被归还。
    pub fn swap_out(&self, page: &[u8]) -> VmResult<usize> {
        let slot = self.slots.lock().alloc().ok_or(VmError::SwapFull)?;
        let written = {
            let _io = self.io.lock();
            page.chunks_exact(SECTOR_SIZE)
                .enumerate()
                .all(|(i, sector)| self.device.write_sector(slot * SECTORS_PER_SLOT + i, sector))
        };
        if !written {
            log::warn!("swap: failed to write slot {}", slot);
            self.slots.lock().free(slot);
            return Err(VmError::Io);
        }
        Ok(slot)
    }

    /// 从槽位读回一页内容，成功后释放槽位
    pub fn swap_in(&self, slot: usize, page: &mut [u8]) -> VmResult<()> {
        let read = {
            let _io = self.io.lock();
            page.chunks_exact_mut(SECTOR_SIZE)
                .enumerate()
                .all(|(i, sector)| self.device.read_sector(slot * SECTORS_PER_SLOT + i, sector))
        };
        if !read {
            log::warn!("swap: failed to read slot {}", slot);
            return Err(VmError::Io);
        }
        self.free(slot);
        Ok(())
    }

    /// 释放槽位而不读取
    pub fn free(&self, slot: usize) {
        if !self.slots.lock().free(slot) {
            log::warn!("swap: freeing unused slot {}", slot);
        }
    }
}
