//! 帧表
//!
//! 全局记录所有正在承载某个页的物理帧，并在物理页耗尽时选择牺牲帧。
//!
//! ## 淘汰
//!
//! 帧按装入顺序编号（[`FrameId`] 单调递增且不复用），[`EvictionPolicy`]
//! 据此给出尝试顺序，默认的 [`Fifo`] 最旧的先淘汰。对每个候选帧：
//!
//! 1. 升级反向引用并 `try_lock` 其所属页；页锁被占用说明它正在缺页处理、
//!    复制或销毁中，跳过
//! 2. 调用页的换出操作；失败则记录警告并尝试下一个候选
//! 3. 解除 MMU 映射，把帧从页上摘下，清零后交给新的所有者
//!
//! 没有候选能被淘汰时返回 [`VmError::OutOfMemory`]。换出只写交换区或文件，
//! 从不申请新帧，因此淘汰不会递归。
//!
//! 整个过程在帧表锁内完成；帧表锁之后只会 `try_lock` 页锁，
//! 所以与“先持页锁、再进帧表”的认领路径不会死锁。

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use log::{debug, error, warn};
use sync::SleepLock;

use crate::address::{Asid, Kva, Vaddr, frame_bytes_mut};
use crate::error::{VmError, VmResult};
use crate::ops::FrameAllocator;
use crate::page::{Page, PageIo};

/// 帧编号，按装入顺序单调递增
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(u64);

/// 页持有的帧引用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef {
    /// 帧表中的编号
    pub id: FrameId,
    /// 物理页地址
    pub kva: Kva,
}

/// 帧当前的所属页（非拥有引用）
pub(crate) struct FrameOwner {
    pub(crate) asid: Asid,
    pub(crate) va: Vaddr,
    pub(crate) page: Weak<SleepLock<Page>>,
}

struct FrameSlot {
    kva: Kva,
    owner: FrameOwner,
}

/// 淘汰策略
pub trait EvictionPolicy: Send + Sync {
    /// 策略名
    fn name(&self) -> &'static str;

    /// 给出尝试淘汰的顺序
    ///
    /// `resident` 按装入顺序排列，最旧的在前。返回的序列不必包含全部帧，
    /// 但只要还有可淘汰的帧就应当包含它，以保证淘汰总能推进。
    fn candidates(&self, resident: &[FrameId]) -> Vec<FrameId>;
}

/// 先进先出：最早装入的帧最先淘汰
#[derive(Debug, Default)]
pub struct Fifo;

impl EvictionPolicy for Fifo {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn candidates(&self, resident: &[FrameId]) -> Vec<FrameId> {
        resident.to_vec()
    }
}

struct FrameTableInner {
    frames: BTreeMap<FrameId, FrameSlot>,
    next_id: u64,
}

/// 全局帧表
pub struct FrameTable {
    allocator: Arc<dyn FrameAllocator>,
    policy: Box<dyn EvictionPolicy>,
    inner: SleepLock<FrameTableInner>,
}

impl FrameTable {
    /// 创建帧表
    pub fn new(allocator: Arc<dyn FrameAllocator>, policy: Box<dyn EvictionPolicy>) -> Self {
        FrameTable {
            allocator,
            policy,
            inner: SleepLock::new(FrameTableInner {
                frames: BTreeMap::new(),
                next_id: 0,
            }),
        }
    }

    /// 淘汰策略名
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// 当前驻留的帧数
    pub fn resident_frames(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// 获取一个清零的帧并登记所属页，必要时淘汰其他页
    pub(crate) fn acquire(&self, owner: FrameOwner, io: &PageIo<'_>) -> VmResult<FrameRef> {
        let mut inner = self.inner.lock();
        let kva = match self.allocator.alloc_zeroed() {
            Some(kva) => kva,
            None => self.evict(&mut inner, io)?,
        };
        let id = FrameId(inner.next_id);
        inner.next_id += 1;
        inner.frames.insert(id, FrameSlot { kva, owner });
        Ok(FrameRef { id, kva })
    }

    /// 移出帧表并归还物理页；调用者必须已把帧从页上摘下
    pub(crate) fn release(&self, id: FrameId) {
        let slot = self.inner.lock().frames.remove(&id);
        match slot {
            Some(slot) => self.allocator.free(slot.kva),
            None => warn!("vm: releasing unknown frame {:?}", id),
        }
    }

    fn evict(&self, inner: &mut FrameTableInner, io: &PageIo<'_>) -> VmResult<Kva> {
        let resident: Vec<FrameId> = inner.frames.keys().copied().collect();
        for id in self.policy.candidates(&resident) {
            let Some(slot) = inner.frames.get(&id) else {
                continue;
            };
            let (asid, va) = (slot.owner.asid, slot.owner.va);
            let Some(handle) = slot.owner.page.upgrade() else {
                // 所属页已被丢弃，帧直接回收
                let kva = slot.kva;
                inner.frames.remove(&id);
                return Ok(Self::scrub(kva));
            };
            let Some(mut page) = handle.try_lock() else {
                continue;
            };
            if page.frame().map(|f| f.id) != Some(id) {
                continue;
            }
            if let Err(e) = page.swap_out(io) {
                warn!("vm: cannot evict {:#x} (asid {}): {:?}", va, asid, e);
                continue;
            }
            io.mmu.unmap(asid, va);
            page.detach_frame();
            let Some(slot) = inner.frames.remove(&id) else {
                continue;
            };
            debug!("vm: evicted {:#x} (asid {}) from {:?}", va, asid, id);
            return Ok(Self::scrub(slot.kva));
        }
        error!(
            "vm: out of memory, no evictable frame among {} resident",
            resident.len()
        );
        Err(VmError::OutOfMemory)
    }

    fn scrub(kva: Kva) -> Kva {
        // SAFETY: 帧已离开帧表且不属于任何页
        unsafe { frame_bytes_mut(kva) }.fill(0);
        kva
    }
}
