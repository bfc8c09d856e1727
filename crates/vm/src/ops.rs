//! 外部协作者接口
//!
//! 子系统不直接访问硬件或调度器，而是通过这里的 trait 使用它们。
//! 内核在创建 [`crate::Vm`] 时以 [`VmServices`] 注入具体实现。

use alloc::sync::Arc;

use crate::address::{Asid, Kva, Vaddr};

/// 物理页分配器
pub trait FrameAllocator: Send + Sync {
    /// 分配一个清零的物理页，耗尽时返回 `None`
    fn alloc_zeroed(&self) -> Option<Kva>;

    /// 归还物理页
    fn free(&self, kva: Kva);
}

/// 硬件页表操作，以 `(asid, va)` 定位一个页
pub trait Mmu: Send + Sync {
    /// 建立映射，失败（如页表页耗尽）时返回 `false`
    fn map(&self, asid: Asid, va: Vaddr, kva: Kva, writable: bool) -> bool;

    /// 清除映射，不存在时什么也不做
    fn unmap(&self, asid: Asid, va: Vaddr);

    /// 查询脏位
    fn is_dirty(&self, asid: Asid, va: Vaddr) -> bool;

    /// 设置或清除脏位
    fn set_dirty(&self, asid: Asid, va: Vaddr, dirty: bool);
}

/// 交换盘，按扇区读写
pub trait SwapDevice: Send + Sync {
    /// 扇区总数
    fn sector_count(&self) -> usize;

    /// 读取一个扇区，`buf` 长度为 [`crate::SECTOR_SIZE`]
    fn read_sector(&self, sector: usize, buf: &mut [u8]) -> bool;

    /// 写入一个扇区，`buf` 长度为 [`crate::SECTOR_SIZE`]
    fn write_sector(&self, sector: usize, buf: &[u8]) -> bool;
}

/// 当前线程的执行上下文
pub trait ExecutionContext: Send + Sync {
    /// 触发缺页时的用户栈指针
    ///
    /// 用户态缺页取陷入帧中的值，内核态缺页取系统调用入口处保存的值。
    fn user_stack_pointer(&self) -> Vaddr;
}

/// 注入给 [`crate::Vm`] 的协作者集合
#[derive(Clone)]
pub struct VmServices {
    /// 物理页分配器
    pub frames: Arc<dyn FrameAllocator>,
    /// 硬件页表
    pub mmu: Arc<dyn Mmu>,
    /// 交换盘
    pub swap: Arc<dyn SwapDevice>,
    /// 执行上下文
    pub exec: Arc<dyn ExecutionContext>,
}
