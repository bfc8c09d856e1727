//! 地址空间
//!
//! [`AddressSpace`] 把一个补充页表和共享的 [`Vm`] 绑在一起，
//! 是页登记、认领和销毁的入口。缺页处理、mmap 与复制分别在
//! `fault`、`mmap`、`fork` 模块中为它实现。
//!
//! # 锁顺序
//!
//! 页锁 → 帧表锁 → （仅 `try_lock`）其他页锁 → 文件 I/O 锁 / 交换盘锁。
//! 文件 I/O 锁和交换盘锁是叶子锁，持有时不再获取任何锁。

use alloc::sync::Arc;

use log::{debug, warn};

use crate::address::{Asid, Vaddr, is_page_aligned};
use crate::error::{VmError, VmResult};
use crate::frame_table::FrameOwner;
use crate::page::{Backing, LoadContext, Page, PageInitializer, PageType, UninitPage, load_zero};
use crate::spt::{PageHandle, SupplementalPageTable};
use crate::vm::Vm;

/// 一个进程的地址空间
///
/// `Drop` 时销毁所有页：脏的文件页写回，交换槽与帧全部归还。
pub struct AddressSpace {
    vm: Arc<Vm>,
    asid: Asid,
    spt: SupplementalPageTable,
}

impl AddressSpace {
    /// 创建空的地址空间
    pub fn new(vm: Arc<Vm>, asid: Asid) -> Self {
        AddressSpace {
            vm,
            asid,
            spt: SupplementalPageTable::new(),
        }
    }

    /// 地址空间标识
    pub fn asid(&self) -> Asid {
        self.asid
    }

    /// 共享上下文
    pub fn vm(&self) -> &Arc<Vm> {
        &self.vm
    }

    /// 补充页表
    pub fn spt(&self) -> &SupplementalPageTable {
        &self.spt
    }

    /// 查找包含 `addr` 的页
    pub fn find_page(&self, addr: Vaddr) -> Option<PageHandle> {
        self.spt.find(addr)
    }

    /// 包含 `addr` 的页的有效类型
    pub fn page_type(&self, addr: Vaddr) -> Option<PageType> {
        self.spt.find(addr).map(|handle| handle.lock().page_type())
    }

    /// 包含 `addr` 的页是否驻留
    pub fn is_resident(&self, addr: Vaddr) -> bool {
        self.spt
            .find(addr)
            .is_some_and(|handle| handle.lock().is_resident())
    }

    /// 登记一个延迟填充页
    ///
    /// 首次访问时以 `ctx` 调用 `init` 填充内容，之后页变为 `target` 类型。
    pub fn allocate_lazy_page(
        &self,
        target: PageType,
        va: Vaddr,
        writable: bool,
        init: PageInitializer,
        ctx: LoadContext,
    ) -> VmResult<()> {
        self.check_page_addr(va)?;
        let uninit = UninitPage::new(target, init, ctx)?;
        self.spt.insert(Page::new(
            self.asid,
            va,
            writable,
            Backing::Uninit(uninit),
        ))?;
        debug!(
            "vm: lazy {:?} page at {:#x} (asid {}, writable={})",
            target, va, self.asid, writable
        );
        Ok(())
    }

    /// 登记一个清零的匿名页（栈、bss 等）
    pub fn allocate_page(&self, target: PageType, va: Vaddr, writable: bool) -> VmResult<()> {
        if target != PageType::Anon {
            return Err(VmError::InvalidArgument);
        }
        self.allocate_lazy_page(target, va, writable, load_zero, LoadContext::Zero)
    }

    /// 立即让已登记的页驻留
    pub fn claim_page(&self, va: Vaddr) -> VmResult<()> {
        let handle = self.spt.find(va).ok_or(VmError::NotMapped)?;
        let mut page = handle.lock();
        self.claim_locked(&handle, &mut page)
    }

    /// 移除并销毁包含 `va` 的页
    pub fn remove_page(&self, va: Vaddr) -> VmResult<()> {
        let handle = self.spt.detach(va).ok_or(VmError::NotMapped)?;
        self.destroy_page(&handle);
        Ok(())
    }

    /// 销毁所有页，地址空间随后为空且仍可继续使用
    pub fn destroy(&self) {
        let pages = self.spt.drain();
        if !pages.is_empty() {
            debug!("vm: destroying {} pages of asid {}", pages.len(), self.asid);
        }
        for handle in &pages {
            self.destroy_page(handle);
        }
    }

    /// 为已加锁的页分配帧、建立映射并填充内容；已驻留时直接返回
    ///
    /// 填充失败时撤销映射并归还帧，页保持原状。
    pub(crate) fn claim_locked(&self, handle: &PageHandle, page: &mut Page) -> VmResult<()> {
        if page.is_resident() {
            return Ok(());
        }
        let io = self.vm.io();
        let owner = FrameOwner {
            asid: self.asid,
            va: page.va(),
            page: Arc::downgrade(handle),
        };
        let frame = self.vm.frame_table().acquire(owner, &io)?;
        if !io.mmu.map(self.asid, page.va(), frame.kva, page.writable()) {
            self.vm.frame_table().release(frame.id);
            return Err(VmError::MapFailed);
        }
        page.attach_frame(frame);
        if let Err(e) = page.fill(&io) {
            warn!("vm: failed to populate {:#x}: {:?}", page.va(), e);
            page.detach_frame();
            io.mmu.unmap(self.asid, page.va());
            self.vm.frame_table().release(frame.id);
            return Err(e);
        }
        Ok(())
    }

    /// 已从页表摘下的页走完整的销毁路径
    pub(crate) fn destroy_page(&self, handle: &PageHandle) {
        let io = self.vm.io();
        let mut page = handle.lock();
        page.destroy(&io);
        if let Some(frame) = page.detach_frame() {
            io.mmu.unmap(self.asid, page.va());
            self.vm.frame_table().release(frame.id);
        }
    }

    fn check_page_addr(&self, va: Vaddr) -> VmResult<()> {
        if !is_page_aligned(va) || !self.vm.config().is_user_addr(va) {
            return Err(VmError::InvalidAddress);
        }
        Ok(())
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        self.destroy();
    }
}
