//! 缺页处理
//!
//! 1. 权限冲突或地址不在用户空间：直接失败
//! 2. 页表中有登记的页：检查写权限后认领
//! 3. 否则若地址在栈指针下方的余量内且未超过栈的最大大小：新建匿名页并认领
//! 4. 其余情况：失败，由调用者终止进程
//!
//! 处理过程可能阻塞在文件或交换盘 I/O 上，直到页驻留或确定无法处理才返回。

use bitflags::bitflags;
use log::{debug, warn};

use crate::address::{Vaddr, page_round_down};
use crate::error::{VmError, VmResult};
use crate::page::{AnonPage, Backing, Page};
use crate::space::AddressSpace;

bitflags! {
    /// 缺页的硬件信息
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FaultFlags: u8 {
        /// 来自用户态
        const USER = 1 << 0;
        /// 写访问
        const WRITE = 1 << 1;
        /// 页不存在（否则为权限冲突）
        const NOT_PRESENT = 1 << 2;
    }
}

impl AddressSpace {
    /// 处理一次缺页，成功时页已驻留并建立映射
    pub fn handle_fault(&self, addr: Vaddr, flags: FaultFlags) -> VmResult<()> {
        let result = self.resolve_fault(addr, flags);
        if let Err(e) = result {
            warn!(
                "vm: unresolved fault at {:#x} (user={}, write={}, not_present={}): {}",
                addr,
                flags.contains(FaultFlags::USER),
                flags.contains(FaultFlags::WRITE),
                flags.contains(FaultFlags::NOT_PRESENT),
                e
            );
        }
        result
    }

    fn resolve_fault(&self, addr: Vaddr, flags: FaultFlags) -> VmResult<()> {
        if !flags.contains(FaultFlags::NOT_PRESENT) {
            return Err(VmError::ProtectionViolation);
        }
        if !self.vm().config().is_user_addr(addr) {
            return Err(VmError::InvalidAddress);
        }

        let va = page_round_down(addr);
        if let Some(handle) = self.spt().find(va) {
            let mut page = handle.lock();
            if flags.contains(FaultFlags::WRITE) && !page.writable() {
                return Err(VmError::WriteProtected);
            }
            return self.claim_locked(&handle, &mut page);
        }

        if self.is_stack_access(addr) {
            return self.grow_stack(va);
        }
        Err(VmError::NotMapped)
    }

    /// 地址是否在栈指针下方的余量内，且不超过栈的最大大小
    fn is_stack_access(&self, addr: Vaddr) -> bool {
        let config = self.vm().config();
        let sp = self.vm().exec().user_stack_pointer();
        addr >= sp.saturating_sub(config.stack_slack)
            && addr >= config.stack_limit()
            && addr < config.user_stack_top
    }

    fn grow_stack(&self, va: Vaddr) -> VmResult<()> {
        debug!("vm: growing stack of asid {} to {:#x}", self.asid(), va);
        let page = Page::new(self.asid(), va, true, Backing::Anon(AnonPage::new()));
        let handle = self.spt().insert(page)?;
        let result = {
            let mut page = handle.lock();
            self.claim_locked(&handle, &mut page)
        };
        if result.is_err() {
            // 认领失败的栈页不保留
            if let Some(handle) = self.spt().detach(va) {
                self.destroy_page(&handle);
            }
        }
        result
    }
}
