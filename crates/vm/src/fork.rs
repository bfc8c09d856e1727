//! 地址空间复制
//!
//! 未初始化页只复制加载上下文（文件句柄重新打开），保持延迟；
//! 其余页在目标空间新建同类页、立即认领并逐字节复制内容，脏位随之继承。
//! 源页若已被淘汰，先把它换回内存再复制。

use log::debug;

use crate::address::{frame_bytes, frame_bytes_mut};
use crate::error::{VmError, VmResult};
use crate::page::{Backing, Page};
use crate::space::AddressSpace;
use crate::spt::PageHandle;

impl AddressSpace {
    /// 把 `src` 的所有页复制到本地址空间
    ///
    /// 本空间已有的地址被跳过。中途失败时返回错误，已复制的页留在本空间中，
    /// 由其正常销毁。
    pub fn copy_from(&self, src: &AddressSpace) -> VmResult<()> {
        let entries = src.spt().entries();
        let mut copied = 0usize;
        for (va, handle) in &entries {
            if self.spt().contains(*va) {
                continue;
            }
            let mut src_page = handle.lock();
            if let Backing::Uninit(_) = src_page.backing() {
                match self.spt().insert(src_page.duplicate_for(self.asid())?) {
                    Ok(_) | Err(VmError::AlreadyMapped) => {}
                    Err(e) => return Err(e),
                }
                continue;
            }

            src.claim_locked(handle, &mut src_page)?;
            let dst = match self.spt().insert(src_page.duplicate_for(self.asid())?) {
                Ok(dst) => dst,
                Err(VmError::AlreadyMapped) => continue,
                Err(e) => return Err(e),
            };
            if let Err(e) = self.copy_resident(&src_page, src, &dst) {
                if let Some(dst) = self.spt().detach(*va) {
                    self.destroy_page(&dst);
                }
                return Err(e);
            }
            copied += 1;
        }
        debug!(
            "vm: copied asid {} -> {}: {} pages, {} populated",
            src.asid(),
            self.asid(),
            entries.len(),
            copied
        );
        Ok(())
    }

    fn copy_resident(&self, src_page: &Page, src: &AddressSpace, dst: &PageHandle) -> VmResult<()> {
        let mut dst_page = dst.lock();
        self.claim_locked(dst, &mut dst_page)?;
        let (Some(from), Some(to)) = (src_page.frame(), dst_page.frame()) else {
            return Err(VmError::NotMapped);
        };
        // SAFETY: 两个帧分别由已加锁的源页和目标页独占
        unsafe { frame_bytes_mut(to.kva) }.copy_from_slice(unsafe { frame_bytes(from.kva) });
        let mmu = self.vm().mmu();
        if mmu.is_dirty(src.asid(), src_page.va()) {
            mmu.set_dirty(self.asid(), dst_page.va(), true);
        }
        Ok(())
    }
}
