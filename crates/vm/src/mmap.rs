//! 文件映射
//!
//! `mmap` 为区域内每一页登记一个延迟填充的文件页，每页独占一个重新打开的句柄，
//! 因此映射在调用者关闭原句柄后仍然有效。文件末尾之后的字节补零，从不读取，
//! 也从不写回。
//!
//! `munmap` 对区域内每一页走销毁路径：脏页在文件 I/O 锁下写回，然后关闭句柄、
//! 解除映射并归还帧。

use alloc::vec::Vec;

use log::debug;

use crate::address::{PAGE_SIZE, Vaddr, is_page_aligned};
use crate::error::{VmError, VmResult};
use crate::file::{MmFile, OwnedFile};
use crate::page::{Backing, FileSlice, MapRegion, Page, UninitPage};
use crate::space::AddressSpace;

impl AddressSpace {
    /// 把 `file` 从 `offset` 开始的 `length` 字节映射到 `addr`，返回映射起始地址
    pub fn mmap(
        &self,
        addr: Vaddr,
        length: usize,
        writable: bool,
        file: &dyn MmFile,
        offset: usize,
    ) -> VmResult<Vaddr> {
        // 最后一页的文件偏移也必须可表示
        if length == 0 || !is_page_aligned(offset) || offset.checked_add(length).is_none() {
            return Err(VmError::InvalidArgument);
        }
        if !is_page_aligned(addr) || !self.vm().config().is_user_range(addr, length) {
            return Err(VmError::InvalidAddress);
        }
        let region = MapRegion { base: addr, len: length };
        let pages = region.page_count();
        if (0..pages).any(|i| self.spt().contains(addr + i * PAGE_SIZE)) {
            return Err(VmError::AlreadyMapped);
        }

        let file_len = file.length();
        let mut inserted = Vec::with_capacity(pages);
        for i in 0..pages {
            let va = addr + i * PAGE_SIZE;
            let chunk_offset = offset + i * PAGE_SIZE;
            let chunk_len = (length - i * PAGE_SIZE).min(PAGE_SIZE);
            let read_bytes = chunk_len.min(file_len.saturating_sub(chunk_offset));
            let result = OwnedFile::reopen_mapped(file).and_then(|owned| {
                let slice = FileSlice::new(owned, chunk_offset, read_bytes);
                let uninit = UninitPage::mapped(slice, region);
                self.spt()
                    .insert(Page::new(self.asid(), va, writable, Backing::Uninit(uninit)))
            });
            if let Err(e) = result {
                self.unwind(&inserted);
                return Err(e);
            }
            inserted.push(va);
        }
        debug!(
            "vm: mmap {:#x}..{:#x} offset {} ({} pages, writable={})",
            addr,
            addr + length,
            offset,
            pages,
            writable
        );
        Ok(addr)
    }

    /// 解除以 `addr` 为起点的整个映射区域
    ///
    /// 只销毁仍属于该区域的页；区域内被单独移除后又另作他用的地址保持不变。
    pub fn munmap(&self, addr: Vaddr) -> VmResult<()> {
        let region = self.region_at(addr)?;
        let mut removed = 0usize;
        for i in 0..region.page_count() {
            let va = region.base + i * PAGE_SIZE;
            let Some(handle) = self.spt().find(va) else {
                continue;
            };
            if handle.lock().region() != Some(region) {
                continue;
            }
            if let Some(handle) = self.spt().detach(va) {
                self.destroy_page(&handle);
                removed += 1;
            }
        }
        debug!(
            "vm: munmap {:#x}..{:#x} ({} pages)",
            region.base,
            region.base + region.len,
            removed
        );
        Ok(())
    }

    /// 以 `addr` 为起点的映射区域
    ///
    /// 起始页已被单独移除时，从其余页的记录中找回区域。
    fn region_at(&self, addr: Vaddr) -> VmResult<MapRegion> {
        if let Some(handle) = self.spt().find(addr) {
            return match handle.lock().region() {
                Some(region) if region.base == addr => Ok(region),
                _ => Err(VmError::InvalidArgument),
            };
        }
        self.spt()
            .entries()
            .iter()
            .find_map(|(_, handle)| handle.lock().region().filter(|r| r.base == addr))
            .ok_or(VmError::NotMapped)
    }

    fn unwind(&self, inserted: &[Vaddr]) {
        for &va in inserted {
            if let Some(handle) = self.spt().detach(va) {
                self.destroy_page(&handle);
            }
        }
    }
}
