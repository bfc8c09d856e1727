//! 文件映射页

use log::warn;

use super::{MapRegion, PageIo};
use crate::address::{Asid, PAGE_SIZE, Vaddr};
use crate::error::{VmError, VmResult};
use crate::file::{MmFile, OwnedFile};
use crate::page::FileSlice;
use sync::SleepLock;

/// 文件映射页的后备状态
///
/// 页的前 `read_bytes` 字节来自文件 `offset` 处，其余 `zero_bytes` 字节补零。
/// 写回时只写前 `read_bytes` 字节。
#[derive(Debug)]
pub struct FilePage {
    file: OwnedFile,
    offset: usize,
    read_bytes: usize,
    zero_bytes: usize,
    region: Option<MapRegion>,
}

impl FilePage {
    pub(crate) fn from_slice(slice: FileSlice, region: Option<MapRegion>) -> Self {
        let (file, offset, read_bytes, zero_bytes) = slice.into_parts();
        FilePage {
            file,
            offset,
            read_bytes,
            zero_bytes,
            region,
        }
    }

    /// 映射的文件
    pub fn file(&self) -> &dyn MmFile {
        &*self.file
    }

    /// 文件偏移
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 来自文件的字节数
    pub fn read_bytes(&self) -> usize {
        self.read_bytes
    }

    /// 补零的字节数
    pub fn zero_bytes(&self) -> usize {
        self.zero_bytes
    }

    /// 所属的 mmap 区域
    pub fn region(&self) -> Option<MapRegion> {
        self.region
    }

    /// 从文件重新读取内容
    pub(crate) fn swap_in(&mut self, buf: &mut [u8], fs_lock: &SleepLock<()>) -> VmResult<()> {
        let n = {
            let _fs = fs_lock.lock();
            self.file
                .read_at(self.offset, &mut buf[..self.read_bytes])
                .map_err(|_| VmError::Io)?
        };
        if n != self.read_bytes {
            warn!(
                "vm: short read at offset {}: expected {}, got {}",
                self.offset, self.read_bytes, n
            );
        }
        buf[n..PAGE_SIZE].fill(0);
        Ok(())
    }

    /// 脏页写回文件并清除脏位；干净页什么也不做
    pub(crate) fn write_back(
        &mut self,
        asid: Asid,
        va: Vaddr,
        buf: &[u8],
        io: &PageIo<'_>,
    ) -> VmResult<()> {
        if !io.mmu.is_dirty(asid, va) || self.read_bytes == 0 {
            return Ok(());
        }
        let written = {
            let _fs = io.fs_lock.lock();
            self.file
                .write_at(self.offset, &buf[..self.read_bytes])
                .map_err(|_| VmError::Io)?
        };
        if written != self.read_bytes {
            warn!(
                "vm: partial write-back at offset {}: expected {}, got {}",
                self.offset, self.read_bytes, written
            );
        }
        io.mmu.set_dirty(asid, va, false);
        Ok(())
    }

    pub(crate) fn duplicate(&self) -> VmResult<Self> {
        Ok(FilePage {
            file: self.file.duplicate()?,
            offset: self.offset,
            read_bytes: self.read_bytes,
            zero_bytes: self.zero_bytes,
            region: self.region,
        })
    }
}
