//! 文件映射接口 trait 定义

use alloc::sync::Arc;
use core::fmt;
use core::ops::Deref;

use crate::error::{VmError, VmResult};

/// 可映射到内存的文件接口
///
/// 每个打开的文件维护两个计数：打开计数（共享同一底层文件对象的句柄数）
/// 和映射计数（通过 mmap 引用它的页数）。底层文件对象只在打开计数归零时释放，
/// 映射计数仅用于诊断。
pub trait MmFile: Send + Sync {
    /// 打开一个共享同一底层文件对象的独立句柄，打开计数加一
    fn reopen(&self) -> Result<Arc<dyn MmFile>, isize>;

    /// 从指定偏移读取数据到缓冲区，越过文件末尾的部分不读
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, isize>;

    /// 将缓冲区数据写入指定偏移
    fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, isize>;

    /// 文件长度（字节）
    fn length(&self) -> usize;

    /// 关闭本句柄，打开计数减一
    fn close(&self);

    /// 当前打开计数
    fn dup_count(&self) -> usize;

    /// 当前映射计数
    fn mapping_count(&self) -> usize;

    /// 映射计数加一
    fn inc_mapping(&self);

    /// 映射计数减一
    fn dec_mapping(&self);
}

/// 页独占的文件句柄
///
/// 总是由 [`MmFile::reopen`] 得到，`Drop` 时关闭句柄；
/// 若作为 mmap 区域的一部分打开，还负责维护映射计数。
pub struct OwnedFile {
    file: Arc<dyn MmFile>,
    mapped: bool,
}

impl OwnedFile {
    /// 为普通的惰性加载重新打开 `file`
    pub fn reopen(file: &dyn MmFile) -> VmResult<Self> {
        let file = file.reopen().map_err(|_| VmError::Io)?;
        Ok(OwnedFile {
            file,
            mapped: false,
        })
    }

    /// 为 mmap 区域中的一页重新打开 `file`，映射计数加一
    pub fn reopen_mapped(file: &dyn MmFile) -> VmResult<Self> {
        let file = file.reopen().map_err(|_| VmError::Io)?;
        file.inc_mapping();
        Ok(OwnedFile { file, mapped: true })
    }

    /// 为新的所有者再打开一份，保留映射属性
    pub fn duplicate(&self) -> VmResult<Self> {
        if self.mapped {
            Self::reopen_mapped(&*self.file)
        } else {
            Self::reopen(&*self.file)
        }
    }
}

impl Deref for OwnedFile {
    type Target = dyn MmFile;

    fn deref(&self) -> &Self::Target {
        &*self.file
    }
}

impl Drop for OwnedFile {
    fn drop(&mut self) {
        if self.mapped {
            self.file.dec_mapping();
        }
        self.file.close();
    }
}

// 手动实现 Debug，因为 dyn MmFile 没有实现 Debug
impl fmt::Debug for OwnedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedFile")
            .field("file", &"<dyn MmFile>")
            .field("mapped", &self.mapped)
            .finish()
    }
}
