//! 延迟填充页
//!
//! 未初始化页只保存一个加载函数和它的上下文，首次被认领时执行加载，
//! 然后变为目标类型（匿名或文件映射）。

use log::debug;
use sync::SleepLock;

use super::{AnonPage, Backing, FilePage, MapRegion, PageType};
use crate::address::PAGE_SIZE;
use crate::error::{VmError, VmResult};
use crate::file::OwnedFile;

/// 延迟加载函数：向清零的帧写入页的初始内容
pub type PageInitializer = fn(&mut [u8], &LoadContext) -> VmResult<()>;

/// 文件中的一段，最多一页
#[derive(Debug)]
pub struct FileSlice {
    file: OwnedFile,
    offset: usize,
    read_bytes: usize,
    zero_bytes: usize,
}

impl FileSlice {
    /// 从 `offset` 起读取 `read_bytes` 字节，其余补零
    pub fn new(file: OwnedFile, offset: usize, read_bytes: usize) -> Self {
        let read_bytes = read_bytes.min(PAGE_SIZE);
        FileSlice {
            file,
            offset,
            read_bytes,
            zero_bytes: PAGE_SIZE - read_bytes,
        }
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

    /// 读入 `buf`，文件末尾之后和 `read_bytes` 之后的部分补零
    pub fn read_into(&self, buf: &mut [u8]) -> VmResult<()> {
        let want = self.read_bytes.min(buf.len());
        let n = self
            .file
            .read_at(self.offset, &mut buf[..want])
            .map_err(|_| VmError::Io)?;
        if n < want {
            debug!("vm: EOF at offset {}, zero-filling {} bytes", self.offset + n, want - n);
        }
        buf[n..].fill(0);
        Ok(())
    }

    /// 为新的所有者复制，文件句柄重新打开
    pub fn duplicate(&self) -> VmResult<Self> {
        Ok(FileSlice {
            file: self.file.duplicate()?,
            offset: self.offset,
            read_bytes: self.read_bytes,
            zero_bytes: self.zero_bytes,
        })
    }

    pub(crate) fn into_parts(self) -> (OwnedFile, usize, usize, usize) {
        (self.file, self.offset, self.read_bytes, self.zero_bytes)
    }
}

/// 加载函数的上下文
#[derive(Debug)]
pub enum LoadContext {
    /// 清零
    Zero,
    /// 从文件读取
    File(FileSlice),
}

impl LoadContext {
    /// 为新的所有者复制，不与原上下文共享文件句柄
    pub fn duplicate(&self) -> VmResult<Self> {
        match self {
            LoadContext::Zero => Ok(LoadContext::Zero),
            LoadContext::File(slice) => Ok(LoadContext::File(slice.duplicate()?)),
        }
    }
}

/// 按 [`FileSlice`] 加载：读取文件内容并补零
pub fn load_file_slice(buf: &mut [u8], ctx: &LoadContext) -> VmResult<()> {
    match ctx {
        LoadContext::File(slice) => slice.read_into(buf),
        LoadContext::Zero => Err(VmError::InvalidArgument),
    }
}

/// 清零加载
pub fn load_zero(buf: &mut [u8], _ctx: &LoadContext) -> VmResult<()> {
    buf.fill(0);
    Ok(())
}

/// 未初始化页的后备状态
#[derive(Debug)]
pub struct UninitPage {
    target: PageType,
    init: PageInitializer,
    ctx: LoadContext,
    region: Option<MapRegion>,
}

impl UninitPage {
    /// 创建延迟填充页
    ///
    /// `target` 不能是 [`PageType::Uninit`]；目标为文件映射时上下文必须是文件。
    pub fn new(target: PageType, init: PageInitializer, ctx: LoadContext) -> VmResult<Self> {
        match (target, &ctx) {
            (PageType::Uninit, _) | (PageType::File, LoadContext::Zero) => {
                Err(VmError::InvalidArgument)
            }
            _ => Ok(UninitPage {
                target,
                init,
                ctx,
                region: None,
            }),
        }
    }

    /// mmap 区域中的一页
    pub(crate) fn mapped(slice: FileSlice, region: MapRegion) -> Self {
        UninitPage {
            target: PageType::File,
            init: load_file_slice,
            ctx: LoadContext::File(slice),
            region: Some(region),
        }
    }

    /// 首次认领后将变成的类型
    pub fn target(&self) -> PageType {
        self.target
    }

    /// 所属的 mmap 区域
    pub fn region(&self) -> Option<MapRegion> {
        self.region
    }

    pub(crate) fn load(&self, buf: &mut [u8], fs_lock: &SleepLock<()>) -> VmResult<()> {
        match &self.ctx {
            LoadContext::File(_) => {
                let _fs = fs_lock.lock();
                (self.init)(buf, &self.ctx)
            }
            LoadContext::Zero => (self.init)(buf, &self.ctx),
        }
    }

    /// 加载成功后转换为目标变体
    pub(crate) fn into_backing(self) -> Backing {
        match (self.target, self.ctx) {
            (PageType::File, LoadContext::File(slice)) => {
                Backing::File(FilePage::from_slice(slice, self.region))
            }
            // 匿名目标的加载上下文到此用完，文件句柄随之关闭
            _ => Backing::Anon(AnonPage::new()),
        }
    }

    pub(crate) fn duplicate(&self) -> VmResult<Self> {
        Ok(UninitPage {
            target: self.target,
            init: self.init,
            ctx: self.ctx.duplicate()?,
            region: self.region,
        })
    }
}
