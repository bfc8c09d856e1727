//! 页与后备存储
//!
//! 每个 [`Page`] 记录一个虚拟页的状态。后备存储用 [`Backing`] 表示，
//! 三个变体各自实现填充、换入、换出和销毁：
//!
//! | 变体 | 填充 / 换入 | 换出 | 销毁 |
//! |------|-------------|------|------|
//! | `Uninit` | 调用延迟加载函数，然后变为目标变体 | 无需保存 | 释放加载上下文 |
//! | `Anon` | 从交换槽读回，或清零 | 写入新交换槽 | 释放交换槽 |
//! | `File` | 从文件读取并补零 | 脏页写回文件 | 脏页写回并关闭句柄 |

mod anon;
mod file;
mod uninit;

pub use anon::AnonPage;
pub use file::FilePage;
pub use uninit::{
    FileSlice, LoadContext, PageInitializer, UninitPage, load_file_slice, load_zero,
};

use log::warn;
use sync::SleepLock;

use crate::address::{Asid, PAGE_SIZE, Vaddr, frame_bytes, frame_bytes_mut};
use crate::error::{VmError, VmResult};
use crate::frame_table::FrameRef;
use crate::ops::Mmu;
use crate::swap::SwapTable;

/// 页的后备存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// 尚未填充，首次访问时变为目标类型
    Uninit,
    /// 匿名页，淘汰时写入交换区
    Anon,
    /// 文件映射页，淘汰时写回文件
    File,
}

/// 一次 mmap 建立的整个区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapRegion {
    /// 起始地址
    pub base: Vaddr,
    /// 映射长度（字节）
    pub len: usize,
}

impl MapRegion {
    /// 区域覆盖的页数
    pub fn page_count(&self) -> usize {
        self.len.div_ceil(PAGE_SIZE)
    }
}

/// 后备存储变体
#[derive(Debug)]
pub enum Backing {
    /// 延迟填充
    Uninit(UninitPage),
    /// 匿名
    Anon(AnonPage),
    /// 文件映射
    File(FilePage),
}

/// 后备存储操作需要的共享资源
pub(crate) struct PageIo<'a> {
    pub(crate) swap: &'a SwapTable,
    pub(crate) mmu: &'a dyn Mmu,
    pub(crate) fs_lock: &'a SleepLock<()>,
}

/// 一个虚拟页
#[derive(Debug)]
pub struct Page {
    va: Vaddr,
    writable: bool,
    asid: Asid,
    backing: Backing,
    frame: Option<FrameRef>,
}

impl Page {
    pub(crate) fn new(asid: Asid, va: Vaddr, writable: bool, backing: Backing) -> Self {
        Page {
            va,
            writable,
            asid,
            backing,
            frame: None,
        }
    }

    /// 页起始地址
    pub fn va(&self) -> Vaddr {
        self.va
    }

    /// 是否可写
    pub fn writable(&self) -> bool {
        self.writable
    }

    /// 所属地址空间
    pub fn asid(&self) -> Asid {
        self.asid
    }

    /// 后备存储
    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    /// 当前占用的帧
    pub fn frame(&self) -> Option<FrameRef> {
        self.frame
    }

    /// 是否驻留在物理内存中
    pub fn is_resident(&self) -> bool {
        self.frame.is_some()
    }

    /// 后备存储的当前类型
    pub fn kind(&self) -> PageType {
        match &self.backing {
            Backing::Uninit(_) => PageType::Uninit,
            Backing::Anon(_) => PageType::Anon,
            Backing::File(_) => PageType::File,
        }
    }

    /// 页的有效类型：未初始化页报告它将变成的类型
    pub fn page_type(&self) -> PageType {
        match &self.backing {
            Backing::Uninit(uninit) => uninit.target(),
            _ => self.kind(),
        }
    }

    /// 所属的 mmap 区域
    pub fn region(&self) -> Option<MapRegion> {
        match &self.backing {
            Backing::Uninit(uninit) => uninit.region(),
            Backing::File(file) => file.region(),
            Backing::Anon(_) => None,
        }
    }

    pub(crate) fn attach_frame(&mut self, frame: FrameRef) {
        debug_assert!(self.frame.is_none());
        self.frame = Some(frame);
    }

    pub(crate) fn detach_frame(&mut self) -> Option<FrameRef> {
        self.frame.take()
    }

    /// 填充刚分配的帧：首次驻留时加载初始内容，被淘汰过则换入
    pub(crate) fn fill(&mut self, io: &PageIo<'_>) -> VmResult<()> {
        let frame = self.frame.ok_or(VmError::NotMapped)?;
        // SAFETY: 帧由本页独占，调用者持有页锁
        let buf = unsafe { frame_bytes_mut(frame.kva) };
        match &mut self.backing {
            Backing::Uninit(uninit) => uninit.load(buf, io.fs_lock)?,
            Backing::Anon(anon) => return anon.swap_in(buf, io.swap),
            Backing::File(file) => return file.swap_in(buf, io.fs_lock),
        }
        let backing = core::mem::replace(&mut self.backing, Backing::Anon(AnonPage::new()));
        self.backing = match backing {
            Backing::Uninit(uninit) => uninit.into_backing(),
            other => other,
        };
        Ok(())
    }

    /// 在帧被回收前保存内容；不解除映射，也不释放帧
    pub(crate) fn swap_out(&mut self, io: &PageIo<'_>) -> VmResult<()> {
        let frame = self.frame.ok_or(VmError::NotMapped)?;
        // SAFETY: 同上，帧内容在换出期间不会被修改
        let buf = unsafe { frame_bytes(frame.kva) };
        match &mut self.backing {
            // 再次访问时会重新执行加载函数
            Backing::Uninit(_) => Ok(()),
            Backing::Anon(anon) => anon.swap_out(buf, io.swap),
            Backing::File(file) => file.write_back(self.asid, self.va, buf, io),
        }
    }

    /// 释放后备存储资源；帧由调用者随后释放
    ///
    /// 文件句柄和加载上下文在此关闭，不等最后一个 [`PageHandle`](crate::PageHandle)
    /// 被丢弃。之后页只剩一个空的匿名后备，可重复调用。
    pub(crate) fn destroy(&mut self, io: &PageIo<'_>) {
        match &mut self.backing {
            Backing::Uninit(_) => {}
            Backing::Anon(anon) => anon.destroy(io.swap),
            Backing::File(file) => {
                if let Some(frame) = self.frame {
                    // SAFETY: 同上
                    let buf = unsafe { frame_bytes(frame.kva) };
                    if let Err(e) = file.write_back(self.asid, self.va, buf, io) {
                        warn!("vm: write-back of {:#x} failed on destroy: {:?}", self.va, e);
                    }
                }
            }
        }
        self.backing = Backing::Anon(AnonPage::new());
    }

    /// 为另一个地址空间构造同一位置、同一变体的页，不复制内容
    pub(crate) fn duplicate_for(&self, asid: Asid) -> VmResult<Page> {
        let backing = match &self.backing {
            Backing::Uninit(uninit) => Backing::Uninit(uninit.duplicate()?),
            Backing::Anon(_) => Backing::Anon(AnonPage::new()),
            Backing::File(file) => Backing::File(file.duplicate()?),
        };
        Ok(Page::new(asid, self.va, self.writable, backing))
    }
}
