//! 按需分页虚拟内存管理
//!
//! 把进程的虚拟地址空间映射到物理帧上：页在第一次访问时才填充内容，
//! 内存紧张时被淘汰到交换区或写回文件。
//!
//! # 组成
//!
//! - [`Page`]：一个虚拟页的状态，后备存储为 [`Backing`] 的三个变体之一
//! - [`FrameTable`]：全局帧表，负责分配与淘汰
//! - [`SupplementalPageTable`]：每个地址空间一份的页登记表
//! - [`AddressSpace`]：缺页处理、mmap、地址空间复制的入口
//! - [`Vm`]：整个子系统共享的上下文（帧表、交换表、文件 I/O 锁）
//!
//! # 外部协作者
//!
//! 物理页分配器、MMU、交换盘和调度上下文通过 [`VmServices`] 在构造时注入，
//! 被映射的文件实现 [`MmFile`]。锁原语依赖 [`sync::register_arch_ops`]。

#![no_std]

extern crate alloc;

mod address;
mod config;
mod error;
mod fault;
mod file;
mod fork;
mod frame_table;
mod mmap;
mod ops;
mod page;
mod space;
mod spt;
mod swap;
mod vm;

#[cfg(test)]
mod tests;

pub use address::{Asid, Kva, PAGE_SIZE, Vaddr, Vpn, is_page_aligned, page_offset, page_round_down};
pub use config::VmConfig;
pub use error::{VmError, VmResult};
pub use fault::FaultFlags;
pub use file::{MmFile, OwnedFile};
pub use frame_table::{EvictionPolicy, Fifo, FrameId, FrameRef, FrameTable};
pub use ops::{ExecutionContext, FrameAllocator, Mmu, SwapDevice, VmServices};
pub use page::{
    AnonPage, Backing, FilePage, FileSlice, LoadContext, MapRegion, Page, PageInitializer,
    PageType, UninitPage, load_file_slice, load_zero,
};
pub use space::AddressSpace;
pub use spt::{PageHandle, SupplementalPageTable};
pub use swap::{SECTOR_SIZE, SECTORS_PER_SLOT, SwapTable};
pub use vm::Vm;
