//! 地址与页号

/// 页大小（字节）
pub const PAGE_SIZE: usize = 4096;

const PAGE_SHIFT: usize = 12;

/// 用户虚拟地址
pub type Vaddr = usize;

/// 内核可直接访问的物理页地址
pub type Kva = usize;

/// 地址空间标识，传给 MMU 区分不同进程的页表
pub type Asid = usize;

/// 向下对齐到页边界
#[inline]
pub const fn page_round_down(addr: Vaddr) -> Vaddr {
    addr & !(PAGE_SIZE - 1)
}

/// 页内偏移
#[inline]
pub const fn page_offset(addr: Vaddr) -> usize {
    addr & (PAGE_SIZE - 1)
}

/// 是否按页对齐
#[inline]
pub const fn is_page_aligned(addr: usize) -> bool {
    page_offset(addr) == 0
}

/// 虚拟页号，补充页表的键
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Vpn(usize);

impl Vpn {
    /// 包含 `addr` 的页的页号
    #[inline]
    pub const fn from_addr_floor(addr: Vaddr) -> Self {
        Vpn(addr >> PAGE_SHIFT)
    }

    /// 该页的起始地址
    #[inline]
    pub const fn start_addr(self) -> Vaddr {
        self.0 << PAGE_SHIFT
    }

    /// 页号的原始数值
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

/// 以字节切片的形式访问一个物理页
///
/// # Safety
/// `kva` 必须指向一个存活的物理页，且调用期间没有其他可变引用
pub(crate) unsafe fn frame_bytes<'a>(kva: Kva) -> &'a [u8] {
    unsafe { core::slice::from_raw_parts(kva as *const u8, PAGE_SIZE) }
}

/// 以可变字节切片的形式访问一个物理页
///
/// # Safety
/// `kva` 必须指向一个存活的物理页，且由调用者独占
pub(crate) unsafe fn frame_bytes_mut<'a>(kva: Kva) -> &'a mut [u8] {
    unsafe { core::slice::from_raw_parts_mut(kva as *mut u8, PAGE_SIZE) }
}
