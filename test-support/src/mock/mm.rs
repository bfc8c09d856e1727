//! 物理页分配器与 MMU 的 Mock 实现
//!
//! 物理页是堆上按页对齐的缓冲区，其地址直接充当内核虚拟地址（kva）；
//! MMU 用 `(asid, va)` 到页表项的映射表模拟硬件页表与脏位。

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Mock 使用的页大小
pub const MOCK_PAGE_SIZE: usize = 4096;

#[repr(C, align(4096))]
struct PageBuf([u8; MOCK_PAGE_SIZE]);

struct PoolInner {
    pages: Vec<Box<PageBuf>>,
    free: Vec<usize>,
    index: HashMap<usize, usize>,
}

/// 容量固定的物理页池
pub struct MockFrameAllocator {
    inner: Mutex<PoolInner>,
    allocs: AtomicUsize,
    frees: AtomicUsize,
}

impl MockFrameAllocator {
    /// 创建拥有 `capacity` 个物理页的页池
    pub fn new(capacity: usize) -> Self {
        let mut pages = Vec::with_capacity(capacity);
        let mut index = HashMap::new();
        for i in 0..capacity {
            let page = Box::new(PageBuf([0u8; MOCK_PAGE_SIZE]));
            index.insert(page.0.as_ptr() as usize, i);
            pages.push(page);
        }
        // 倒序压栈，使分配顺序与下标一致
        let free = (0..capacity).rev().collect();
        Self {
            inner: Mutex::new(PoolInner { pages, free, index }),
            allocs: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
        }
    }

    pub fn alloc_zeroed(&self) -> Option<usize> {
        let mut inner = self.inner.lock().unwrap();
        let idx = inner.free.pop()?;
        let page = &mut inner.pages[idx];
        page.0.fill(0);
        self.allocs.fetch_add(1, Ordering::SeqCst);
        Some(page.0.as_ptr() as usize)
    }

    pub fn free(&self, kva: usize) {
        let mut inner = self.inner.lock().unwrap();
        let idx = *inner
            .index
            .get(&kva)
            .unwrap_or_else(|| panic!("mock: freeing foreign page {kva:#x}"));
        assert!(!inner.free.contains(&idx), "mock: double free of {kva:#x}");
        inner.free.push(idx);
        self.frees.fetch_add(1, Ordering::SeqCst);
    }

    /// 当前已分配出去的页数
    pub fn in_use(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.pages.len() - inner.free.len()
    }

    pub fn total_allocs(&self) -> usize {
        self.allocs.load(Ordering::SeqCst)
    }

    pub fn total_frees(&self) -> usize {
        self.frees.load(Ordering::SeqCst)
    }
}

/// 模拟的页表项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPte {
    pub kva: usize,
    pub writable: bool,
    pub dirty: bool,
}

/// 模拟 MMU：所有地址空间共用一张 `(asid, va) -> MockPte` 表
pub struct MockMmu {
    table: Mutex<HashMap<(usize, usize), MockPte>>,
    fail_next_map: AtomicBool,
}

impl MockMmu {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            fail_next_map: AtomicBool::new(false),
        }
    }

    pub fn map(&self, asid: usize, va: usize, kva: usize, writable: bool) -> bool {
        if self.fail_next_map.swap(false, Ordering::SeqCst) {
            return false;
        }
        let mut table = self.table.lock().unwrap();
        if table.contains_key(&(asid, va)) {
            return false;
        }
        table.insert(
            (asid, va),
            MockPte {
                kva,
                writable,
                dirty: false,
            },
        );
        true
    }

    pub fn unmap(&self, asid: usize, va: usize) {
        self.table.lock().unwrap().remove(&(asid, va));
    }

    pub fn is_dirty(&self, asid: usize, va: usize) -> bool {
        self.table
            .lock()
            .unwrap()
            .get(&(asid, va))
            .is_some_and(|pte| pte.dirty)
    }

    pub fn set_dirty(&self, asid: usize, va: usize, dirty: bool) {
        if let Some(pte) = self.table.lock().unwrap().get_mut(&(asid, va)) {
            pte.dirty = dirty;
        }
    }

    /// 让下一次 `map` 失败（模拟页表页耗尽）
    pub fn fail_next_map(&self) {
        self.fail_next_map.store(true, Ordering::SeqCst);
    }

    /// 查询 `(asid, va)` 所在页的页表项，`va` 会被向下对齐到页边界
    pub fn pte(&self, asid: usize, va: usize) -> Option<MockPte> {
        let page = va & !(MOCK_PAGE_SIZE - 1);
        self.table.lock().unwrap().get(&(asid, page)).copied()
    }

    /// 某地址空间当前的映射数
    pub fn mapped_count(&self, asid: usize) -> usize {
        self.table
            .lock()
            .unwrap()
            .keys()
            .filter(|(a, _)| *a == asid)
            .count()
    }

    /// 模拟用户态读：页不存在时返回 `None`（即触发缺页）
    pub fn user_read(&self, asid: usize, va: usize, len: usize) -> Option<Vec<u8>> {
        let pte = self.pte(asid, va)?;
        let off = va & (MOCK_PAGE_SIZE - 1);
        assert!(off + len <= MOCK_PAGE_SIZE, "mock: read crosses a page");
        // SAFETY: kva 指向 MockFrameAllocator 中仍然存活的页
        let bytes = unsafe { std::slice::from_raw_parts((pte.kva + off) as *const u8, len) };
        Some(bytes.to_vec())
    }

    /// 模拟用户态写：页不存在或只读时返回 `false`，成功时置脏位
    pub fn user_write(&self, asid: usize, va: usize, data: &[u8]) -> bool {
        let page = va & !(MOCK_PAGE_SIZE - 1);
        let mut table = self.table.lock().unwrap();
        let Some(pte) = table.get_mut(&(asid, page)) else {
            return false;
        };
        if !pte.writable {
            return false;
        }
        let off = va & (MOCK_PAGE_SIZE - 1);
        assert!(off + data.len() <= MOCK_PAGE_SIZE, "mock: write crosses a page");
        // SAFETY: 同上
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), (pte.kva + off) as *mut u8, data.len());
        }
        pte.dirty = true;
        true
    }
}

impl Default for MockMmu {
    fn default() -> Self {
        Self::new()
    }
}
