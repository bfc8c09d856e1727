//! 补充页表
//!
//! 每个地址空间一份，从页号映射到 [`Page`]。页表拥有其中的所有页，
//! 页本身由睡眠锁保护，查找只克隆句柄，不持有表锁做任何耗时操作。

use alloc::sync::Arc;
use alloc::vec::Vec;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use sync::{SleepLock, SpinLock};

use crate::address::{Vaddr, Vpn};
use crate::error::{VmError, VmResult};
use crate::page::Page;

/// 页句柄
pub type PageHandle = Arc<SleepLock<Page>>;

/// 补充页表
pub struct SupplementalPageTable {
    pages: SpinLock<HashMap<Vpn, PageHandle>>,
}

impl SupplementalPageTable {
    /// 空表
    pub fn new() -> Self {
        SupplementalPageTable {
            pages: SpinLock::new(HashMap::new()),
        }
    }

    /// 查找包含 `addr` 的页；空地址视为未命中
    pub fn find(&self, addr: Vaddr) -> Option<PageHandle> {
        if addr == 0 {
            return None;
        }
        self.pages.lock().get(&Vpn::from_addr_floor(addr)).cloned()
    }

    /// 是否已登记包含 `addr` 的页
    pub fn contains(&self, addr: Vaddr) -> bool {
        self.pages.lock().contains_key(&Vpn::from_addr_floor(addr))
    }

    /// 页数
    pub fn len(&self) -> usize {
        self.pages.lock().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.pages.lock().is_empty()
    }

    /// 按地址排序的全部页
    pub fn entries(&self) -> Vec<(Vaddr, PageHandle)> {
        let mut entries: Vec<_> = self
            .pages
            .lock()
            .iter()
            .map(|(vpn, handle)| (vpn.start_addr(), handle.clone()))
            .collect();
        entries.sort_unstable_by_key(|(va, _)| *va);
        entries
    }

    /// 登记新页，地址已存在时失败且原有的页保持不变
    pub(crate) fn insert(&self, page: Page) -> VmResult<PageHandle> {
        let vpn = Vpn::from_addr_floor(page.va());
        let mut pages = self.pages.lock();
        match pages.entry(vpn) {
            Entry::Occupied(_) => Err(VmError::AlreadyMapped),
            Entry::Vacant(slot) => {
                let handle = Arc::new(SleepLock::new(page));
                slot.insert(handle.clone());
                Ok(handle)
            }
        }
    }

    /// 摘下包含 `addr` 的页，不做销毁
    pub(crate) fn detach(&self, addr: Vaddr) -> Option<PageHandle> {
        self.pages.lock().remove(&Vpn::from_addr_floor(addr))
    }

    /// 一次性摘下所有页，表随即为空
    pub(crate) fn drain(&self) -> Vec<PageHandle> {
        let pages = core::mem::take(&mut *self.pages.lock());
        pages.into_values().collect()
    }
}

impl Default for SupplementalPageTable {
    fn default() -> Self {
        Self::new()
    }
}
