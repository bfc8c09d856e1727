//! 地址空间布局配置

use crate::address::{PAGE_SIZE, Vaddr};

/// 缺页处理所需的地址空间常量
///
/// 默认值对应 x86-64 用户空间布局。
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// 用户地址空间上界（不含）
    pub user_end: Vaddr,
    /// 用户栈顶
    pub user_stack_top: Vaddr,
    /// 用户栈最大大小（字节）
    pub max_stack_size: usize,
    /// 栈指针以下允许访问的余量（字节）
    pub stack_slack: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            user_end: 0x80_0400_0000,
            user_stack_top: 0x4748_0000,
            max_stack_size: 1 << 20,
            stack_slack: PAGE_SIZE,
        }
    }
}

impl VmConfig {
    /// `addr` 是否落在用户地址范围 `(0, user_end)` 内
    #[inline]
    pub fn is_user_addr(&self, addr: Vaddr) -> bool {
        addr != 0 && addr < self.user_end
    }

    /// `[addr, addr + len)` 是否整体位于用户地址范围内
    pub fn is_user_range(&self, addr: Vaddr, len: usize) -> bool {
        match addr.checked_add(len) {
            Some(end) => self.is_user_addr(addr) && end <= self.user_end,
            None => false,
        }
    }

    /// 栈可以增长到的最低地址
    #[inline]
    pub fn stack_limit(&self) -> Vaddr {
        self.user_stack_top.saturating_sub(self.max_stack_size)
    }
}
