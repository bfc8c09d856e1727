//! 架构相关操作的 Mock 实现

use std::sync::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Mock 架构操作
///
/// 中断开关只是一个全局布尔值；多个测试读写它时需先调用 [`MockArchOps::serialize`]。
pub struct MockArchOps {
    pub interrupt_state: AtomicBool,
    yields: AtomicUsize,
    serial: Mutex<()>,
}

impl MockArchOps {
    pub const fn new() -> Self {
        Self {
            interrupt_state: AtomicBool::new(true),
            yields: AtomicUsize::new(0),
            serial: Mutex::new(()),
        }
    }

    /// # Safety
    /// 仅用于测试环境。
    pub unsafe fn read_and_disable_interrupts(&self) -> usize {
        self.interrupt_state.swap(false, Ordering::SeqCst) as usize
    }

    /// # Safety
    /// flags 必须来自 [`MockArchOps::read_and_disable_interrupts`]。
    pub unsafe fn restore_interrupts(&self, flags: usize) {
        self.interrupt_state.store(flags != 0, Ordering::SeqCst);
    }

    pub fn yield_now(&self) {
        self.yields.fetch_add(1, Ordering::SeqCst);
        std::thread::yield_now();
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupt_state.load(Ordering::SeqCst)
    }

    /// 累计让出次数
    pub fn yields(&self) -> usize {
        self.yields.load(Ordering::SeqCst)
    }

    /// 串行化依赖中断状态的测试
    pub fn serialize(&self) -> MutexGuard<'_, ()> {
        self.serial.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockArchOps {
    fn default() -> Self {
        Self::new()
    }
}

/// 全局 Mock 实例
pub static MOCK_ARCH_OPS: MockArchOps = MockArchOps::new();
