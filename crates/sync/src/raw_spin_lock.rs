//! 自旋锁实现
//!
//! 基于原子操作实现 [`lock_api::RawMutex`]，加锁期间禁用本地中断。

use crate::intr_guard::IntrGuard;
use core::{
    hint,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// 关中断自旋锁的原始实现。
///
/// 不可重入：持有锁时再次加锁会死锁。
#[derive(Debug)]
pub struct RawSpinLock {
    lock: AtomicBool,
    /// 加锁前的中断状态，仅由持锁者读写
    saved_intr: AtomicUsize,
}

unsafe impl lock_api::RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinLock {
        lock: AtomicBool::new(false),
        saved_intr: AtomicUsize::new(0),
    };

    type GuardMarker = lock_api::GuardNoSend;

    fn lock(&self) {
        let guard = IntrGuard::new();
        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hint::spin_loop();
        }
        self.saved_intr.store(guard.into_flags(), Ordering::Relaxed);
    }

    fn try_lock(&self) -> bool {
        let guard = IntrGuard::new();
        if self
            .lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            self.saved_intr.store(guard.into_flags(), Ordering::Relaxed);
            true
        } else {
            // guard 在此 drop，立即恢复中断
            false
        }
    }

    unsafe fn unlock(&self) {
        let flags = self.saved_intr.load(Ordering::Relaxed);
        self.lock.store(false, Ordering::Release);
        drop(IntrGuard::from_flags(flags));
    }

    fn is_locked(&self) -> bool {
        self.lock.load(Ordering::Relaxed)
    }
}

/// 提供对数据的互斥访问的自旋锁。
///
/// # 示例
/// ```ignore
/// let lock = SpinLock::new(0);
/// {
///     let mut guard = lock.lock();
///     *guard += 1;
/// }
/// ```
///
/// 持锁期间中断被禁用，不要在临界区内做 I/O 或让出 CPU。
pub type SpinLock<T> = lock_api::Mutex<RawSpinLock, T>;

/// [`SpinLock`] 的 RAII 保护器。
pub type SpinLockGuard<'a, T> = lock_api::MutexGuard<'a, RawSpinLock, T>;
