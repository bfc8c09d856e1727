//! 睡眠锁实现
//!
//! 竞争失败时通过 [`crate::ArchOps::yield_now`] 让出 CPU，持锁期间保持中断开启，
//! 因此临界区内可以执行阻塞 I/O。

use crate::arch_ops;
use core::sync::atomic::{AtomicBool, Ordering};

/// 让出式互斥锁的原始实现。
#[derive(Debug)]
pub struct RawSleepLock {
    lock: AtomicBool,
}

unsafe impl lock_api::RawMutex for RawSleepLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSleepLock {
        lock: AtomicBool::new(false),
    };

    // 持锁线程可能在临界区内被抢占，但 guard 不跨线程移动
    type GuardMarker = lock_api::GuardNoSend;

    fn lock(&self) {
        while !self.try_lock() {
            arch_ops().yield_now();
        }
    }

    fn try_lock(&self) -> bool {
        self.lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.lock.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.lock.load(Ordering::Relaxed)
    }
}

/// 可在临界区内阻塞的互斥锁。
pub type SleepLock<T> = lock_api::Mutex<RawSleepLock, T>;

/// [`SleepLock`] 的 RAII 保护器。
pub type SleepLockGuard<'a, T> = lock_api::MutexGuard<'a, RawSleepLock, T>;
