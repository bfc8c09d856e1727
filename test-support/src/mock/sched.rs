//! 调度上下文的 Mock 实现

use std::sync::atomic::{AtomicUsize, Ordering};

/// 当前线程的执行上下文，只记录用户栈指针
pub struct MockExecContext {
    user_sp: AtomicUsize,
}

impl MockExecContext {
    pub const fn new(user_sp: usize) -> Self {
        Self {
            user_sp: AtomicUsize::new(user_sp),
        }
    }

    pub fn user_stack_pointer(&self) -> usize {
        self.user_sp.load(Ordering::SeqCst)
    }

    pub fn set_user_stack_pointer(&self, sp: usize) {
        self.user_sp.store(sp, Ordering::SeqCst);
    }
}
