//! 错误类型
//!
//! [`VmError`] 覆盖缺页处理、mmap 与地址空间复制的全部失败路径，
//! 可通过 [`VmError::to_errno()`] 转换为系统调用错误码。

use core::fmt;

/// 虚拟内存操作错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    // 致命的用户态错误
    /// 地址为空或不在用户地址范围内 (-EFAULT)
    InvalidAddress,
    /// 访问权限冲突，而非页不存在 (-EFAULT)
    ProtectionViolation,
    /// 写只读页 (-EACCES)
    WriteProtected,
    /// 既没有登记的页也不符合栈增长条件 (-EFAULT)
    NotMapped,

    // 资源耗尽
    /// 无法获得物理帧，淘汰也失败 (-ENOMEM)
    OutOfMemory,
    /// 交换区没有空闲槽位 (-ENOMEM)
    SwapFull,
    /// MMU 无法建立映射 (-ENOMEM)
    MapFailed,

    /// 后备存储读写失败 (-EIO)
    Io,
    /// 该地址已经登记了页 (-EEXIST)
    AlreadyMapped,
    /// 参数无效 (-EINVAL)
    InvalidArgument,
}

impl VmError {
    /// 转换为负的 errno
    pub fn to_errno(&self) -> isize {
        match self {
            VmError::Io => -5,
            VmError::OutOfMemory | VmError::SwapFull | VmError::MapFailed => -12,
            VmError::WriteProtected => -13,
            VmError::InvalidAddress | VmError::ProtectionViolation | VmError::NotMapped => -14,
            VmError::AlreadyMapped => -17,
            VmError::InvalidArgument => -22,
        }
    }

    /// 是否应当直接终止触发缺页的进程
    pub fn is_fatal_fault(&self) -> bool {
        matches!(
            self,
            VmError::InvalidAddress
                | VmError::ProtectionViolation
                | VmError::WriteProtected
                | VmError::NotMapped
        )
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            VmError::InvalidAddress => "invalid user address",
            VmError::ProtectionViolation => "protection violation",
            VmError::WriteProtected => "write to read-only page",
            VmError::NotMapped => "address not mapped",
            VmError::OutOfMemory => "out of memory",
            VmError::SwapFull => "swap space exhausted",
            VmError::MapFailed => "failed to install mapping",
            VmError::Io => "backing store I/O error",
            VmError::AlreadyMapped => "page already mapped",
            VmError::InvalidArgument => "invalid argument",
        };
        f.write_str(msg)
    }
}

/// 虚拟内存操作的结果类型
pub type VmResult<T> = Result<T, VmError>;
