//! Mock 实现模块

pub mod arch;
pub mod device;
pub mod fs;
pub mod mm;
pub mod sched;
