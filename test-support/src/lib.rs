//! 测试支持 crate
//!
//! 提供分页子系统外部协作者的 Mock 实现：物理页分配器、MMU、交换盘、
//! 文件系统、调度上下文以及锁原语所需的架构操作。
//!
//! 这些 Mock 只暴露固有方法，不依赖被测 crate（避免循环依赖）；
//! 被测 crate 在 `cfg(test)` 下为它们实现自己的 trait。

pub mod mock;
