//! 子系统上下文

use alloc::boxed::Box;
use alloc::sync::Arc;

use log::info;
use sync::SleepLock;

use crate::config::VmConfig;
use crate::frame_table::{EvictionPolicy, Fifo, FrameTable};
use crate::ops::{ExecutionContext, Mmu, VmServices};
use crate::page::PageIo;
use crate::swap::SwapTable;

/// 所有地址空间共享的分页上下文
///
/// 持有全局帧表、交换表和文件 I/O 锁。内核通常只创建一个，
/// 测试可以各自创建互不影响的实例。
pub struct Vm {
    config: VmConfig,
    mmu: Arc<dyn Mmu>,
    exec: Arc<dyn ExecutionContext>,
    frames: FrameTable,
    swap: SwapTable,
    fs_lock: SleepLock<()>,
}

impl Vm {
    /// 以 FIFO 淘汰策略创建
    pub fn new(services: VmServices, config: VmConfig) -> Arc<Self> {
        Self::with_policy(services, config, Box::new(Fifo))
    }

    /// 以指定淘汰策略创建
    pub fn with_policy(
        services: VmServices,
        config: VmConfig,
        policy: Box<dyn EvictionPolicy>,
    ) -> Arc<Self> {
        let frames = FrameTable::new(services.frames, policy);
        let swap = SwapTable::new(services.swap);
        info!(
            "vm: {} swap slots, {} eviction, user space below {:#x}",
            swap.total_slots(),
            frames.policy_name(),
            config.user_end
        );
        Arc::new(Vm {
            config,
            mmu: services.mmu,
            exec: services.exec,
            frames,
            swap,
            fs_lock: SleepLock::new(()),
        })
    }

    /// 地址空间配置
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// 全局帧表
    pub fn frame_table(&self) -> &FrameTable {
        &self.frames
    }

    /// 交换表
    pub fn swap_table(&self) -> &SwapTable {
        &self.swap
    }

    /// 文件 I/O 锁
    ///
    /// 底层存储驱动不可重入，内核的文件系统调用也必须持有此锁。
    /// 持锁期间不得再获取其他锁。
    pub fn fs_lock(&self) -> &SleepLock<()> {
        &self.fs_lock
    }

    /// 当前驻留的帧数
    pub fn resident_frames(&self) -> usize {
        self.frames.resident_frames()
    }

    /// 空闲交换槽位数
    pub fn free_swap_slots(&self) -> usize {
        self.swap.free_slots()
    }

    pub(crate) fn mmu(&self) -> &dyn Mmu {
        &*self.mmu
    }

    pub(crate) fn exec(&self) -> &dyn ExecutionContext {
        &*self.exec
    }

    pub(crate) fn io(&self) -> PageIo<'_> {
        PageIo {
            swap: &self.swap,
            mmu: &*self.mmu,
            fs_lock: &self.fs_lock,
        }
    }
}
