//! 匿名页

use crate::error::VmResult;
use crate::swap::SwapTable;

/// 匿名页的后备状态
#[derive(Debug, Default)]
pub struct AnonPage {
    swap_slot: Option<usize>,
}

impl AnonPage {
    /// 尚未换出过的匿名页
    pub fn new() -> Self {
        AnonPage { swap_slot: None }
    }

    /// 内容当前所在的交换槽
    pub fn swap_slot(&self) -> Option<usize> {
        self.swap_slot
    }

    /// 有交换槽时读回内容；否则帧保持清零
    pub(crate) fn swap_in(&mut self, buf: &mut [u8], swap: &SwapTable) -> VmResult<()> {
        match self.swap_slot {
            Some(slot) => {
                swap.swap_in(slot, buf)?;
                self.swap_slot = None;
            }
            None => buf.fill(0),
        }
        Ok(())
    }

    pub(crate) fn swap_out(&mut self, buf: &[u8], swap: &SwapTable) -> VmResult<()> {
        debug_assert!(self.swap_slot.is_none());
        self.swap_slot = Some(swap.swap_out(buf)?);
        Ok(())
    }

    pub(crate) fn destroy(&mut self, swap: &SwapTable) {
        if let Some(slot) = self.swap_slot.take() {
            swap.free(slot);
        }
    }
}
