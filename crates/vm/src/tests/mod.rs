// Unit tests for the paging subsystem, run on the host against the `test-support` mocks.
//
// The mocks only expose inherent methods; the collaborator traits are implemented for
// them here. `Harness` wires one isolated `Vm` per test.

extern crate std;

use std::boxed::Box;
use std::sync::{Arc, Once};
use std::vec;
use std::vec::Vec;

use test_support::mock::arch::MOCK_ARCH_OPS;
use test_support::mock::device::MockSwapDisk;
use test_support::mock::fs::MockFile;
use test_support::mock::mm::{MockFrameAllocator, MockMmu};
use test_support::mock::sched::MockExecContext;

use crate::{
    AddressSpace, Asid, EvictionPolicy, ExecutionContext, FaultFlags, FrameAllocator, Kva,
    MmFile, Mmu, PAGE_SIZE, SECTORS_PER_SLOT, SwapDevice, Vaddr, Vm, VmConfig, VmResult,
    VmServices,
};

mod mmap;

impl FrameAllocator for MockFrameAllocator {
    fn alloc_zeroed(&self) -> Option<Kva> {
        MockFrameAllocator::alloc_zeroed(self)
    }

    fn free(&self, kva: Kva) {
        MockFrameAllocator::free(self, kva)
    }
}

impl Mmu for MockMmu {
    fn map(&self, asid: Asid, va: Vaddr, kva: Kva, writable: bool) -> bool {
        MockMmu::map(self, asid, va, kva, writable)
    }

    fn unmap(&self, asid: Asid, va: Vaddr) {
        MockMmu::unmap(self, asid, va)
    }

    fn is_dirty(&self, asid: Asid, va: Vaddr) -> bool {
        MockMmu::is_dirty(self, asid, va)
    }

    fn set_dirty(&self, asid: Asid, va: Vaddr, dirty: bool) {
        MockMmu::set_dirty(self, asid, va, dirty)
    }
}

impl SwapDevice for MockSwapDisk {
    fn sector_count(&self) -> usize {
        MockSwapDisk::sector_count(self)
    }

    fn read_sector(&self, sector: usize, buf: &mut [u8]) -> bool {
        MockSwapDisk::read_sector(self, sector, buf)
    }

    fn write_sector(&self, sector: usize, buf: &[u8]) -> bool {
        MockSwapDisk::write_sector(self, sector, buf)
    }
}

impl ExecutionContext for MockExecContext {
    fn user_stack_pointer(&self) -> Vaddr {
        MockExecContext::user_stack_pointer(self)
    }
}

impl MmFile for MockFile {
    fn reopen(&self) -> Result<Arc<dyn MmFile>, isize> {
        let file: Arc<dyn MmFile> = MockFile::reopen(self).ok_or(-9isize)?;
        Ok(file)
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, isize> {
        MockFile::read_at(self, offset, buf).ok_or(-5)
    }

    fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, isize> {
        MockFile::write_at(self, offset, buf).ok_or(-5)
    }

    fn length(&self) -> usize {
        MockFile::length(self)
    }

    fn close(&self) {
        MockFile::close(self)
    }

    fn dup_count(&self) -> usize {
        MockFile::dup_count(self)
    }

    fn mapping_count(&self) -> usize {
        MockFile::mapping_count(self)
    }

    fn inc_mapping(&self) {
        MockFile::inc_mapping(self)
    }

    fn dec_mapping(&self) {
        MockFile::dec_mapping(self)
    }
}

/// 把锁原语的架构操作转发给全局 Mock
struct TestArch;

impl sync::ArchOps for TestArch {
    unsafe fn read_and_disable_interrupts(&self) -> usize {
        unsafe { MOCK_ARCH_OPS.read_and_disable_interrupts() }
    }

    unsafe fn restore_interrupts(&self, flags: usize) {
        unsafe { MOCK_ARCH_OPS.restore_interrupts(flags) }
    }

    fn yield_now(&self) {
        MOCK_ARCH_OPS.yield_now()
    }
}

static TEST_ARCH: TestArch = TestArch;
static INIT: Once = Once::new();

fn setup() {
    INIT.call_once(|| unsafe { sync::register_arch_ops(&TEST_ARCH) });
}

/// 代码段附近的普通用户地址
const USER_BASE: Vaddr = 0x40_0000;

/// 第 `i` 个测试页
fn page_va(i: usize) -> Vaddr {
    USER_BASE + i * PAGE_SIZE
}

/// 一个测试用的独立分页上下文
struct Harness {
    vm: Arc<Vm>,
    frames: Arc<MockFrameAllocator>,
    mmu: Arc<MockMmu>,
    disk: Arc<MockSwapDisk>,
    exec: Arc<MockExecContext>,
}

impl Harness {
    fn new(frames: usize, swap_slots: usize) -> Self {
        Self::build(frames, swap_slots, None)
    }

    fn with_policy(frames: usize, swap_slots: usize, policy: Box<dyn EvictionPolicy>) -> Self {
        Self::build(frames, swap_slots, Some(policy))
    }

    fn build(frames: usize, swap_slots: usize, policy: Option<Box<dyn EvictionPolicy>>) -> Self {
        setup();
        let config = VmConfig::default();
        let frame_pool = Arc::new(MockFrameAllocator::new(frames));
        let mmu = Arc::new(MockMmu::new());
        let disk = Arc::new(MockSwapDisk::new(swap_slots * SECTORS_PER_SLOT));
        let exec = Arc::new(MockExecContext::new(config.user_stack_top));
        let services = VmServices {
            frames: frame_pool.clone(),
            mmu: mmu.clone(),
            swap: disk.clone(),
            exec: exec.clone(),
        };
        let vm = match policy {
            Some(policy) => Vm::with_policy(services, config, policy),
            None => Vm::new(services, config),
        };
        Harness {
            vm,
            frames: frame_pool,
            mmu,
            disk,
            exec,
        }
    }

    fn space(&self, asid: Asid) -> AddressSpace {
        AddressSpace::new(self.vm.clone(), asid)
    }

    /// 模拟用户态读：页不存在时先触发缺页
    fn read(&self, space: &AddressSpace, va: Vaddr, len: usize) -> VmResult<Vec<u8>> {
        if let Some(bytes) = self.mmu.user_read(space.asid(), va, len) {
            return Ok(bytes);
        }
        space.handle_fault(va, FaultFlags::USER | FaultFlags::NOT_PRESENT)?;
        Ok(self
            .mmu
            .user_read(space.asid(), va, len)
            .expect("page must be mapped after a resolved fault"))
    }

    /// 模拟用户态写：页不存在时触发缺页，只读页触发权限冲突
    fn write(&self, space: &AddressSpace, va: Vaddr, data: &[u8]) -> VmResult<()> {
        if self.mmu.user_write(space.asid(), va, data) {
            return Ok(());
        }
        let mut flags = FaultFlags::USER | FaultFlags::WRITE;
        if self.mmu.pte(space.asid(), va).is_none() {
            flags |= FaultFlags::NOT_PRESENT;
        }
        space.handle_fault(va, flags)?;
        assert!(self.mmu.user_write(space.asid(), va, data));
        Ok(())
    }

    /// 读出一整页
    fn read_page(&self, space: &AddressSpace, va: Vaddr) -> Vec<u8> {
        self.read(space, va, PAGE_SIZE).expect("page must be readable")
    }
}

/// 以 `seed` 生成一页可辨认的内容
fn pattern(seed: u8) -> Vec<u8> {
    (0..PAGE_SIZE)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// 以给定内容创建文件，返回最初打开的句柄
fn open_file(data: &[u8]) -> Arc<MockFile> {
    MockFile::open(data)
}
