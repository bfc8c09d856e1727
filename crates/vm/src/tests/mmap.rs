use super::*;
use crate::{Backing, PageType, VmError};

#[test]
fn test_one_byte_mapping() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let file = open_file(b"abcdefghij");
    let addr = page_va(0);

    assert_eq!(space.mmap(addr, 1, true, &*file, 0), Ok(addr));
    let page = h.read_page(&space, addr);
    assert_eq!(page[0], b'a');
    assert!(page[1..].iter().all(|&b| b == 0));

    h.write(&space, addr, b"Z").unwrap();
    space.munmap(addr).unwrap();

    assert_eq!(file.write_log(), vec![(0, 1)]);
    assert_eq!(file.contents(), b"Zbcdefghij".to_vec());
}

#[test]
fn test_partial_last_page() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let data: Vec<u8> = (0..6000).map(|i| (i % 251) as u8 + 1).collect();
    let file = open_file(&data);
    let addr = page_va(0);
    let tail = addr + PAGE_SIZE;

    space.mmap(addr, data.len(), true, &*file, 0).unwrap();
    assert_eq!(space.spt().len(), 2);

    let second = h.read_page(&space, tail);
    let valid = data.len() - PAGE_SIZE;
    assert_eq!(&second[..valid], &data[PAGE_SIZE..]);
    assert!(second[valid..].iter().all(|&b| b == 0));
    match space.find_page(tail).unwrap().lock().backing() {
        Backing::File(page) => {
            assert_eq!(page.offset(), PAGE_SIZE);
            assert_eq!(page.read_bytes(), valid);
            assert_eq!(page.zero_bytes(), PAGE_SIZE - valid);
            assert_eq!(page.file().mapping_count(), 2);
        }
        other => panic!("expected a file page, got {:?}", other),
    }

    // 写入补零区域不会扩展文件
    h.write(&space, tail + 3000, &[0xee; 8]).unwrap();
    space.munmap(addr).unwrap();

    assert_eq!(file.write_log(), vec![(PAGE_SIZE, valid)]);
    assert_eq!(file.length(), data.len());
    assert_eq!(file.contents(), data);
}

#[test]
fn test_mapping_longer_than_file() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let file = open_file(&[7u8; 100]);
    let addr = page_va(0);

    space.mmap(addr, 2 * PAGE_SIZE, true, &*file, 0).unwrap();
    let first = h.read_page(&space, addr);
    assert_eq!(&first[..100], &[7u8; 100]);
    assert!(first[100..].iter().all(|&b| b == 0));
    assert_eq!(h.read_page(&space, addr + PAGE_SIZE), vec![0u8; PAGE_SIZE]);

    h.write(&space, addr + PAGE_SIZE, &[1; 4]).unwrap();
    h.write(&space, addr + 50, &[2; 4]).unwrap();
    space.munmap(addr).unwrap();

    // 第二页完全在文件末尾之后，不写回
    assert_eq!(file.write_log(), vec![(0, 100)]);
    assert_eq!(&file.contents()[50..54], &[2; 4]);
}

#[test]
fn test_unmap_clean_page_writes_nothing() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let file = open_file(&pattern(2));
    let addr = page_va(0);

    space.mmap(addr, PAGE_SIZE, true, &*file, 0).unwrap();
    assert_eq!(h.read_page(&space, addr), pattern(2));
    space.munmap(addr).unwrap();

    assert!(file.write_log().is_empty());
    assert!(space.spt().is_empty());
    assert_eq!(h.frames.in_use(), 0);
    assert_eq!(h.mmu.mapped_count(1), 0);
}

#[test]
fn test_unmap_untouched_mapping() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let file = open_file(&pattern(2));
    let addr = page_va(0);

    space.mmap(addr, 3 * PAGE_SIZE, false, &*file, 0).unwrap();
    assert_eq!(space.page_type(addr), Some(PageType::File));
    space.munmap(addr).unwrap();

    assert!(space.spt().is_empty());
    assert_eq!(file.read_calls(), 0);
    assert_eq!(file.dup_count(), 1);
}

#[test]
fn test_mapping_outlives_original_handle() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let data = pattern(4);
    let file = open_file(&data);
    let addr = page_va(0);

    space.mmap(addr, 2 * PAGE_SIZE, true, &*file, 0).unwrap();
    assert_eq!(file.dup_count(), 3);
    assert_eq!(file.mapping_count(), 2);

    file.close();
    assert_eq!(file.dup_count(), 2);
    assert_eq!(h.read_page(&space, addr), data);

    space.munmap(addr).unwrap();
    assert_eq!(file.dup_count(), 0);
    assert_eq!(file.mapping_count(), 0);
}

#[test]
fn test_mapping_with_offset() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let mut data = pattern(1);
    data.extend(pattern(2));
    let file = open_file(&data);
    let addr = page_va(0);

    space.mmap(addr, PAGE_SIZE, true, &*file, PAGE_SIZE).unwrap();
    assert_eq!(h.read_page(&space, addr), pattern(2));

    h.write(&space, addr, &[0; 4]).unwrap();
    space.munmap(addr).unwrap();
    assert_eq!(file.write_log(), vec![(PAGE_SIZE, PAGE_SIZE)]);
}

#[test]
fn test_mmap_rejects_bad_arguments() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let file = open_file(&pattern(0));
    let addr = page_va(0);
    let user_end = h.vm.config().user_end;

    assert_eq!(space.mmap(addr, 0, true, &*file, 0), Err(VmError::InvalidArgument));
    assert_eq!(space.mmap(addr, 10, true, &*file, 1), Err(VmError::InvalidArgument));
    assert_eq!(space.mmap(0, 10, true, &*file, 0), Err(VmError::InvalidAddress));
    assert_eq!(space.mmap(addr + 1, 10, true, &*file, 0), Err(VmError::InvalidAddress));
    assert_eq!(
        space.mmap(user_end - PAGE_SIZE, 2 * PAGE_SIZE, true, &*file, 0),
        Err(VmError::InvalidAddress)
    );
    assert_eq!(
        space.mmap(addr, 2 * PAGE_SIZE, true, &*file, usize::MAX & !(PAGE_SIZE - 1)),
        Err(VmError::InvalidArgument)
    );
    assert!(space.spt().is_empty());
    assert_eq!(file.dup_count(), 1);
}

#[test]
fn test_mmap_overlap_leaves_no_partial_chain() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let file = open_file(&pattern(0));
    space.allocate_page(PageType::Anon, page_va(2), true).unwrap();

    assert_eq!(
        space.mmap(page_va(0), 3 * PAGE_SIZE, true, &*file, 0),
        Err(VmError::AlreadyMapped)
    );
    assert_eq!(space.spt().len(), 1);
    assert_eq!(file.dup_count(), 1);
    assert_eq!(file.mapping_count(), 0);
}

#[test]
fn test_munmap_requires_region_base() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let file = open_file(&pattern(0));
    let addr = page_va(0);
    space.mmap(addr, 2 * PAGE_SIZE, true, &*file, 0).unwrap();
    space.allocate_page(PageType::Anon, page_va(8), true).unwrap();

    assert_eq!(space.munmap(addr + PAGE_SIZE), Err(VmError::InvalidArgument));
    assert_eq!(space.munmap(page_va(8)), Err(VmError::InvalidArgument));
    assert_eq!(space.munmap(page_va(20)), Err(VmError::NotMapped));
    assert_eq!(space.spt().len(), 3);
}

#[test]
fn test_read_only_mapping_rejects_writes() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let file = open_file(&pattern(6));
    let addr = page_va(0);
    space.mmap(addr, PAGE_SIZE, false, &*file, 0).unwrap();

    assert_eq!(h.write(&space, addr, &[1]), Err(VmError::WriteProtected));
    assert_eq!(h.read_page(&space, addr), pattern(6));
    assert_eq!(h.write(&space, addr, &[1]), Err(VmError::ProtectionViolation));
}

#[test]
fn test_destroy_writes_back_dirty_mapping() {
    let h = Harness::new(4, 4);
    let file = open_file(&pattern(3));
    let addr = page_va(0);
    {
        let space = h.space(1);
        space.mmap(addr, PAGE_SIZE, true, &*file, 0).unwrap();
        h.write(&space, addr + 100, b"exit").unwrap();
    }
    assert_eq!(&file.contents()[100..104], b"exit");
    assert_eq!(file.dup_count(), 1);
    assert_eq!(h.frames.in_use(), 0);
}

#[test]
fn test_two_mappings_of_same_file() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let file = open_file(&pattern(8));
    let (a, b) = (page_va(0), page_va(4));

    space.mmap(a, PAGE_SIZE, true, &*file, 0).unwrap();
    space.mmap(b, PAGE_SIZE, true, &*file, 0).unwrap();
    assert_eq!(file.mapping_count(), 2);

    h.write(&space, a, b"first").unwrap();
    space.munmap(a).unwrap();
    assert_eq!(file.mapping_count(), 1);
    // 第二个映射首次读入时看到写回的数据
    assert_eq!(h.read(&space, b, 5).unwrap(), b"first".to_vec());
}

#[test]
fn test_munmap_closes_handles_still_referenced() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let file = open_file(&pattern(5));
    let addr = page_va(0);
    space.mmap(addr, 2 * PAGE_SIZE, true, &*file, 0).unwrap();
    h.write(&space, addr, b"held").unwrap();
    let touched = space.find_page(addr).unwrap();
    let untouched = space.find_page(addr + PAGE_SIZE).unwrap();

    space.munmap(addr).unwrap();
    assert_eq!(file.dup_count(), 1);
    assert_eq!(file.mapping_count(), 0);
    assert_eq!(&file.contents()[..4], b"held");
    assert!(!touched.lock().is_resident());
    assert_eq!(h.frames.in_use(), 0);

    drop(touched);
    drop(untouched);
    assert_eq!(file.dup_count(), 1);
    assert_eq!(file.write_log().len(), 1);
}

#[test]
fn test_munmap_leaves_reused_address_alone() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let file = open_file(&pattern(0));
    let base = page_va(0);
    space.mmap(base, 3 * PAGE_SIZE, true, &*file, 0).unwrap();
    space.remove_page(page_va(1)).unwrap();
    space.allocate_page(PageType::Anon, page_va(1), true).unwrap();
    h.write(&space, page_va(1), &[0x77; 8]).unwrap();

    space.munmap(base).unwrap();
    assert_eq!(space.spt().len(), 1);
    assert_eq!(space.page_type(page_va(1)), Some(PageType::Anon));
    assert_eq!(h.read(&space, page_va(1), 8).unwrap(), vec![0x77; 8]);
    assert_eq!(file.mapping_count(), 0);
    assert_eq!(file.dup_count(), 1);
}

#[test]
fn test_munmap_after_base_page_removed() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let file = open_file(&[pattern(0), pattern(1), pattern(2)].concat());
    let base = page_va(0);
    space.mmap(base, 3 * PAGE_SIZE, true, &*file, 0).unwrap();
    h.write(&space, page_va(2), b"tail").unwrap();
    space.remove_page(base).unwrap();

    space.munmap(base).unwrap();
    assert!(space.spt().is_empty());
    assert_eq!(&file.contents()[2 * PAGE_SIZE..2 * PAGE_SIZE + 4], b"tail");
    assert_eq!(file.mapping_count(), 0);
    assert_eq!(space.munmap(base), Err(VmError::NotMapped));
}

#[test]
fn test_failed_file_populate_releases_frame() {
    let h = Harness::new(4, 4);
    let space = h.space(1);
    let file = open_file(&pattern(5));
    let addr = page_va(0);
    space.mmap(addr, PAGE_SIZE, true, &*file, 0).unwrap();

    file.set_fail_io(true);
    assert_eq!(space.claim_page(addr), Err(VmError::Io));
    assert_eq!(h.read(&space, addr, 1), Err(VmError::Io));
    assert!(!space.is_resident(addr));
    assert_eq!(space.find_page(addr).unwrap().lock().kind(), PageType::Uninit);
    assert!(h.mmu.pte(1, addr).is_none());
    assert_eq!(h.frames.in_use(), 0);
    assert_eq!(h.vm.resident_frames(), 0);

    file.set_fail_io(false);
    assert_eq!(h.read_page(&space, addr), pattern(5));
}
