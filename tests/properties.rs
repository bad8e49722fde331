use fixed_alloc::{site, AllocatorError, BlockAllocator, BlockInfo, HEADER_SIZE};
use proptest::prelude::*;
use test_log::test;

const CAPACITY: usize = 4096;

type Heap = BlockAllocator<CAPACITY>;

fn new_heap() -> Box<Heap> {
    Box::new(Heap::new())
}

fn blocks(heap: &Heap) -> Vec<BlockInfo> {
    heap.blocks().collect()
}

fn check_invariants(heap: &Heap) -> Result<(), TestCaseError> {
    let blocks = blocks(heap);
    let mut offset = 0;
    for block in &blocks {
        prop_assert_eq!(block.offset, offset, "gap or overlap in {:?}", heap);
        prop_assert_eq!(block.size % 8, 0);
        offset += HEADER_SIZE + block.size;
    }
    prop_assert_eq!(offset, CAPACITY);
    for pair in blocks.windows(2) {
        prop_assert!(pair[0].in_use || pair[1].in_use, "adjacent free blocks in {:?}", heap);
    }
    Ok(())
}

#[test]
fn default_capacity() {
    let heap = Box::new(BlockAllocator::<{ fixed_alloc::DEFAULT_CAPACITY }>::default());
    assert_eq!(heap.capacity(), 32768);
    assert_eq!(heap.max_payload(), 32768 - HEADER_SIZE);
}

#[test]
fn out_of_memory_boundary() {
    let heap = new_heap();
    let max = CAPACITY - HEADER_SIZE;
    assert_eq!(
        heap.try_allocate(max + 1),
        Err(AllocatorError::InvalidSize {
            requested: max + 1,
            max
        })
    );
    assert!(heap.allocate(max, site!()).is_some());
    assert_eq!(
        heap.try_allocate(1),
        Err(AllocatorError::OutOfMemory { requested: 8 })
    );
    assert_eq!(heap.usage().free_bytes, 0);
}

#[test]
fn round_trip_restores_capacity() {
    let heap = new_heap();
    let keep = heap.allocate(40, site!()).unwrap();
    let before = heap.usage();

    let ptr = heap.allocate(200, site!()).unwrap();
    heap.deallocate(ptr.as_ptr(), site!());
    assert_eq!(heap.usage(), before);

    heap.deallocate(keep.as_ptr(), site!());
    assert!(heap.is_pristine());
}

#[test]
fn coalesce_three() {
    let heap = new_heap();
    let a = heap.allocate(24, site!()).unwrap();
    let b = heap.allocate(24, site!()).unwrap();
    let c = heap.allocate(24, site!()).unwrap();
    let guard = heap.allocate(24, site!()).unwrap();

    heap.deallocate(a.as_ptr(), site!());
    heap.deallocate(c.as_ptr(), site!());
    heap.deallocate(b.as_ptr(), site!());

    let blocks = blocks(&heap);
    assert_eq!(
        blocks[0],
        BlockInfo {
            offset: 0,
            size: 3 * 24 + 2 * HEADER_SIZE,
            in_use: false
        }
    );
    assert!(blocks[1].in_use);
    heap.deallocate(guard.as_ptr(), site!());
    assert!(heap.is_pristine());
}

#[test]
fn double_free_leaves_block_free() {
    let heap = new_heap();
    let a = heap.allocate(8, site!()).unwrap();
    let _b = heap.allocate(8, site!()).unwrap();
    heap.deallocate(a.as_ptr(), site!());
    let before = blocks(&heap);

    assert_eq!(
        heap.try_deallocate(a.as_ptr()),
        Err(AllocatorError::DoubleFree { offset: HEADER_SIZE })
    );
    assert_eq!(blocks(&heap), before);
    assert!(!before[0].in_use);
}

#[test]
fn errors_do_not_poison() {
    let heap = new_heap();
    heap.deallocate(std::ptr::null_mut(), site!());
    assert!(heap.allocate(0, site!()).is_none());
    let mut local = [0u8; 8];
    heap.deallocate(local.as_mut_ptr(), site!());

    let ptr = heap.allocate(16, site!()).unwrap();
    heap.deallocate(ptr.as_ptr(), site!());
    assert!(heap.is_pristine());
}

#[derive(Clone, Debug)]
enum Op {
    Alloc(usize),
    Free(prop::sample::Index),
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            3 => (1usize..600).prop_map(Op::Alloc),
            2 => any::<prop::sample::Index>().prop_map(Op::Free),
        ],
        1..100,
    )
}

proptest! {
    #[test]
    fn tiling_and_alignment(ops in ops()) {
        let heap = new_heap();
        let base = heap.allocate(8, site!()).unwrap().as_ptr() as usize - HEADER_SIZE;
        let mut live = Vec::new();
        for op in ops {
            match op {
                Op::Alloc(size) => {
                    if let Ok(ptr) = heap.try_allocate(size) {
                        prop_assert_eq!((ptr.as_ptr() as usize - base) % 8, 0);
                        live.push(ptr);
                    }
                }
                Op::Free(index) => {
                    if !live.is_empty() {
                        let ptr = live.swap_remove(index.index(live.len()));
                        prop_assert_eq!(heap.try_deallocate(ptr.as_ptr()), Ok(()));
                    }
                }
            }
            check_invariants(&heap)?;
        }
    }

    #[test]
    fn first_fit_without_frees(sizes in prop::collection::vec(1usize..300, 1..12)) {
        let heap = new_heap();
        let base = heap.allocate(8, site!()).unwrap().as_ptr() as usize;
        // with nothing freed every allocation lands right after the previous one
        let mut expected = base + 8;
        for size in sizes {
            let aligned = (size + 7) & !7;
            if let Ok(ptr) = heap.try_allocate(size) {
                prop_assert_eq!(ptr.as_ptr() as usize, expected + HEADER_SIZE);
                expected += HEADER_SIZE + aligned;
            }
        }
    }
}
