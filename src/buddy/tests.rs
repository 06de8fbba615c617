extern crate std;

use std::boxed::Box;
use std::vec::Vec;

use super::BuddyAllocator;
use crate::config;

fn new_allocator(end: usize) -> Box<BuddyAllocator> {
    // Boxing a `const` lets the compiler move the ~3.75MiB node array
    // straight from rodata into the heap allocation, never through a stack
    // temporary the size of `BuddyAllocator` itself.
    const EMPTY: BuddyAllocator = BuddyAllocator::new();
    let mut allocator = Box::new(EMPTY);
    allocator.init(end);
    allocator
}

#[test]
fn fresh_init_then_alloc_one() {
    let mut allocator = new_allocator(0);

    let addr = allocator.alloc(1);
    assert_eq!(addr, Some(0));

    for lvl in 0..config::DEPTH - 1 {
        assert_eq!(allocator.free_lists.count(lvl), 1, "level {} count", lvl);
    }
    assert_eq!(allocator.free_lists.count(config::DEPTH - 1), 0);
}

#[test]
fn two_single_page_allocs_then_free_restores_state() {
    let mut allocator = new_allocator(0);

    let first = allocator.alloc(1).expect("first alloc");
    let second = allocator.alloc(1).expect("second alloc");
    assert_eq!(first, 0);
    assert_eq!(second, config::PAGE_SIZE);

    allocator.free(second);
    allocator.free(first);

    for lvl in 0..config::DEPTH - 1 {
        assert_eq!(allocator.free_lists.count(lvl), 0, "level {} count", lvl);
    }
    assert_eq!(allocator.free_lists.count(config::DEPTH - 1), 1);
}

#[test]
fn non_power_of_two_request_is_rejected() {
    let mut allocator = new_allocator(0);
    assert_eq!(allocator.alloc(3), None);
    assert_eq!(allocator.free_lists.count(config::DEPTH - 1), 1);
}

#[test]
fn zero_pages_is_rejected() {
    let mut allocator = new_allocator(0);
    assert_eq!(allocator.alloc(0), None);
}

#[test]
fn above_max_alloc_pages_is_rejected() {
    let mut allocator = new_allocator(0);
    assert_eq!(allocator.alloc(config::MAX_ALLOC_PAGES * 2), None);
}

#[test]
fn split_then_free_restores_single_top_level_node() {
    let mut allocator = new_allocator(0);

    let addr = allocator.alloc(2).expect("alloc(2)");
    assert_eq!(addr, 0);

    allocator.free(addr);

    for lvl in 0..config::DEPTH - 1 {
        assert_eq!(allocator.free_lists.count(lvl), 0, "level {} count", lvl);
    }
    assert_eq!(allocator.free_lists.count(config::DEPTH - 1), 1);
}

#[test]
fn fill_then_drain_the_whole_arena() {
    let mut allocator = new_allocator(0);

    let mut addrs = Vec::with_capacity(config::PAGES);
    for _ in 0..config::PAGES {
        addrs.push(allocator.alloc(1).expect("arena should not be exhausted yet"));
    }

    assert_eq!(allocator.alloc(1), None, "arena should be exhausted");

    let mut seen = addrs.clone();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), config::PAGES, "all addresses must be distinct");
    assert_eq!(*seen.first().unwrap(), 0);
    assert_eq!(*seen.last().unwrap(), (config::PAGES - 1) * config::PAGE_SIZE);

    for &addr in addrs.iter().rev() {
        allocator.free(addr);
    }

    for lvl in 0..config::DEPTH - 1 {
        assert_eq!(allocator.free_lists.count(lvl), 0, "level {} count", lvl);
    }
    assert_eq!(allocator.free_lists.count(config::DEPTH - 1), 1);
}

#[test]
#[should_panic]
fn double_free_is_fatal() {
    let mut allocator = new_allocator(0);
    let addr = allocator.alloc(1).expect("alloc(1)");
    allocator.free(addr);
    allocator.free(addr);
}

#[test]
#[should_panic]
fn freeing_a_misaligned_address_is_fatal() {
    let mut allocator = new_allocator(0);
    allocator.alloc(1).expect("alloc(1)");
    allocator.free(1);
}

#[test]
#[should_panic]
fn freeing_an_out_of_range_address_is_fatal() {
    let mut allocator = new_allocator(0);
    allocator.alloc(1).expect("alloc(1)");
    let out_of_range = config::PAGES * config::PAGE_SIZE * 2;
    allocator.free(out_of_range);
}

#[test]
fn exhaustion_is_recoverable() {
    let mut allocator = new_allocator(0);

    let mut addrs = Vec::with_capacity(config::PAGES);
    for _ in 0..config::PAGES {
        addrs.push(allocator.alloc(1).expect("arena should not be exhausted yet"));
    }
    assert_eq!(allocator.alloc(1), None);

    let reclaimed = addrs.pop().unwrap();
    allocator.free(reclaimed);

    assert_eq!(allocator.alloc(1), Some(reclaimed));
}

#[test]
fn allocations_are_naturally_aligned() {
    let mut allocator = new_allocator(0);

    let addr = allocator.alloc(8).expect("alloc(8)");
    assert_eq!(addr % (8 * config::PAGE_SIZE), 0);
}

#[test]
fn outstanding_allocations_are_disjoint() {
    let mut allocator = new_allocator(0);

    let a = allocator.alloc(4).expect("alloc(4)");
    let b = allocator.alloc(2).expect("alloc(2)");
    let c = allocator.alloc(1).expect("alloc(1)");

    let ranges = [
        (a, 4 * config::PAGE_SIZE),
        (b, 2 * config::PAGE_SIZE),
        (c, 1 * config::PAGE_SIZE),
    ];
    for i in 0..ranges.len() {
        for j in (i + 1)..ranges.len() {
            let (start_i, len_i) = ranges[i];
            let (start_j, len_j) = ranges[j];
            let disjoint = start_i + len_i <= start_j || start_j + len_j <= start_i;
            assert!(disjoint, "ranges {:?} and {:?} overlap", ranges[i], ranges[j]);
        }
    }
}

#[test]
fn report_does_not_panic() {
    let mut allocator = new_allocator(0);
    allocator.alloc(4);
    allocator.alloc(1);
    allocator.report();
}
