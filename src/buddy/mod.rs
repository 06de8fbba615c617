//! Binary-buddy physical page allocator.
//!
//! A complete binary tree of `config::NODES` fixed nodes overlays a
//! power-of-two page arena. Each node covers a power-of-two-sized,
//! naturally aligned block; splitting a node on allocation produces a used
//! left half and a freed right half, and freeing coalesces a block with its
//! buddy whenever the buddy is also free. The whole tree lives in one
//! fixed-size array for the allocator's lifetime — no node is ever moved,
//! and every structural or free-list link is an array index rather than a
//! pointer into the managed memory.

mod freelist;
mod node;

#[cfg(test)]
mod tests;

use freelist::FreeListIndex;
pub use node::{Node, NodeState};

use crate::config;

/// A value behind a spinlock, with lazy-free construction suitable for a
/// `static`: no heap allocation and no deferred initialization step needed
/// before the lock itself can be taken.
pub struct Locked<A> {
    inner: spin::Mutex<A>,
}

impl<A> Locked<A> {
    pub const fn new(inner: A) -> Self {
        Locked {
            inner: spin::Mutex::new(inner),
        }
    }

    pub fn lock(&self) -> spin::MutexGuard<A> {
        self.inner.lock()
    }
}

/// The buddy tree and its per-level free lists.
pub struct BuddyAllocator {
    nodes: [Node; config::NODES],
    free_lists: FreeListIndex,
    base: usize,
    phys_top: usize,
    initialized: bool,
}

fn page_align_up(addr: usize) -> usize {
    (addr + config::PAGE_SIZE - 1) & !(config::PAGE_SIZE - 1)
}

/// Level of the node at flat index `id`, where level 0 is a leaf (one page)
/// and `config::DEPTH - 1` is the root (the whole arena). `id` is a
/// zero-based index into a heap-ordered complete binary tree, so its depth
/// from the root is `floor(log2(id + 1))`.
fn node_level(id: usize) -> usize {
    let depth_from_root = (id as u32 + 1).ilog2() as usize;
    config::DEPTH - 1 - depth_from_root
}

impl BuddyAllocator {
    /// An allocator with no arena yet configured. Call `init` before use.
    pub const fn new() -> Self {
        BuddyAllocator {
            nodes: [Node::empty(); config::NODES],
            free_lists: FreeListIndex::new(),
            base: 0,
            phys_top: 0,
            initialized: false,
        }
    }

    /// Configures the tree over the arena starting at `end` (rounded up to
    /// page alignment) and seeds the root onto the top-level free list.
    /// Must be called exactly once before any other operation.
    pub fn init(&mut self, end: usize) {
        let base = page_align_up(end);
        self.base = base;
        self.phys_top = base + config::PAGES * config::PAGE_SIZE;

        for id in 0..config::NODES {
            let lvl = node_level(id);
            let size = 1usize << lvl;
            let (parent, neighbour, memory) = if id == 0 {
                (0, 0, base)
            } else {
                let parent = (id - 1) / 2;
                let is_left = id % 2 == 1;
                let neighbour = if is_left { id + 1 } else { id - 1 };
                let memory = if is_left {
                    self.nodes[parent].memory
                } else {
                    self.nodes[parent].memory + (self.nodes[parent].size / 2) * config::PAGE_SIZE
                };
                (parent, neighbour, memory)
            };
            let (left_child, right_child) = if 2 * id + 2 < config::NODES {
                (Some(2 * id + 1), Some(2 * id + 2))
            } else {
                (None, None)
            };

            self.nodes[id] = Node {
                state: NodeState::Nonexistent,
                id,
                size,
                lvl,
                memory,
                parent,
                left_child,
                right_child,
                neighbour,
                prev: None,
                next: None,
            };
        }

        self.free_lists = FreeListIndex::new();
        self.nodes[0].state = NodeState::Free;
        let root_lvl = self.nodes[0].lvl;
        self.free_lists.push(&mut self.nodes, root_lvl, 0);
        self.initialized = true;

        info!(
            "buddy: initialized {} pages ({} nodes) at base {:#x}",
            config::PAGES,
            config::NODES,
            base
        );
    }

    /// Allocates `n` contiguous pages, returning the block's base address,
    /// or `None` if `n` is invalid or the arena has no block large enough.
    pub fn alloc(&mut self, n: usize) -> Option<usize> {
        debug_assert!(self.initialized, "alloc called before init");

        if n == 0 || n > config::MAX_ALLOC_PAGES || !n.is_power_of_two() {
            return None;
        }
        let lvl = n.trailing_zeros() as usize;

        let mut split_lvl = None;
        for l in lvl..config::DEPTH {
            if self.free_lists.count(l) > 0 {
                split_lvl = Some(l);
                break;
            }
        }
        let split_lvl = match split_lvl {
            Some(l) => l,
            None => {
                warn!("alloc({}): out of memory", n);
                return None;
            }
        };

        let mut id = self
            .free_lists
            .pop(&mut self.nodes, split_lvl)
            .expect("free list reported non-zero count but had no head");

        while self.nodes[id].lvl > lvl {
            self.nodes[id].state = NodeState::Inner;
            let right = self.nodes[id]
                .right_child
                .expect("node above leaf level must have children");
            let left = self.nodes[id]
                .left_child
                .expect("node above leaf level must have children");
            let child_lvl = self.nodes[id].lvl - 1;
            self.nodes[right].state = NodeState::Free;
            self.free_lists.push(&mut self.nodes, child_lvl, right);
            id = left;
        }

        self.nodes[id].state = NodeState::Used;
        trace!("alloc({}) -> {:#x}", n, self.nodes[id].memory);
        Some(self.nodes[id].memory)
    }

    /// Returns the block at `address` to the allocator, coalescing with its
    /// buddy while the buddy is also free. Panics on any caller-contract
    /// violation: a null, misaligned, or out-of-range address, or a
    /// double-free.
    pub fn free(&mut self, address: usize) {
        assert!(self.initialized, "free called before init");
        assert!(
            address != 0
                && address % config::PAGE_SIZE == 0
                && address >= self.base
                && address < self.phys_top,
            "free: address {:#x} is not a valid block base in this arena",
            address
        );

        let mut id = 0usize;
        while self.nodes[id].state == NodeState::Inner {
            let right = self.nodes[id]
                .right_child
                .expect("inner node must have children");
            let left = self.nodes[id]
                .left_child
                .expect("inner node must have children");
            id = if self.nodes[right].memory > address {
                left
            } else {
                right
            };
        }

        assert!(
            self.nodes[id].state == NodeState::Used && self.nodes[id].memory == address,
            "free: double free or address {:#x} is not a block base",
            address
        );

        while id != 0 {
            let neighbour = self.nodes[id].neighbour;
            if self.nodes[neighbour].state != NodeState::Free {
                break;
            }
            let buddy_lvl = self.nodes[neighbour].lvl;
            self.free_lists.remove(&mut self.nodes, buddy_lvl, neighbour);
            self.nodes[neighbour].state = NodeState::Nonexistent;
            self.nodes[id].state = NodeState::Nonexistent;
            id = self.nodes[id].parent;
        }

        self.nodes[id].state = NodeState::Free;
        let lvl = self.nodes[id].lvl;
        self.free_lists.push(&mut self.nodes, lvl, id);
        trace!("free({:#x})", address);
    }

    /// Logs pages in use, pages free, and each level's free-list length.
    pub fn report(&self) {
        let mut used_pages = 0usize;
        let mut free_pages = 0usize;
        for node in self.nodes.iter() {
            match node.state {
                NodeState::Used => used_pages += node.size,
                NodeState::Free => free_pages += node.size,
                _ => {}
            }
        }
        info!("buddy: {} pages used, {} pages free", used_pages, free_pages);
        for lvl in 0..config::DEPTH {
            info!("  level {:>2}: {} free", lvl, self.free_lists.count(lvl));
        }
    }
}

/// The allocator's single process-wide instance.
pub static ALLOCATOR: Locked<BuddyAllocator> = Locked::new(BuddyAllocator::new());

/// Initializes the global allocator over the arena starting at `end`. Must
/// be called exactly once before `alloc`, `free`, or `report`.
pub fn init(end: usize) {
    ALLOCATOR.lock().init(end);
}

/// Allocates `n` contiguous pages from the global allocator.
pub fn alloc(n: usize) -> Option<usize> {
    ALLOCATOR.lock().alloc(n)
}

/// Frees the block at `address` back to the global allocator.
pub fn free(address: usize) {
    ALLOCATOR.lock().free(address);
}

/// Logs a diagnostic summary of the global allocator's state.
pub fn report() {
    ALLOCATOR.lock().report();
}
