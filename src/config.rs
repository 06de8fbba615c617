//! Compile-time configuration for the page allocator.

/// Byte size of a single page.
pub const PAGE_SIZE: usize = 4096;

/// Total number of pages managed by the allocator. Must be a power of two.
pub const PAGES: usize = 16384;

/// Number of levels in the buddy tree: `log2(PAGES) + 1`.
pub const DEPTH: usize = 15;

/// Total node count in the flat, heap-indexed node array.
pub const NODES: usize = 2 * PAGES - 1;

/// Largest single allocation `alloc` will satisfy, in pages, independent of
/// how large the arena is. Rejects runaway single-caller requests without
/// touching the tree.
pub const MAX_ALLOC_PAGES: usize = 512;
