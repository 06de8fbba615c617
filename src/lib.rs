//! A binary-buddy physical page allocator for a preemptive kernel.
//!
//! The tree and free-list logic (`buddy`) never touches raw memory directly:
//! every structural and free-list link is an index into a flat node array, so
//! the allocator compiles and tests the same way whether or not a real
//! physical arena backs it.

#![cfg_attr(not(test), no_std)]

pub mod config;

#[macro_use]
pub mod serial;

#[macro_use]
pub mod macros;

pub mod buddy;

pub use buddy::{BuddyAllocator, Locked};

#[cfg(not(test))]
use core::panic::PanicInfo;

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    error!("{}", info);
    loop {
        core::hint::spin_loop();
    }
}
