//! Heap-backed reservation for targets without mmap

use gatehttpd_core::error::MemoryError;
use std::alloc::{self, Layout};
use std::ptr::NonNull;

const ALIGN: usize = 4096;

pub(super) fn reserve(len: usize) -> Result<NonNull<u8>, MemoryError> {
    let layout = Layout::from_size_align(len, ALIGN).map_err(|_| MemoryError::InvalidSize)?;
    let base = unsafe { alloc::alloc_zeroed(layout) };
    NonNull::new(base).ok_or(MemoryError::ReserveFailed(0))
}

pub(super) fn release(base: NonNull<u8>, len: usize) -> Result<(), MemoryError> {
    let layout = Layout::from_size_align(len, ALIGN).map_err(|_| MemoryError::InvalidSize)?;
    unsafe { alloc::dealloc(base.as_ptr(), layout) };
    Ok(())
}
