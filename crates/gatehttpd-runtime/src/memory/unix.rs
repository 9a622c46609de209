//! mmap-backed reservation
//!
//! Anonymous private mappings with `MAP_NORESERVE`: the full
//! `threads * task_memory` size costs nothing until a request touches it.

use gatehttpd_core::error::MemoryError;
use std::io;
use std::ptr::NonNull;

fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

pub(super) fn reserve(len: usize) -> Result<NonNull<u8>, MemoryError> {
    let base = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
            -1,
            0,
        )
    };

    if base == libc::MAP_FAILED {
        return Err(MemoryError::ReserveFailed(last_errno()));
    }
    NonNull::new(base as *mut u8).ok_or(MemoryError::ReserveFailed(0))
}

pub(super) fn release(base: NonNull<u8>, len: usize) -> Result<(), MemoryError> {
    let ret = unsafe { libc::munmap(base.as_ptr() as *mut libc::c_void, len) };
    if ret != 0 {
        return Err(MemoryError::ReleaseFailed(last_errno()));
    }
    Ok(())
}
