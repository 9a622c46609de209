//! Reserved memory backing every arena
//!
//! One region is reserved at start-up and carved into per-slot arenas.
//! Platform-specific code only decides how the bytes are obtained and
//! returned; the region always starts zero-filled.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix as platform;
    } else {
        mod heap;
        use heap as platform;
    }
}

use gatehttpd_core::error::MemoryError;
use std::ptr::NonNull;

/// Contiguous, zero-initialised, read/write region released on drop
pub struct MemoryRegion {
    base: NonNull<u8>,
    len: usize,
}

// The region is plain bytes; aliasing is controlled by the arenas built on it.
unsafe impl Send for MemoryRegion {}
unsafe impl Sync for MemoryRegion {}

impl MemoryRegion {
    /// Reserve `len` bytes.
    pub fn reserve(len: usize) -> Result<Self, MemoryError> {
        if len == 0 {
            return Err(MemoryError::InvalidSize);
        }
        let base = platform::reserve(len)?;
        Ok(Self { base, len })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for MemoryRegion {
    fn drop(&mut self) {
        if let Err(e) = platform::release(self.base, self.len) {
            gatehttpd_core::kerror!("{}", e);
        }
    }
}

impl std::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("base", &self.base)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_is_zeroed_and_writable() {
        let region = MemoryRegion::reserve(64 * 1024).unwrap();
        assert_eq!(region.len(), 64 * 1024);
        let bytes = unsafe { std::slice::from_raw_parts_mut(region.as_ptr(), region.len()) };
        assert!(bytes.iter().all(|&b| b == 0));
        bytes[0] = 1;
        bytes[region.len() - 1] = 2;
        assert_eq!(bytes[0] + bytes[region.len() - 1], 3);
    }

    #[test]
    fn test_zero_length_rejected() {
        assert_eq!(MemoryRegion::reserve(0).unwrap_err(), MemoryError::InvalidSize);
    }
}
