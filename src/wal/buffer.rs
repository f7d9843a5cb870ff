//! Aligned log buffer
//!
//! Direct I/O requires the buffer address to be aligned to the device block
//! size, so the arena is allocated with an explicit `Layout` alignment
//! instead of through `Vec`.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use crate::error::{Result, WalError};

/// Fixed-capacity, zero-initialised byte arena with an aligned base address
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl AlignedBuffer {
    /// Allocate `len` zeroed bytes aligned to `alignment`
    ///
    /// `alignment` must be a power of two and `len` a non-zero multiple of it.
    pub fn new(len: usize, alignment: usize) -> Result<Self> {
        if len == 0 || !alignment.is_power_of_two() || len % alignment != 0 {
            return Err(WalError::InvalidArgument(format!(
                "aligned buffer len={} alignment={}",
                len, alignment
            )));
        }
        let layout = Layout::from_size_align(len, alignment)
            .map_err(|e| WalError::InvalidArgument(format!("buffer layout: {}", e)))?;

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or_else(|| {
            WalError::Unexpected(format!("failed to allocate {} byte log buffer", len))
        })?;

        Ok(Self { ptr, layout })
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for layout.size() initialised bytes for the
        // lifetime of self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    pub fn alignment(&self) -> usize {
        self.layout.align()
    }

    /// Check if the base address honours the requested alignment
    pub fn is_aligned(&self) -> bool {
        (self.ptr.as_ptr() as usize) % self.layout.align() == 0
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr was returned by alloc_zeroed with this exact layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

// The arena is exclusively owned; moving it across threads is sound.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("len", &self.len())
            .field("alignment", &self.alignment())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_buffer() {
        let buf = AlignedBuffer::new(3 * 4096, 4096).unwrap();
        assert!(buf.is_aligned());
        assert_eq!(buf.len(), 3 * 4096);
        assert_eq!(buf.alignment(), 4096);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_aligned_buffer_write_read() {
        let mut buf = AlignedBuffer::new(4096, 512).unwrap();
        buf.as_mut_slice()[..5].copy_from_slice(b"hello");
        assert_eq!(&buf.as_slice()[..5], b"hello");
    }

    #[test]
    fn test_rejects_unaligned_len() {
        assert!(AlignedBuffer::new(4097, 4096).is_err());
        assert!(AlignedBuffer::new(0, 4096).is_err());
        assert!(AlignedBuffer::new(4096, 3000).is_err());
    }
}
