//! Guest address space implementation

use std::sync::Arc;

use tracing::debug;
use xr_core::config::MemoryConfig;
use xr_core::error::MemoryError;

use crate::access::Translate;

/// Full 32-bit guest address space
pub const GUEST_ADDRESS_SPACE_SIZE: u64 = 0x1_0000_0000;

/// Flat guest address space
///
/// The whole guest range is reserved as one host mapping, so translation is
/// `base + addr` plus a bounds check against the reserved size.
pub struct GuestMemory {
    /// Base pointer for the guest address space
    base: *mut u8,
    /// Reserved size in bytes
    size: usize,
}

// Safety: the mapping lives as long as the manager and guest memory has no
// host-side invariants beyond its bounds
unsafe impl Send for GuestMemory {}
unsafe impl Sync for GuestMemory {}

impl GuestMemory {
    /// Reserve a guest address space of `size` bytes
    pub fn new(size: u64) -> Result<Arc<Self>, MemoryError> {
        if size == 0 || size > GUEST_ADDRESS_SPACE_SIZE {
            return Err(MemoryError::OutOfMemory);
        }

        let size = size as usize;
        let base = Self::allocate_address_space(size)?;
        debug!("Reserved 0x{:x} bytes of guest memory at {:p}", size, base);

        Ok(Arc::new(Self { base, size }))
    }

    /// Reserve the address space described by the configuration
    pub fn from_config(config: &MemoryConfig) -> Result<Arc<Self>, MemoryError> {
        Self::new(config.guest_size)
    }

    #[cfg(unix)]
    fn allocate_address_space(size: usize) -> Result<*mut u8, MemoryError> {
        use libc::{mmap, MAP_ANONYMOUS, MAP_NORESERVE, MAP_PRIVATE, PROT_READ, PROT_WRITE};

        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS | MAP_NORESERVE,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(MemoryError::OutOfMemory);
        }

        Ok(ptr as *mut u8)
    }

    #[cfg(not(unix))]
    fn allocate_address_space(size: usize) -> Result<*mut u8, MemoryError> {
        let layout = std::alloc::Layout::from_size_align(size, 0x1000)
            .map_err(|_| MemoryError::OutOfMemory)?;
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };

        if ptr.is_null() {
            return Err(MemoryError::OutOfMemory);
        }

        Ok(ptr)
    }

    /// Reserved size in bytes
    pub fn size(&self) -> u64 {
        self.size as u64
    }

    /// Get raw pointer for address (unchecked, for hot paths)
    ///
    /// # Safety
    /// Caller must ensure the address is inside the reserved range.
    #[inline(always)]
    pub unsafe fn ptr(&self, addr: u32) -> *mut u8 {
        self.base.add(addr as usize)
    }
}

unsafe impl Translate for GuestMemory {
    #[inline]
    fn translate(&self, addr: u32, len: u32) -> Result<*mut u8, MemoryError> {
        if addr as usize >= self.size {
            return Err(MemoryError::InvalidAddress(addr));
        }
        if addr as usize + len as usize > self.size {
            return Err(MemoryError::OutOfRange { addr, len });
        }
        Ok(unsafe { self.ptr(addr) })
    }
}

impl Drop for GuestMemory {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.size);
        }

        #[cfg(not(unix))]
        unsafe {
            if let Ok(layout) = std::alloc::Layout::from_size_align(self.size, 0x1000) {
                std::alloc::dealloc(self.base, layout);
            }
        }
    }
}
