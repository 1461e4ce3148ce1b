//! Byte-order-correct guest memory access
//!
//! The guest is big-endian. Every multi-byte value is converted with
//! `from_be`/`to_be` on the way through, so the code is correct on hosts of
//! either endianness. Bounds are the translator's business: an address it
//! cannot map comes back as a [`MemoryError`] and is propagated as-is.

use xr_core::error::MemoryError;

/// Guest-to-host address translation.
///
/// # Safety
/// A successful `translate(addr, len)` must return a pointer that is valid
/// for reads and writes of `len` bytes for as long as `self` is alive.
pub unsafe trait Translate: Send + Sync {
    /// Resolve `len` bytes starting at guest address `addr` to host memory.
    fn translate(&self, addr: u32, len: u32) -> Result<*mut u8, MemoryError>;
}

#[inline]
fn load<T: Copy, M: Translate + ?Sized>(mem: &M, addr: u32) -> Result<T, MemoryError> {
    let ptr = mem.translate(addr, std::mem::size_of::<T>() as u32)?;
    // SAFETY: `Translate` guarantees `ptr` covers size_of::<T>() bytes.
    Ok(unsafe { std::ptr::read_unaligned(ptr as *const T) })
}

#[inline]
fn store<T: Copy, M: Translate + ?Sized>(mem: &M, addr: u32, value: T) -> Result<(), MemoryError> {
    let ptr = mem.translate(addr, std::mem::size_of::<T>() as u32)?;
    // SAFETY: as in `load`.
    unsafe { std::ptr::write_unaligned(ptr as *mut T, value) };
    Ok(())
}

/// Typed guest reads and writes, available on every [`Translate`]
/// implementation (including `dyn Translate`).
pub trait GuestAccess: Translate {
    /// Read a u8
    fn read_u8(&self, addr: u32) -> Result<u8, MemoryError> {
        load(self, addr)
    }

    /// Read a big-endian u16
    fn read_be16(&self, addr: u32) -> Result<u16, MemoryError> {
        load::<u16, _>(self, addr).map(u16::from_be)
    }

    /// Read a big-endian u32
    fn read_be32(&self, addr: u32) -> Result<u32, MemoryError> {
        load::<u32, _>(self, addr).map(u32::from_be)
    }

    /// Read a big-endian u64
    fn read_be64(&self, addr: u32) -> Result<u64, MemoryError> {
        load::<u64, _>(self, addr).map(u64::from_be)
    }

    /// Write a u8
    fn write_u8(&self, addr: u32, value: u8) -> Result<(), MemoryError> {
        store(self, addr, value)
    }

    /// Write a big-endian u16
    fn write_be16(&self, addr: u32, value: u16) -> Result<(), MemoryError> {
        store(self, addr, value.to_be())
    }

    /// Write a big-endian u32
    fn write_be32(&self, addr: u32, value: u32) -> Result<(), MemoryError> {
        store(self, addr, value.to_be())
    }

    /// Write a big-endian u64
    fn write_be64(&self, addr: u32, value: u64) -> Result<(), MemoryError> {
        store(self, addr, value.to_be())
    }

    /// Copy data from guest memory
    fn read_bytes(&self, addr: u32, size: u32) -> Result<Vec<u8>, MemoryError> {
        let ptr = self.translate(addr, size)?;
        let mut data = vec![0u8; size as usize];
        // SAFETY: `ptr` covers `size` bytes.
        unsafe {
            std::ptr::copy_nonoverlapping(ptr as *const u8, data.as_mut_ptr(), size as usize);
        }
        Ok(data)
    }

    /// Copy data to guest memory
    fn write_bytes(&self, addr: u32, data: &[u8]) -> Result<(), MemoryError> {
        let ptr = self.translate(addr, data.len() as u32)?;
        // SAFETY: `ptr` covers `data.len()` bytes.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
        }
        Ok(())
    }

    /// Write UTF-16 code units as big-endian guest characters
    fn write_be16_slice(&self, addr: u32, units: &[u16]) -> Result<(), MemoryError> {
        let bytes: Vec<u8> = units.iter().flat_map(|u| u.to_be_bytes()).collect();
        self.write_bytes(addr, &bytes)
    }
}

impl<T: Translate + ?Sized> GuestAccess for T {}
