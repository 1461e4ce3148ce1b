//! Tests for guest memory accessors

use std::sync::Arc;
use std::thread;

use xr_memory::{GuestAccess, GuestMemory, Translate};

#[test]
fn test_guest_strings_are_big_endian() {
    let mem = GuestMemory::new(0x10000).unwrap();

    // "Hi" as guest UTF-16
    mem.write_be16_slice(0x200, &[0x0048, 0x0069, 0]).unwrap();
    assert_eq!(
        mem.read_bytes(0x200, 6).unwrap(),
        vec![0x00, 0x48, 0x00, 0x69, 0x00, 0x00]
    );
    assert_eq!(mem.read_be16(0x202).unwrap(), 0x0069);
}

#[test]
fn test_concurrent_independent_access() {
    let mem = GuestMemory::new(0x10000).unwrap();

    let handles: Vec<_> = (0..4u32)
        .map(|i| {
            let mem = Arc::clone(&mem);
            thread::spawn(move || {
                let addr = 0x1000 * (i + 1);
                for n in 0..64u64 {
                    mem.write_be64(addr, n << 32 | i as u64).unwrap();
                    assert_eq!(mem.read_be64(addr).unwrap(), n << 32 | i as u64);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_trait_object_access() {
    let mem = GuestMemory::new(0x10000).unwrap();
    let translate: &dyn Translate = &*mem;

    translate.write_be32(0x40, 0xCAFEBABE).unwrap();
    assert_eq!(mem.read_be32(0x40).unwrap(), 0xCAFEBABE);
}
