//! Guest memory for xenon-rt
//!
//! This crate provides the translated guest address space that recompiled
//! code runs against, together with the accessors that read and write
//! big-endian guest values from the little-endian host.

pub mod access;
pub mod manager;

pub use access::{GuestAccess, Translate};
pub use manager::{GuestMemory, GUEST_ADDRESS_SPACE_SIZE};
