//! Formatted-output argument lists
//!
//! Every fetch consumes exactly one 8-byte argument slot, whatever the
//! width the caller asked for, matching the guest's slot granularity.

use xr_core::error::MemoryError;
use xr_cpu::{PpcContext, ARG_REGISTERS};
use xr_memory::{GuestAccess, Translate};

/// Offset of the first overflow slot in the caller's frame (parameter save
/// area). Each slot is a big-endian doubleword, so a 32-bit argument sits
/// in the low word at `+0x54`.
pub const STACK_ARG_OFFSET: u32 = 0x50;

/// Size of one argument slot
pub const ARG_SLOT_SIZE: u32 = 8;

/// Sequential source of formatted-output arguments
pub trait ArgList {
    /// Fetch the next slot as a 32-bit value (low word of the slot)
    fn get32(&mut self) -> Result<u32, MemoryError> {
        self.get64().map(|value| value as u32)
    }

    /// Fetch the next slot as a 64-bit value
    fn get64(&mut self) -> Result<u64, MemoryError>;
}

/// Arguments passed in r3..r10, then on the caller's stack
pub struct StackArgList<'a> {
    ctx: &'a PpcContext,
    memory: &'a dyn Translate,
    index: usize,
}

impl<'a> StackArgList<'a> {
    /// Start reading at argument ordinal `first` (the first variadic slot)
    pub fn new(ctx: &'a PpcContext, memory: &'a dyn Translate, first: usize) -> Self {
        Self {
            ctx,
            memory,
            index: first,
        }
    }

    /// Guest address of overflow slot for argument ordinal `index`
    fn stack_slot(&self, index: usize) -> u32 {
        let overflow = (index - ARG_REGISTERS.len()) as u32;
        self.ctx
            .stack_pointer()
            .wrapping_add(STACK_ARG_OFFSET)
            .wrapping_add(overflow.wrapping_mul(ARG_SLOT_SIZE))
    }
}

impl ArgList for StackArgList<'_> {
    fn get64(&mut self) -> Result<u64, MemoryError> {
        let value = match self.ctx.arg(self.index) {
            Some(value) => value,
            None => self.memory.read_be64(self.stack_slot(self.index))?,
        };
        self.index += 1;
        Ok(value)
    }
}

/// Arguments materialized by the caller as an array of big-endian slots
/// (the `va_list` of the `v*printf` routines)
pub struct ArrayArgList<'a> {
    memory: &'a dyn Translate,
    arg_ptr: u32,
    index: u32,
}

impl<'a> ArrayArgList<'a> {
    pub fn new(memory: &'a dyn Translate, arg_ptr: u32) -> Self {
        Self {
            memory,
            arg_ptr,
            index: 0,
        }
    }
}

impl ArgList for ArrayArgList<'_> {
    fn get64(&mut self) -> Result<u64, MemoryError> {
        let addr = self
            .arg_ptr
            .wrapping_add(self.index.wrapping_mul(ARG_SLOT_SIZE));
        let value = self.memory.read_be64(addr)?;
        self.index += 1;
        Ok(value)
    }
}
