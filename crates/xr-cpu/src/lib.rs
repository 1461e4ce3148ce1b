//! PowerPC execution context for xenon-rt
//!
//! Recompiled functions keep the guest register file in a [`PpcContext`]
//! and hand it to host routines when they call an imported symbol.

pub mod context;

pub use context::{PpcContext, ARG_REGISTERS, RETURN_REGISTER, STACK_POINTER_REGISTER};
