//! High-level emulation of guest library routines for xenon-rt
//!
//! Recompiled code reaches these routines through stubs registered with the
//! [`HleDispatcher`]. The `crt` module carries the guest C runtime's
//! formatted-output family.

pub mod crt;
pub mod dispatcher;

pub use dispatcher::{
    dispatch_hle_call, get_dispatcher, get_dispatcher_mut, init_hle_dispatcher,
    register_all_hle_functions, HleCallContext, HleDispatcher, HleFn, HleFunctionInfo,
    HLE_DISPATCHER,
};
