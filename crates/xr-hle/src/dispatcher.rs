//! Host routine dispatcher
//!
//! Maps stub addresses to host-implemented routines. Recompiled code calls
//! an imported symbol by jumping to its stub; the runtime hands the stub
//! address, the caller's register file and the guest memory to
//! [`HleDispatcher::dispatch`], which runs the routine and stores its result
//! in r3.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, trace};
use xr_core::config::{Config, CrtConfig};
use xr_core::error::{HleError, MemoryError};
use xr_cpu::PpcContext;
use xr_memory::Translate;

use crate::crt::register_crt_functions;

/// Spacing between consecutive stub addresses
const STUB_SIZE: u32 = 16;

/// Everything a host routine sees of its caller
pub struct HleCallContext<'a> {
    /// Stub address that was called
    pub stub_addr: u32,
    /// Caller's register file (arguments in r3..r10, stack in r1)
    pub ppc: &'a PpcContext,
    /// Guest memory of the calling image
    pub memory: &'a dyn Translate,
    /// CRT settings in effect
    pub crt: &'a CrtConfig,
}

impl HleCallContext<'_> {
    /// Argument `n` as a guest address or 32-bit value
    pub fn arg32(&self, n: usize) -> u32 {
        self.ppc.arg(n).unwrap_or(0) as u32
    }
}

/// Host routine: returns the value for r3, or a fatal memory fault
pub type HleFn = fn(&HleCallContext<'_>) -> Result<i64, MemoryError>;

/// HLE function info
#[derive(Clone)]
pub struct HleFunctionInfo {
    /// Symbol name
    pub name: &'static str,
    /// Module name
    pub module: &'static str,
    /// Handler function
    pub handler: HleFn,
}

/// Global HLE dispatcher
pub static HLE_DISPATCHER: Lazy<RwLock<HleDispatcher>> =
    Lazy::new(|| RwLock::new(HleDispatcher::new()));

/// Maps stub addresses to host routines
pub struct HleDispatcher {
    /// Map of stub address -> function info
    stub_map: HashMap<u32, HleFunctionInfo>,
    /// Symbol name -> stub address
    name_to_stub: HashMap<&'static str, u32>,
    /// Next available stub ID
    next_stub_id: u32,
    /// Base address for stub region
    stub_base: u32,
    /// Call statistics
    call_counts: HashMap<u32, u64>,
    crt: CrtConfig,
}

impl HleDispatcher {
    /// Create an empty dispatcher with default settings
    pub fn new() -> Self {
        Self {
            stub_map: HashMap::new(),
            name_to_stub: HashMap::new(),
            next_stub_id: 0,
            stub_base: 0x2F00_0000,
            call_counts: HashMap::new(),
            crt: CrtConfig::default(),
        }
    }

    /// Create an empty dispatcher from runtime configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            stub_base: config.hle.stub_base,
            crt: config.crt.clone(),
            ..Self::new()
        }
    }

    /// Set the stub base address
    pub fn set_stub_base(&mut self, base: u32) {
        self.stub_base = base;
    }

    /// Register a host routine and return its stub address
    ///
    /// Registering a name twice rebinds the existing stub.
    pub fn register_function(
        &mut self,
        module: &'static str,
        name: &'static str,
        handler: HleFn,
    ) -> u32 {
        let stub_addr = match self.name_to_stub.get(name) {
            Some(&addr) => addr,
            None => {
                let addr = self
                    .stub_base
                    .wrapping_add(self.next_stub_id.wrapping_mul(STUB_SIZE));
                self.next_stub_id += 1;
                addr
            }
        };

        debug!(
            "Registering HLE stub 0x{:08x} -> {}::{}",
            stub_addr, module, name
        );
        self.stub_map.insert(
            stub_addr,
            HleFunctionInfo {
                name,
                module,
                handler,
            },
        );
        self.name_to_stub.insert(name, stub_addr);

        stub_addr
    }

    /// Stub address bound to a symbol name
    pub fn stub_for_name(&self, name: &str) -> Result<u32, HleError> {
        self.name_to_stub
            .get(name)
            .copied()
            .ok_or_else(|| HleError::UnknownSymbol(name.to_string()))
    }

    /// Check if an address is an HLE stub
    pub fn is_hle_stub(&self, addr: u32) -> bool {
        self.stub_map.contains_key(&addr)
    }

    /// Run the routine bound to `stub_addr` and store its result in r3
    pub fn dispatch(
        &mut self,
        stub_addr: u32,
        ppc: &mut PpcContext,
        memory: &dyn Translate,
    ) -> Result<i64, HleError> {
        let info = self
            .stub_map
            .get(&stub_addr)
            .ok_or(HleError::UnknownStub(stub_addr))?;

        *self.call_counts.entry(stub_addr).or_insert(0) += 1;

        trace!(
            "HLE call {}::{} (stub 0x{:08x}) args=[0x{:x}, 0x{:x}, 0x{:x}, 0x{:x}]",
            info.module,
            info.name,
            stub_addr,
            ppc.gpr[3],
            ppc.gpr[4],
            ppc.gpr[5],
            ppc.gpr[6]
        );

        let ctx = HleCallContext {
            stub_addr,
            ppc,
            memory,
            crt: &self.crt,
        };

        let result = (info.handler)(&ctx).map_err(|source| {
            error!("HLE call {}::{} faulted: {}", info.module, info.name, source);
            HleError::Fault {
                name: info.name,
                source,
            }
        })?;

        trace!("HLE call {}::{} returned 0x{:x}", info.module, info.name, result);

        ppc.set_return(result as u64);
        Ok(result)
    }

    /// Get function info for a stub address
    pub fn get_function_info(&self, stub_addr: u32) -> Option<&HleFunctionInfo> {
        self.stub_map.get(&stub_addr)
    }

    /// Get call count for a function
    pub fn get_call_count(&self, stub_addr: u32) -> u64 {
        self.call_counts.get(&stub_addr).copied().unwrap_or(0)
    }

    /// Get number of registered stubs
    pub fn stub_count(&self) -> usize {
        self.stub_map.len()
    }

    /// Reset the dispatcher
    pub fn reset(&mut self) {
        self.stub_map.clear();
        self.name_to_stub.clear();
        self.next_stub_id = 0;
        self.call_counts.clear();
    }
}

impl Default for HleDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Register every host routine this runtime provides
pub fn register_all_hle_functions(dispatcher: &mut HleDispatcher) {
    register_crt_functions(dispatcher);
    debug!("Registered {} HLE functions", dispatcher.stub_count());
}

/// Get mutable access to the global dispatcher
pub fn get_dispatcher_mut() -> RwLockWriteGuard<'static, HleDispatcher> {
    HLE_DISPATCHER.write()
}

/// Get read access to the global dispatcher
pub fn get_dispatcher() -> RwLockReadGuard<'static, HleDispatcher> {
    HLE_DISPATCHER.read()
}

/// Configure the global dispatcher and register all host routines
pub fn init_hle_dispatcher(config: &Config) {
    let mut dispatcher = get_dispatcher_mut();
    *dispatcher = HleDispatcher::from_config(config);
    register_all_hle_functions(&mut dispatcher);
}

/// Dispatch an HLE call through the global dispatcher
pub fn dispatch_hle_call(
    stub_addr: u32,
    ppc: &mut PpcContext,
    memory: &dyn Translate,
) -> Result<i64, HleError> {
    get_dispatcher_mut().dispatch(stub_addr, ppc, memory)
}
