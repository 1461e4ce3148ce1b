//! PowerPC register context

/// Stack pointer (r1)
pub const STACK_POINTER_REGISTER: usize = 1;

/// Integer return value register (r3)
pub const RETURN_REGISTER: usize = 3;

/// Integer argument registers, by argument ordinal
pub const ARG_REGISTERS: [usize; 8] = [3, 4, 5, 6, 7, 8, 9, 10];

/// Register file of a recompiled guest function at a call boundary
///
/// Values are host-native; the recompiled code already byte-swapped them
/// when it loaded them from guest memory.
#[derive(Debug, Clone)]
pub struct PpcContext {
    /// General Purpose Registers (64-bit)
    pub gpr: [u64; 32],
    /// Floating Point Registers (64-bit)
    pub fpr: [f64; 32],
    /// Condition Register
    pub cr: u32,
    /// Link Register
    pub lr: u64,
    /// Count Register
    pub ctr: u64,
    /// Fixed-Point Exception Register
    pub xer: u64,
    /// FP Status and Control Register
    pub fpscr: u64,
    /// Current instruction address
    pub cia: u64,
    /// Machine State Register
    pub msr: u64,
}

impl Default for PpcContext {
    fn default() -> Self {
        Self {
            gpr: [0; 32],
            fpr: [0.0; 32],
            cr: 0,
            lr: 0,
            ctr: 0,
            xer: 0,
            fpscr: 0,
            cia: 0,
            msr: 0x8000_0000_0000_0000, // 64-bit mode enabled by default
        }
    }
}

impl PpcContext {
    /// Create a zeroed context with the given stack pointer
    pub fn with_stack(stack_pointer: u32) -> Self {
        let mut ctx = Self::default();
        ctx.gpr[STACK_POINTER_REGISTER] = stack_pointer as u64;
        ctx
    }

    /// Read a GPR
    #[inline]
    pub fn gpr(&self, index: usize) -> u64 {
        self.gpr[index]
    }

    /// Write a GPR
    #[inline]
    pub fn set_gpr(&mut self, index: usize, value: u64) {
        self.gpr[index] = value;
    }

    /// Read an FPR
    #[inline]
    pub fn fpr(&self, index: usize) -> f64 {
        self.fpr[index]
    }

    /// Write an FPR
    #[inline]
    pub fn set_fpr(&mut self, index: usize, value: f64) {
        self.fpr[index] = value;
    }

    /// Register-passed integer argument `n` (0..=7 maps to r3..=r10)
    ///
    /// Returns `None` for ordinals that the caller passed on the stack.
    #[inline]
    pub fn arg(&self, n: usize) -> Option<u64> {
        ARG_REGISTERS.get(n).map(|&reg| self.gpr[reg])
    }

    /// Set register-passed argument `n`; ordinals past r10 are ignored
    pub fn set_arg(&mut self, n: usize, value: u64) {
        if let Some(&reg) = ARG_REGISTERS.get(n) {
            self.gpr[reg] = value;
        }
    }

    /// Guest stack pointer (low 32 bits of r1)
    #[inline]
    pub fn stack_pointer(&self) -> u32 {
        self.gpr[STACK_POINTER_REGISTER] as u32
    }

    /// Store a routine's integer result in r3
    #[inline]
    pub fn set_return(&mut self, value: u64) {
        self.gpr[RETURN_REGISTER] = value;
    }

    /// Integer result of the last call (r3)
    #[inline]
    pub fn return_value(&self) -> u64 {
        self.gpr[RETURN_REGISTER]
    }

    /// Get CR field value (0-7)
    pub fn get_cr_field(&self, field: usize) -> u32 {
        (self.cr >> (28 - field * 4)) & 0xF
    }

    /// Set CR field value (0-7)
    pub fn set_cr_field(&mut self, field: usize, value: u32) {
        let shift = 28 - field * 4;
        self.cr = (self.cr & !(0xF << shift)) | ((value & 0xF) << shift);
    }
}
