//! Format string input and formatted output sinks
//!
//! The format engine reads one character at a time from a guest string and
//! pushes characters into a sink. Characters are `u16` so the same engine
//! serves the narrow and wide routines.

use xr_core::error::MemoryError;
use xr_memory::{GuestAccess, Translate};

/// Input cursor plus output sink driven by the format engine
pub trait FormatData {
    /// Next input character; the terminator is returned but never consumed
    fn get(&mut self) -> Result<u16, MemoryError>;

    /// Character `offset` positions ahead without advancing (0 past the end)
    fn peek(&mut self, offset: u32) -> Result<u16, MemoryError>;

    /// Advance by up to `count` characters, stopping at the terminator
    fn skip(&mut self, count: u32) -> Result<(), MemoryError>;

    /// Append one output character; `false` means the sink rejected it
    fn put(&mut self, c: u16) -> bool;

    /// Whether output is only being measured; `%n` stores are skipped then
    fn is_counting(&self) -> bool {
        false
    }
}

/// Null-terminated guest string read lazily, one character per access
struct GuestInput<'m> {
    memory: &'m dyn Translate,
    addr: u32,
    wide: bool,
}

impl<'m> GuestInput<'m> {
    fn new(memory: &'m dyn Translate, addr: u32, wide: bool) -> Self {
        Self { memory, addr, wide }
    }

    fn char_size(&self) -> u32 {
        if self.wide {
            2
        } else {
            1
        }
    }

    fn load(&self, index: u32) -> Result<u16, MemoryError> {
        let addr = self.addr.wrapping_add(index.wrapping_mul(self.char_size()));
        if self.wide {
            self.memory.read_be16(addr)
        } else {
            self.memory.read_u8(addr).map(u16::from)
        }
    }

    fn get(&mut self) -> Result<u16, MemoryError> {
        let c = self.load(0)?;
        if c != 0 {
            self.addr = self.addr.wrapping_add(self.char_size());
        }
        Ok(c)
    }

    fn peek(&self, offset: u32) -> Result<u16, MemoryError> {
        for index in 0..offset {
            if self.load(index)? == 0 {
                return Ok(0);
            }
        }
        self.load(offset)
    }

    fn skip(&mut self, count: u32) -> Result<(), MemoryError> {
        for _ in 0..count {
            if self.get()? == 0 {
                break;
            }
        }
        Ok(())
    }
}

/// Narrow format string, byte-string output
pub struct StringFormatData<'m> {
    input: GuestInput<'m>,
    output: Vec<u8>,
}

impl<'m> StringFormatData<'m> {
    pub fn new(memory: &'m dyn Translate, format_ptr: u32) -> Self {
        Self {
            input: GuestInput::new(memory, format_ptr, false),
            output: Vec::new(),
        }
    }

    /// Output produced so far
    pub fn bytes(&self) -> &[u8] {
        &self.output
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.output
    }
}

impl FormatData for StringFormatData<'_> {
    fn get(&mut self) -> Result<u16, MemoryError> {
        self.input.get()
    }

    fn peek(&mut self, offset: u32) -> Result<u16, MemoryError> {
        self.input.peek(offset)
    }

    fn skip(&mut self, count: u32) -> Result<(), MemoryError> {
        self.input.skip(count)
    }

    fn put(&mut self, c: u16) -> bool {
        match u8::try_from(c) {
            Ok(byte) => {
                self.output.push(byte);
                true
            }
            Err(_) => false,
        }
    }
}

/// Wide (big-endian UTF-16) format string, wide output
pub struct WideStringFormatData<'m> {
    input: GuestInput<'m>,
    output: Vec<u16>,
}

impl<'m> WideStringFormatData<'m> {
    pub fn new(memory: &'m dyn Translate, format_ptr: u32) -> Self {
        Self {
            input: GuestInput::new(memory, format_ptr, true),
            output: Vec::new(),
        }
    }

    /// Output produced so far, host byte order
    pub fn units(&self) -> &[u16] {
        &self.output
    }

    pub fn into_units(self) -> Vec<u16> {
        self.output
    }
}

impl FormatData for WideStringFormatData<'_> {
    fn get(&mut self) -> Result<u16, MemoryError> {
        self.input.get()
    }

    fn peek(&mut self, offset: u32) -> Result<u16, MemoryError> {
        self.input.peek(offset)
    }

    fn skip(&mut self, count: u32) -> Result<(), MemoryError> {
        self.input.skip(count)
    }

    fn put(&mut self, c: u16) -> bool {
        self.output.push(c);
        true
    }
}

/// Wide format string, output is only counted
pub struct WideCountFormatData<'m> {
    input: GuestInput<'m>,
    count: i32,
}

impl<'m> WideCountFormatData<'m> {
    pub fn new(memory: &'m dyn Translate, format_ptr: u32) -> Self {
        Self {
            input: GuestInput::new(memory, format_ptr, true),
            count: 0,
        }
    }

    pub fn count(&self) -> i32 {
        self.count
    }
}

impl FormatData for WideCountFormatData<'_> {
    fn get(&mut self) -> Result<u16, MemoryError> {
        self.input.get()
    }

    fn peek(&mut self, offset: u32) -> Result<u16, MemoryError> {
        self.input.peek(offset)
    }

    fn skip(&mut self, count: u32) -> Result<(), MemoryError> {
        self.input.skip(count)
    }

    fn put(&mut self, _c: u16) -> bool {
        self.count += 1;
        true
    }

    fn is_counting(&self) -> bool {
        true
    }
}
