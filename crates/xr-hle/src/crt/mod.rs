//! Guest CRT formatted-output routines
//!
//! `sprintf` and friends as the guest's kernel exports them. Each routine
//! picks an argument list (registers and stack, or a caller-built slot
//! array) and an output sink, then runs the shared [`Formatter`].

pub mod args;
pub mod data;
pub mod format;
pub mod render;

use tracing::{debug, trace};
use xr_core::error::MemoryError;
use xr_memory::GuestAccess;

use crate::dispatcher::{HleCallContext, HleDispatcher};

pub use args::{ArgList, ArrayArgList, StackArgList};
pub use data::{FormatData, StringFormatData, WideCountFormatData, WideStringFormatData};
pub use format::{FormatFlags, Formatter, Spec};

/// Module the formatted-output routines are exported from
pub const CRT_MODULE: &str = "xboxkrnl";

/// Return value for NULL arguments and truncated counted output
const FAILURE: i64 = -1;

fn formatter<'m>(ctx: &HleCallContext<'m>) -> Formatter<'m> {
    Formatter::new(ctx.memory).with_max_string_length(ctx.crt.max_string_length)
}

/// How much of the result a routine may store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Limit {
    Unbounded,
    /// `_sn*`/`_vsn*`: at most this many characters
    Counted(u32),
}

/// Characters to store, whether to terminate, and the routine's result
fn clip(len: usize, limit: Limit) -> (usize, bool, i64) {
    match limit {
        Limit::Unbounded => (len, true, len as i64),
        Limit::Counted(count) => {
            let count = count as usize;
            if len < count {
                (len, true, len as i64)
            } else if len == count {
                (len, false, len as i64)
            } else {
                (count, false, FAILURE)
            }
        }
    }
}

fn narrow_printf<A: ArgList + ?Sized>(
    name: &str,
    ctx: &HleCallContext<'_>,
    buffer: u32,
    limit: Limit,
    format_ptr: u32,
    args: &mut A,
) -> Result<i64, MemoryError> {
    trace!(
        "{}(buffer=0x{:08x}, limit={:?}, format=0x{:08x})",
        name,
        buffer,
        limit,
        format_ptr
    );

    if buffer == 0 || format_ptr == 0 {
        return Ok(FAILURE);
    }

    let mut data = StringFormatData::new(ctx.memory, format_ptr);
    formatter(ctx).format(&mut data, args, false)?;
    let output = data.into_bytes();

    if ctx.crt.trace_calls {
        debug!("{} -> {:?}", name, String::from_utf8_lossy(&output));
    }

    let (stored, terminate, result) = clip(output.len(), limit);
    ctx.memory.write_bytes(buffer, &output[..stored])?;
    if terminate {
        ctx.memory.write_u8(buffer.wrapping_add(stored as u32), 0)?;
    }

    Ok(result)
}

fn wide_printf<A: ArgList + ?Sized>(
    name: &str,
    ctx: &HleCallContext<'_>,
    buffer: u32,
    limit: Limit,
    format_ptr: u32,
    args: &mut A,
) -> Result<i64, MemoryError> {
    trace!(
        "{}(buffer=0x{:08x}, limit={:?}, format=0x{:08x})",
        name,
        buffer,
        limit,
        format_ptr
    );

    if buffer == 0 || format_ptr == 0 {
        return Ok(FAILURE);
    }

    let mut data = WideStringFormatData::new(ctx.memory, format_ptr);
    formatter(ctx).format(&mut data, args, true)?;
    let output = data.into_units();

    if ctx.crt.trace_calls {
        debug!("{} -> {:?}", name, String::from_utf16_lossy(&output));
    }

    let (stored, terminate, result) = clip(output.len(), limit);
    ctx.memory.write_be16_slice(buffer, &output[..stored])?;
    if terminate {
        ctx.memory
            .write_be16(buffer.wrapping_add(stored as u32 * 2), 0)?;
    }

    Ok(result)
}

/// `int sprintf(char *buffer, const char *format, ...)`
fn hle_sprintf(ctx: &HleCallContext<'_>) -> Result<i64, MemoryError> {
    let mut args = StackArgList::new(ctx.ppc, ctx.memory, 2);
    narrow_printf("sprintf", ctx, ctx.arg32(0), Limit::Unbounded, ctx.arg32(1), &mut args)
}

/// `int _snprintf(char *buffer, size_t count, const char *format, ...)`
fn hle_snprintf(ctx: &HleCallContext<'_>) -> Result<i64, MemoryError> {
    let mut args = StackArgList::new(ctx.ppc, ctx.memory, 3);
    let limit = Limit::Counted(ctx.arg32(1));
    narrow_printf("_snprintf", ctx, ctx.arg32(0), limit, ctx.arg32(2), &mut args)
}

/// `int vsprintf(char *buffer, const char *format, va_list args)`
fn hle_vsprintf(ctx: &HleCallContext<'_>) -> Result<i64, MemoryError> {
    let mut args = ArrayArgList::new(ctx.memory, ctx.arg32(2));
    narrow_printf("vsprintf", ctx, ctx.arg32(0), Limit::Unbounded, ctx.arg32(1), &mut args)
}

/// `int _vsnprintf(char *buffer, size_t count, const char *format, va_list args)`
fn hle_vsnprintf(ctx: &HleCallContext<'_>) -> Result<i64, MemoryError> {
    let mut args = ArrayArgList::new(ctx.memory, ctx.arg32(3));
    let limit = Limit::Counted(ctx.arg32(1));
    narrow_printf("_vsnprintf", ctx, ctx.arg32(0), limit, ctx.arg32(2), &mut args)
}

/// `int swprintf(wchar_t *buffer, const wchar_t *format, ...)`
fn hle_swprintf(ctx: &HleCallContext<'_>) -> Result<i64, MemoryError> {
    let mut args = StackArgList::new(ctx.ppc, ctx.memory, 2);
    wide_printf("swprintf", ctx, ctx.arg32(0), Limit::Unbounded, ctx.arg32(1), &mut args)
}

/// `int _snwprintf(wchar_t *buffer, size_t count, const wchar_t *format, ...)`
fn hle_snwprintf(ctx: &HleCallContext<'_>) -> Result<i64, MemoryError> {
    let mut args = StackArgList::new(ctx.ppc, ctx.memory, 3);
    let limit = Limit::Counted(ctx.arg32(1));
    wide_printf("_snwprintf", ctx, ctx.arg32(0), limit, ctx.arg32(2), &mut args)
}

/// `int vswprintf(wchar_t *buffer, const wchar_t *format, va_list args)`
fn hle_vswprintf(ctx: &HleCallContext<'_>) -> Result<i64, MemoryError> {
    let mut args = ArrayArgList::new(ctx.memory, ctx.arg32(2));
    wide_printf("vswprintf", ctx, ctx.arg32(0), Limit::Unbounded, ctx.arg32(1), &mut args)
}

/// `int _vsnwprintf(wchar_t *buffer, size_t count, const wchar_t *format, va_list args)`
fn hle_vsnwprintf(ctx: &HleCallContext<'_>) -> Result<i64, MemoryError> {
    let mut args = ArrayArgList::new(ctx.memory, ctx.arg32(3));
    let limit = Limit::Counted(ctx.arg32(1));
    wide_printf("_vsnwprintf", ctx, ctx.arg32(0), limit, ctx.arg32(2), &mut args)
}

/// `int _vscwprintf(const wchar_t *format, va_list args)`
///
/// Length the formatted result would have, without storing anything.
fn hle_vscwprintf(ctx: &HleCallContext<'_>) -> Result<i64, MemoryError> {
    let format_ptr = ctx.arg32(0);
    let arg_ptr = ctx.arg32(1);
    trace!("_vscwprintf(format=0x{:08x}, args=0x{:08x})", format_ptr, arg_ptr);

    if format_ptr == 0 {
        return Ok(FAILURE);
    }

    let mut data = WideCountFormatData::new(ctx.memory, format_ptr);
    let mut args = ArrayArgList::new(ctx.memory, arg_ptr);
    formatter(ctx).format(&mut data, &mut args, true)?;

    if ctx.crt.trace_calls {
        debug!("_vscwprintf -> {}", data.count());
    }

    Ok(i64::from(data.count()))
}

/// Bind every formatted-output routine to a stub
pub fn register_crt_functions(dispatcher: &mut HleDispatcher) {
    dispatcher.register_function(CRT_MODULE, "sprintf", hle_sprintf);
    dispatcher.register_function(CRT_MODULE, "_snprintf", hle_snprintf);
    dispatcher.register_function(CRT_MODULE, "vsprintf", hle_vsprintf);
    dispatcher.register_function(CRT_MODULE, "_vsnprintf", hle_vsnprintf);
    dispatcher.register_function(CRT_MODULE, "swprintf", hle_swprintf);
    dispatcher.register_function(CRT_MODULE, "_snwprintf", hle_snwprintf);
    dispatcher.register_function(CRT_MODULE, "vswprintf", hle_vswprintf);
    dispatcher.register_function(CRT_MODULE, "_vsnwprintf", hle_vsnwprintf);
    dispatcher.register_function(CRT_MODULE, "_vscwprintf", hle_vscwprintf);
}
