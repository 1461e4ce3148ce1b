//! printf-family format engine
//!
//! A character-at-a-time state machine over a [`FormatData`] channel. It
//! pulls arguments from an [`ArgList`] and is shared by every narrow, wide
//! and counting entry point.
//!
//! Conversions the guest CRT does not know are echoed as their conversion
//! character (`%y` prints `y`) without consuming an argument. A terminator
//! inside a specifier abandons that specifier.

use bitflags::bitflags;
use tracing::{debug, trace, warn};
use xr_core::error::MemoryError;
use xr_memory::{GuestAccess, Translate};

use super::args::ArgList;
use super::data::FormatData;
use super::render::{render_char, render_float, render_integer, Rendered};

/// Parser position inside a conversion specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatState {
    /// Input ended inside a specification
    Invalid,
    /// The conversion character was not recognized
    Unknown,
    Start,
    Flags,
    Width,
    PrecisionStart,
    Precision,
    Size,
    Type,
    /// A conversion was fully handled
    End,
}

bitflags! {
    /// Per-specification flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FormatFlags: u32 {
        const LEFT_JUSTIFY          = 1 << 0;
        const ADD_LEADING_ZEROS     = 1 << 1;
        const ADD_POSITIVE          = 1 << 2;
        const ADD_POSITIVE_AS_SPACE = 1 << 3;
        const ADD_NEGATIVE          = 1 << 4;
        /// `#` alternate form
        const ADD_PREFIX            = 1 << 5;
        const IS_SHORT              = 1 << 6;
        const IS_LONG               = 1 << 7;
        const IS_LONG_LONG          = 1 << 8;
        const IS_WIDE               = 1 << 9;
        const IS_SIGNED             = 1 << 10;
        /// Octal alternate form: the body must start with `0`
        const FORCE_LEADING_ZERO    = 1 << 11;
        /// `C`/`S`: opposite character width from the routine's own
        const INVERT_WIDE           = 1 << 12;
    }
}

/// Argument width selected by the size modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgumentSize {
    #[default]
    Default,
    Short,
    Long,
    LongLong,
}

/// One conversion specification (`%-08.3lx`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Spec {
    pub flags: FormatFlags,
    pub width: i32,
    /// `None` until a `.` is seen (or after a negative `*` precision)
    pub precision: Option<i32>,
}

impl Spec {
    /// Argument width implied by the size flags
    pub fn size(&self) -> ArgumentSize {
        if self.flags.contains(FormatFlags::IS_LONG_LONG) {
            ArgumentSize::LongLong
        } else if self.flags.contains(FormatFlags::IS_LONG) {
            ArgumentSize::Long
        } else if self.flags.contains(FormatFlags::IS_SHORT) {
            ArgumentSize::Short
        } else {
            ArgumentSize::Default
        }
    }

    /// Whether a `c`/`s`/`Z` argument is a wide string or character
    ///
    /// `l`/`w` force wide and `h` forces narrow; otherwise the routine's own
    /// width applies, flipped for `C`/`S`.
    pub fn is_wide(&self, routine_is_wide: bool) -> bool {
        if self.flags.intersects(FormatFlags::IS_LONG | FormatFlags::IS_WIDE) {
            true
        } else if self.flags.contains(FormatFlags::IS_SHORT) {
            false
        } else {
            self.flags.contains(FormatFlags::INVERT_WIDE) ^ routine_is_wide
        }
    }
}

/// Outcome of the `Type` state
enum Conversion {
    Render(Rendered),
    /// `%n`: nothing to emit
    Stored,
    Unknown(u16),
}

const NULL_STRING: &str = "(null)";

fn is_digit(c: u16) -> Option<i32> {
    (u16::from(b'0')..=u16::from(b'9'))
        .contains(&c)
        .then(|| i32::from(c - u16::from(b'0')))
}

fn flag_for(c: u16) -> Option<FormatFlags> {
    match u8::try_from(c).ok()? {
        b'-' => Some(FormatFlags::LEFT_JUSTIFY),
        b'+' => Some(FormatFlags::ADD_POSITIVE),
        b' ' => Some(FormatFlags::ADD_POSITIVE_AS_SPACE),
        b'#' => Some(FormatFlags::ADD_PREFIX),
        b'0' => Some(FormatFlags::ADD_LEADING_ZEROS),
        _ => None,
    }
}

fn null_text() -> Vec<u16> {
    NULL_STRING.bytes().map(u16::from).collect()
}

/// The format engine, bound to the guest memory of one call
pub struct Formatter<'m> {
    memory: &'m dyn Translate,
    max_string_length: u32,
}

impl<'m> Formatter<'m> {
    pub fn new(memory: &'m dyn Translate) -> Self {
        Self {
            memory,
            max_string_length: 16384,
        }
    }

    /// Cap on characters read for a `%s` argument without precision
    pub fn with_max_string_length(mut self, max: u32) -> Self {
        self.max_string_length = max;
        self
    }

    /// Run the format string in `data` against `args`.
    ///
    /// `wide` says whether the calling routine is a wide-character one,
    /// which decides the default width of `%c`/`%s`. Returns the number of
    /// characters the sink accepted.
    pub fn format<D, A>(&self, data: &mut D, args: &mut A, wide: bool) -> Result<i32, MemoryError>
    where
        D: FormatData + ?Sized,
        A: ArgList + ?Sized,
    {
        let mut count: i32 = 0;
        let counting = data.is_counting();
        let mut state = FormatState::Start;
        let mut spec = Spec::default();

        loop {
            let c = data.get()?;

            if c == 0 {
                if state != FormatState::Start {
                    state = FormatState::Invalid;
                    trace!("format string ended inside a specification ({:?})", state);
                }
                break;
            }

            if state == FormatState::Start {
                if c == u16::from(b'%') {
                    state = FormatState::Flags;
                    spec = Spec::default();
                } else {
                    put_counted(data, c, &mut count);
                }
                continue;
            }

            if state == FormatState::Flags {
                if let Some(flag) = flag_for(c) {
                    spec.flags |= flag;
                    continue;
                }
                state = FormatState::Width;
            }

            if state == FormatState::Width {
                if c == u16::from(b'*') {
                    let width = args.get32()? as i32;
                    if width < 0 {
                        spec.flags |= FormatFlags::LEFT_JUSTIFY;
                    }
                    spec.width = width.unsigned_abs().min(i32::MAX as u32) as i32;
                    state = FormatState::PrecisionStart;
                    continue;
                }
                if let Some(digit) = is_digit(c) {
                    spec.width = spec.width.saturating_mul(10).saturating_add(digit);
                    continue;
                }
                state = FormatState::PrecisionStart;
            }

            if state == FormatState::PrecisionStart {
                if c == u16::from(b'.') {
                    spec.precision = Some(0);
                    state = FormatState::Precision;
                    continue;
                }
                state = FormatState::Size;
            }

            if state == FormatState::Precision {
                if c == u16::from(b'*') {
                    let precision = args.get32()? as i32;
                    spec.precision = (precision >= 0).then_some(precision);
                    state = FormatState::Size;
                    continue;
                }
                if let Some(digit) = is_digit(c) {
                    let precision = spec.precision.unwrap_or(0);
                    spec.precision = Some(precision.saturating_mul(10).saturating_add(digit));
                    continue;
                }
                state = FormatState::Size;
            }

            if state == FormatState::Size {
                state = FormatState::Type;
                if self.size_modifier(c, data, &mut spec)? {
                    continue;
                }
            }

            match self.convert(c, &mut spec, args, wide, count, counting)? {
                Conversion::Render(rendered) => {
                    count += emit(data, &spec, &rendered);
                    state = FormatState::End;
                }
                Conversion::Stored => state = FormatState::End,
                Conversion::Unknown(c) => {
                    warn!("unknown format conversion '{}'", char::from_u32(c.into()).unwrap_or('?'));
                    put_counted(data, c, &mut count);
                    state = FormatState::Unknown;
                }
            }

            if matches!(state, FormatState::End | FormatState::Unknown) {
                state = FormatState::Start;
            }
        }

        Ok(count)
    }

    /// Consume a size modifier starting at `c`. Returns `false` when `c` is
    /// not a modifier and must be handled as the conversion character.
    fn size_modifier<D: FormatData + ?Sized>(
        &self,
        c: u16,
        data: &mut D,
        spec: &mut Spec,
    ) -> Result<bool, MemoryError> {
        let Ok(c) = u8::try_from(c) else {
            return Ok(false);
        };

        match c {
            b'h' => {
                if data.peek(0)? == u16::from(b'h') {
                    data.skip(1)?;
                }
                spec.flags |= FormatFlags::IS_SHORT;
            }
            b'l' => {
                if data.peek(0)? == u16::from(b'l') {
                    data.skip(1)?;
                    spec.flags |= FormatFlags::IS_LONG_LONG;
                } else {
                    spec.flags |= FormatFlags::IS_LONG;
                }
            }
            b'w' => spec.flags |= FormatFlags::IS_WIDE,
            b'q' => spec.flags |= FormatFlags::IS_LONG_LONG,
            // Accepted and ignored, as the guest CRT does
            b'L' => {}
            b'I' => {
                let next = (data.peek(0)?, data.peek(1)?);
                if next == (u16::from(b'6'), u16::from(b'4')) {
                    data.skip(2)?;
                    spec.flags |= FormatFlags::IS_LONG_LONG;
                } else if next == (u16::from(b'3'), u16::from(b'2')) {
                    data.skip(2)?;
                }
            }
            _ => return Ok(false),
        }

        Ok(true)
    }

    fn convert<A: ArgList + ?Sized>(
        &self,
        c: u16,
        spec: &mut Spec,
        args: &mut A,
        wide: bool,
        count: i32,
        counting: bool,
    ) -> Result<Conversion, MemoryError> {
        let Ok(conversion) = u8::try_from(c) else {
            return Ok(Conversion::Unknown(c));
        };

        let conversion = match conversion {
            b'%' => Conversion::Render(Rendered::text(vec![c])),

            b'C' | b'c' => {
                if conversion == b'C' {
                    spec.flags |= FormatFlags::INVERT_WIDE;
                }
                let value = args.get32()?;
                Conversion::Render(render_char(value, spec.is_wide(wide)))
            }

            b'd' | b'i' | b'u' | b'o' | b'x' | b'X' => {
                if matches!(conversion, b'd' | b'i') {
                    spec.flags |= FormatFlags::IS_SIGNED;
                }
                if conversion == b'o' && spec.flags.contains(FormatFlags::ADD_PREFIX) {
                    spec.flags |= FormatFlags::FORCE_LEADING_ZERO;
                }
                // an explicit precision turns off zero padding
                if spec.precision.is_some() {
                    spec.flags.remove(FormatFlags::ADD_LEADING_ZEROS);
                }
                let value = self.integer_argument(spec, args)?;
                if spec.flags.contains(FormatFlags::IS_SIGNED) && (value as i64) < 0 {
                    spec.flags |= FormatFlags::ADD_NEGATIVE;
                }
                Conversion::Render(render_integer(conversion, spec, value))
            }

            b'p' => {
                // always a fixed-precision conversion
                spec.flags.remove(FormatFlags::ADD_LEADING_ZEROS);
                let value = u64::from(args.get32()?);
                Conversion::Render(render_integer(conversion, spec, value))
            }

            b'e' | b'E' | b'f' | b'g' | b'G' => {
                let value = f64::from_bits(args.get64()?);
                if value.is_sign_negative() {
                    spec.flags |= FormatFlags::ADD_NEGATIVE;
                }
                Conversion::Render(render_float(conversion, spec, value))
            }

            b'S' | b's' => {
                if conversion == b'S' {
                    spec.flags |= FormatFlags::INVERT_WIDE;
                }
                let ptr = args.get32()?;
                let limit = match spec.precision {
                    Some(precision) => precision.clamp(0, i32::MAX) as u32,
                    None => self.max_string_length,
                };
                let text = if ptr == 0 {
                    let mut text = null_text();
                    text.truncate(limit as usize);
                    text
                } else {
                    self.read_string(ptr, spec.is_wide(wide), limit)?
                };
                Conversion::Render(Rendered::text(text))
            }

            b'Z' => {
                let ptr = args.get32()?;
                Conversion::Render(Rendered::text(self.read_counted_string(
                    ptr,
                    spec.is_wide(wide),
                )?))
            }

            b'n' => {
                let ptr = args.get32()?;
                if ptr != 0 && !counting {
                    if spec.flags.contains(FormatFlags::IS_SHORT) {
                        self.memory.write_be16(ptr, count as u16)?;
                    } else {
                        self.memory.write_be32(ptr, count as u32)?;
                    }
                }
                Conversion::Stored
            }

            _ => Conversion::Unknown(c),
        };

        Ok(conversion)
    }

    /// Fetch an integer argument extended to 64 bits per size and signedness
    fn integer_argument<A: ArgList + ?Sized>(
        &self,
        spec: &Spec,
        args: &mut A,
    ) -> Result<u64, MemoryError> {
        let signed = spec.flags.contains(FormatFlags::IS_SIGNED);

        let value = match spec.size() {
            ArgumentSize::LongLong => args.get64()?,
            ArgumentSize::Short => {
                let raw = args.get32()? as u16;
                if signed {
                    raw as i16 as i64 as u64
                } else {
                    u64::from(raw)
                }
            }
            ArgumentSize::Default | ArgumentSize::Long => {
                let raw = args.get32()?;
                if signed {
                    raw as i32 as i64 as u64
                } else {
                    u64::from(raw)
                }
            }
        };

        Ok(value)
    }

    /// Read up to `limit` characters of a null-terminated guest string
    fn read_string(&self, ptr: u32, is_wide: bool, limit: u32) -> Result<Vec<u16>, MemoryError> {
        let mut text = Vec::new();
        let mut addr = ptr;

        while (text.len() as u32) < limit {
            let c = if is_wide {
                self.memory.read_be16(addr)?
            } else {
                u16::from(self.memory.read_u8(addr)?)
            };
            if c == 0 {
                break;
            }
            text.push(c);
            addr = addr.wrapping_add(if is_wide { 2 } else { 1 });
        }

        Ok(text)
    }

    /// Read a guest `ANSI_STRING`/`UNICODE_STRING`
    /// (`{ be16 length_in_bytes, be16 maximum_length, be32 buffer }`)
    fn read_counted_string(&self, ptr: u32, is_wide: bool) -> Result<Vec<u16>, MemoryError> {
        if ptr == 0 {
            return Ok(null_text());
        }

        let length = self.memory.read_be16(ptr)?;
        let buffer = self.memory.read_be32(ptr.wrapping_add(4))?;
        if buffer == 0 {
            return Ok(null_text());
        }

        let text = if is_wide {
            (0..u32::from(length / 2))
                .map(|i| self.memory.read_be16(buffer.wrapping_add(i * 2)))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            self.memory
                .read_bytes(buffer, u32::from(length))?
                .into_iter()
                .map(u16::from)
                .collect()
        };

        Ok(text)
    }
}

/// Put one character, counting it only if the sink took it
fn put_counted<D: FormatData + ?Sized>(data: &mut D, c: u16, count: &mut i32) {
    if data.put(c) {
        *count += 1;
    } else {
        debug!("sink rejected character 0x{:04x}", c);
    }
}

/// Write a rendered conversion with field-width padding
fn emit<D: FormatData + ?Sized>(data: &mut D, spec: &Spec, rendered: &Rendered) -> i32 {
    let left = spec.flags.contains(FormatFlags::LEFT_JUSTIFY);
    let zeros = !left && spec.flags.contains(FormatFlags::ADD_LEADING_ZEROS);

    let length = rendered.prefix.len() as i64 + rendered.text.len() as i64;
    let padding = (i64::from(spec.width) - length).max(0);

    let mut count = 0;

    if !left && !zeros {
        for _ in 0..padding {
            put_counted(data, u16::from(b' '), &mut count);
        }
    }

    for c in rendered.prefix.bytes() {
        put_counted(data, u16::from(c), &mut count);
    }

    if zeros {
        for _ in 0..padding {
            put_counted(data, u16::from(b'0'), &mut count);
        }
    }

    for &c in &rendered.text {
        put_counted(data, c, &mut count);
    }

    if left {
        for _ in 0..padding {
            put_counted(data, u16::from(b' '), &mut count);
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crt::args::ArrayArgList;
    use crate::crt::data::{StringFormatData, WideCountFormatData, WideStringFormatData};
    use std::sync::Arc;
    use xr_memory::GuestMemory;

    const FORMAT: u32 = 0x1000;
    const ARGS: u32 = 0x2000;
    const STRINGS: u32 = 0x3000;

    fn setup(format: &str, args: &[u64]) -> Arc<GuestMemory> {
        let mem = GuestMemory::new(0x10000).unwrap();
        mem.write_bytes(FORMAT, format.as_bytes()).unwrap();
        mem.write_u8(FORMAT + format.len() as u32, 0).unwrap();
        for (i, &arg) in args.iter().enumerate() {
            mem.write_be64(ARGS + 8 * i as u32, arg).unwrap();
        }
        mem
    }

    fn narrow(format: &str, args: &[u64]) -> String {
        let mem = setup(format, args);
        narrow_in(&mem)
    }

    fn narrow_in(mem: &Arc<GuestMemory>) -> String {
        let mut data = StringFormatData::new(&**mem, FORMAT);
        let mut args = ArrayArgList::new(&**mem, ARGS);
        let count = Formatter::new(&**mem)
            .format(&mut data, &mut args, false)
            .unwrap();
        assert_eq!(count as usize, data.bytes().len());
        String::from_utf8_lossy(data.bytes()).into_owned()
    }

    #[test]
    fn test_literal_text() {
        assert_eq!(narrow("plain text, no specs", &[]), "plain text, no specs");
        assert_eq!(narrow("", &[]), "");
    }

    #[test]
    fn test_percent_literal() {
        assert_eq!(narrow("%%d", &[]), "%d");
        assert_eq!(narrow("100%% %d", &[5]), "100% 5");
        assert_eq!(narrow("%5%|%-3%|%03%", &[]), "    %|%  |00%");
    }

    #[test]
    fn test_zero_flag_pads_every_conversion() {
        let mem = setup(
            "%05s|%05c|%-05s|%05Z|%012.3e|%010f|%010f",
            &[
                STRINGS as u64,
                b'x' as u64,
                STRINGS as u64,
                0x3100,
                1.5f64.to_bits(),
                f64::INFINITY.to_bits(),
                f64::NEG_INFINITY.to_bits(),
            ],
        );
        mem.write_bytes(STRINGS, b"hi\0").unwrap();
        mem.write_be16(0x3100, 2).unwrap();
        mem.write_be32(0x3104, 0x3200).unwrap();
        mem.write_bytes(0x3200, b"ok").unwrap();
        assert_eq!(
            narrow_in(&mem),
            "000hi|0000x|hi   |000ok|001.500e+000|001.#INF00|-01.#INF00"
        );
    }

    #[test]
    fn test_float_ties_round_up() {
        let args = [0.125f64.to_bits(), 2.5f64.to_bits(), 0.25f64.to_bits()];
        assert_eq!(narrow("%.2f %.0f %.1f", &args), "0.13 3 0.3");
        assert_eq!(narrow("%.1e", &[0.125f64.to_bits()]), "1.3e-001");
    }

    #[test]
    fn test_general_alternate_form() {
        let args = [100000f64.to_bits(), 999999.5f64.to_bits(), 999999.5f64.to_bits()];
        assert_eq!(narrow("%#g|%#g|%g", &args), "100000.|1.00000e+006|1e+006");
    }

    #[test]
    fn test_non_finite_floats() {
        let args = [f64::NAN.to_bits(), (-f64::NAN).to_bits(), f64::INFINITY.to_bits()];
        assert_eq!(narrow("%f %f %.2f", &args), "1.#QNAN0 -1.#IND00 1.#J");
    }

    #[test]
    fn test_integers() {
        assert_eq!(narrow("Score: %d", &[42]), "Score: 42");
        assert_eq!(narrow("%d", &[0xFFFF_FFFF]), "-1");
        assert_eq!(narrow("%u", &[0xFFFF_FFFF]), "4294967295");
        assert_eq!(narrow("%5d|%-5d|%05d", &[42, 42, 42]), "   42|42   |00042");
        assert_eq!(narrow("%+d % d", &[3, 3]), "+3  3");
        assert_eq!(narrow("%05d", &[-42i64 as u64]), "-0042");
        assert_eq!(narrow("%.3d", &[7]), "007");
        assert_eq!(narrow("%08.3d", &[7]), "     007");
        assert_eq!(narrow("%-05d|", &[7]), "7    |");
        assert_eq!(narrow("%x %X %#x %#o", &[255, 255, 255, 8]), "ff FF 0xff 010");
    }

    #[test]
    fn test_size_modifiers() {
        assert_eq!(narrow("%hd", &[0x1_FFFF]), "-1");
        assert_eq!(narrow("%hu", &[0x1_FFFF]), "65535");
        assert_eq!(narrow("%hhd", &[5]), "5");
        assert_eq!(narrow("%lld", &[-5i64 as u64]), "-5");
        assert_eq!(narrow("%I64x", &[0x1234_5678_9ABC_DEF0]), "123456789abcdef0");
        assert_eq!(narrow("%I32d", &[0x1_0000_0007]), "7");
        assert_eq!(narrow("%qu", &[u64::MAX]), "18446744073709551615");
        assert_eq!(narrow("%ld", &[0x1_0000_0007]), "7");
        assert_eq!(narrow("%Lf", &[2.5f64.to_bits()]), "2.500000");
    }

    #[test]
    fn test_star_width_and_precision() {
        assert_eq!(narrow("%*d|", &[6, 42]), "    42|");
        assert_eq!(narrow("%*d|", &[-6i64 as u64, 42]), "42    |");
        assert_eq!(narrow("%.*f", &[1, 2.34f64.to_bits()]), "2.3");
        assert_eq!(narrow("%.*d", &[-1i64 as u64, 0]), "0");
        assert_eq!(narrow("%*.*s|", &[5, 2, 0]), "   (n|");
    }

    #[test]
    fn test_floats() {
        assert_eq!(narrow("%05.2f", &[3.14159f64.to_bits()]), "03.14");
        assert_eq!(narrow("%f", &[(-0.5f64).to_bits()]), "-0.500000");
        assert_eq!(narrow("%08.3f", &[(-1.5f64).to_bits()]), "-001.500");
        assert_eq!(narrow("%e", &[1234.5f64.to_bits()]), "1.234500e+003");
        assert_eq!(narrow("%g", &[0.5f64.to_bits()]), "0.5");
    }

    #[test]
    fn test_strings() {
        let mem = setup("%-10s|%s|%.3s|%S", &[STRINGS as u64, 0, STRINGS as u64, 0x3100]);
        mem.write_bytes(STRINGS, b"hi\0").unwrap();
        mem.write_be16_slice(0x3100, &[0x0057, 0x0021, 0]).unwrap();
        assert_eq!(narrow_in(&mem), "hi        |(null)|hi|W!");
    }

    #[test]
    fn test_string_cap() {
        let mem = setup("%s", &[STRINGS as u64]);
        mem.write_bytes(STRINGS, b"abcdefgh\0").unwrap();

        let mut data = StringFormatData::new(&*mem, FORMAT);
        let mut args = ArrayArgList::new(&*mem, ARGS);
        Formatter::new(&*mem)
            .with_max_string_length(4)
            .format(&mut data, &mut args, false)
            .unwrap();
        assert_eq!(data.bytes(), b"abcd");
    }

    #[test]
    fn test_counted_string() {
        let mem = setup("[%Z] [%wZ] [%Z]", &[0x3000, 0x3010, 0]);
        mem.write_be16(0x3000, 5).unwrap();
        mem.write_be16(0x3002, 8).unwrap();
        mem.write_be32(0x3004, 0x3100).unwrap();
        mem.write_bytes(0x3100, b"hello, world").unwrap();
        mem.write_be16(0x3010, 4).unwrap();
        mem.write_be32(0x3014, 0x3200).unwrap();
        mem.write_be16_slice(0x3200, &[0x004F, 0x004B, 0x0021]).unwrap();
        assert_eq!(narrow_in(&mem), "[hello] [OK] [(null)]");
    }

    #[test]
    fn test_chars() {
        assert_eq!(narrow("%c%c%3c", &[b'a' as u64, b'b' as u64, b'c' as u64]), "ab  c");
    }

    #[test]
    fn test_wide_char_dropped_on_narrow_sink() {
        let mem = setup("<%lc>%d", &[0x100, 9]);
        let mut data = StringFormatData::new(&*mem, FORMAT);
        let mut args = ArrayArgList::new(&*mem, ARGS);
        let count = Formatter::new(&*mem)
            .format(&mut data, &mut args, false)
            .unwrap();
        assert_eq!(data.bytes(), b"<>9");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_store_count() {
        let mem = setup("abc%n%hnde", &[0x3000, 0x3010]);
        assert_eq!(narrow_in(&mem), "abcde");
        assert_eq!(mem.read_be32(0x3000).unwrap(), 3);
        assert_eq!(mem.read_be16(0x3010).unwrap(), 3);
    }

    #[test]
    fn test_pointer() {
        assert_eq!(narrow("%p", &[0x8200_00F0]), "820000F0");
        assert_eq!(narrow("%.4p|%010p|%#p", &[0x12, 0x12, 0x12]), "00000012|  00000012|0X00000012");
    }

    #[test]
    fn test_store_count_skipped_when_counting() {
        let mem = GuestMemory::new(0x10000).unwrap();
        let units: Vec<u16> = "ab%n".encode_utf16().chain(std::iter::once(0)).collect();
        mem.write_be16_slice(FORMAT, &units).unwrap();
        mem.write_be64(ARGS, 0x3000).unwrap();
        mem.write_be32(0x3000, 0xDEAD_BEEF).unwrap();

        let mut counter = WideCountFormatData::new(&*mem, FORMAT);
        let count = Formatter::new(&*mem)
            .format(&mut counter, &mut ArrayArgList::new(&*mem, ARGS), true)
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(mem.read_be32(0x3000).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn test_unknown_conversion_echoed() {
        assert_eq!(narrow("a%yb%d", &[4]), "ayb4");
        assert_eq!(narrow("%5k|", &[]), "k|");
    }

    #[test]
    fn test_terminator_inside_spec() {
        assert_eq!(narrow("abc%", &[]), "abc");
        assert_eq!(narrow("abc%-08", &[]), "abc");
        assert_eq!(narrow("abc%.", &[]), "abc");
        assert_eq!(narrow("abc%l", &[]), "abc");
        assert_eq!(narrow("abc%I", &[]), "abc");
        assert_eq!(narrow("%I6d", &[]), "6d");
    }

    #[test]
    fn test_wide_and_count_agree() {
        let format = "n=%d s=%-4s|%05x";
        let mem = GuestMemory::new(0x10000).unwrap();
        let units: Vec<u16> = format.encode_utf16().chain(std::iter::once(0)).collect();
        mem.write_be16_slice(FORMAT, &units).unwrap();
        mem.write_be16_slice(STRINGS, &[0x6F, 0x6B, 0]).unwrap();
        for (i, arg) in [12u64, STRINGS as u64, 0xBEEF].iter().enumerate() {
            mem.write_be64(ARGS + 8 * i as u32, *arg).unwrap();
        }

        let mut wide = WideStringFormatData::new(&*mem, FORMAT);
        let written = Formatter::new(&*mem)
            .format(&mut wide, &mut ArrayArgList::new(&*mem, ARGS), true)
            .unwrap();
        assert_eq!(String::from_utf16_lossy(wide.units()), "n=12 s=ok  |0beef");

        let mut counter = WideCountFormatData::new(&*mem, FORMAT);
        let counted = Formatter::new(&*mem)
            .format(&mut counter, &mut ArrayArgList::new(&*mem, ARGS), true)
            .unwrap();
        assert_eq!(counter.count(), wide.units().len() as i32);
        assert_eq!(counted, written);
    }

    #[test]
    fn test_spec_wideness() {
        let mut spec = Spec::default();
        assert!(!spec.is_wide(false));
        assert!(spec.is_wide(true));

        spec.flags = FormatFlags::INVERT_WIDE;
        assert!(spec.is_wide(false));
        assert!(!spec.is_wide(true));

        spec.flags = FormatFlags::IS_SHORT | FormatFlags::INVERT_WIDE;
        assert!(!spec.is_wide(false));

        spec.flags = FormatFlags::IS_WIDE;
        assert!(spec.is_wide(false));
        assert_eq!(spec.size(), ArgumentSize::Default);
    }
}
