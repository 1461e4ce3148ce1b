//! Conversion renderers
//!
//! Each renderer turns one already-fetched argument into a sign/radix
//! prefix and a body. Padding to the field width happens in the engine.
//!
//! Floating-point output follows the legacy guest CRT: the value is first
//! converted to 17 significant decimal digits, and that digit string is
//! rounded half-up to the requested precision. Digits past the 17th print
//! as zeros.

use super::format::{FormatFlags, Spec};

/// Upper bound on precision, matching the guest CRT's conversion buffer
pub const MAX_PRECISION: i32 = 512;

/// Minimum number of exponent digits the guest CRT prints (`1.5e+000`)
pub const EXPONENT_DIGITS: usize = 3;

/// Significant digits a double is converted to before rounding
const SIGNIFICANT_DIGITS: usize = 17;

/// Digit count `%p` always prints
const POINTER_DIGITS: i32 = 8;

/// Rendered conversion, ready for padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Sign or radix prefix, emitted before any zero padding
    pub prefix: &'static str,
    /// Conversion body
    pub text: Vec<u16>,
}

impl Rendered {
    fn new(prefix: &'static str, text: Vec<u16>) -> Self {
        Self { prefix, text }
    }

    /// Unprefixed body (characters and strings)
    pub fn text(text: Vec<u16>) -> Self {
        Self::new("", text)
    }
}

fn widen(s: &str) -> Vec<u16> {
    s.bytes().map(u16::from).collect()
}

fn sign_prefix(flags: FormatFlags) -> &'static str {
    if flags.contains(FormatFlags::ADD_NEGATIVE) {
        "-"
    } else if flags.contains(FormatFlags::ADD_POSITIVE) {
        "+"
    } else if flags.contains(FormatFlags::ADD_POSITIVE_AS_SPACE) {
        " "
    } else {
        ""
    }
}

/// Integer conversions: `d i u o x X p`
///
/// `value` carries the argument already sign- or zero-extended to 64 bits
/// according to the size modifier. For `d`/`i` the engine sets `IS_SIGNED`,
/// and `ADD_NEGATIVE` when the value is below zero.
pub fn render_integer(conversion: u8, spec: &Spec, value: u64) -> Rendered {
    let flags = spec.flags;
    let negative = flags.contains(FormatFlags::IS_SIGNED | FormatFlags::ADD_NEGATIVE);
    let mut magnitude = if negative {
        (value as i64).unsigned_abs()
    } else {
        value
    };

    let (radix, digits): (u64, &[u8; 16]) = match conversion {
        b'o' => (8, b"0123456789abcdef"),
        b'x' => (16, b"0123456789abcdef"),
        b'X' | b'p' => (16, b"0123456789ABCDEF"),
        _ => (10, b"0123456789abcdef"),
    };

    let precision = match (conversion, spec.precision) {
        (b'p', _) => POINTER_DIGITS,
        (_, Some(precision)) => precision.min(MAX_PRECISION),
        (_, None) => 1,
    };

    let is_zero = magnitude == 0;
    let mut text = Vec::new();
    while magnitude != 0 {
        text.push(u16::from(digits[(magnitude % radix) as usize]));
        magnitude /= radix;
    }
    while (text.len() as i32) < precision {
        text.push(u16::from(b'0'));
    }

    let alternate = flags.contains(FormatFlags::ADD_PREFIX);
    if conversion == b'o'
        && flags.contains(FormatFlags::FORCE_LEADING_ZERO)
        && text.last() != Some(&u16::from(b'0'))
    {
        text.push(u16::from(b'0'));
    }
    text.reverse();

    let prefix = match conversion {
        b'd' | b'i' => sign_prefix(flags),
        b'x' if alternate && !is_zero => "0x",
        b'X' | b'p' if alternate && !is_zero => "0X",
        _ => "",
    };

    Rendered::new(prefix, text)
}

/// Character conversions: `c C`
pub fn render_char(value: u32, is_wide: bool) -> Rendered {
    let c = if is_wide {
        value as u16
    } else {
        u16::from(value as u8)
    };
    Rendered::text(vec![c])
}

/// Floating-point conversions: `e E f g G`
///
/// The engine sets `ADD_NEGATIVE` when the sign bit of `value` is set.
pub fn render_float(conversion: u8, spec: &Spec, value: f64) -> Rendered {
    let flags = spec.flags;
    let upper = conversion.is_ascii_uppercase();
    let precision = spec.precision.unwrap_or(6).clamp(0, MAX_PRECISION) as usize;
    let alternate = flags.contains(FormatFlags::ADD_PREFIX);
    let magnitude = value.abs();

    let text = if magnitude.is_finite() {
        match conversion.to_ascii_lowercase() {
            b'e' => exponential(magnitude, precision, upper, alternate),
            b'g' => general(magnitude, precision, upper, alternate),
            _ => fixed(magnitude, precision, alternate),
        }
    } else {
        non_finite(conversion, value, precision, upper, alternate)
    };

    Rendered::new(sign_prefix(flags), widen(&text))
}

/// Decimal digit string `d0.d1d2... * 10^exponent`, ASCII digits
struct Decimal {
    digits: Vec<u8>,
    exponent: i32,
}

impl Decimal {
    fn new(magnitude: f64) -> Self {
        let formatted = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, magnitude);
        let (mantissa, exponent) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
        Self {
            digits: mantissa.bytes().filter(u8::is_ascii_digit).collect(),
            exponent: exponent.parse().unwrap_or(0),
        }
    }

    /// Round half-up to `keep` significant digits
    fn round(&mut self, keep: i32) {
        if keep < 0 {
            self.digits.clear();
            return;
        }
        let keep = keep as usize;
        if keep >= self.digits.len() {
            return;
        }

        let round_up = self.digits[keep] >= b'5';
        self.digits.truncate(keep);
        if !round_up {
            return;
        }

        for digit in self.digits.iter_mut().rev() {
            if *digit == b'9' {
                *digit = b'0';
            } else {
                *digit += 1;
                return;
            }
        }

        // carried out of the leading digit
        self.digits.insert(0, b'1');
        self.digits.truncate(keep.max(1));
        self.exponent += 1;
    }

    /// Digit at decimal position `10^position`
    fn digit_at(&self, position: i32) -> char {
        usize::try_from(self.exponent - position)
            .ok()
            .and_then(|index| self.digits.get(index))
            .map_or('0', |&digit| char::from(digit))
    }

    /// `ddd.fff` with `precision` fraction digits
    fn fixed_text(&self, precision: usize, alternate: bool) -> String {
        let mut text: String = (0..=self.exponent.max(0))
            .rev()
            .map(|position| self.digit_at(position))
            .collect();
        if precision > 0 || alternate {
            text.push('.');
        }
        text.extend((1..=precision as i32).map(|position| self.digit_at(-position)));
        text
    }

    /// `d.fff` with `precision` fraction digits, exponent not included
    fn scientific_text(&self, precision: usize, alternate: bool) -> String {
        let mut text = String::new();
        text.push(self.digit_at(self.exponent));
        if precision > 0 || alternate {
            text.push('.');
        }
        text.extend((1..=precision as i32).map(|offset| self.digit_at(self.exponent - offset)));
        text
    }
}

fn exponent_suffix(exponent: i32, upper: bool) -> String {
    format!(
        "{}{}{:0width$}",
        if upper { 'E' } else { 'e' },
        if exponent < 0 { '-' } else { '+' },
        exponent.unsigned_abs(),
        width = EXPONENT_DIGITS
    )
}

fn strip_trailing_zeros(text: &mut String) {
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
}

fn fixed(magnitude: f64, precision: usize, alternate: bool) -> String {
    let mut decimal = Decimal::new(magnitude);
    decimal.round(decimal.exponent + 1 + precision as i32);
    decimal.fixed_text(precision, alternate)
}

fn exponential(magnitude: f64, precision: usize, upper: bool, alternate: bool) -> String {
    let mut decimal = Decimal::new(magnitude);
    decimal.round(precision as i32 + 1);
    decimal.scientific_text(precision, alternate) + &exponent_suffix(decimal.exponent, upper)
}

fn general(magnitude: f64, precision: usize, upper: bool, alternate: bool) -> String {
    let significant = precision.max(1);
    let mut decimal = Decimal::new(magnitude);
    decimal.round(significant as i32);
    let exponent = decimal.exponent;

    if exponent < -4 || exponent >= significant as i32 {
        let mut mantissa = decimal.scientific_text(significant - 1, alternate);
        if !alternate {
            strip_trailing_zeros(&mut mantissa);
        }
        mantissa + &exponent_suffix(exponent, upper)
    } else {
        let decimals = (significant as i32 - 1 - exponent) as usize;
        let mut text = decimal.fixed_text(decimals, alternate);
        if !alternate {
            strip_trailing_zeros(&mut text);
        }
        text
    }
}

/// Fraction spelling of a non-finite value (`1.#INF`)
fn special_fraction(value: f64) -> &'static str {
    const QUIET: u64 = 1 << 51;

    if value.is_infinite() {
        return "#INF";
    }
    let bits = value.to_bits();
    if bits & QUIET == 0 {
        "#SNAN"
    } else if value.is_sign_negative() && bits & (QUIET - 1) == 0 {
        // the x87/VMX default NaN
        "#IND"
    } else {
        "#QNAN"
    }
}

/// `1.#INF00`-style text, the fraction rounded like a digit string
/// (`%.2f` of infinity prints `1.#J`)
fn special_text(fraction: &str, precision: usize, alternate: bool) -> String {
    let mut chars: Vec<u8> = fraction.bytes().collect();
    if precision < chars.len() {
        let round_up = chars[precision] >= b'5';
        chars.truncate(precision);
        if round_up {
            if let Some(last) = chars.last_mut() {
                *last += 1;
            }
        }
    }
    chars.resize(precision, b'0');

    let mut text = String::from("1");
    if precision > 0 || alternate {
        text.push('.');
    }
    text.extend(chars.into_iter().map(char::from));
    text
}

fn non_finite(conversion: u8, value: f64, precision: usize, upper: bool, alternate: bool) -> String {
    let fraction = special_fraction(value);

    match conversion.to_ascii_lowercase() {
        b'e' => special_text(fraction, precision, alternate) + &exponent_suffix(0, upper),
        b'g' => {
            let mut text = special_text(fraction, precision.max(1) - 1, alternate);
            if !alternate {
                strip_trailing_zeros(&mut text);
            }
            text
        }
        _ => special_text(fraction, precision, alternate),
    }
}
