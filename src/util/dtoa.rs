//! Number <-> string conversion
//!
//! Numbers render with 15 significant digits (`%.15g`), which is what the
//! legacy player shows for both single and double precision operands.
//! Parsing is locale independent and accepts the longest numeric prefix.

use regex::bytes::Regex;
use std::sync::LazyLock;

/// Significant digits used when rendering numbers
pub const SIGNIFICANT_DIGITS: usize = 15;

static NUMERIC_PREFIX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[ \t\n\r\x0B\x0C]*([+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)").ok()
});

static HEX_LITERAL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[ \t\n\r]*([+-]?)0[xX]([0-9a-fA-F]+)").ok());

/// Format a number like C's `%.15g`
///
/// NaN and the infinities use the script spellings.
pub fn format_g15(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if x == 0.0 {
        return "0".to_string();
    }

    let sci = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, x);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= SIGNIFICANT_DIGITS as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let decimals = (SIGNIFICANT_DIGITS as i32 - 1 - exp) as usize;
        trim_fraction(&format!("{:.*}", decimals, x)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Parse script text as a number
///
/// Empty input is 0, input without a numeric prefix is NaN, trailing
/// garbage after a valid prefix is ignored.
pub fn parse_number(bytes: &[u8]) -> f64 {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return 0.0;
    }

    if let Some(caps) = HEX_LITERAL.as_ref().and_then(|re| re.captures(bytes)) {
        let negative = caps.get(1).is_some_and(|m| m.as_bytes() == b"-");
        let digits = caps.get(2).map(|m| m.as_bytes()).unwrap_or_default();
        let value = std::str::from_utf8(digits)
            .ok()
            .and_then(|d| u64::from_str_radix(d, 16).ok())
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
        return if negative { -value } else { value };
    }

    let text = trim_ascii_start(bytes);
    for (word, value) in [
        (&b"Infinity"[..], f64::INFINITY),
        (&b"+Infinity"[..], f64::INFINITY),
        (&b"-Infinity"[..], f64::NEG_INFINITY),
    ] {
        if text.starts_with(word) {
            return value;
        }
    }

    NUMERIC_PREFIX
        .as_ref()
        .and_then(|re| re.captures(bytes))
        .and_then(|caps| caps.get(1))
        .and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_integers() {
        assert_eq!(format_g15(0.0), "0");
        assert_eq!(format_g15(15.0), "15");
        assert_eq!(format_g15(-42.0), "-42");
        assert_eq!(format_g15(100000.0), "100000");
        assert_eq!(format_g15(123456789012345.0), "123456789012345");
    }

    #[test]
    fn test_format_fractions() {
        assert_eq!(format_g15(0.5), "0.5");
        assert_eq!(format_g15(3.14159), "3.14159");
        assert_eq!(format_g15(0.1), "0.1");
        // Single precision widened keeps its representation error
        assert_eq!(format_g15(0.1f32 as f64), "0.100000001490116");
        assert_eq!(format_g15(1.0 / 3.0), "0.333333333333333");
    }

    #[test]
    fn test_format_exponents() {
        assert_eq!(format_g15(1e15), "1e+15");
        assert_eq!(format_g15(1.5e20), "1.5e+20");
        assert_eq!(format_g15(0.0001), "0.0001");
        assert_eq!(format_g15(0.00001), "1e-05");
        assert_eq!(format_g15(-2.5e-7), "-2.5e-07");
    }

    #[test]
    fn test_format_special() {
        assert_eq!(format_g15(f64::NAN), "NaN");
        assert_eq!(format_g15(f64::INFINITY), "Infinity");
        assert_eq!(format_g15(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(b""), 0.0);
        assert_eq!(parse_number(b"3"), 3.0);
        assert_eq!(parse_number(b"  -2.5"), -2.5);
        assert_eq!(parse_number(b"1e3"), 1000.0);
        assert_eq!(parse_number(b".5"), 0.5);
        assert_eq!(parse_number(b"12abc"), 12.0);
        assert_eq!(parse_number(b"0x1F"), 31.0);
        assert_eq!(parse_number(b"-Infinity"), f64::NEG_INFINITY);
        assert!(parse_number(b"abc").is_nan());
        assert!(parse_number(b"-").is_nan());
    }
}
