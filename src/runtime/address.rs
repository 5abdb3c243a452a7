//! Conversions between IPv4 addresses and their IPv4-mapped IPv6 form.
//!
//! The scanner stores every target as an IPv6 address. IPv4 targets live in
//! the `::ffff:a.b.c.d` range and must always be printed as dotted quads.

use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit1, hex_digit0, oct_digit0},
    combinator::{all_consuming, map_res},
    multi::separated_list1,
    sequence::preceded,
    IResult,
};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => write!(f, "IPv4"),
            AddressFamily::V6 => write!(f, "IPv6"),
        }
    }
}

pub fn is_v4_mapped(addr: &Ipv6Addr) -> bool {
    addr.to_ipv4_mapped().is_some()
}

pub fn to_mapped(addr: Ipv4Addr) -> Ipv6Addr {
    addr.to_ipv6_mapped()
}

pub fn from_mapped(addr: &Ipv6Addr) -> Option<Ipv4Addr> {
    addr.to_ipv4_mapped()
}

pub fn family_of(addr: &Ipv6Addr) -> AddressFamily {
    if is_v4_mapped(addr) {
        AddressFamily::V4
    } else {
        AddressFamily::V6
    }
}

/// True for `::` and for the mapped form of `0.0.0.0`.
pub fn is_any(addr: &Ipv6Addr) -> bool {
    addr.is_unspecified() || from_mapped(addr).is_some_and(|v4| v4.is_unspecified())
}

/// Dotted quad for mapped addresses, regular IPv6 text otherwise.
pub fn to_text(addr: &Ipv6Addr) -> String {
    match from_mapped(addr) {
        Some(v4) => v4.to_string(),
        None => addr.to_string(),
    }
}

/// Folds a generic address into the scanner's IPv6 representation.
pub fn normalize(addr: IpAddr) -> Ipv6Addr {
    match addr {
        IpAddr::V4(v4) => to_mapped(v4),
        IpAddr::V6(v6) => v6,
    }
}

/// Inverse of [`normalize`]: mapped addresses come back as IPv4.
pub fn denormalize(addr: &Ipv6Addr) -> IpAddr {
    match from_mapped(addr) {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(*addr),
    }
}

/// Parses an IPv4 literal with the classic `inet_aton` rules: one to four
/// dot-separated parts, each decimal, octal (leading `0`) or hex (`0x`), the
/// last part filling every remaining byte.
pub fn parse_v4_literal(text: &str) -> Option<Ipv4Addr> {
    let (_, parts) = all_consuming(separated_list1(char('.'), literal_part))(text).ok()?;
    assemble(&parts).map(Ipv4Addr::from)
}

/// Accepts an IPv4 literal (stored mapped) or IPv6 text.
pub fn parse_target(text: &str) -> Option<Ipv6Addr> {
    let text = text.trim();
    if let Some(v4) = parse_v4_literal(text) {
        return Some(to_mapped(v4));
    }
    text.parse().ok()
}

fn literal_part(input: &str) -> IResult<&str, u64> {
    alt((hex_part, octal_part, decimal_part))(input)
}

/// A bare `0x` is zero, as `inet_aton` reads it.
fn hex_part(input: &str) -> IResult<&str, u64> {
    map_res(preceded(tag_no_case("0x"), hex_digit0), |digits: &str| {
        if digits.is_empty() {
            Ok(0)
        } else {
            u64::from_str_radix(digits, 16)
        }
    })(input)
}

fn octal_part(input: &str) -> IResult<&str, u64> {
    map_res(preceded(char('0'), oct_digit0), |digits: &str| {
        if digits.is_empty() {
            Ok(0)
        } else {
            u64::from_str_radix(digits, 8)
        }
    })(input)
}

fn decimal_part(input: &str) -> IResult<&str, u64> {
    map_res(digit1, |digits: &str| digits.parse::<u64>())(input)
}

fn assemble(parts: &[u64]) -> Option<u32> {
    let (last, leading) = parts.split_last()?;
    if leading.len() > 3 || leading.iter().any(|part| *part > 0xff) {
        return None;
    }
    let width = 8 * (4 - leading.len() as u32);
    let limit = if width == 32 {
        u64::from(u32::MAX)
    } else {
        (1u64 << width) - 1
    };
    if *last > limit {
        return None;
    }
    let mut addr = *last as u32;
    for (idx, part) in leading.iter().enumerate() {
        addr |= (*part as u32) << (24 - 8 * idx as u32);
    }
    Some(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_addresses_render_as_dotted_quad() {
        for v4 in [
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(192, 0, 2, 254),
            Ipv4Addr::new(255, 255, 255, 255),
            Ipv4Addr::UNSPECIFIED,
        ] {
            let mapped = to_mapped(v4);
            assert!(is_v4_mapped(&mapped));
            assert_eq!(to_text(&mapped), v4.to_string());
            assert!(!to_text(&mapped).contains(':'));
        }
    }

    #[test]
    fn native_ipv6_renders_as_ipv6_text() {
        for text in ["2001:db8::1", "::1", "fe80::abcd:1", "::"] {
            let addr: Ipv6Addr = text.parse().unwrap();
            assert!(!is_v4_mapped(&addr));
            assert_eq!(to_text(&addr), text);
        }
    }

    #[test]
    fn v4_compatible_form_is_not_mapped() {
        let compat: Ipv6Addr = "::10.0.0.1".parse().unwrap();
        assert!(!is_v4_mapped(&compat));
        assert!(to_text(&compat).contains(':'));
    }

    #[test]
    fn parses_inet_aton_shorthand() {
        assert_eq!(parse_v4_literal("10.0.0.5"), Some(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(parse_v4_literal("10.1"), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(parse_v4_literal("10.1.2"), Some(Ipv4Addr::new(10, 1, 0, 2)));
        assert_eq!(parse_v4_literal("0x7f.1"), Some(Ipv4Addr::new(127, 0, 0, 1)));
        assert_eq!(parse_v4_literal("010.0.0.1"), Some(Ipv4Addr::new(8, 0, 0, 1)));
        assert_eq!(
            parse_v4_literal("3232235777"),
            Some(Ipv4Addr::new(192, 168, 1, 1))
        );
        assert_eq!(parse_v4_literal("0"), Some(Ipv4Addr::UNSPECIFIED));
        assert_eq!(parse_v4_literal("0x"), Some(Ipv4Addr::UNSPECIFIED));
        assert_eq!(parse_v4_literal("10.0x"), Some(Ipv4Addr::new(10, 0, 0, 0)));
    }

    #[test]
    fn rejects_non_literals() {
        for text in [
            "",
            "host.example",
            "256.0.0.1",
            "1.2.3.4.5",
            "1..2",
            "1.2.3.",
            "08.1.1.1",
            "1.2.3.256",
            "10.0x1000000",
            "4294967296",
            "0xg",
            "1.2.3.4 ",
        ] {
            assert_eq!(parse_v4_literal(text), None, "{text:?} should not parse");
        }
    }

    #[test]
    fn any_covers_both_families() {
        assert!(is_any(&Ipv6Addr::UNSPECIFIED));
        assert!(is_any(&to_mapped(Ipv4Addr::UNSPECIFIED)));
        assert!(!is_any(&to_mapped(Ipv4Addr::LOCALHOST)));
        assert_eq!(family_of(&to_mapped(Ipv4Addr::LOCALHOST)), AddressFamily::V4);
        assert_eq!(family_of(&Ipv6Addr::LOCALHOST), AddressFamily::V6);
    }

    #[test]
    fn parse_target_maps_ipv4() {
        assert_eq!(
            parse_target("192.0.2.7"),
            Some(to_mapped(Ipv4Addr::new(192, 0, 2, 7)))
        );
        assert_eq!(parse_target("2001:db8::7"), "2001:db8::7".parse().ok());
        assert_eq!(parse_target("scanme.example"), None);
        assert_eq!(
            denormalize(&normalize(IpAddr::V4(Ipv4Addr::LOCALHOST))),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
    }
}
