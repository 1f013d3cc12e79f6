//! Conversion between ckpool's suffixed hashrate strings ("12.3T", "274P")
//! and plain numbers.

/// SI-like magnitude suffix used by ckpool for hashrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Magnitude {
    Kilo,
    Mega,
    Giga,
    Tera,
    Peta,
    Exa,
}

impl Magnitude {
    /// Largest first, the order buckets are checked in when formatting.
    pub const DESCENDING: [Magnitude; 6] = [
        Magnitude::Exa,
        Magnitude::Peta,
        Magnitude::Tera,
        Magnitude::Giga,
        Magnitude::Mega,
        Magnitude::Kilo,
    ];

    pub fn from_suffix(suffix: char) -> Option<Self> {
        match suffix {
            'K' => Some(Magnitude::Kilo),
            'M' => Some(Magnitude::Mega),
            'G' => Some(Magnitude::Giga),
            'T' => Some(Magnitude::Tera),
            'P' => Some(Magnitude::Peta),
            'E' => Some(Magnitude::Exa),
            _ => None,
        }
    }

    pub fn suffix(self) -> char {
        match self {
            Magnitude::Kilo => 'K',
            Magnitude::Mega => 'M',
            Magnitude::Giga => 'G',
            Magnitude::Tera => 'T',
            Magnitude::Peta => 'P',
            Magnitude::Exa => 'E',
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Magnitude::Kilo => 1e3,
            Magnitude::Mega => 1e6,
            Magnitude::Giga => 1e9,
            Magnitude::Tera => 1e12,
            Magnitude::Peta => 1e15,
            Magnitude::Exa => 1e18,
        }
    }
}

/// Parse a hashrate such as `"12.3T"`, `"274 P"` or `"950"` into a raw value.
///
/// The text must start with digits, optionally followed by a fractional part,
/// optional whitespace and one suffix letter from `K M G T P E`. Anything after
/// that is ignored. Input that does not start with a number yields `0.0`.
pub fn parse_hashrate(text: &str) -> f64 {
    let bytes = text.as_bytes();

    let int_end = skip_digits(bytes, 0);
    if int_end == 0 {
        return 0.0;
    }

    let mut end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = skip_digits(bytes, end + 1);
        if frac_end > end + 1 {
            end = frac_end;
        }
    }

    let mantissa: f64 = match text[..end].parse() {
        Ok(value) => value,
        Err(_) => return 0.0,
    };

    let multiplier = text[end..]
        .trim_start()
        .chars()
        .next()
        .and_then(Magnitude::from_suffix)
        .map_or(1.0, Magnitude::multiplier);

    mantissa * multiplier
}

/// Format a raw hashrate with two decimals and the largest suffix it reaches.
/// Values below 1000 get no suffix.
pub fn format_hashrate(value: f64) -> String {
    for magnitude in Magnitude::DESCENDING {
        let multiplier = magnitude.multiplier();
        if value >= multiplier {
            let scaled = round_half_away(value / multiplier);
            return format!("{:.2}{}", scaled, magnitude.suffix());
        }
    }
    format!("{:.2}", round_half_away(value))
}

/// Round to two decimals with exact ties going away from zero (`1.125` -> `1.13`).
/// `{:.2}` alone rounds ties to even.
pub fn round_half_away(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn skip_digits(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    i
}
