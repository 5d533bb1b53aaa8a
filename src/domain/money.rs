use std::fmt;

/// Balances and prices are integer minor units (cents), never floats.
/// $9.99 is stored as 999.
pub type Cents = i64;

/// Format cents as a dollar string.
/// Example: 999 -> "9.99", 100000 -> "1000.00"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Parse a non-negative decimal amount into cents.
///
/// Accepts "10", "10.5", "10.50" and ".50". Rejects signs, more than two
/// decimal places and amounts that do not fit in `Cents`.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseCentsError::InvalidFormat);
    }

    let (units_str, fraction_str) = match input.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (input, ""),
    };

    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !fraction_str.chars().all(|c| c.is_ascii_digit())
        || (units_str.is_empty() && fraction_str.is_empty())
    {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: Cents = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| ParseCentsError::Overflow)?
    };

    let fraction: Cents = match fraction_str.len() {
        0 => 0,
        // "10.5" means fifty cents
        1 => fraction_str.parse::<Cents>().map_err(|_| ParseCentsError::InvalidFormat)? * 10,
        2 => fraction_str.parse().map_err(|_| ParseCentsError::InvalidFormat)?,
        _ => return Err(ParseCentsError::TooPrecise),
    };

    units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or(ParseCentsError::Overflow)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    TooPrecise,
    Overflow,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::TooPrecise => write!(f, "at most two decimal places are allowed"),
            ParseCentsError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
