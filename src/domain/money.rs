use std::fmt;

/// Money is kept as integer minor units (cents) end to end. Balance mutation
/// never touches floating point: repeated float addition on money values
/// drifts, and drift breaks the zero-sum invariant.
pub type Cents = i64;

/// Format cents as a decimal string: 5000 -> "50.00", -1234 -> "-12.34".
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Format cents with a currency code for display: "50.00 EUR".
pub fn format_amount(cents: Cents, currency: &str) -> String {
    format!("{} {}", format_cents(cents), currency)
}

/// Parse a decimal string into cents. Accepts "50", "50.0", "50.00";
/// digits beyond two decimal places are truncated.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let (units_str, decimals_str) = match digits.split_once('.') {
        Some((u, d)) => {
            if d.contains('.') {
                return Err(ParseCentsError::InvalidFormat);
            }
            (u, d)
        }
        None => (digits, ""),
    };

    if units_str.is_empty() && decimals_str.is_empty() {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?
    };

    let decimal_cents: i64 = match decimals_str.len() {
        0 => 0,
        1 => {
            decimals_str
                .parse::<i64>()
                .map_err(|_| ParseCentsError::InvalidFormat)?
                * 10
        }
        // Truncate past two decimal places.
        _ => decimals_str
            .get(..2)
            .ok_or(ParseCentsError::InvalidFormat)?
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or(ParseCentsError::Overflow)?;
    Ok(if negative { -cents } else { cents })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    Overflow,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::Overflow => write!(f, "amount too large to represent in cents"),
        }
    }
}

impl std::error::Error for ParseCentsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(5000), "50.00");
        assert_eq!(format_cents(1234), "12.34");
        assert_eq!(format_cents(1), "0.01");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-5000), "-50.00");
        assert_eq!(format_cents(-1), "-0.01");
    }

    #[test]
    fn test_format_amount_includes_currency() {
        assert_eq!(format_amount(10000, "EUR"), "100.00 EUR");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("50.00"), Ok(5000));
        assert_eq!(parse_cents("50"), Ok(5000));
        assert_eq!(parse_cents("12.34"), Ok(1234));
        assert_eq!(parse_cents("12.5"), Ok(1250));
        assert_eq!(parse_cents("0.01"), Ok(1));
        assert_eq!(parse_cents(".50"), Ok(50));
        assert_eq!(parse_cents("-50.00"), Ok(-5000));
        assert_eq!(parse_cents("100.999"), Ok(10099)); // Truncates
    }

    #[test]
    fn test_parse_cents_invalid() {
        assert!(parse_cents("abc").is_err());
        assert!(parse_cents("12.34.56").is_err());
        assert!(parse_cents("").is_err());
        assert!(parse_cents(".").is_err());
    }

    #[test]
    fn test_parse_cents_rejects_overflow() {
        // Parses as i64 units but cannot be scaled to cents.
        assert_eq!(
            parse_cents("92233720368547758.08"),
            Err(ParseCentsError::Overflow)
        );
        assert_eq!(
            parse_cents("9223372036854775807"),
            Err(ParseCentsError::Overflow)
        );
        // Still in range once scaled.
        assert_eq!(parse_cents("92233720368547758.07"), Ok(i64::MAX));
    }
}
