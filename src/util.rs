// Display formatting helpers.
//
// The core hands numbers outward as plain `f64`; everything string-shaped
// about presentation lives here so the pipeline stages stay format-free.
use num_format::{Locale, ToFormattedString};

/// Scale factor for crore display (1 crore = 10,000,000).
pub const CRORE: f64 = 10_000_000.0;

/// Format a floating-point value with a fixed number of decimal places and
/// locale-aware thousands separators (e.g., `1,234,567.89`).
pub fn format_number(n: f64, decimals: usize) -> String {
    let neg = n.is_sign_negative();
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    } else if decimals > 0 {
        res.push('.');
        res.push_str(&"0".repeat(decimals));
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Used for row counts in console messages (e.g., `9,855 rows loaded`).
    n.to_formatted_string(&Locale::en)
}

/// Amount in rupees rendered at crore scale, e.g. `₹ 12.35 Cr`.
pub fn format_crore(n: f64) -> String {
    format!("₹ {} Cr", format_number(n / CRORE, 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_separators_and_decimals() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(0.0, 2), "0.00");
        assert_eq!(format_number(-4500.5, 2), "-4,500.50");
        assert_eq!(format_number(12.0, 0), "12");
    }

    #[test]
    fn crore_scaling() {
        assert_eq!(format_crore(25_000_000.0), "₹ 2.50 Cr");
        assert_eq!(format_crore(0.0), "₹ 0.00 Cr");
    }

    #[test]
    fn integer_counts() {
        assert_eq!(format_int(9855_i64), "9,855");
    }
}
