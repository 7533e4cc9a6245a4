//! Human-readable size parsing for `df -h` style output.

const UNITS: [char; 7] = ['B', 'K', 'M', 'G', 'T', 'P', 'E'];

/// Parse a human-readable size to bytes.
///
/// Handles the forms `df -h` prints and a few common report spellings:
/// - "0", "512" (plain bytes)
/// - "4.9T", "132G", "512K" (powers of 1024)
/// - "131.95GB", "1.39 TB", "2GiB"
///
/// Returns None for empty strings, placeholders, or unknown units.
pub fn parse_size_bytes(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || s == "-" {
        return None;
    }

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: f64 = number.parse().ok()?;

    let unit = unit.trim().to_ascii_uppercase();
    let unit = unit
        .strip_suffix("IB")
        .or_else(|| unit.strip_suffix('B').filter(|u| !u.is_empty()))
        .unwrap_or(&unit);

    let power = match unit {
        "" => 0,
        _ => {
            let mut chars = unit.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            UNITS.iter().position(|u| *u == c)?
        }
    };

    Some((value * 1024f64.powi(power as i32)).round() as u64)
}
