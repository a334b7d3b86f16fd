//! Mod-10 (Luhn) checksum used to validate order numbers.

/// Returns `true` if `digits` is a non-empty string of ASCII digits whose
/// Luhn checksum is zero.
///
/// Starting from the rightmost digit, every second digit is doubled and 9 is
/// subtracted from any doubled value above 9. The number is valid iff the sum
/// of all resulting digits is divisible by 10.
///
/// Anything that is not a plain non-negative integer string (empty input,
/// signs, whitespace, separators, non-ASCII digits) is rejected before the
/// checksum is evaluated.
#[must_use]
pub fn is_valid(digits: &str) -> bool {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}
