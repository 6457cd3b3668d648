/// Canonical digit-only form of a raw phone value, or `None` when no digits
/// remain after stripping separators and punctuation.
pub fn normalize_phone(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }

    Some(digits)
}
