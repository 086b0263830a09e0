/// Minimum length the login form accepts for a phone number.
pub const MIN_LOGIN_PHONE_LEN: usize = 10;

const COUNTRY_CODE: &str = "250";

/// Validates a phone number for login.
///
/// Only the length is checked locally; the server owns the real format rules.
#[must_use]
pub fn is_valid_login_phone(s: &str) -> bool {
    s.chars().count() >= MIN_LOGIN_PHONE_LEN
}

/// Validates an airtime recipient number.
///
/// After stripping non-digits, a valid number is either:
/// - 12 digits with the "250" country prefix
/// - 9 digits (local format)
#[must_use]
pub fn is_valid_airtime_number(s: &str) -> bool {
    let digits = digits_only(s);
    (digits.len() == 12 && digits.starts_with(COUNTRY_CODE)) || digits.len() == 9
}

/// Strips non-digits and prefixes local 9-digit numbers with the country code.
#[must_use]
pub fn format_phone_number(s: &str) -> String {
    let digits = digits_only(s);
    if digits.len() == 9 {
        format!("{COUNTRY_CODE}{digits}")
    } else {
        digits
    }
}

fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}
