//! ISBN-13 helpers
//!
//! Books are stored with a normalized ISBN: thirteen ASCII digits, no
//! separators. The last digit is a checksum over the first twelve with
//! alternating weights 1 and 3.

use validator::ValidationError;

/// Strip the separators commonly found in printed ISBNs
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '-' | ' ' | '\u{2010}' | '\u{2011}'))
        .collect()
}

/// Compute the check digit for the first twelve digits of an ISBN-13.
///
/// Returns `None` when `digits` is not exactly twelve ASCII digits.
pub fn check_digit(digits: &str) -> Option<u8> {
    if digits.len() != 12 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let sum: u32 = digits
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let d = (b - b'0') as u32;
            if i % 2 == 0 {
                d
            } else {
                d * 3
            }
        })
        .sum();

    Some(((10 - sum % 10) % 10) as u8)
}

/// Whether `raw` (separators allowed) is a valid ISBN-13
pub fn is_valid_isbn13(raw: &str) -> bool {
    let isbn = normalize(raw);
    let digits = isbn.as_bytes();
    if digits.len() != 13 || !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }
    check_digit(&isbn[..12]) == Some(digits[12] - b'0')
}

/// Build a `978`-prefixed ISBN-13 from nine registrant/publication digits
pub fn generate_isbn13(body: &str) -> Option<String> {
    if body.len() != 9 {
        return None;
    }
    let first12 = format!("978{}", body);
    let check = check_digit(&first12)?;
    Some(format!("{}{}", first12, check))
}

/// `validator` hook used on request bodies
pub fn validate(value: &str) -> Result<(), ValidationError> {
    if is_valid_isbn13(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("isbn");
        err.message = Some("ISBN must be a valid ISBN-13".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_isbns() {
        assert!(is_valid_isbn13("9780306406157"));
        assert!(is_valid_isbn13("978-0-306-40615-7"));
        assert!(is_valid_isbn13("978 0 441 17271 9"));
        assert!(is_valid_isbn13("9782070360024"));
    }

    #[test]
    fn test_rejects_bad_checksum() {
        assert!(!is_valid_isbn13("9780306406158"));
        assert!(!is_valid_isbn13("9780441172710"));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(!is_valid_isbn13(""));
        assert!(!is_valid_isbn13("978030640615"));
        assert!(!is_valid_isbn13("97803064061577"));
        assert!(!is_valid_isbn13("978030640615X"));
        assert!(!is_valid_isbn13("0306406152"));
    }

    #[test]
    fn test_rejects_non_ascii_without_panicking() {
        // 'é' straddles the twelfth byte
        assert!(!is_valid_isbn13("97803064061\u{e9}"));
        assert!(!is_valid_isbn13("９７８０３０６４０６１５７"));
        assert!(validate("97803064061\u{e9}").is_err());
    }

    #[test]
    fn test_check_digit() {
        assert_eq!(check_digit("978030640615"), Some(7));
        assert_eq!(check_digit("97803064061"), None);
        assert_eq!(check_digit("97803064061a"), None);
    }

    #[test]
    fn test_check_digit_zero_case() {
        assert_eq!(check_digit("978000000000"), Some(2));
        assert_eq!(check_digit("978000000001"), Some(9));
        // weighted sum is a multiple of ten
        assert_eq!(check_digit("978000000020"), Some(0));
    }

    #[test]
    fn test_generate_is_valid() {
        let isbn = generate_isbn13("044117271").unwrap();
        assert_eq!(isbn, "9780441172719");
        assert!(is_valid_isbn13(&isbn));
        assert!(generate_isbn13("12345").is_none());
    }

    #[test]
    fn test_validator_hook() {
        assert!(validate("978-0-306-40615-7").is_ok());
        let err = validate("123").unwrap_err();
        assert_eq!(err.code, "isbn");
    }
}
