//! Common validation utilities for visitor identity fields.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Maximum visitors expected on a single visiting.
pub const MAX_HEADCOUNT: i32 = 25;

/// Maximum display name length in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 80;

lazy_static! {
    /// Digits only, 6-15 characters. Country code is carried separately.
    static ref MOBILE_NUMBER_REGEX: Regex = Regex::new(r"^[0-9]{6,15}$").unwrap();

    /// A `+` followed by 1-3 digits.
    static ref COUNTRY_CODE_REGEX: Regex = Regex::new(r"^\+[0-9]{1,3}$").unwrap();
}

/// Validates a mobile number (digits only, 6-15 characters).
pub fn validate_mobile_number(mobile: &str) -> Result<(), ValidationError> {
    if MOBILE_NUMBER_REGEX.is_match(mobile) {
        Ok(())
    } else {
        let mut err = ValidationError::new("mobile_number_format");
        err.message = Some("Mobile number must be 6-15 digits".into());
        Err(err)
    }
}

/// Validates a dialing country code (`+` followed by 1-3 digits).
pub fn validate_country_code(code: &str) -> Result<(), ValidationError> {
    if COUNTRY_CODE_REGEX.is_match(code) {
        Ok(())
    } else {
        let mut err = ValidationError::new("country_code_format");
        err.message = Some("Country code must be + followed by 1-3 digits".into());
        Err(err)
    }
}

/// Validates a visiting display name: non-blank, bounded length.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("Display name must not be blank".into());
        return Err(err);
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some("Display name must be at most 80 characters".into());
        return Err(err);
    }
    Ok(())
}

/// Validates an expected headcount (1 to 25).
pub fn validate_headcount(headcount: i32) -> Result<(), ValidationError> {
    if (1..=MAX_HEADCOUNT).contains(&headcount) {
        Ok(())
    } else {
        let mut err = ValidationError::new("headcount_range");
        err.message = Some("Headcount must be between 1 and 25".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_mobile_number() {
        assert!(validate_mobile_number("9876543210").is_ok());
        assert!(validate_mobile_number("123456").is_ok());
        assert!(validate_mobile_number("123456789012345").is_ok());
        assert!(validate_mobile_number("12345").is_err());
        assert!(validate_mobile_number("1234567890123456").is_err());
        assert!(validate_mobile_number("98765-43210").is_err());
        assert!(validate_mobile_number("").is_err());
    }

    #[test]
    fn test_validate_mobile_number_error_message() {
        let err = validate_mobile_number("abc").unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Mobile number must be 6-15 digits"
        );
    }

    #[test]
    fn test_validate_country_code() {
        assert!(validate_country_code("+1").is_ok());
        assert!(validate_country_code("+91").is_ok());
        assert!(validate_country_code("+971").is_ok());
        assert!(validate_country_code("+9711").is_err());
        assert!(validate_country_code("91").is_err());
        assert!(validate_country_code("+").is_err());
        assert!(validate_country_code("").is_err());
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("Ramesh Kumar").is_ok());
        assert!(validate_display_name("  ").is_err());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name(&"x".repeat(80)).is_ok());
        assert!(validate_display_name(&"x".repeat(81)).is_err());
    }

    #[test]
    fn test_validate_display_name_blank_message() {
        let err = validate_display_name("   ").unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Display name must not be blank"
        );
    }

    #[test]
    fn test_validate_headcount() {
        assert!(validate_headcount(1).is_ok());
        assert!(validate_headcount(25).is_ok());
        assert!(validate_headcount(0).is_err());
        assert!(validate_headcount(26).is_err());
        assert!(validate_headcount(-3).is_err());
    }
}
