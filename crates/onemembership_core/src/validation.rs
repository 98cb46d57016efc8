//! Field validation rules shared by account, catalog and payment services.
//!
//! # Responsibility
//! - Collect per-field validation failures into an [`ErrMap`].
//! - Normalize profile input (phone numbers, user names) into stored form.
//!
//! # Invariants
//! - Phone numbers are stored in international `+<digits>` form.
//! - Local `0XXXXXXXXX` numbers are rewritten with the `+251` country code.
//! - User names and project links are stored lowercase.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Country code applied to local phone numbers.
pub const DEFAULT_COUNTRY_CODE: &str = "+251";

pub const MAX_NAME_CHARS: usize = 255;
pub const MAX_USER_NAME_CHARS: usize = 20;
pub const MIN_PASSWORD_CHARS: usize = 8;

static BLANK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*$").expect("valid blank regex"));
static LOCAL_PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0\d{9}$").expect("valid local phone regex"));
static INTERNATIONAL_PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+\d{11,12}$").expect("valid phone regex"));
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid word regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#,
    )
    .expect("valid email regex")
});
static PASSWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._\-&!?=#]+$").expect("valid password regex"));

/// Field name to human-readable failure message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrMap(BTreeMap<String, String>);

impl ErrMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure for `field`, replacing any earlier message.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_string_map(self) -> BTreeMap<String, String> {
        self.0
    }

    /// Returns `Ok(())` when nothing was recorded, otherwise the map itself.
    pub fn into_result(self) -> Result<(), ErrMap> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for ErrMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl Error for ErrMap {}

/// Returns whether `value` is empty or whitespace only.
pub fn is_blank(value: &str) -> bool {
    BLANK_RE.is_match(value)
}

pub fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Strips whitespace and rewrites a phone number into international form.
///
/// Returns an empty string for blank input.
pub fn normalize_phone(raw: &str) -> String {
    let compact: String = raw.chars().filter(|ch| !ch.is_whitespace()).collect();
    if compact.is_empty() {
        return compact;
    }
    if LOCAL_PHONE_RE.is_match(&compact) {
        return format!("{DEFAULT_COUNTRY_CODE}{}", &compact[1..]);
    }
    if compact.starts_with('+') {
        compact
    } else {
        format!("+{compact}")
    }
}

/// Rewrites a lookup key that looks like a local number (`0...`).
pub fn localize_phone_key(key: &str) -> String {
    match key.strip_prefix('0') {
        Some(rest) => format!("{DEFAULT_COUNTRY_CODE}{rest}"),
        None => key.to_string(),
    }
}

pub fn is_valid_phone(value: &str) -> bool {
    INTERNATIONAL_PHONE_RE.is_match(value)
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// Returns whether `value` only holds ASCII letters, digits or underscores.
pub fn is_word(value: &str) -> bool {
    WORD_RE.is_match(value)
}

/// Profile fields as submitted by a caller.
#[derive(Debug, Clone, Copy)]
pub struct ProfileInput<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub user_name: &'a str,
    pub phone_number: &'a str,
    pub email: &'a str,
}

/// Normalized profile values produced by [`check_profile_format`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedProfile {
    pub user_name: String,
    pub phone_number: String,
    pub phone_is_valid: bool,
}

/// Runs format-only profile checks shared by users and service providers.
///
/// Uniqueness is left to the caller since it needs storage access.
pub fn check_profile_format(input: ProfileInput<'_>, errors: &mut ErrMap) -> NormalizedProfile {
    if char_len(input.first_name) > MAX_NAME_CHARS {
        errors.insert(
            "first_name",
            "first name should not be longer than 255 characters",
        );
    }
    if char_len(input.last_name) > MAX_NAME_CHARS {
        errors.insert(
            "last_name",
            "last name should not be longer than 255 characters",
        );
    }

    let user_name = input.user_name.to_lowercase();
    if !is_blank(&user_name) && !is_word(&user_name) {
        errors.insert(
            "user_name",
            "username shouldn't contain space or any special characters",
        );
    } else if char_len(&user_name) > MAX_USER_NAME_CHARS {
        errors.insert(
            "user_name",
            "username should not be longer than 20 characters",
        );
    }

    if !is_blank(input.email) && !is_valid_email(input.email) {
        errors.insert("email", "invalid email address used");
    }

    let normalized_phone = normalize_phone(input.phone_number);
    let phone_is_valid = is_valid_phone(&normalized_phone);
    let phone_number = if phone_is_valid {
        normalized_phone
    } else {
        if !is_blank(input.phone_number) {
            errors.insert("phone_number", "invalid phonenumber used");
        }
        input.phone_number.to_string()
    };

    NormalizedProfile {
        user_name,
        phone_number,
        phone_is_valid,
    }
}

/// Checks a new password against its confirmation entry.
pub fn check_password(password: &str, confirmation: &str) -> Result<(), String> {
    if char_len(password) < MIN_PASSWORD_CHARS {
        return Err("password should contain at least 8 characters".to_string());
    }
    if !PASSWORD_RE.is_match(password) {
        return Err("invalid characters used in password".to_string());
    }
    if password != confirmation {
        return Err("passwords do not match".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile<'a>(user_name: &'a str, phone: &'a str, email: &'a str) -> ProfileInput<'a> {
        ProfileInput {
            first_name: "Abebe",
            last_name: "Kebede",
            user_name,
            phone_number: phone,
            email,
        }
    }

    #[test]
    fn normalize_phone_handles_local_and_international_forms() {
        assert_eq!(normalize_phone("0911 223 344"), "+251911223344");
        assert_eq!(normalize_phone("251911223344"), "+251911223344");
        assert_eq!(normalize_phone("+251911223344"), "+251911223344");
        assert_eq!(normalize_phone("   "), "");
    }

    #[test]
    fn check_profile_format_normalizes_valid_input() {
        let mut errors = ErrMap::new();
        let normalized =
            check_profile_format(profile("Abebe_K", "0911223344", "abebe@example.com"), &mut errors);

        assert!(errors.is_empty(), "unexpected errors: {errors}");
        assert_eq!(normalized.user_name, "abebe_k");
        assert_eq!(normalized.phone_number, "+251911223344");
        assert!(normalized.phone_is_valid);
    }

    #[test]
    fn check_profile_format_allows_empty_optional_fields() {
        let mut errors = ErrMap::new();
        let normalized = check_profile_format(profile("", "", ""), &mut errors);
        assert!(errors.is_empty());
        assert!(!normalized.phone_is_valid);
    }

    #[test]
    fn check_profile_format_reports_each_bad_field() {
        let mut errors = ErrMap::new();
        check_profile_format(profile("bad name", "12ab", "not-an-email"), &mut errors);

        assert!(errors.contains("user_name"));
        assert!(errors.contains("phone_number"));
        assert!(errors.contains("email"));
    }

    #[test]
    fn check_profile_format_limits_user_name_length() {
        let mut errors = ErrMap::new();
        check_profile_format(profile("a_very_long_user_name_value", "", ""), &mut errors);
        assert_eq!(
            errors.get("user_name"),
            Some("username should not be longer than 20 characters")
        );
    }

    #[test]
    fn check_password_enforces_length_charset_and_confirmation() {
        assert!(check_password("short", "short").is_err());
        assert!(check_password("with space1", "with space1").is_err());
        assert_eq!(
            check_password("secret-123", "secret-124").unwrap_err(),
            "passwords do not match"
        );
        assert!(check_password("secret-123", "secret-123").is_ok());
    }

    #[test]
    fn localize_phone_key_only_rewrites_leading_zero() {
        assert_eq!(localize_phone_key("0911223344"), "+251911223344");
        assert_eq!(localize_phone_key("abebe"), "abebe");
    }
}
