//! Login identifier normalization.
//!
//! Users sign in with either a phone number or an email address. Both are
//! stored in one `identifier` column, so every lookup and uniqueness check
//! goes through the same normalization: phones become E.164, emails become
//! trimmed lowercase.

use lazy_static::lazy_static;
use regex::Regex;

/// What kind of identifier a string normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Phone,
    Email,
}

/// A normalized login identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub value: String,
    pub kind: IdentifierKind,
}

lazy_static! {
    // RFC 5322 simplified
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").unwrap();

    // E.164 after stripping separators: optional +, 8-15 digits
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9]{8,15}$").unwrap();
}

impl Identifier {
    /// Normalize a raw login identifier.
    ///
    /// Emails are trimmed and lowercased. Phone numbers have separators
    /// stripped and are prefixed with `+` (bare 10-digit numbers are assumed
    /// US and get `+1`). Anything that matches neither shape is rejected.
    pub fn normalize(raw: &str) -> Result<Self, &'static str> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("Identifier cannot be empty");
        }

        if trimmed.contains('@') {
            let value = trimmed.to_lowercase();
            if !EMAIL_REGEX.is_match(&value) {
                return Err("Invalid email address");
            }
            return Ok(Identifier {
                value,
                kind: IdentifierKind::Email,
            });
        }

        let stripped: String = trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();
        if !PHONE_REGEX.is_match(&stripped) {
            return Err("Invalid phone number");
        }

        let digits = stripped.trim_start_matches('+');
        let value = if stripped.starts_with('+') {
            format!("+{}", digits)
        } else if digits.len() == 10 {
            format!("+1{}", digits)
        } else {
            format!("+{}", digits)
        };

        Ok(Identifier {
            value,
            kind: IdentifierKind::Phone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_lowercased() {
        let id = Identifier::normalize("  Sales@Example.COM ").unwrap();
        assert_eq!(id.value, "sales@example.com");
        assert_eq!(id.kind, IdentifierKind::Email);
    }

    #[test]
    fn test_invalid_email_rejected() {
        assert!(Identifier::normalize("not-an-email@").is_err());
        assert!(Identifier::normalize("@example.com").is_err());
    }

    #[test]
    fn test_us_phone_gets_country_code() {
        let id = Identifier::normalize("(612) 555-0123").unwrap();
        assert_eq!(id.value, "+16125550123");
        assert_eq!(id.kind, IdentifierKind::Phone);
    }

    #[test]
    fn test_e164_phone_passes_through() {
        let id = Identifier::normalize("+16125550123").unwrap();
        assert_eq!(id.value, "+16125550123");
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(Identifier::normalize("hello").is_err());
        assert!(Identifier::normalize("").is_err());
        assert!(Identifier::normalize("123").is_err());
    }
}
