// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone address normalization into canonical `+<digits>` (E.164) form.

use std::sync::LazyLock;

use parley_core::ParleyError;
use regex::Regex;

/// Canonical form: `+`, a non-zero country code digit, 8 to 15 digits total.
static E164: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{7,14}$").expect("E.164 pattern compiles"));

/// Separators people type inside phone numbers.
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-().]").expect("separator pattern compiles"));

/// Channel prefixes some providers put in front of addresses.
const CHANNEL_PREFIXES: &[&str] = &["whatsapp:", "sms:", "tel:"];

/// Normalize a phone address.
///
/// A bare 10-digit national number is prefixed with `default_country_code`;
/// a `00` international prefix is rewritten to `+`. Anything that does not
/// end up as a plausible E.164 number is a validation error.
pub fn normalize_address(raw: &str, default_country_code: &str) -> Result<String, ParleyError> {
    let mut trimmed = raw.trim();
    for prefix in CHANNEL_PREFIXES {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            trimmed = rest;
        }
    }
    let cleaned = SEPARATORS.replace_all(trimmed, "");

    let candidate = if let Some(rest) = cleaned.strip_prefix('+') {
        format!("+{rest}")
    } else if let Some(rest) = cleaned.strip_prefix("00") {
        format!("+{rest}")
    } else if cleaned.len() == 10 && cleaned.chars().all(|c| c.is_ascii_digit()) {
        format!("+{default_country_code}{cleaned}")
    } else {
        format!("+{cleaned}")
    };

    if E164.is_match(&candidate) {
        Ok(candidate)
    } else {
        Err(ParleyError::Validation(format!(
            "`{raw}` is not a valid phone address"
        )))
    }
}

/// Reject input that no country code could turn into a valid address.
///
/// Runs before the tenant's configuration is known; bare national numbers
/// pass here and get their country code later.
pub fn check_address_shape(raw: &str) -> Result<(), ParleyError> {
    normalize_address(raw, "1").map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_input_is_unchanged() {
        assert_eq!(normalize_address("+15551234567", "1").unwrap(), "+15551234567");
    }

    #[test]
    fn national_number_gets_default_country_code() {
        assert_eq!(normalize_address("5551234567", "1").unwrap(), "+15551234567");
        assert_eq!(normalize_address("7700900123", "44").unwrap(), "+447700900123");
    }

    #[test]
    fn formatting_is_stripped() {
        assert_eq!(
            normalize_address(" (555) 123-4567 ", "1").unwrap(),
            "+15551234567"
        );
        assert_eq!(
            normalize_address("+44 7700 900.123", "1").unwrap(),
            "+447700900123"
        );
    }

    #[test]
    fn international_prefix_and_channel_prefix() {
        assert_eq!(normalize_address("00447700900123", "1").unwrap(), "+447700900123");
        assert_eq!(
            normalize_address("whatsapp:+15551234567", "1").unwrap(),
            "+15551234567"
        );
        assert_eq!(normalize_address("15551234567", "1").unwrap(), "+15551234567");
    }

    #[test]
    fn garbage_is_rejected() {
        for raw in ["", "hello", "+0123456789", "12345", "+1555abc4567", "+1234567890123456"] {
            let err = normalize_address(raw, "1").unwrap_err();
            assert!(matches!(err, ParleyError::Validation(_)), "{raw} accepted");
        }
    }

    #[test]
    fn shape_check_needs_no_country_code() {
        assert!(check_address_shape("555-123-4567").is_ok());
        assert!(check_address_shape("+44 7700 900123").is_ok());
        assert!(matches!(
            check_address_shape("not a number"),
            Err(ParleyError::Validation(_))
        ));
        assert!(check_address_shape("12").is_err());
    }
}
