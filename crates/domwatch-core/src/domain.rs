//! Domain name normalization
//!
//! Users paste domains in many shapes (`HTTPS://Example.com/path`,
//! `example.com.`). Everything the engine stores or checks goes through
//! [`normalize_domain`] first, so a domain has exactly one spelling in the
//! stores.

use crate::error::{Error, Result};

/// Normalize and validate a user-supplied domain name
///
/// Trims whitespace, lower-cases, strips an `http://`/`https://` scheme,
/// any path/query, and a trailing dot, then validates the result per
/// RFC 1035 host-name rules.
pub fn normalize_domain(input: &str) -> Result<String> {
    let mut domain = input.trim().to_ascii_lowercase();

    for scheme in ["https://", "http://"] {
        if let Some(rest) = domain.strip_prefix(scheme) {
            domain = rest.to_string();
            break;
        }
    }

    if let Some(end) = domain.find(['/', '?', '#']) {
        domain.truncate(end);
    }

    if domain.ends_with('.') {
        domain.pop();
    }

    validate_domain_name(&domain)?;
    Ok(domain)
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 validation. Not comprehensive, but it catches common errors.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::invalid_input("Domain name cannot be empty"));
    }

    // RFC 1035: 253 chars max
    if domain.len() > 253 {
        return Err(Error::invalid_input(format!(
            "Domain name too long: {} chars (max 253)",
            domain.len()
        )));
    }

    if !domain.contains('.') {
        return Err(Error::invalid_input(format!(
            "Domain name needs at least two labels: '{}'",
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(Error::invalid_input(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(Error::invalid_input(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::invalid_input(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::invalid_input(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}
