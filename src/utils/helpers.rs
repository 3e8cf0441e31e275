//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use rand::{distributions::Alphanumeric, Rng};

/// Normalize an email address for comparisons and storage
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Extract the lowercased domain part of an email address
pub fn email_domain(email: &str) -> Option<String> {
    let (local, domain) = email.trim().rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(domain.to_lowercase())
}

/// Validate email format
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    match email_domain(email) {
        Some(domain) => domain.contains('.') && !email.contains(char::is_whitespace) && email.len() > 5,
        None => false,
    }
}

/// Validate phone number format (basic validation)
pub fn is_valid_phone(phone: &str) -> bool {
    phone.chars().all(|c| c.is_ascii_digit() || c == '+' || c == '-' || c == ' ' || c == '(' || c == ')')
        && phone.chars().filter(|c| c.is_ascii_digit()).count() >= 7
}

/// Check whether an email's domain is in the allow-list.
///
/// Subdomains of an allowed domain are accepted.
pub fn domain_allowed(email: &str, allowed_domains: &[String]) -> bool {
    let Some(domain) = email_domain(email) else {
        return false;
    };
    allowed_domains.iter().any(|allowed| {
        let allowed = allowed.trim().trim_start_matches('@').to_lowercase();
        domain == allowed || domain.ends_with(&format!(".{}", allowed))
    })
}

/// Generate a random alphanumeric token from the thread-local CSPRNG
pub fn generate_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Compare two secrets without short-circuiting on the first mismatch
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
