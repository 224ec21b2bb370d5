//! Input helpers for account flows.

/// Canonical form of an email address: trimmed and lowercased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Structural email check.
///
/// Accepts `local@domain.tld` where the local part uses alphanumerics and
/// `.-+_`, and the domain uses alphanumerics, dots and hyphens with at least
/// one dot and no empty labels. Deliverability is not checked.
///
/// # Examples
///
/// ```
/// # use ticketbook_auth::utils::is_valid_email;
/// assert!(is_valid_email("alice+tickets@example.com"));
/// assert!(!is_valid_email("alice@localhost"));
/// assert!(!is_valid_email("alice@@example.com"));
/// ```
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 3 || email.len() > 255 {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let local_ok = local
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'));
    let domain_ok = domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
        && domain.chars().all(|c| c.is_alphanumeric() || matches!(c, '.' | '-'));

    local_ok && domain_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.example.co"));
        assert!(is_valid_email("a_b-c@x.io"));
    }

    #[test]
    fn invalid_addresses() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@example..com"));
        assert!(!is_valid_email("user@.com"));
        assert!(!is_valid_email("us er@example.com"));
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
