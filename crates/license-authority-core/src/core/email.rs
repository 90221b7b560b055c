// crates/license-authority-core/src/core/email.rs
// ============================================================================
// Module: Email Policy
// Description: Disposable-provider denylist for license requesters.
// Purpose: Reject throwaway addresses before any state is touched.
// Dependencies: crate::core::identifiers
// ============================================================================

//! ## Overview
//! Disposable-email providers are matched on the requester's domain,
//! including subdomains. The built-in list can be extended from config.

use std::collections::BTreeSet;

use crate::core::identifiers::Domain;

/// Built-in disposable email providers.
pub const DISPOSABLE_EMAIL_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "discard.email",
    "dispostable.com",
    "fakeinbox.com",
    "getnada.com",
    "guerrillamail.com",
    "mailinator.com",
    "maildrop.cc",
    "mintemail.com",
    "mohmal.com",
    "sharklasers.com",
    "temp-mail.org",
    "tempmail.dev",
    "throwawaymail.com",
    "trashmail.com",
    "yopmail.com",
];

/// Denylist of disposable email domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailPolicy {
    /// Lower-cased denied domains.
    disposable: BTreeSet<String>,
}

impl Default for EmailPolicy {
    fn default() -> Self {
        Self::with_extra_domains(std::iter::empty::<String>())
    }
}

impl EmailPolicy {
    /// Creates a policy from the built-in list plus `extra` domains.
    #[must_use]
    pub fn with_extra_domains(extra: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut disposable: BTreeSet<String> =
            DISPOSABLE_EMAIL_DOMAINS.iter().map(|domain| (*domain).to_string()).collect();
        for domain in extra {
            let domain = domain.into().trim().trim_start_matches('.').to_ascii_lowercase();
            if !domain.is_empty() {
                disposable.insert(domain);
            }
        }
        Self {
            disposable,
        }
    }

    /// Returns true when the domain belongs to a disposable provider.
    #[must_use]
    pub fn is_disposable(&self, domain: &Domain) -> bool {
        self.disposable.iter().any(|denied| domain.is_within(denied))
    }
}

#[cfg(test)]
mod tests {
    //! Disposable-domain matching tests.

    use super::*;

    #[test]
    fn matches_builtin_and_subdomains() {
        let policy = EmailPolicy::default();
        assert!(policy.is_disposable(&Domain::new("mailinator.com")));
        assert!(policy.is_disposable(&Domain::new("eu.Mailinator.com")));
        assert!(!policy.is_disposable(&Domain::new("example.com")));
    }

    #[test]
    fn extra_domains_are_normalized() {
        let policy = EmailPolicy::with_extra_domains([" .Burner.Example "]);
        assert!(policy.is_disposable(&Domain::new("burner.example")));
    }
}
