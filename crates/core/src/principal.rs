//! Principal identifiers.
//!
//! A principal ID is the platform's external identity reference string. For
//! Active Directory users it takes one of two forms:
//!
//! - DN form:   `activedirectory_user://CN=jdoe,OU=Users,DC=example,DC=com`
//! - GUID form: `activedirectory_user://objectGUID=<uuid>`
//!
//! The ID is the join key across users, role bindings and tokens, so it is
//! wrapped in a newtype and compared as an exact string.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::guid::Guid;

/// Scope of Active Directory user principals.
pub const USER_SCOPE: &str = "activedirectory_user";

/// Attribute marking the GUID form of a principal ID.
pub const OBJECT_GUID_ATTRIBUTE: &str = "objectGUID";

fn ad_prefix() -> String {
    format!("{USER_SCOPE}://")
}

fn guid_prefix() -> String {
    format!("{USER_SCOPE}://{OBJECT_GUID_ATTRIBUTE}=")
}

/// A principal identifier string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the DN form of an AD principal ID.
    pub fn from_dn(dn: &str) -> Self {
        Self(format!("{}{dn}", ad_prefix()))
    }

    /// Build the GUID form of an AD principal ID.
    pub fn from_guid(guid: &Guid) -> Self {
        Self(format!("{}{guid}", guid_prefix()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this principal carries the Active Directory user scope.
    pub fn is_ad_scoped(&self) -> bool {
        self.0.starts_with(&ad_prefix())
    }

    /// Whether this principal carries the objectGUID marker.
    pub fn is_guid_form(&self) -> bool {
        self.0.contains(OBJECT_GUID_ATTRIBUTE)
    }

    /// The embedded DN, for AD-scoped DN-form principals.
    pub fn dn(&self) -> Option<&str> {
        if self.is_guid_form() {
            return None;
        }
        self.0.strip_prefix(&ad_prefix()[..])
    }

    /// The embedded GUID text, for GUID-form principals.
    pub fn guid_text(&self) -> Option<&str> {
        self.0.strip_prefix(&guid_prefix()[..])
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate a DN for migration: it must parse into RDNs and its first RDN
/// must carry a `CN` attribute. Principals failing this check are skipped
/// during classification, not treated as fatal.
pub fn dn_is_migratable(dn: &str) -> bool {
    match parse_rdns(dn) {
        Some(rdns) => match rdns.first() {
            Some(first) => first.iter().any(|(attr, _)| *attr == "CN"),
            None => false,
        },
        None => {
            warn!(dn, "skipping principal with malformed DN");
            false
        }
    }
}

/// Minimal DN parser: splits on unescaped `,` into RDNs and on unescaped
/// `+` into attribute type/value pairs. Returns `None` on malformed input
/// (empty components, missing `=`).
fn parse_rdns(dn: &str) -> Option<Vec<Vec<(&str, &str)>>> {
    if dn.trim().is_empty() {
        return None;
    }

    let mut rdns = Vec::new();
    for rdn in split_unescaped(dn, ',') {
        let mut attrs = Vec::new();
        for pair in split_unescaped(rdn, '+') {
            let (attr, value) = pair.split_once('=')?;
            let attr = attr.trim();
            if attr.is_empty() {
                return None;
            }
            attrs.push((attr, value));
        }
        if attrs.is_empty() {
            return None;
        }
        rdns.push(attrs);
    }
    Some(rdns)
}

/// Split on `sep` ignoring occurrences escaped with a backslash.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forms() {
        let dn_form = PrincipalId::from_dn("CN=jdoe,OU=Users,DC=example,DC=com");
        assert_eq!(
            dn_form.as_str(),
            "activedirectory_user://CN=jdoe,OU=Users,DC=example,DC=com"
        );
        assert!(dn_form.is_ad_scoped());
        assert!(!dn_form.is_guid_form());
        assert_eq!(dn_form.dn(), Some("CN=jdoe,OU=Users,DC=example,DC=com"));
        assert_eq!(dn_form.guid_text(), None);

        let guid = Guid::parse("04030201-0605-0807-090a-0b0c0d0e0f10").unwrap();
        let guid_form = PrincipalId::from_guid(&guid);
        assert_eq!(
            guid_form.as_str(),
            "activedirectory_user://objectGUID=04030201-0605-0807-090a-0b0c0d0e0f10"
        );
        assert!(guid_form.is_ad_scoped());
        assert!(guid_form.is_guid_form());
        assert_eq!(guid_form.dn(), None);
        assert_eq!(
            guid_form.guid_text(),
            Some("04030201-0605-0807-090a-0b0c0d0e0f10")
        );
    }

    #[test]
    fn test_non_ad_scope() {
        let other = PrincipalId::new("local://u-abcde");
        assert!(!other.is_ad_scoped());
        assert_eq!(other.dn(), None);
    }

    #[test]
    fn test_dn_is_migratable() {
        assert!(dn_is_migratable("CN=jdoe,OU=Users,DC=example,DC=com"));
        assert!(dn_is_migratable("CN=a\\,b,DC=example"));
        // First RDN must carry CN.
        assert!(!dn_is_migratable("OU=Users,DC=example,DC=com"));
        // Case-sensitive attribute type, as in the source platform.
        assert!(!dn_is_migratable("cn=jdoe,DC=example"));
        // Malformed.
        assert!(!dn_is_migratable(""));
        assert!(!dn_is_migratable("no-equals-sign"));
        assert!(!dn_is_migratable("=value,DC=example"));
    }

    #[test]
    fn test_split_unescaped_respects_escapes() {
        assert_eq!(
            split_unescaped("CN=a\\,b,DC=example", ','),
            vec!["CN=a\\,b", "DC=example"]
        );
    }
}
