use std::fmt;

use serde::{Deserialize, Serialize};

/// A billing/credential boundary discovered from the tenant directory.
///
/// Immutable for the lifetime of a scheduling epoch; a changed account is
/// replaced wholesale rather than patched.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantAccount {
    pub tenant_id: String,
    pub display_name: String,
    pub access_key: String,
    pub access_secret: String,
}

impl TenantAccount {
    pub fn new(
        tenant_id: impl Into<String>,
        display_name: impl Into<String>,
        access_key: impl Into<String>,
        access_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            display_name: display_name.into(),
            access_key: access_key.into(),
            access_secret: access_secret.into(),
        }
    }
}

// Secrets never end up in logs.
impl fmt::Debug for TenantAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantAccount")
            .field("tenant_id", &self.tenant_id)
            .field("display_name", &self.display_name)
            .field("access_key", &self.access_key)
            .field("access_secret", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let account = TenantAccount::new("1", "acme", "AK", "super-secret");
        let rendered = format!("{account:?}");
        assert!(rendered.contains("acme"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn equality_covers_credentials() {
        let a = TenantAccount::new("1", "acme", "AK", "S1");
        let b = TenantAccount::new("1", "acme", "AK", "S2");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn deserializes_from_json() {
        let json = r#"{"tenant_id":"7","display_name":"erda","access_key":"k","access_secret":"s"}"#;
        let account: TenantAccount = serde_json::from_str(json).unwrap();
        assert_eq!(account.tenant_id, "7");
        assert_eq!(account.display_name, "erda");
    }
}
