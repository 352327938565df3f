//! Tenant credential directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use harvest_core::TenantAccount;

use crate::error::DirectoryError;

/// Source of tenant accounts and their vendor credentials.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Every tenant known to the directory.
    async fn list_tenants(&self) -> Result<Vec<TenantAccount>, DirectoryError>;

    /// Only the tenants whose id is in `tenant_ids`.
    async fn list_tenants_for(
        &self,
        tenant_ids: &[String],
    ) -> Result<Vec<TenantAccount>, DirectoryError> {
        let all = self.list_tenants().await?;
        Ok(all
            .into_iter()
            .filter(|a| tenant_ids.iter().any(|id| *id == a.tenant_id))
            .collect())
    }
}

/// Directory backed by a JSON array of accounts on disk.
///
/// The file is re-read on every call so edits show up on the next
/// re-discovery tick.
pub struct FileTenantDirectory {
    path: PathBuf,
}

impl FileTenantDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TenantDirectory for FileTenantDirectory {
    async fn list_tenants(&self) -> Result<Vec<TenantAccount>, DirectoryError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let accounts: Vec<TenantAccount> = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), count = accounts.len(), "loaded tenant directory");
        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_directory(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    const TWO_TENANTS: &str = r#"[
        {"tenant_id": "1", "display_name": "acme", "access_key": "ak1", "access_secret": "s1"},
        {"tenant_id": "2", "display_name": "globex", "access_key": "ak2", "access_secret": "s2"}
    ]"#;

    #[tokio::test]
    async fn lists_all_tenants() {
        let file = write_directory(TWO_TENANTS);
        let dir = FileTenantDirectory::new(file.path());

        let tenants = dir.list_tenants().await.unwrap();
        assert_eq!(tenants.len(), 2);
        assert_eq!(tenants[0].display_name, "acme");
        assert_eq!(tenants[1].access_key, "ak2");
    }

    #[tokio::test]
    async fn list_for_restricts_to_allow_list() {
        let file = write_directory(TWO_TENANTS);
        let dir = FileTenantDirectory::new(file.path());

        let tenants = dir.list_tenants_for(&["2".to_string()]).await.unwrap();
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].tenant_id, "2");

        let none = dir.list_tenants_for(&["9".to_string()]).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn picks_up_edits_between_calls() {
        let file = write_directory(TWO_TENANTS);
        let dir = FileTenantDirectory::new(file.path());
        assert_eq!(dir.list_tenants().await.unwrap().len(), 2);

        std::fs::write(
            file.path(),
            r#"[{"tenant_id": "1", "display_name": "acme", "access_key": "ak1", "access_secret": "rotated"}]"#,
        )
        .unwrap();
        let tenants = dir.list_tenants().await.unwrap();
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].access_secret, "rotated");
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = FileTenantDirectory::new("/nonexistent/tenants.json");
        let err = dir.list_tenants().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Io(_)));
    }

    #[tokio::test]
    async fn malformed_file_is_parse_error() {
        let file = write_directory("{not json");
        let dir = FileTenantDirectory::new(file.path());
        let err = dir.list_tenants().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Parse(_)));
    }
}
