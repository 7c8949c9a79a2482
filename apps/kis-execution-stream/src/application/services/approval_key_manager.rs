//! Approval Key Manager
//!
//! Obtains a valid approval key, preferring the cached value and falling
//! back to the issuance endpoint on a miss.
//!
//! Per call: at most one cache read and, on a miss, exactly one issuance
//! plus one cache write. Concurrent callers are not deduplicated; run a
//! single client per process. Retries belong to the reconnection supervisor.

use std::sync::Arc;

use crate::application::ports::{ApprovalKeyIssuer, ApprovalKeyStore, CredentialIssuanceError};
use crate::domain::credential::{APPROVAL_KEY_CACHE_TTL, ApprovalKey};
use crate::infrastructure::metrics::{self, IssueReason};

/// Cached approval key lifecycle.
#[derive(Clone)]
pub struct ApprovalKeyManager {
    store: Arc<dyn ApprovalKeyStore>,
    issuer: Arc<dyn ApprovalKeyIssuer>,
}

impl std::fmt::Debug for ApprovalKeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalKeyManager").finish_non_exhaustive()
    }
}

impl ApprovalKeyManager {
    /// Create a manager over a cache and an issuer.
    #[must_use]
    pub fn new(store: Arc<dyn ApprovalKeyStore>, issuer: Arc<dyn ApprovalKeyIssuer>) -> Self {
        Self { store, issuer }
    }

    /// Return the cached approval key, or issue and cache a new one.
    ///
    /// A cached value that is empty or whitespace-only counts as a miss.
    /// A cache read failure also counts as a miss.
    pub async fn get_approval_key(&self) -> Result<ApprovalKey, CredentialIssuanceError> {
        match self.store.get().await {
            Ok(Some(raw)) => {
                if let Some(key) = ApprovalKey::parse(&raw) {
                    tracing::debug!("Using cached approval key");
                    return Ok(key);
                }
                tracing::debug!("Cached approval key is blank, treating as miss");
            }
            Ok(None) => {
                tracing::debug!("No cached approval key");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Approval key cache read failed, treating as miss");
            }
        }

        self.issue_and_cache(IssueReason::CacheMiss).await
    }

    /// Issue a fresh approval key without consulting the cache, and cache it.
    ///
    /// Used after the server rejected the current key, so the next attempt
    /// does not pick the rejected key back up from the cache.
    pub async fn reissue_approval_key(&self) -> Result<ApprovalKey, CredentialIssuanceError> {
        self.issue_and_cache(IssueReason::Reissue).await
    }

    /// Release the cache connection. Safe to call more than once.
    pub async fn release(&self) {
        self.store.release().await;
    }

    async fn issue_and_cache(
        &self,
        reason: IssueReason,
    ) -> Result<ApprovalKey, CredentialIssuanceError> {
        let key = self.issuer.issue().await?;
        metrics::record_approval_key_issued(reason);
        tracing::info!(reason = ?reason, "Issued new approval key");

        if let Err(e) = self.store.set(key.expose(), APPROVAL_KEY_CACHE_TTL).await {
            tracing::warn!(error = %e, "Failed to cache approval key");
        }

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use proptest::prelude::*;

    use super::*;
    use crate::application::ports::{CacheError, MockApprovalKeyIssuer, MockApprovalKeyStore};

    fn key(value: &str) -> ApprovalKey {
        ApprovalKey::parse(value).unwrap()
    }

    fn manager(store: MockApprovalKeyStore, issuer: MockApprovalKeyIssuer) -> ApprovalKeyManager {
        ApprovalKeyManager::new(Arc::new(store), Arc::new(issuer))
    }

    #[tokio::test]
    async fn cached_key_is_returned_without_issuance() {
        let mut store = MockApprovalKeyStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|| Ok(Some("cached-key".to_string())));
        store.expect_set().never();

        let mut issuer = MockApprovalKeyIssuer::new();
        issuer.expect_issue().never();

        let result = manager(store, issuer).get_approval_key().await.unwrap();
        assert_eq!(result.expose(), "cached-key");
    }

    #[tokio::test]
    async fn whitespace_cache_hit_issues_and_caches_with_ttl() {
        let mut store = MockApprovalKeyStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|| Ok(Some("  ".to_string())));
        store
            .expect_set()
            .withf(|value, ttl| value.to_string() == "X" && ttl.as_secs() == 82_800)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut issuer = MockApprovalKeyIssuer::new();
        issuer.expect_issue().times(1).returning(|| Ok(key("X")));

        let result = manager(store, issuer).get_approval_key().await.unwrap();
        assert_eq!(result.expose(), "X");
    }

    #[tokio::test]
    async fn cache_read_error_is_a_miss() {
        let mut store = MockApprovalKeyStore::new();
        store.expect_get().times(1).returning(|| {
            Err(CacheError::Connection {
                message: "refused".to_string(),
            })
        });
        store.expect_set().times(1).returning(|_, _| Ok(()));

        let mut issuer = MockApprovalKeyIssuer::new();
        issuer.expect_issue().times(1).returning(|| Ok(key("fresh")));

        let result = manager(store, issuer).get_approval_key().await.unwrap();
        assert_eq!(result.expose(), "fresh");
    }

    #[tokio::test]
    async fn cache_write_error_still_returns_key() {
        let mut store = MockApprovalKeyStore::new();
        store.expect_get().returning(|| Ok(None));
        store.expect_set().times(1).returning(|_, _| Err(CacheError::Released));

        let mut issuer = MockApprovalKeyIssuer::new();
        issuer.expect_issue().times(1).returning(|| Ok(key("fresh")));

        let result = manager(store, issuer).get_approval_key().await.unwrap();
        assert_eq!(result.expose(), "fresh");
    }

    #[tokio::test]
    async fn issuance_error_propagates_without_cache_write() {
        let mut store = MockApprovalKeyStore::new();
        store.expect_get().returning(|| Ok(None));
        store.expect_set().never();

        let mut issuer = MockApprovalKeyIssuer::new();
        issuer
            .expect_issue()
            .times(1)
            .returning(|| Err(CredentialIssuanceError::MissingField));

        let result = manager(store, issuer).get_approval_key().await;
        assert!(matches!(result, Err(CredentialIssuanceError::MissingField)));
    }

    #[tokio::test]
    async fn reissue_bypasses_cache_read() {
        let mut store = MockApprovalKeyStore::new();
        store.expect_get().never();
        store
            .expect_set()
            .with(eq("renewed"), eq(APPROVAL_KEY_CACHE_TTL))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut issuer = MockApprovalKeyIssuer::new();
        issuer.expect_issue().times(1).returning(|| Ok(key("renewed")));

        let result = manager(store, issuer).reissue_approval_key().await.unwrap();
        assert_eq!(result.expose(), "renewed");
    }

    #[tokio::test]
    async fn release_delegates_to_store() {
        let mut store = MockApprovalKeyStore::new();
        store.expect_release().times(2).returning(|| ());

        let manager = manager(store, MockApprovalKeyIssuer::new());
        manager.release().await;
        manager.release().await;
    }

    proptest! {
        #[test]
        fn blank_cached_values_issue_exactly_once(blank in "[ \t\r\n]{0,12}") {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let mut store = MockApprovalKeyStore::new();
            store.expect_get().times(1).returning(move || Ok(Some(blank.clone())));
            store.expect_set().times(1).returning(|_, _| Ok(()));

            let mut issuer = MockApprovalKeyIssuer::new();
            issuer.expect_issue().times(1).returning(|| Ok(key("issued")));

            let result = runtime.block_on(manager(store, issuer).get_approval_key()).unwrap();
            prop_assert_eq!(result.expose(), "issued");
        }

        #[test]
        fn non_blank_cached_values_never_issue(value in "[A-Za-z0-9-]{1,40}") {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let cached = value.clone();
            let mut store = MockApprovalKeyStore::new();
            store.expect_get().times(1).returning(move || Ok(Some(cached.clone())));

            let mut issuer = MockApprovalKeyIssuer::new();
            issuer.expect_issue().never();

            let result = runtime.block_on(manager(store, issuer).get_approval_key()).unwrap();
            prop_assert_eq!(result.expose(), value.as_str());
        }
    }
}
