//! Read-through response cache and write-path invalidation.
//!
//! Read handlers wrap their persistent-store query in [`lookup_or_compute`]: a
//! hit serves the serialized envelope straight from the shared store, a miss
//! (or any store error) falls through to the query and best-effort populates
//! the key afterwards. Correctness never depends on the store being up -- every
//! cache failure is logged and swallowed, and the compute path wins.
//!
//! Write handlers call [`invalidate_all`] before and after the write, so a
//! cached envelope cannot outlive a data change by more than the TTL. The
//! pre-write sweep narrows (but does not close) the window in which a racing
//! read repopulates the cache with pre-write data.
//!
//! Keys are deterministic: list responses key on the canonical JSON of their
//! normalized filter + pagination parameters (`chapters:<json>`), detail
//! responses on the chapter id (`chapter:<id>`). Both prefixes sit under one
//! glob so a single sweep evicts them together.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::data::chapters::ChapterFilter;
use crate::kv::KvStore;

/// Covers both `chapters:<filters>` list keys and `chapter:<id>` detail keys.
pub const INVALIDATION_PATTERN: &str = "chapter*";

/// Canonical form of the list-query parameters. Field order is fixed by the
/// struct declaration and absent filters are omitted, so two requests with the
/// same normalized parameters always serialize to the same key.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListKey<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    weak_chapters: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<&'a str>,
    page: i64,
    limit: i64,
}

/// Cache key for a list query.
pub fn list_key(filter: &ChapterFilter, page: i64, limit: i64) -> String {
    let key = ListKey {
        class: filter.class.as_deref(),
        unit: filter.unit.as_deref(),
        status: filter.status.as_deref(),
        weak_chapters: filter.weak_chapters,
        subject: filter.subject.as_deref(),
        page,
        limit,
    };
    // A flat struct of scalars; serialization cannot fail.
    format!("chapters:{}", serde_json::to_string(&key).unwrap_or_default())
}

/// Cache key for a detail query.
pub fn detail_key(id: Uuid) -> String {
    format!("chapter:{id}")
}

/// Serve `key` from the shared store, or compute the envelope and populate the
/// key with the given TTL. Store failures on either side degrade to the
/// compute path; only `compute` itself can fail the request.
pub async fn lookup_or_compute<T, E, F, Fut>(
    kv: &KvStore,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match kv.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
            Ok(hit) => {
                debug!(key, "cache hit");
                return Ok(hit);
            }
            Err(e) => warn!(key, error = %e, "discarding undecodable cache entry"),
        },
        Ok(None) => debug!(key, "cache miss"),
        Err(e) => warn!(key, error = %e, "cache read failed, falling through to store"),
    }

    let fresh = compute().await?;

    match serde_json::to_string(&fresh) {
        Ok(raw) => {
            if let Err(e) = kv.set_ex(key, &raw, ttl).await {
                warn!(key, error = %e, "cache populate failed");
            }
        }
        Err(e) => warn!(key, error = %e, "cache entry not serializable"),
    }
    Ok(fresh)
}

/// Evict every cached chapter envelope, list and detail alike. Idempotent;
/// a failure here costs staleness (bounded by the TTL), never the write.
pub async fn invalidate_all(kv: &KvStore) {
    match kv.del_matching(INVALIDATION_PATTERN).await {
        Ok(0) => {}
        Ok(evicted) => debug!(evicted, "chapter cache invalidated"),
        Err(e) => warn!(error = %e, "cache invalidation failed; stale entries expire by TTL"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(class: Option<&str>, subject: Option<&str>) -> ChapterFilter {
        ChapterFilter {
            class: class.map(str::to_owned),
            subject: subject.map(str::to_owned),
            ..Default::default()
        }
    }

    #[test]
    fn identical_parameters_share_a_key() {
        let a = list_key(&filter(Some("Class 11"), None), 1, 100);
        let b = list_key(&filter(Some("Class 11"), None), 1, 100);
        assert_eq!(a, b);
    }

    #[test]
    fn different_parameters_get_different_keys() {
        let base = list_key(&filter(Some("Class 11"), None), 1, 100);
        assert_ne!(base, list_key(&filter(Some("Class 12"), None), 1, 100));
        assert_ne!(base, list_key(&filter(Some("Class 11"), Some("Physics")), 1, 100));
        assert_ne!(base, list_key(&filter(Some("Class 11"), None), 2, 100));
        assert_ne!(base, list_key(&filter(Some("Class 11"), None), 1, 50));
    }

    #[test]
    fn keys_live_under_the_invalidation_namespace() {
        let prefix = INVALIDATION_PATTERN.trim_end_matches('*');
        assert!(list_key(&ChapterFilter::default(), 1, 100).starts_with(prefix));
        assert!(detail_key(Uuid::nil()).starts_with(prefix));
    }
}
