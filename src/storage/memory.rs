//! The reference in-memory `Storage`. Holds policies in a map keyed
//! by uid plus an insertion-order index, guarded by a single
//! `RwLock` so readers see a consistent snapshot while writers are
//! serialized against each other and against readers.

use super::Storage;
use crate::checker::CheckerKind;
use crate::error::EngineError;
use crate::inquiry::Inquiry;
use crate::policy::Policy;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    policies: HashMap<String, Policy>,
    order: Vec<String>,
}

/// An in-memory `Storage` backed by a `HashMap`. `find_for_inquiry`
/// is deliberately conservative: it returns every policy regardless
/// of `checker_kind`, leaving the narrowing work to `Guard`.
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }
}

impl Storage for MemoryStorage {
    fn add(&self, policy: Policy) -> Result<(), EngineError> {
        let mut inner = self.inner.write().unwrap();
        if inner.policies.contains_key(&policy.uid) {
            return Err(EngineError::exists(policy.uid));
        }
        inner.order.push(policy.uid.clone());
        inner.policies.insert(policy.uid.clone(), policy);
        Ok(())
    }

    fn get(&self, uid: &str) -> Result<Policy, EngineError> {
        let inner = self.inner.read().unwrap();
        inner
            .policies
            .get(uid)
            .cloned()
            .ok_or_else(|| EngineError::not_found(uid))
    }

    fn get_all(&self, limit: i64, offset: i64) -> Result<Vec<Policy>, EngineError> {
        if limit < 0 || offset < 0 {
            return Err(EngineError::invalid_argument(
                "limit and offset must both be >= 0",
            ));
        }
        let inner = self.inner.read().unwrap();
        let offset = offset as usize;
        let limit = limit as usize;
        Ok(inner
            .order
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|uid| inner.policies.get(uid).cloned())
            .collect())
    }

    fn update(&self, policy: Policy) -> Result<(), EngineError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.policies.contains_key(&policy.uid) {
            return Err(EngineError::not_found(policy.uid));
        }
        inner.policies.insert(policy.uid.clone(), policy);
        Ok(())
    }

    fn delete(&self, uid: &str) -> Result<(), EngineError> {
        let mut inner = self.inner.write().unwrap();
        if inner.policies.remove(uid).is_some() {
            inner.order.retain(|existing| existing != uid);
        }
        Ok(())
    }

    fn find_for_inquiry(
        &self,
        _inquiry: &Inquiry,
        _checker_kind: Option<CheckerKind>,
    ) -> Result<Vec<Policy>, EngineError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .order
            .iter()
            .filter_map(|uid| inner.policies.get(uid).cloned())
            .collect())
    }

    fn len(&self) -> Result<usize, EngineError> {
        Ok(self.inner.read().unwrap().policies.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;
    use std::collections::HashMap as Map;

    fn policy(uid: &str) -> Policy {
        Policy::string_typed(uid, vec!["Alice"], vec!["read"], vec!["book"], Map::new(), Effect::Allow, "")
    }

    #[test]
    fn test_add_rejects_duplicate_uid() {
        let storage = MemoryStorage::new();
        storage.add(policy("p1")).unwrap();
        let err = storage.add(policy("p1")).unwrap_err();
        assert!(matches!(err, EngineError::Exists { .. }));
    }

    #[test]
    fn test_get_not_found() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.get("missing").unwrap_err(),
            EngineError::NotFound { .. }
        ));
    }

    #[test]
    fn test_update_missing_uid_is_not_found() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.update(policy("ghost")).unwrap_err(),
            EngineError::NotFound { .. }
        ));
    }

    #[test]
    fn test_delete_missing_uid_is_noop() {
        let storage = MemoryStorage::new();
        storage.delete("ghost").unwrap();
    }

    #[test]
    fn test_get_all_negative_is_invalid_argument() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.get_all(-1, 0).unwrap_err(),
            EngineError::InvalidArgument { .. }
        ));
    }

    #[test]
    fn test_get_all_preserves_insertion_order() {
        let storage = MemoryStorage::new();
        storage.add(policy("p1")).unwrap();
        storage.add(policy("p2")).unwrap();
        storage.add(policy("p3")).unwrap();
        let page = storage.get_all(10, 0).unwrap();
        assert_eq!(
            page.iter().map(|p| p.uid.as_str()).collect::<Vec<_>>(),
            vec!["p1", "p2", "p3"]
        );
        let page = storage.get_all(1, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].uid, "p2");
    }

    #[test]
    fn test_find_for_inquiry_returns_every_policy() {
        let storage = MemoryStorage::new();
        storage.add(policy("p1")).unwrap();
        storage.add(policy("p2")).unwrap();
        let inquiry = Inquiry::new("Alice", "read", "book");
        let candidates = storage.find_for_inquiry(&inquiry, None).unwrap();
        assert_eq!(candidates.len(), 2);
    }
}
