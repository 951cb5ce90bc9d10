//! The storage contract: how policies are persisted, paginated and
//! pre-filtered for a given inquiry. `MemoryStorage` is the only
//! implementation this crate carries; remote backends (Mongo and
//! friends) are adapters implemented outside this crate against the
//! same `Storage` trait.

mod memory;

pub use memory::MemoryStorage;

use crate::checker::CheckerKind;
use crate::error::EngineError;
use crate::inquiry::Inquiry;
use crate::policy::Policy;

/// Persistence + candidate-lookup contract for a population of
/// policies.
///
/// `find_for_inquiry` MUST return a superset of the policies that
/// would actually fit the inquiry ("storage conservatism", spec_full
/// §8 law 6) — a storage is free to return every policy it holds.
pub trait Storage: Send + Sync {
    /// Persists `policy`. Fails with `EngineError::Exists` if its uid
    /// is already present.
    fn add(&self, policy: Policy) -> Result<(), EngineError>;

    /// Returns the policy with the given uid, or `EngineError::NotFound`.
    fn get(&self, uid: &str) -> Result<Policy, EngineError>;

    /// Returns a page of policies. `limit`/`offset` must both be
    /// `>= 0`; negative values are rejected with
    /// `EngineError::InvalidArgument`.
    fn get_all(&self, limit: i64, offset: i64) -> Result<Vec<Policy>, EngineError>;

    /// Replaces the policy with the given uid. This storage's policy:
    /// missing uid is `EngineError::NotFound` (documented per spec_full
    /// open question in DESIGN.md).
    fn update(&self, policy: Policy) -> Result<(), EngineError>;

    /// Removes the policy with the given uid. Missing uid is a no-op.
    fn delete(&self, uid: &str) -> Result<(), EngineError>;

    /// Returns every policy that might fit `inquiry`, optionally using
    /// `checker_kind` as a narrowing hint. Must never exclude a
    /// policy that would actually fit.
    fn find_for_inquiry(
        &self,
        inquiry: &Inquiry,
        checker_kind: Option<CheckerKind>,
    ) -> Result<Vec<Policy>, EngineError>;

    /// Number of policies currently held.
    fn len(&self) -> Result<usize, EngineError>;

    fn is_empty(&self) -> Result<bool, EngineError> {
        Ok(self.len()? == 0)
    }
}
