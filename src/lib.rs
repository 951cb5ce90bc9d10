//! `bouncer`: an attribute-based access control (ABAC) decision engine.
//!
//! An inquiry — who (`subject`), doing what (`action`), to what
//! (`resource`), under what (`context`) — is handed to a [`Guard`],
//! which asks a [`Storage`] for candidate [`Policy`] objects, filters
//! them with a [`Checker`], and returns an allow/deny verdict under
//! deny-overrides precedence. Policies describe who/what they apply
//! to either with plain strings matched by a string [`Checker`], or
//! with a [`rules::Rule`] algebra matched structurally — never both
//! in the same policy.

pub mod checker;
pub mod effect;
pub mod error;
pub mod guard;
pub mod inquiry;
pub mod migration;
pub mod policy;
pub mod rules;
pub mod storage;

pub use checker::{Checker, CheckerKind, RegexChecker, RulesChecker, StringExactChecker, StringFuzzyChecker};
pub use effect::Effect;
pub use error::{EngineError, Result};
pub use guard::Guard;
pub use inquiry::Inquiry;
pub use migration::{InMemoryMigrationSet, Migration, MigrationSet, Migrator};
pub use policy::{Dialect, FieldMatcher, Policy};
pub use rules::Rule;
pub use storage::{MemoryStorage, Storage};

/// Initializes a process-wide terminal logger, at `debug` level, for
/// use from test modules that want to observe `trace!`/`debug!`
/// output. Safe to call more than once: a logger already being set is
/// ignored rather than treated as an error.
#[cfg(test)]
pub(crate) fn initialize_logging() {
    use simplelog::{Config, LevelFilter, TermLogger};
    let _ = TermLogger::init(LevelFilter::Debug, Config::default());
}
