//! The migration framework: ordered, reversible schema changes for an
//! externally persisted `Storage`, driven by a `Migrator`.

use crate::error::EngineError;
use log::{debug, info};
use std::sync::atomic::{AtomicU32, Ordering};

/// A single reversible schema change. `order` must be `>= 1` and
/// unique within a `MigrationSet`; `up`/`down` must be safe to call
/// on an already-migrated storage (idempotent), since the framework
/// does not wrap them in a transaction.
pub trait Migration: Send + Sync {
    fn order(&self) -> u32;
    fn up(&self) -> Result<(), EngineError>;
    fn down(&self) -> Result<(), EngineError>;
}

/// Knows the ordered list of migrations for a storage, and how to
/// read/persist the `last_applied` order within that storage.
pub trait MigrationSet {
    fn migrations(&self) -> Vec<Box<dyn Migration + '_>>;
    fn last_applied(&self) -> Result<u32, EngineError>;
    fn set_last_applied(&self, order: u32) -> Result<(), EngineError>;
}

/// Drives a `MigrationSet`: applies migrations forward with `up`, or
/// reverses them with `down`. A step's failure aborts the run;
/// already-committed steps stay applied and the originating error is
/// surfaced to the caller.
pub struct Migrator<S: MigrationSet> {
    set: S,
}

impl<S: MigrationSet> Migrator<S> {
    pub fn new(set: S) -> Migrator<S> {
        Migrator { set }
    }

    /// Applies every not-yet-applied migration in ascending order, or
    /// just the migration whose order equals `number` (applied
    /// regardless of `last_applied`, as long as it's genuinely
    /// pending).
    pub fn up(&self, number: Option<u32>) -> Result<(), EngineError> {
        let mut migrations = self.set.migrations();
        migrations.sort_by_key(|m| m.order());
        let last = self.set.last_applied()?;

        for migration in migrations {
            if migration.order() <= last {
                continue;
            }
            if let Some(n) = number {
                if migration.order() != n {
                    continue;
                }
            }
            debug!("applying migration {}", migration.order());
            migration.up()?;
            self.set.set_last_applied(migration.order())?;
            info!("migration {} applied", migration.order());
            if number.is_some() {
                break;
            }
        }
        Ok(())
    }

    /// Reverses applied migrations in descending order, stopping
    /// before order 0, or just the migration whose order equals
    /// `number`.
    pub fn down(&self, number: Option<u32>) -> Result<(), EngineError> {
        let mut migrations = self.set.migrations();
        migrations.sort_by_key(|m| m.order());
        migrations.reverse();
        let last = self.set.last_applied()?;

        for migration in migrations {
            if migration.order() > last {
                continue;
            }
            if let Some(n) = number {
                if migration.order() != n {
                    continue;
                }
            }
            debug!("reverting migration {}", migration.order());
            migration.down()?;
            self.set.set_last_applied(migration.order().saturating_sub(1))?;
            info!("migration {} reverted", migration.order());
            if number.is_some() {
                break;
            }
        }
        Ok(())
    }
}

/// A `MigrationSet` that persists `last_applied` as an in-process
/// atomic counter. Useful for tests and for storages that keep their
/// own migration bookkeeping in memory; the pattern mirrors
/// `MemoryStorage` as the reference, non-persistent implementation.
pub struct InMemoryMigrationSet {
    migrations: Vec<Box<dyn Migration>>,
    last_applied: AtomicU32,
}

impl InMemoryMigrationSet {
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> InMemoryMigrationSet {
        InMemoryMigrationSet {
            migrations,
            last_applied: AtomicU32::new(0),
        }
    }
}

impl MigrationSet for InMemoryMigrationSet {
    fn migrations(&self) -> Vec<Box<dyn Migration + '_>> {
        // `dyn Migration` boxes aren't `Clone`, so delegate to
        // light proxies that just forward to the owned migration by
        // index rather than trying to hand out the originals twice.
        (0..self.migrations.len())
            .map(|i| Box::new(MigrationRef { set: self, index: i }) as Box<dyn Migration>)
            .collect()
    }

    fn last_applied(&self) -> Result<u32, EngineError> {
        Ok(self.last_applied.load(Ordering::SeqCst))
    }

    fn set_last_applied(&self, order: u32) -> Result<(), EngineError> {
        self.last_applied.store(order, Ordering::SeqCst);
        Ok(())
    }
}

struct MigrationRef<'a> {
    set: &'a InMemoryMigrationSet,
    index: usize,
}

impl<'a> Migration for MigrationRef<'a> {
    fn order(&self) -> u32 {
        self.set.migrations[self.index].order()
    }
    fn up(&self) -> Result<(), EngineError> {
        self.set.migrations[self.index].up()
    }
    fn down(&self) -> Result<(), EngineError> {
        self.set.migrations[self.index].down()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    struct CountingMigration {
        order: u32,
        ups: Arc<AtomicUsize>,
        downs: Arc<AtomicUsize>,
    }

    impl Migration for CountingMigration {
        fn order(&self) -> u32 {
            self.order
        }
        fn up(&self) -> Result<(), EngineError> {
            self.ups.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        }
        fn down(&self) -> Result<(), EngineError> {
            self.downs.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        }
    }

    struct CountingSet {
        migrations: Vec<(u32, Arc<AtomicUsize>, Arc<AtomicUsize>)>,
        last_applied: AtomicU32,
    }

    impl MigrationSet for CountingSet {
        fn migrations(&self) -> Vec<Box<dyn Migration + '_>> {
            self.migrations
                .iter()
                .map(|(order, ups, downs)| {
                    Box::new(CountingMigration {
                        order: *order,
                        ups: ups.clone(),
                        downs: downs.clone(),
                    }) as Box<dyn Migration>
                })
                .collect()
        }

        fn last_applied(&self) -> Result<u32, EngineError> {
            Ok(self.last_applied.load(Ordering::SeqCst))
        }

        fn set_last_applied(&self, order: u32) -> Result<(), EngineError> {
            self.last_applied.store(order, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting_set(orders: &[u32]) -> (CountingSet, Vec<Arc<AtomicUsize>>, Vec<Arc<AtomicUsize>>) {
        let mut ups = Vec::new();
        let mut downs = Vec::new();
        let mut migrations = Vec::new();
        for &order in orders {
            let up = Arc::new(AtomicUsize::new(0));
            let down = Arc::new(AtomicUsize::new(0));
            migrations.push((order, up.clone(), down.clone()));
            ups.push(up);
            downs.push(down);
        }
        (
            CountingSet {
                migrations,
                last_applied: AtomicU32::new(0),
            },
            ups,
            downs,
        )
    }

    #[test]
    fn test_up_applies_in_ascending_order() {
        let (set, ups, _downs) = counting_set(&[1, 2, 3]);
        let migrator = Migrator::new(set);
        migrator.up(None).unwrap();
        assert_eq!(migrator.set.last_applied().unwrap(), 3);
        for up in &ups {
            assert_eq!(up.load(AtomicOrdering::SeqCst), 1);
        }
    }

    #[test]
    fn test_up_with_number_applies_only_that_migration() {
        let (set, ups, _downs) = counting_set(&[1, 2, 3]);
        let migrator = Migrator::new(set);
        migrator.up(Some(2)).unwrap();
        assert_eq!(ups[0].load(AtomicOrdering::SeqCst), 0);
        assert_eq!(ups[1].load(AtomicOrdering::SeqCst), 1);
        assert_eq!(ups[2].load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_migration_inversion() {
        let (set, ups, downs) = counting_set(&[1, 2, 3]);
        let migrator = Migrator::new(set);
        migrator.up(None).unwrap();
        assert_eq!(migrator.set.last_applied().unwrap(), 3);
        migrator.down(None).unwrap();
        assert_eq!(migrator.set.last_applied().unwrap(), 0);
        for (up, down) in ups.iter().zip(downs.iter()) {
            assert_eq!(up.load(AtomicOrdering::SeqCst), down.load(AtomicOrdering::SeqCst));
        }
    }

    #[test]
    fn test_down_stops_before_order_zero() {
        let (set, _ups, downs) = counting_set(&[1, 2]);
        let migrator = Migrator::new(set);
        migrator.up(None).unwrap();
        migrator.down(None).unwrap();
        assert_eq!(migrator.set.last_applied().unwrap(), 0);
        // calling down again is a no-op: nothing left to revert
        migrator.down(None).unwrap();
        for down in &downs {
            assert_eq!(down.load(AtomicOrdering::SeqCst), 1);
        }
    }
}
