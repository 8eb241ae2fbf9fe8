use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::metadata::DatabaseMetadata;
use crate::migration::executor::check_deadline;
use crate::migration::{MigrationContext, MigrationExecutor, MigrationStep};
use crate::schema::{ChangeSet, DiffOptions, SchemaCatalog, SchemaDiffer};
use crate::store::StorageEngine;
use crate::strata_config::StrataConfig;
use crate::MIGRATION_LOCKS;
use std::time::Instant;

/// Result of resolving a store open against its declared catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Stored and declared catalogs already matched; nothing was touched.
    NoOp,
    /// The store was uninitialized and adopted the declared catalog.
    Created,
    /// The store was wiped and recreated (`delete_if_migration_needed`).
    Recreated,
    /// A migration ran to completion and committed.
    Migrated { from_version: u32, to_version: u32 },
}

/// States of the migration driver.
///
/// `Idle -> VersionCheck -> {NoOpOpen | BuildingPath | Failed} -> Executing
/// -> Verifying -> {Committed | RolledBack}`. Terminal states are
/// `NoOpOpen`, `Committed`, `RolledBack`, and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    VersionCheck,
    NoOpOpen,
    BuildingPath,
    Executing,
    Verifying,
    Committed,
    RolledBack,
    Failed,
}

/// Orchestrates one migration run.
///
/// # Purpose
/// The driver compares the stored (version, catalog) against the declared
/// ones, builds and validates a linear migration path, invokes the executor
/// per step inside one exclusive transaction, verifies post-conditions, and
/// commits or rolls back.
///
/// # Guarantees
/// - Schema errors surface before any transaction opens
/// - A process-wide per-store lock is held for the whole Executing/Verifying
///   span; concurrent attempts block or fail fast with `AlreadyMigrating`
/// - Any failure after Executing begins triggers a full rollback, leaving
///   the committed store state unchanged from its pre-migration state
/// - Only the Committed path durably advances the stored version, so
///   re-running the driver against a migrated store is a no-op open
pub struct MigrationDriver {
    engine: StorageEngine,
    config: StrataConfig,
    state: DriverState,
}

impl MigrationDriver {
    pub fn new(engine: StorageEngine, config: StrataConfig) -> Self {
        MigrationDriver {
            engine,
            config,
            state: DriverState::Idle,
        }
    }

    /// The driver's current state, for observability and tests.
    pub fn state(&self) -> DriverState {
        self.state
    }

    fn transition(&mut self, state: DriverState) {
        log::debug!("Migration driver: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Runs the full state machine once.
    pub fn run(&mut self) -> StrataResult<MigrationOutcome> {
        self.transition(DriverState::VersionCheck);

        let declared = self.config.declared_catalog()?;
        let stored = self.engine.stored_catalog()?;
        let stored_version = self.engine.stored_version()?;
        let declared_version = declared.version();

        if stored_version == declared_version && stored.structural_eq(&declared) {
            self.transition(DriverState::NoOpOpen);
            return Ok(MigrationOutcome::NoOp);
        }

        if stored_version > declared_version {
            self.transition(DriverState::Failed);
            log::error!(
                "Stored schema version {} is newer than declared version {}",
                stored_version,
                declared_version
            );
            return Err(StrataError::new(
                &format!(
                    "Stored schema version {} is newer than declared version {}",
                    stored_version, declared_version
                ),
                ErrorKind::DowngradeNotSupported,
            ));
        }

        if self.config.delete_if_migration_needed() {
            log::warn!(
                "Store {} needs migration; deleting and recreating as configured",
                self.engine.identity()
            );
            self.engine.purge()?;
            bootstrap_store(&self.engine, &declared)?;
            self.transition(DriverState::Committed);
            return Ok(MigrationOutcome::Recreated);
        }

        self.transition(DriverState::BuildingPath);
        let differ = SchemaDiffer::with_options(DiffOptions {
            fill_required_defaults: self.config.fill_required_defaults(),
        });
        // Schema errors abort here, before any transaction opens.
        let change_set = differ.diff(&stored, &declared)?;
        let steps = match self.build_path(stored_version, declared_version, change_set) {
            Ok(steps) => steps,
            Err(e) => {
                self.transition(DriverState::Failed);
                return Err(e);
            }
        };

        self.transition(DriverState::Executing);

        let lock = MIGRATION_LOCKS.get_lock(&self.engine.identity());
        let _guard = if self.config.fail_fast_on_concurrent_migration() {
            match lock.try_write() {
                Some(guard) => guard,
                None => {
                    self.transition(DriverState::Failed);
                    return Err(StrataError::new(
                        &format!(
                            "Another migration is already running against {}",
                            self.engine.identity()
                        ),
                        ErrorKind::AlreadyMigrating,
                    ));
                }
            }
        } else {
            lock.write()
        };

        let deadline = self
            .config
            .migration_timeout()
            .map(|timeout| Instant::now() + timeout);

        self.engine.begin_exclusive_transaction()?;
        let result = self.execute_and_verify(&steps, &stored, &declared, deadline);

        match result {
            Ok(()) => {
                self.engine.commit_transaction()?;
                self.transition(DriverState::Committed);
                log::info!(
                    "Migrated {} from schema version {} to {}",
                    self.engine.identity(),
                    stored_version,
                    declared_version
                );
                Ok(MigrationOutcome::Migrated {
                    from_version: stored_version,
                    to_version: declared_version,
                })
            }
            Err(error) => {
                if let Err(rollback_error) = self.engine.rollback_transaction() {
                    log::error!(
                        "Rollback failed after migration error: {}",
                        rollback_error
                    );
                }
                self.transition(DriverState::RolledBack);
                log::error!("Migration rolled back: {}", error);
                Err(error)
            }
        }
    }

    /// Builds the ordered step sequence spanning `from -> to`.
    ///
    /// One step per registered migration, preferring the largest registered
    /// jump, with the full structural diff attached to the first step. When
    /// no migrations are registered at all, a single synthesized step covers
    /// the whole diff. A gap between registered steps is a schema-breaking
    /// gap and fails with `NoPathFound`.
    fn build_path(
        &self,
        from: u32,
        to: u32,
        change_set: ChangeSet,
    ) -> StrataResult<Vec<MigrationStep>> {
        let migrations = self.config.migrations();

        if migrations.is_empty() || from == to {
            return Ok(vec![MigrationStep {
                from_version: from,
                to_version: to,
                change_set,
                callback: None,
            }]);
        }

        let mut steps = Vec::new();
        let mut current = from;
        while current < to {
            let no_path = || {
                StrataError::new(
                    &format!(
                        "No migration path found from version {} to {} (gap at {})",
                        from, to, current
                    ),
                    ErrorKind::NoPathFound,
                )
            };

            let targets = migrations.get(&current).ok_or_else(&no_path)?;
            // Prefer the largest registered jump that does not overshoot.
            let (target, migration) = targets
                .range(current + 1..=to)
                .next_back()
                .ok_or_else(&no_path)?;

            steps.push(MigrationStep {
                from_version: current,
                to_version: *target,
                change_set: ChangeSet::new(),
                callback: Some(migration.callback()),
            });
            current = *target;
        }

        if let Some(first) = steps.first_mut() {
            first.change_set = change_set;
        }
        Ok(steps)
    }

    fn execute_and_verify(
        &mut self,
        steps: &[MigrationStep],
        stored: &SchemaCatalog,
        declared: &SchemaCatalog,
        deadline: Option<Instant>,
    ) -> StrataResult<()> {
        let engine = self.engine.clone();
        let executor = MigrationExecutor::new(&engine);

        for step in steps {
            check_deadline(deadline)?;

            // Version guard: a committed step can never be re-applied.
            let current = self.engine.stored_version()?;
            if step.from_version != step.to_version && current != step.from_version {
                return Err(StrataError::new(
                    &format!(
                        "Step {} -> {} cannot run at stored version {}",
                        step.from_version, step.to_version, current
                    ),
                    ErrorKind::InvalidOperation,
                ));
            }

            executor.apply(&step.change_set, deadline)?;

            // Persist catalog and version before the callback runs, so the
            // callback observes the step's target version.
            let step_catalog = declared.with_version(step.to_version);
            self.engine.write_catalog(&step_catalog)?;

            if let Some(callback) = &step.callback {
                check_deadline(deadline)?;
                let context = MigrationContext::new(stored, &step_catalog, &self.engine);
                callback(&context).map_err(|e| {
                    StrataError::new_with_cause(
                        &format!(
                            "Migration callback {} -> {} failed",
                            step.from_version, step.to_version
                        ),
                        ErrorKind::UserCallbackFailed,
                        e,
                    )
                })?;
            }
        }

        self.transition(DriverState::Verifying);
        check_deadline(deadline)?;

        let persisted = self.engine.stored_catalog()?;
        let differ = SchemaDiffer::with_options(DiffOptions {
            fill_required_defaults: self.config.fill_required_defaults(),
        });
        match differ.diff(&persisted, declared) {
            Ok(diff) if diff.is_empty() => Ok(()),
            Ok(diff) => {
                log::error!(
                    "Persisted catalog differs from declared catalog after migration ({} changes)",
                    diff.len()
                );
                Err(StrataError::new(
                    "Persisted catalog differs from declared catalog after migration",
                    ErrorKind::PostMigrationMismatch,
                ))
            }
            Err(e) => Err(StrataError::new_with_cause(
                "Persisted catalog could not be re-diffed after migration",
                ErrorKind::PostMigrationMismatch,
                e,
            )),
        }
    }
}

/// Adopts a declared catalog on an empty store, inside one transaction.
///
/// Used for first open of an uninitialized store and for the
/// `delete_if_migration_needed` recreate path.
pub(crate) fn bootstrap_store(
    engine: &StorageEngine,
    declared: &SchemaCatalog,
) -> StrataResult<()> {
    declared.validate()?;
    engine.begin_exclusive_transaction()?;

    let result = (|| {
        for schema in declared.schemas() {
            engine.add_type(schema)?;
        }
        engine.write_catalog(declared)?;
        engine.write_metadata(&DatabaseMetadata::fresh(
            &engine.engine_version(),
            declared.version(),
        ))?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            engine.commit_transaction()?;
            log::info!(
                "Bootstrapped store {} at schema version {}",
                engine.identity(),
                declared.version()
            );
            Ok(())
        }
        Err(error) => {
            if let Err(rollback_error) = engine.rollback_transaction() {
                log::error!("Rollback failed after bootstrap error: {}", rollback_error);
            }
            Err(error)
        }
    }
}
