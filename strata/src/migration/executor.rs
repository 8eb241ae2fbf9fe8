use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::migration::{conversions, ConversionTable};
use crate::schema::{ChangeSet, SchemaChange};
use crate::store::StorageEngine;
use std::time::Instant;

/// Fails with `MigrationTimeout` once the caller-supplied deadline passes.
///
/// The driver and executor call this between steps and between operations,
/// so a timed-out migration aborts at the next operation boundary and rolls
/// back.
pub(crate) fn check_deadline(deadline: Option<Instant>) -> StrataResult<()> {
    if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
            log::error!("Migration exceeded its configured timeout");
            return Err(StrataError::new(
                "Migration exceeded its configured timeout",
                ErrorKind::MigrationTimeout,
            ));
        }
    }
    Ok(())
}

/// Applies the structural changes of one migration step.
///
/// # Purpose
/// The executor turns a [`ChangeSet`] into storage adapter calls, in order,
/// inside the single exclusive transaction the driver acquired. It never
/// begins, commits, or rolls back a transaction itself: the first failing
/// operation propagates upward and the driver rolls the whole migration
/// back, so no partial schema state ever persists.
///
/// # Invariants
/// - A new column is initialized for every existing row before any later
///   operation runs, so no row ever reads an undefined value for a declared
///   property
/// - A type change re-encodes every row through the registered conversion;
///   one inconvertible value fails the whole migration with
///   `ConversionFailed`, naming the class, property, and row
pub struct MigrationExecutor<'a> {
    engine: &'a StorageEngine,
    conversions: &'static ConversionTable,
}

impl<'a> MigrationExecutor<'a> {
    pub fn new(engine: &'a StorageEngine) -> Self {
        MigrationExecutor {
            engine,
            conversions: conversions(),
        }
    }

    /// Applies every change in order, checking the deadline between
    /// operations.
    pub fn apply(&self, change_set: &ChangeSet, deadline: Option<Instant>) -> StrataResult<()> {
        for change in change_set.iter() {
            check_deadline(deadline)?;
            self.apply_change(change)?;
        }
        Ok(())
    }

    fn apply_change(&self, change: &SchemaChange) -> StrataResult<()> {
        match change {
            SchemaChange::AddType { schema } => {
                log::debug!("Adding type '{}'", schema.class_name());
                self.engine.add_type(schema)
            }

            SchemaChange::RemoveType { class_name } => {
                log::debug!("Removing type '{}'", class_name);
                self.engine.remove_type(class_name)
            }

            SchemaChange::AddProperty {
                class_name,
                property,
                default,
            } => {
                log::debug!("Adding column '{}.{}'", class_name, property.name);
                self.engine.add_column(class_name, property, default)
            }

            SchemaChange::RemoveProperty {
                class_name,
                property_name,
            } => {
                log::debug!("Removing column '{}.{}'", class_name, property_name);
                self.engine.remove_column(class_name, property_name)
            }

            SchemaChange::ChangePropertyType {
                class_name,
                property_name,
                from,
                to,
            } => {
                log::debug!(
                    "Re-encoding column '{}.{}' from {} to {}",
                    class_name,
                    property_name,
                    from,
                    to
                );
                let index = self.engine.column_index(class_name, property_name)?;
                self.engine.set_column_type(class_name, property_name, *to)?;

                for row in self.engine.rows(class_name)? {
                    let row = row?;
                    let value = row.get(index)?;
                    if value.is_null() {
                        continue;
                    }
                    let converted =
                        self.conversions.convert(*from, *to, &value).map_err(|e| {
                            StrataError::new_with_cause(
                                &format!(
                                    "Cannot convert '{}.{}' for row {}",
                                    class_name,
                                    property_name,
                                    row.id()
                                ),
                                ErrorKind::ConversionFailed,
                                e,
                            )
                        })?;
                    row.set(index, converted)?;
                }
                Ok(())
            }

            SchemaChange::ChangeIndexed {
                class_name,
                property_name,
                indexed,
            } => self
                .engine
                .set_indexed(class_name, property_name, *indexed),

            SchemaChange::ChangeOptional {
                class_name,
                property_name,
                optional,
                default,
            } => self.engine.set_optional(
                class_name,
                property_name,
                *optional,
                default.as_ref(),
            ),

            SchemaChange::SetPrimaryKey {
                class_name,
                primary_key,
            } => self
                .engine
                .set_primary_key(class_name, primary_key.as_deref()),
        }
    }
}
