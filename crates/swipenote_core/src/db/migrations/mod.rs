//! Ordered schema steps for the note database.
//!
//! # Invariants
//! - `version` values are strictly increasing.
//! - All pending steps run in one transaction; `PRAGMA user_version` mirrors
//!   the last applied step.
//! - A failing step rolls back every pending step and is reported by name.

use crate::db::{DbError, DbResult};
use log::{debug, error, info};
use rusqlite::{Connection, Transaction};
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "notes",
        sql: include_str!("0001_notes.sql"),
    },
    Migration {
        version: 2,
        name: "sort_indexes",
        sql: include_str!("0002_sort_indexes.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS
        .iter()
        .filter(|migration| migration.version > current_version)
    {
        apply_step(&tx, migration)?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={current_version} to_version={latest}"
    );

    Ok(())
}

fn apply_step(tx: &Transaction<'_>, migration: &Migration) -> DbResult<()> {
    let started_at = Instant::now();
    tx.execute_batch(migration.sql)
        .and_then(|()| {
            tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
        })
        .map_err(|source| {
            error!(
                "event=db_migrate_step module=db status=error version={} name={} error={source}",
                migration.version, migration.name
            );
            DbError::MigrationFailed {
                version: migration.version,
                name: migration.name,
                source,
            }
        })?;
    debug!(
        "event=db_migrate_step module=db status=ok version={} name={} duration_ms={}",
        migration.version,
        migration.name,
        started_at.elapsed().as_millis()
    );
    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::MIGRATIONS;
    use std::collections::HashSet;

    #[test]
    fn steps_are_strictly_increasing_and_uniquely_named() {
        assert!(MIGRATIONS
            .windows(2)
            .all(|pair| pair[0].version < pair[1].version));
        let names: HashSet<_> = MIGRATIONS.iter().map(|migration| migration.name).collect();
        assert_eq!(names.len(), MIGRATIONS.len());
    }
}
