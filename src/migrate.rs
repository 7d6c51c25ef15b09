use std::collections::HashSet;

use futures::future::BoxFuture;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::ledger::{AppliedMigration, LedgerHandle};

type MigrationStep = for<'c> fn(&'c mut SqliteConnection) -> BoxFuture<'c, sqlx::Result<()>>;

/// A named, ordered schema-change unit. The list below is the one source of
/// truth for ordering; there is no filesystem discovery.
pub struct Migration {
    pub name: &'static str,
    pub up: MigrationStep,
    pub down: MigrationStep,
}

pub static MIGRATIONS: &[Migration] = &[
    Migration {
        name: "001_initial",
        up: up_initial,
        down: down_initial,
    },
    Migration {
        name: "002_emergency_contacts",
        up: up_emergency_contacts,
        down: down_emergency_contacts,
    },
    Migration {
        name: "003_legal_tutors",
        up: up_legal_tutors,
        down: down_legal_tutors,
    },
    Migration {
        name: "004_patient_sexual_orientation",
        up: up_patient_sexual_orientation,
        down: down_patient_sexual_orientation,
    },
    Migration {
        name: "005_search_indexes",
        up: up_search_indexes,
        down: down_search_indexes,
    },
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    pub applied: Vec<AppliedMigration>,
    pub pending: Vec<String>,
}

pub struct MigrationRunner {
    pool: SqlitePool,
    ledger: LedgerHandle,
}

impl MigrationRunner {
    pub fn new(pool: SqlitePool, ledger: LedgerHandle) -> Self {
        MigrationRunner { pool, ledger }
    }

    /// Applied entries from the ledger plus the names still pending, in
    /// application order.
    pub fn status(&self) -> AppResult<MigrationStatus> {
        let applied = self.ledger.applied()?;
        let applied_names: HashSet<&str> = applied.iter().map(|m| m.name.as_str()).collect();
        let pending = MIGRATIONS
            .iter()
            .filter(|m| !applied_names.contains(m.name))
            .map(|m| m.name.to_string())
            .collect();
        Ok(MigrationStatus { applied, pending })
    }

    /// Run every pending `up` in ascending order, each in its own
    /// transaction. The ledger entry is recorded only after the unit
    /// commits, so a failure leaves earlier units applied and the failing
    /// one unrecorded.
    pub async fn apply_pending(&self) -> AppResult<Vec<String>> {
        let applied: HashSet<String> = self
            .ledger
            .applied()?
            .into_iter()
            .map(|m| m.name)
            .collect();

        let mut ran = Vec::new();
        for migration in MIGRATIONS {
            if applied.contains(migration.name) {
                info!(target: "consulta", event = "migration_skip", name = migration.name);
                continue;
            }
            self.run_step(migration.name, migration.up, "up").await?;
            self.ledger.record_applied(migration.name)?;
            info!(target: "consulta", event = "migration_applied", name = migration.name);
            ran.push(migration.name.to_string());
        }
        Ok(ran)
    }

    /// Single-step rollback of the most recently applied unit. There is no
    /// multi-step down path.
    pub async fn rollback_last(&self) -> AppResult<Option<String>> {
        let applied = self.ledger.applied()?;
        let Some(last) = applied.last().cloned() else {
            info!(target: "consulta", event = "migration_rollback_noop");
            return Ok(None);
        };
        let migration = MIGRATIONS
            .iter()
            .find(|m| m.name == last.name)
            .ok_or_else(|| {
                AppError::new(
                    "MIGRATE/UNKNOWN_UNIT",
                    "Ledger references a migration this build does not know",
                )
                .with_context("name", last.name.clone())
            })?;

        self.run_step(migration.name, migration.down, "down").await?;
        self.ledger.remove_last()?;
        info!(target: "consulta", event = "migration_rolled_back", name = migration.name);
        Ok(Some(migration.name.to_string()))
    }

    async fn run_step(
        &self,
        name: &str,
        step: MigrationStep,
        direction: &'static str,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        info!(
            target: "consulta",
            event = "migration_step_begin",
            name = name,
            direction = direction
        );
        match step(&mut tx).await {
            Ok(()) => {
                tx.commit().await.map_err(AppError::from)?;
                Ok(())
            }
            Err(err) => {
                if let Err(rb) = tx.rollback().await {
                    error!(
                        target: "consulta",
                        event = "migration_rollback_failed",
                        name = name,
                        error = %rb
                    );
                }
                error!(
                    target: "consulta",
                    event = "migration_step_error",
                    name = name,
                    direction = direction,
                    error = %err
                );
                Err(AppError::from(err)
                    .with_context("migration", name.to_string())
                    .with_context("direction", direction))
            }
        }
    }
}

fn up_initial(conn: &mut SqliteConnection) -> BoxFuture<'_, sqlx::Result<()>> {
    Box::pin(async move {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS patients (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               name TEXT NOT NULL,\
               age INTEGER NOT NULL,\
               email TEXT NOT NULL UNIQUE,\
               phoneNumber TEXT NOT NULL,\
               birthDate TEXT NOT NULL,\
               maritalStatus TEXT NOT NULL,\
               gender TEXT NOT NULL,\
               educationalLevel TEXT NOT NULL DEFAULT '',\
               profession TEXT NOT NULL DEFAULT '',\
               livesWith TEXT NOT NULL DEFAULT '',\
               children INTEGER NOT NULL DEFAULT 0,\
               previousPsychologicalExperience TEXT,\
               firstAppointmentDate TEXT,\
               status TEXT NOT NULL DEFAULT 'active',\
               createdAt INTEGER NOT NULL,\
               updatedAt INTEGER NOT NULL\
             )",
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS notes (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               patientId INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,\
               title TEXT NOT NULL,\
               content TEXT NOT NULL DEFAULT '',\
               createdAt INTEGER NOT NULL,\
               updatedAt INTEGER NOT NULL\
             )",
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_notes_patient ON notes(patientId)")
            .execute(&mut *conn)
            .await?;

        Ok(())
    })
}

fn down_initial(conn: &mut SqliteConnection) -> BoxFuture<'_, sqlx::Result<()>> {
    Box::pin(async move {
        sqlx::query("DROP TABLE IF EXISTS notes")
            .execute(&mut *conn)
            .await?;
        sqlx::query("DROP TABLE IF EXISTS patients")
            .execute(&mut *conn)
            .await?;
        Ok(())
    })
}

fn up_emergency_contacts(conn: &mut SqliteConnection) -> BoxFuture<'_, sqlx::Result<()>> {
    Box::pin(async move {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS emergency_contacts (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               patientId INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,\
               fullName TEXT NOT NULL,\
               phoneNumber TEXT NOT NULL,\
               relation TEXT NOT NULL,\
               email TEXT NOT NULL,\
               address TEXT,\
               createdAt INTEGER NOT NULL,\
               updatedAt INTEGER NOT NULL\
             )",
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_emergency_contacts_patient \
             ON emergency_contacts(patientId)",
        )
        .execute(&mut *conn)
        .await?;

        Ok(())
    })
}

fn down_emergency_contacts(conn: &mut SqliteConnection) -> BoxFuture<'_, sqlx::Result<()>> {
    Box::pin(async move {
        sqlx::query("DROP TABLE IF EXISTS emergency_contacts")
            .execute(&mut *conn)
            .await?;
        Ok(())
    })
}

fn up_legal_tutors(conn: &mut SqliteConnection) -> BoxFuture<'_, sqlx::Result<()>> {
    Box::pin(async move {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS legal_tutors (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               patientId INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,\
               fullName TEXT NOT NULL,\
               phoneNumber TEXT NOT NULL,\
               relation TEXT NOT NULL,\
               email TEXT NOT NULL,\
               birthDate TEXT NOT NULL,\
               address TEXT,\
               createdAt INTEGER NOT NULL,\
               updatedAt INTEGER NOT NULL\
             )",
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_legal_tutors_patient ON legal_tutors(patientId)",
        )
        .execute(&mut *conn)
        .await?;

        Ok(())
    })
}

fn down_legal_tutors(conn: &mut SqliteConnection) -> BoxFuture<'_, sqlx::Result<()>> {
    Box::pin(async move {
        sqlx::query("DROP TABLE IF EXISTS legal_tutors")
            .execute(&mut *conn)
            .await?;
        Ok(())
    })
}

// Column added after the initial release; the guard keeps the unit safe to
// re-run against a database that already has it.
fn up_patient_sexual_orientation(conn: &mut SqliteConnection) -> BoxFuture<'_, sqlx::Result<()>> {
    Box::pin(async move {
        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM pragma_table_info('patients') WHERE name = 'sexualOrientation'",
        )
        .fetch_optional(&mut *conn)
        .await?;
        if exists.is_none() {
            sqlx::query(
                "ALTER TABLE patients ADD COLUMN sexualOrientation \
                 TEXT NOT NULL DEFAULT 'prefer_not_to_say'",
            )
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    })
}

fn down_patient_sexual_orientation(conn: &mut SqliteConnection) -> BoxFuture<'_, sqlx::Result<()>> {
    Box::pin(async move {
        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM pragma_table_info('patients') WHERE name = 'sexualOrientation'",
        )
        .fetch_optional(&mut *conn)
        .await?;
        if exists.is_some() {
            sqlx::query("ALTER TABLE patients DROP COLUMN sexualOrientation")
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    })
}

fn up_search_indexes(conn: &mut SqliteConnection) -> BoxFuture<'_, sqlx::Result<()>> {
    Box::pin(async move {
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name)")
            .execute(&mut *conn)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_patients_status ON patients(status)")
            .execute(&mut *conn)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notes_patient_created \
             ON notes(patientId, createdAt)",
        )
        .execute(&mut *conn)
        .await?;
        Ok(())
    })
}

fn down_search_indexes(conn: &mut SqliteConnection) -> BoxFuture<'_, sqlx::Result<()>> {
    Box::pin(async move {
        sqlx::query("DROP INDEX IF EXISTS idx_patients_name")
            .execute(&mut *conn)
            .await?;
        sqlx::query("DROP INDEX IF EXISTS idx_patients_status")
            .execute(&mut *conn)
            .await?;
        sqlx::query("DROP INDEX IF EXISTS idx_notes_patient_created")
            .execute(&mut *conn)
            .await?;
        Ok(())
    })
}
