use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::ledger::LedgerHandle;
use crate::migrate::MigrationRunner;
use crate::repo::{ContactsRepo, NotesRepo, PatientsRepo, TutorsRepo};
use crate::service::{ContactService, NoteService, PatientService, TutorService};
use crate::store::Store;

/// Everything a caller needs after startup: the open store, the migration
/// ledger, and one service per entity. Services are wired only after every
/// pending migration has run.
#[derive(Clone)]
pub struct AppState {
    store: Store,
    ledger: LedgerHandle,
    patients: PatientService,
    notes: NoteService,
    contacts: ContactService,
    tutors: TutorService,
    db_path: Arc<PathBuf>,
    ready: Arc<AtomicBool>,
}

impl AppState {
    /// Open the configured database, apply pending migrations, then wire
    /// repositories and services. A migration failure propagates and the
    /// state never becomes ready.
    pub async fn initialize(config: &AppConfig) -> AppResult<AppState> {
        config.ensure_dirs()?;
        let store = Store::open(config.db_path()).await?;
        let ledger = LedgerHandle::file(config.ledger_path());
        let runner = MigrationRunner::new(store.pool().clone(), ledger.clone());
        let applied = runner.apply_pending().await?;
        if !applied.is_empty() {
            info!(target: "consulta", event = "db_migrated", count = applied.len());
        }

        let state = AppState::assemble(store, ledger, config.db_path().to_path_buf());
        state.ready.store(true, Ordering::SeqCst);
        info!(
            target: "consulta",
            event = "state_ready",
            db_path = %state.db_path.display()
        );
        Ok(state)
    }

    /// Fresh in-memory store with a memory ledger and all migrations
    /// applied. Test and scratch use.
    pub async fn in_memory() -> AppResult<AppState> {
        let store = Store::in_memory().await?;
        let ledger = LedgerHandle::in_memory();
        let runner = MigrationRunner::new(store.pool().clone(), ledger.clone());
        runner.apply_pending().await?;
        let state = AppState::assemble(store, ledger, PathBuf::from(":memory:"));
        state.ready.store(true, Ordering::SeqCst);
        Ok(state)
    }

    fn assemble(store: Store, ledger: LedgerHandle, db_path: PathBuf) -> AppState {
        let patients_repo = PatientsRepo::new(store.clone());
        let notes_repo = NotesRepo::new(store.clone());
        let contacts_repo = ContactsRepo::new(store.clone());
        let tutors_repo = TutorsRepo::new(store.clone());

        AppState {
            patients: PatientService::new(patients_repo.clone()),
            notes: NoteService::new(notes_repo, patients_repo.clone()),
            contacts: ContactService::new(contacts_repo, patients_repo.clone()),
            tutors: TutorService::new(tutors_repo, patients_repo),
            store,
            ledger,
            db_path: Arc::new(db_path),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn ledger(&self) -> &LedgerHandle {
        &self.ledger
    }

    pub fn patients(&self) -> &PatientService {
        &self.patients
    }

    pub fn notes(&self) -> &NoteService {
        &self.notes
    }

    pub fn contacts(&self) -> &ContactService {
        &self.contacts
    }

    pub fn tutors(&self) -> &TutorService {
        &self.tutors
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn migration_runner(&self) -> MigrationRunner {
        MigrationRunner::new(self.store.pool().clone(), self.ledger.clone())
    }

    #[cfg(test)]
    pub(crate) async fn unready() -> AppResult<AppState> {
        let store = Store::in_memory().await?;
        Ok(AppState::assemble(
            store,
            LedgerHandle::in_memory(),
            PathBuf::from(":memory:"),
        ))
    }
}
