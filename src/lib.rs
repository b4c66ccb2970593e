pub mod db;
pub mod diary;
pub mod error;
pub mod lookup;
pub mod models;
pub mod profile;
pub mod settings;
pub mod storage;
mod utils;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use log::info;

use db::Database;
use diary::{BpDiarySession, DiaryRepository, FoodDiarySession, GlucoseDiarySession};
use models::DiaryDate;
use profile::ProfileStore;
use settings::SettingsStore;
use storage::{KeyValueStore, TimeoutStore};

pub const DATABASE_FILE: &str = "health_diary.sqlite3";

/// Initializes logging (reads `RUST_LOG`, defaults to info). Safe to call
/// more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Everything a host shell needs: the diaries, the profile and the settings,
/// all backed by one store.
pub struct DiaryApp {
    store: Arc<dyn KeyValueStore>,
    settings: Arc<SettingsStore>,
    diaries: DiaryRepository,
    profile: ProfileStore,
}

impl DiaryApp {
    /// Opens (or creates) the app state under `data_dir`: settings file,
    /// SQLite database behind the configured storage deadline, and the three
    /// diary keys.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir: PathBuf = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let settings = SettingsStore::in_dir(&data_dir)?;
        let deadline = settings.get().storage_timeout();

        let db_path = data_dir.join(DATABASE_FILE);
        let database = tokio::task::spawn_blocking(move || Database::new(db_path))
            .await
            .context("database initialization task failed")??;

        let app = Self::with_store(Arc::new(TimeoutStore::new(database, deadline)), settings);
        app.diaries
            .bootstrap()
            .await
            .context("failed to bootstrap diary collections")?;

        info!("Health diary opened at {}", data_dir.display());
        Ok(app)
    }

    pub fn with_store(store: Arc<dyn KeyValueStore>, settings: SettingsStore) -> Self {
        Self {
            diaries: DiaryRepository::new(store.clone()),
            profile: ProfileStore::new(store.clone()),
            settings: Arc::new(settings),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn diaries(&self) -> &DiaryRepository {
        &self.diaries
    }

    pub fn profile(&self) -> &ProfileStore {
        &self.profile
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn bp_session(&self, date: DiaryDate) -> BpDiarySession {
        BpDiarySession::new(date)
    }

    /// Picks up the hypo threshold configured at the time of the call.
    pub fn glucose_session(&self, date: DiaryDate) -> GlucoseDiarySession {
        GlucoseDiarySession::new(date, self.settings.get().hypo_threshold_mmol_l)
    }

    pub fn food_session(&self, date: DiaryDate) -> FoodDiarySession {
        FoodDiarySession::new(date)
    }
}
