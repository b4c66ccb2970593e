//! Persisted diary collections and the merge-and-persist round trip.
//!
//! Every collection is one JSON array under a fixed key. A save reads the
//! whole array, merges in memory and writes the whole array back; a failed
//! write leaves the stored array as it was. A write that times out is read
//! back before the save reports anything.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{PersistError, StorageError, ValidationError};
use crate::models::{BpDayEntry, DayEntry, DiaryDate, FoodDiaryEntry, GlucoseDayEntry};
use crate::storage::KeyValueStore;
use crate::{log_debug, log_error, log_info, log_warn};

use super::merge::{merge_bp, merge_glucose, upsert_by_date, PendingBpEntry, PendingGlucoseEntry};

const ENABLE_LOGS: bool = true;

const EMPTY_COLLECTION: &str = "[]";

const CONFIRM_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiaryKind {
    Bp,
    Glucose,
    Food,
}

impl DiaryKind {
    pub const ALL: [DiaryKind; 3] = [DiaryKind::Bp, DiaryKind::Glucose, DiaryKind::Food];

    /// Storage key of the collection.
    pub fn key(&self) -> &'static str {
        match self {
            DiaryKind::Bp => "BPDiary",
            DiaryKind::Glucose => "GlucoseDiary",
            DiaryKind::Food => "FoodDiary",
        }
    }
}

struct RepositoryInner {
    store: Arc<dyn KeyValueStore>,
    bp_lock: Mutex<()>,
    glucose_lock: Mutex<()>,
    food_lock: Mutex<()>,
}

/// Handle to the three diary collections. Cheap to clone; clones share the
/// per-kind save locks.
#[derive(Clone)]
pub struct DiaryRepository {
    inner: Arc<RepositoryInner>,
}

impl DiaryRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(RepositoryInner {
                store,
                bp_lock: Mutex::new(()),
                glucose_lock: Mutex::new(()),
                food_lock: Mutex::new(()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.store
    }

    /// Raw collection under `kind`, writing an empty array first if the key
    /// has never been used.
    pub async fn get_or_create(&self, kind: DiaryKind) -> Result<String, StorageError> {
        if let Some(raw) = self.inner.store.get_item(kind.key()).await? {
            return Ok(raw);
        }

        log_info!("Creating empty {} collection", kind.key());
        self.inner
            .store
            .set_item(kind.key(), EMPTY_COLLECTION.to_string())
            .await?;
        Ok(EMPTY_COLLECTION.to_string())
    }

    /// Ensures every diary key exists.
    pub async fn bootstrap(&self) -> Result<(), StorageError> {
        for kind in DiaryKind::ALL {
            self.get_or_create(kind).await?;
        }
        Ok(())
    }

    pub async fn load_bp(&self) -> Result<Vec<BpDayEntry>, StorageError> {
        self.load(DiaryKind::Bp).await
    }

    pub async fn load_glucose(&self) -> Result<Vec<GlucoseDayEntry>, StorageError> {
        self.load(DiaryKind::Glucose).await
    }

    pub async fn load_food(&self) -> Result<Vec<FoodDiaryEntry>, StorageError> {
        self.load(DiaryKind::Food).await
    }

    /// BP entries sorted by date; the stored order is insertion order.
    pub async fn bp_entries_chronological(&self) -> Result<Vec<BpDayEntry>, StorageError> {
        let mut entries = self.load_bp().await?;
        entries.sort_by_key(|entry| entry.date());
        Ok(entries)
    }

    pub async fn glucose_entries_chronological(
        &self,
    ) -> Result<Vec<GlucoseDayEntry>, StorageError> {
        let mut entries = self.load_glucose().await?;
        entries.sort_by_key(|entry| entry.date());
        Ok(entries)
    }

    pub async fn find_bp(&self, date: DiaryDate) -> Result<Option<BpDayEntry>, StorageError> {
        Ok(self
            .load_bp()
            .await?
            .into_iter()
            .find(|entry| entry.date() == date))
    }

    pub async fn find_glucose(
        &self,
        date: DiaryDate,
    ) -> Result<Option<GlucoseDayEntry>, StorageError> {
        Ok(self
            .load_glucose()
            .await?
            .into_iter()
            .find(|entry| entry.date() == date))
    }

    /// Merges `pending` into the BP entry for its date and persists the
    /// collection. Returns the entry as stored.
    pub async fn save_bp(&self, pending: PendingBpEntry) -> Result<BpDayEntry, PersistError> {
        if pending.is_empty() {
            return Err(ValidationError::EmptyEntry.into());
        }
        let _guard = self.acquire(DiaryKind::Bp)?;

        let kind = DiaryKind::Bp;
        let date = pending.date;
        let mut collection: Vec<BpDayEntry> = self.load(kind).await?;
        if collection.iter().any(|entry| entry.date() == date) {
            log_info!("Merging into existing {} entry for {}", kind.key(), date);
        }

        let saved = upsert_by_date(&mut collection, date, |existing| {
            merge_bp(existing, pending)
        })?
        .clone();
        log_debug!(
            "BP entry {}: morning={} afternoon={} evening={}",
            saved.key,
            saved.morning.len(),
            saved.afternoon.len(),
            saved.evening.len()
        );

        self.store_collection(kind, &collection).await?;
        Ok(saved)
    }

    pub async fn save_glucose(
        &self,
        pending: PendingGlucoseEntry,
    ) -> Result<GlucoseDayEntry, PersistError> {
        if pending.is_empty() {
            return Err(ValidationError::EmptyEntry.into());
        }
        let _guard = self.acquire(DiaryKind::Glucose)?;

        let kind = DiaryKind::Glucose;
        let date = pending.date;
        let mut collection: Vec<GlucoseDayEntry> = self.load(kind).await?;
        if collection.iter().any(|entry| entry.date() == date) {
            log_info!("Merging into existing {} entry for {}", kind.key(), date);
        }

        let saved = upsert_by_date(&mut collection, date, |existing| {
            merge_glucose(existing, pending)
        })?
        .clone();
        log_debug!(
            "Glucose entry {}: {} readings, {} injections, hypo={}",
            saved.key,
            saved.glucose_readings.len(),
            saved.injections.len(),
            saved.hypo
        );

        self.store_collection(kind, &collection).await?;
        Ok(saved)
    }

    /// Appends one food record. Food entries are never merged by date.
    pub async fn append_food(
        &self,
        entry: FoodDiaryEntry,
    ) -> Result<FoodDiaryEntry, PersistError> {
        if entry.is_blank() {
            return Err(ValidationError::EmptyEntry.into());
        }
        let _guard = self.acquire(DiaryKind::Food)?;

        let kind = DiaryKind::Food;
        let mut collection: Vec<FoodDiaryEntry> = self.load(kind).await?;
        collection.push(entry.clone());
        log_debug!(
            "Food entry for {} with {} items, collection now {}",
            entry.date,
            entry.food.len(),
            collection.len()
        );

        self.store_collection(kind, &collection).await?;
        Ok(entry)
    }

    fn acquire(&self, kind: DiaryKind) -> Result<MutexGuard<'_, ()>, PersistError> {
        let lock = match kind {
            DiaryKind::Bp => &self.inner.bp_lock,
            DiaryKind::Glucose => &self.inner.glucose_lock,
            DiaryKind::Food => &self.inner.food_lock,
        };
        lock.try_lock().map_err(|_| PersistError::SaveInFlight)
    }

    async fn load<E: DeserializeOwned>(&self, kind: DiaryKind) -> Result<Vec<E>, StorageError> {
        let Some(raw) = self.inner.store.get_item(kind.key()).await? else {
            return Ok(Vec::new());
        };

        serde_json::from_str(&raw).map_err(|source| {
            log_error!("Stored {} collection is unreadable: {}", kind.key(), source);
            StorageError::Corrupt {
                key: kind.key().to_string(),
                source,
            }
        })
    }

    async fn store_collection<E: Serialize>(
        &self,
        kind: DiaryKind,
        collection: &[E],
    ) -> Result<(), StorageError> {
        let raw = serde_json::to_string(collection).map_err(|source| StorageError::Encode {
            key: kind.key().to_string(),
            source,
        })?;

        match self.inner.store.set_item(kind.key(), raw.clone()).await {
            Ok(()) => {}
            Err(err @ StorageError::Timeout { .. }) => {
                log_warn!("Write to {} timed out, reading it back", kind.key());
                self.confirm_write(kind, &raw, err).await?;
            }
            Err(err) => {
                log_error!("Failed to write {} collection: {}", kind.key(), err);
                return Err(err);
            }
        }

        log_info!("Wrote {} ({} entries)", kind.key(), collection.len());
        Ok(())
    }

    /// Settles a write that timed out. The read-back is queued behind the
    /// write, so once it answers the write has either landed or been dropped.
    /// Returns `timeout` when the stored value is not the one written.
    async fn confirm_write(
        &self,
        kind: DiaryKind,
        written: &str,
        timeout: StorageError,
    ) -> Result<(), StorageError> {
        for attempt in 1..=CONFIRM_ATTEMPTS {
            match self.inner.store.get_item(kind.key()).await {
                Ok(Some(stored)) if stored == written => {
                    log_info!("Timed-out write to {} was applied", kind.key());
                    return Ok(());
                }
                Ok(_) => {
                    log_error!("Timed-out write to {} was not applied", kind.key());
                    return Err(timeout);
                }
                Err(err) => {
                    log_warn!(
                        "Read-back {}/{} of {} failed: {}",
                        attempt,
                        CONFIRM_ATTEMPTS,
                        kind.key(),
                        err
                    );
                }
            }
        }

        log_error!("Could not confirm the write to {}", kind.key());
        Err(StorageError::Unconfirmed {
            key: kind.key().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Arm, BpReading, FoodItem, GlucoseReading};
    use crate::storage::{MemoryStore, TimeoutStore};
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn jan(day: u32) -> DiaryDate {
        DiaryDate::from_ymd(2024, 1, day).unwrap()
    }

    fn bp_save(day: u32, hour: u32, systolic: i32, diastolic: i32) -> PendingBpEntry {
        PendingBpEntry {
            date: jan(day),
            readings: vec![BpReading {
                timestamp: at(day, hour),
                arm: Arm::Left,
                systolic: Some(systolic),
                diastolic: Some(diastolic),
            }],
        }
    }

    fn setup() -> (Arc<MemoryStore>, DiaryRepository) {
        let store = Arc::new(MemoryStore::new());
        let repo = DiaryRepository::new(store.clone());
        (store, repo)
    }

    #[tokio::test]
    async fn two_saves_on_one_day_make_one_entry() {
        let (_store, repo) = setup();

        let first = repo.save_bp(bp_save(5, 8, 120, 80)).await.unwrap();
        assert_eq!(first.morning_systolic_avg, 120.0);
        assert!(first.afternoon_systolic_avg.is_nan());

        repo.save_bp(bp_save(5, 9, 130, 85)).await.unwrap();

        let entries = repo.load_bp().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].morning.len(), 2);
        assert_eq!(entries[0].morning_systolic_avg, 125.0);
        assert!(entries[0].afternoon_systolic_avg.is_nan());
    }

    #[tokio::test]
    async fn empty_save_never_touches_storage() {
        let (store, repo) = setup();

        let err = repo
            .save_bp(PendingBpEntry {
                date: jan(5),
                readings: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PersistError::Validation(ValidationError::EmptyEntry)
        ));

        let blank_food = FoodDiaryEntry {
            date: jan(5),
            time: String::new(),
            meal: String::new(),
            water_ml: None,
            food: Vec::new(),
        };
        assert!(repo.append_food(blank_food).await.unwrap_err().is_validation());
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn failed_write_keeps_the_previous_collection() {
        let (store, repo) = setup();
        repo.save_bp(bp_save(5, 8, 120, 80)).await.unwrap();
        let before = store.peek("BPDiary").await.unwrap();

        store.set_fail_writes(true);
        let err = repo.save_bp(bp_save(5, 9, 130, 85)).await.unwrap_err();
        assert!(matches!(err, PersistError::Storage(StorageError::Backend(_))));
        assert_eq!(store.peek("BPDiary").await.unwrap(), before);
    }

    #[tokio::test]
    async fn corrupt_collection_is_reported() {
        let (store, repo) = setup();
        store
            .set_item("GlucoseDiary", "{not an array".into())
            .await
            .unwrap();

        let err = repo.load_glucose().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { ref key, .. } if key == "GlucoseDiary"));
    }

    #[tokio::test]
    async fn bootstrap_writes_each_key_once() {
        let (store, repo) = setup();
        repo.bootstrap().await.unwrap();
        assert_eq!(store.peek("BPDiary").await.as_deref(), Some("[]"));
        assert_eq!(store.peek("FoodDiary").await.as_deref(), Some("[]"));

        let calls = store.calls();
        repo.bootstrap().await.unwrap();
        // three reads, no writes
        assert_eq!(store.calls(), calls + 3);
    }

    #[tokio::test]
    async fn chronological_view_sorts_insertion_order() {
        let (_store, repo) = setup();
        repo.save_bp(bp_save(7, 8, 120, 80)).await.unwrap();
        repo.save_bp(bp_save(5, 8, 120, 80)).await.unwrap();
        repo.save_bp(bp_save(6, 8, 120, 80)).await.unwrap();
        repo.save_bp(bp_save(7, 18, 120, 80)).await.unwrap();

        let stored: Vec<_> = repo.load_bp().await.unwrap().iter().map(|e| e.date).collect();
        assert_eq!(stored, vec![jan(5), jan(6), jan(7)]);

        repo.save_bp(bp_save(5, 18, 120, 80)).await.unwrap();
        let sorted: Vec<_> = repo
            .bp_entries_chronological()
            .await
            .unwrap()
            .iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(sorted, vec![jan(5), jan(6), jan(7)]);
        assert_eq!(repo.find_bp(jan(5)).await.unwrap().unwrap().evening.len(), 1);
        assert!(repo.find_bp(jan(9)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn glucose_saves_merge_by_date() {
        let (_store, repo) = setup();
        let pending = |hour, value: f64| PendingGlucoseEntry {
            date: jan(5),
            readings: vec![GlucoseReading {
                timestamp: at(5, hour),
                value: Some(value),
            }],
            injections: Vec::new(),
            feel_sick: false,
            hypo: false,
            hypo_reason: String::new(),
        };

        repo.save_glucose(pending(13, 6.0)).await.unwrap();
        repo.save_glucose(pending(14, 8.0)).await.unwrap();

        let entry = repo.find_glucose(jan(5)).await.unwrap().unwrap();
        assert_eq!(entry.glucose_readings.afternoon.len(), 2);
        assert_eq!(entry.glucose_readings.afternoon_avg, 7.0);
        assert_eq!(repo.load_glucose().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn food_entries_are_appended_even_on_the_same_day() {
        let (_store, repo) = setup();
        let entry = |meal: &str| FoodDiaryEntry {
            date: jan(5),
            time: "12:30".into(),
            meal: meal.into(),
            water_ml: None,
            food: vec![FoodItem {
                name: "Toast".into(),
                amount_grams: Some(40.0),
                per_nutrient: Default::default(),
                scanned_item: None,
            }],
        };

        repo.append_food(entry("Lunch")).await.unwrap();
        repo.append_food(entry("Snack")).await.unwrap();

        let meals: Vec<_> = repo
            .load_food()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.meal)
            .collect();
        assert_eq!(meals, vec!["Lunch", "Snack"]);
    }

    /// Holds every read until the test opens the gate.
    struct GatedStore {
        inner: MemoryStore,
        gate: Semaphore,
        waiting: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for GatedStore {
        async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.waiting.store(true, Ordering::SeqCst);
            let _permit = self.gate.acquire().await.map_err(anyhow::Error::new)?;
            self.inner.get_item(key).await
        }

        async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
            self.inner.set_item(key, value).await
        }

        async fn merge_item(&self, key: &str, partial: String) -> Result<(), StorageError> {
            self.inner.merge_item(key, partial).await
        }

        async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key).await
        }
    }

    #[tokio::test]
    async fn overlapping_saves_of_one_kind_are_refused() {
        let store = Arc::new(GatedStore {
            inner: MemoryStore::new(),
            gate: Semaphore::new(0),
            waiting: AtomicBool::new(false),
        });
        let repo = DiaryRepository::new(store.clone());

        let first = tokio::spawn({
            let repo = repo.clone();
            async move { repo.save_bp(bp_save(5, 8, 120, 80)).await }
        });
        while !store.waiting.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        let second = repo.save_bp(bp_save(5, 9, 130, 85)).await;
        assert!(matches!(second, Err(PersistError::SaveInFlight)));

        // other kinds are not blocked by a BP save
        let food = FoodDiaryEntry {
            date: jan(5),
            time: String::new(),
            meal: "Breakfast".into(),
            water_ml: None,
            food: Vec::new(),
        };
        let food_save = tokio::spawn({
            let repo = repo.clone();
            async move { repo.append_food(food).await }
        });

        store.gate.add_permits(16);
        first.await.unwrap().unwrap();
        food_save.await.unwrap().unwrap();
        assert_eq!(repo.load_bp().await.unwrap()[0].morning.len(), 1);
    }

    /// Keeps the SQLite worker busy right after the first read, so the write
    /// that follows queues behind it.
    struct BusyAfterFirstRead {
        db: Database,
        busy_for: Duration,
        armed: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for BusyAfterFirstRead {
        async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            let value = self.db.get_item(key).await;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.db.block_worker(self.busy_for);
            }
            value
        }

        async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
            self.db.set_item(key, value).await
        }

        async fn merge_item(&self, key: &str, partial: String) -> Result<(), StorageError> {
            self.db.merge_item(key, partial).await
        }

        async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.db.remove_item(key).await
        }
    }

    #[tokio::test]
    async fn timed_out_sqlite_write_is_not_applied_late() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("diary.sqlite3")).unwrap();
        let direct = DiaryRepository::new(Arc::new(db.clone()));
        direct.save_bp(bp_save(5, 8, 120, 80)).await.unwrap();

        let slow = DiaryRepository::new(Arc::new(TimeoutStore::new(
            BusyAfterFirstRead {
                db: db.clone(),
                busy_for: Duration::from_millis(300),
                armed: AtomicBool::new(true),
            },
            Duration::from_millis(120),
        )));

        let err = slow.save_bp(bp_save(5, 9, 130, 85)).await.unwrap_err();
        assert!(matches!(err, PersistError::Storage(StorageError::Timeout { .. })));

        tokio::time::sleep(Duration::from_millis(400)).await;
        let entry = direct.find_bp(jan(5)).await.unwrap().unwrap();
        assert_eq!(entry.morning.len(), 1);

        // a retry counts the reading once
        let entry = slow.save_bp(bp_save(5, 9, 130, 85)).await.unwrap();
        assert_eq!(entry.morning.len(), 2);
        assert_eq!(entry.morning_systolic_avg, 125.0);
        assert_eq!(direct.find_bp(jan(5)).await.unwrap().unwrap().morning.len(), 2);
    }

    /// Applies writes at once but acknowledges them late.
    struct LateAckStore {
        inner: MemoryStore,
        ack_after: Duration,
        slow_reads_after: Option<usize>,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for LateAckStore {
        async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            let read = self.reads.fetch_add(1, Ordering::SeqCst);
            if self.slow_reads_after.is_some_and(|first_slow| read >= first_slow) {
                tokio::time::sleep(self.ack_after).await;
            }
            self.inner.get_item(key).await
        }

        async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
            self.inner.set_item(key, value).await?;
            tokio::time::sleep(self.ack_after).await;
            Ok(())
        }

        async fn merge_item(&self, key: &str, partial: String) -> Result<(), StorageError> {
            self.inner.merge_item(key, partial).await
        }

        async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key).await
        }
    }

    #[tokio::test]
    async fn write_that_landed_after_its_deadline_counts_as_saved() {
        let store = Arc::new(TimeoutStore::new(
            LateAckStore {
                inner: MemoryStore::new(),
                ack_after: Duration::from_millis(200),
                slow_reads_after: None,
                reads: AtomicUsize::new(0),
            },
            Duration::from_millis(50),
        ));
        let repo = DiaryRepository::new(store.clone());

        let entry = repo.save_bp(bp_save(5, 8, 120, 80)).await.unwrap();
        assert_eq!(entry.morning.len(), 1);
        assert_eq!(repo.find_bp(jan(5)).await.unwrap().unwrap().morning.len(), 1);
    }

    #[tokio::test]
    async fn unreadable_outcome_is_reported_as_unconfirmed() {
        let store = Arc::new(TimeoutStore::new(
            LateAckStore {
                inner: MemoryStore::new(),
                ack_after: Duration::from_millis(200),
                slow_reads_after: Some(1),
                reads: AtomicUsize::new(0),
            },
            Duration::from_millis(30),
        ));
        let repo = DiaryRepository::new(store.clone());

        let err = repo.save_bp(bp_save(5, 8, 120, 80)).await.unwrap_err();
        assert!(matches!(
            err,
            PersistError::Storage(StorageError::Unconfirmed { ref key }) if key == "BPDiary"
        ));
        // the load plus every read-back
        assert_eq!(store.inner().reads.load(Ordering::SeqCst), 1 + CONFIRM_ATTEMPTS);
    }
}
