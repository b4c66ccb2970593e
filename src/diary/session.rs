//! One open diary screen: its slot buffers, the day it is for, and its save
//! state. Sessions are owned by the screen that created them and are never
//! shared.

use std::future::Future;

use chrono::NaiveTime;
use uuid::Uuid;

use crate::error::{LookupError, PersistError, ValidationError};
use crate::lookup::{lookup_barcode, NutritionLookup};
use crate::models::{BpDayEntry, DiaryDate, FoodDiaryEntry, GlucoseDayEntry, GlucoseReading};
use crate::{log_info, log_warn};

use super::buffer::{SessionBuffer, SlotDraft, SlotIndex};
use super::draft::{
    parse_decimal, BpDraft, BpField, FoodDraft, FoodField, GlucoseDraft, GlucoseField,
    InjectionDraft, InjectionField,
};
use super::merge::{PendingBpEntry, PendingGlucoseEntry};
use super::repository::DiaryRepository;
use super::state::SaveState;

const ENABLE_LOGS: bool = true;

/// Runs one persist attempt and records its outcome. Validation has already
/// passed by the time this is called.
async fn run_save<T, F>(state: &mut SaveState, session: &str, save: F) -> Result<T, PersistError>
where
    F: Future<Output = Result<T, PersistError>>,
{
    if !state.begin_save() {
        log_warn!("Session {session} starts a save over an abandoned one");
    }

    let outcome = save.await;
    state.finish(&outcome);
    match &outcome {
        Ok(_) => log_info!("Session {session} saved"),
        Err(err) => log_warn!("Session {session} save failed: {err}"),
    }
    outcome
}

fn validate_all<D, T>(
    buffer: &SessionBuffer<D>,
    validate: impl Fn(&D) -> Result<T, ValidationError>,
) -> Result<Vec<T>, ValidationError>
where
    D: SlotDraft,
{
    buffer.filled().map(validate).collect()
}

pub struct BpDiarySession {
    id: Uuid,
    date: DiaryDate,
    readings: SessionBuffer<BpDraft>,
    state: SaveState,
}

impl BpDiarySession {
    /// Opens with one blank reading, as the form does.
    pub fn new(date: DiaryDate) -> Self {
        let mut readings = SessionBuffer::new();
        readings.add_slot();
        Self {
            id: Uuid::new_v4(),
            date,
            readings,
            state: SaveState::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn date(&self) -> DiaryDate {
        self.date
    }

    pub fn set_date(&mut self, date: DiaryDate) {
        self.date = date;
        self.state.edited();
    }

    pub fn state(&self) -> &SaveState {
        &self.state
    }

    pub fn readings(&self) -> &SessionBuffer<BpDraft> {
        &self.readings
    }

    pub fn add_reading(&mut self) -> SlotIndex {
        self.state.edited();
        self.readings.add_slot()
    }

    pub fn update_reading(&mut self, index: SlotIndex, field: BpField) -> bool {
        let touched = self.readings.update_slot(index, field);
        if touched {
            self.state.edited();
        }
        touched
    }

    pub fn to_pending(&self) -> Result<PendingBpEntry, ValidationError> {
        let pending = PendingBpEntry {
            date: self.date,
            readings: validate_all(&self.readings, BpDraft::validate)?,
        };
        if pending.is_empty() {
            return Err(ValidationError::EmptyEntry);
        }
        Ok(pending)
    }

    pub async fn save(&mut self, repo: &DiaryRepository) -> Result<BpDayEntry, PersistError> {
        let pending = self.to_pending()?;
        let session = format!("bp/{}", self.id);
        run_save(&mut self.state, &session, repo.save_bp(pending)).await
    }
}

pub struct GlucoseDiarySession {
    id: Uuid,
    date: DiaryDate,
    readings: SessionBuffer<GlucoseDraft>,
    injections: SessionBuffer<InjectionDraft>,
    feel_sick: bool,
    hypo: bool,
    hypo_reason: String,
    hypo_threshold: f64,
    state: SaveState,
}

impl GlucoseDiarySession {
    /// `hypo_threshold` is in mmol/L; readings strictly below it are hypos.
    pub fn new(date: DiaryDate, hypo_threshold: f64) -> Self {
        let mut readings = SessionBuffer::new();
        readings.add_slot();
        let mut injections = SessionBuffer::new();
        injections.add_slot();
        Self {
            id: Uuid::new_v4(),
            date,
            readings,
            injections,
            feel_sick: false,
            hypo: false,
            hypo_reason: String::new(),
            hypo_threshold,
            state: SaveState::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn date(&self) -> DiaryDate {
        self.date
    }

    pub fn set_date(&mut self, date: DiaryDate) {
        self.date = date;
        self.state.edited();
    }

    pub fn state(&self) -> &SaveState {
        &self.state
    }

    pub fn readings(&self) -> &SessionBuffer<GlucoseDraft> {
        &self.readings
    }

    pub fn injections(&self) -> &SessionBuffer<InjectionDraft> {
        &self.injections
    }

    pub fn hypo(&self) -> bool {
        self.hypo
    }

    pub fn hypo_reason(&self) -> &str {
        &self.hypo_reason
    }

    pub fn feel_sick(&self) -> bool {
        self.feel_sick
    }

    pub fn add_reading(&mut self) -> SlotIndex {
        self.state.edited();
        self.readings.add_slot()
    }

    pub fn update_reading(&mut self, index: SlotIndex, field: GlucoseField) -> bool {
        let touched = self.readings.update_slot(index, field);
        if touched {
            self.state.edited();
        }
        touched
    }

    pub fn add_injection(&mut self) -> SlotIndex {
        self.state.edited();
        self.injections.add_slot()
    }

    pub fn update_injection(&mut self, index: SlotIndex, field: InjectionField) -> bool {
        let touched = self.injections.update_slot(index, field);
        if touched {
            self.state.edited();
        }
        touched
    }

    pub fn set_feel_sick(&mut self, feel_sick: bool) {
        self.feel_sick = feel_sick;
        self.state.edited();
    }

    pub fn set_hypo_reason(&mut self, reason: impl Into<String>) {
        self.hypo_reason = reason.into();
        self.state.edited();
    }

    /// Lowest entered reading below the threshold, if any. Flags the session
    /// as a hypo when one is found; the flag is never cleared.
    pub fn check_for_hypo(&mut self) -> Result<Option<f64>, ValidationError> {
        let readings = validate_all(&self.readings, GlucoseDraft::validate)?;
        let lowest = self.lowest_below_threshold(&readings);
        if lowest.is_some() {
            self.hypo = true;
        }
        Ok(lowest)
    }

    fn lowest_below_threshold(&self, readings: &[GlucoseReading]) -> Option<f64> {
        readings
            .iter()
            .filter_map(|reading| reading.value)
            .filter(|value| *value < self.hypo_threshold)
            .reduce(f64::min)
    }

    pub fn to_pending(&self) -> Result<PendingGlucoseEntry, ValidationError> {
        let readings = validate_all(&self.readings, GlucoseDraft::validate)?;
        let injections = validate_all(&self.injections, InjectionDraft::validate)?;
        let lowest = self.lowest_below_threshold(&readings);

        if let Some(lowest) = lowest {
            if self.hypo_reason.trim().is_empty() {
                return Err(ValidationError::HypoReasonRequired { lowest });
            }
        }

        let pending = PendingGlucoseEntry {
            date: self.date,
            readings,
            injections,
            feel_sick: self.feel_sick,
            hypo: self.hypo || lowest.is_some(),
            hypo_reason: self.hypo_reason.trim().to_string(),
        };
        if pending.is_empty() {
            return Err(ValidationError::EmptyEntry);
        }
        Ok(pending)
    }

    pub async fn save(&mut self, repo: &DiaryRepository) -> Result<GlucoseDayEntry, PersistError> {
        self.check_for_hypo()?;
        let pending = self.to_pending()?;
        let session = format!("glucose/{}", self.id);
        run_save(&mut self.state, &session, repo.save_glucose(pending)).await
    }
}

pub struct FoodDiarySession {
    id: Uuid,
    date: DiaryDate,
    time: String,
    meal: String,
    water: String,
    food: SessionBuffer<FoodDraft>,
    state: SaveState,
}

impl FoodDiarySession {
    pub fn new(date: DiaryDate) -> Self {
        let mut food = SessionBuffer::new();
        food.add_slot();
        Self {
            id: Uuid::new_v4(),
            date,
            time: String::new(),
            meal: String::new(),
            water: String::new(),
            food,
            state: SaveState::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn date(&self) -> DiaryDate {
        self.date
    }

    pub fn state(&self) -> &SaveState {
        &self.state
    }

    pub fn food(&self) -> &SessionBuffer<FoodDraft> {
        &self.food
    }

    pub fn set_date(&mut self, date: DiaryDate) {
        self.date = date;
        self.state.edited();
    }

    /// `HH:MM`, or empty for no time.
    pub fn set_time(&mut self, time: impl Into<String>) {
        self.time = time.into();
        self.state.edited();
    }

    pub fn set_meal(&mut self, meal: impl Into<String>) {
        self.meal = meal.into();
        self.state.edited();
    }

    /// Millilitres, as typed.
    pub fn set_water(&mut self, water: impl Into<String>) {
        self.water = water.into();
        self.state.edited();
    }

    pub fn add_food(&mut self) -> SlotIndex {
        self.state.edited();
        self.food.add_slot()
    }

    pub fn update_food(&mut self, index: SlotIndex, field: FoodField) -> bool {
        let touched = self.food.update_slot(index, field);
        if touched {
            self.state.edited();
        }
        touched
    }

    /// Looks `barcode` up and fills the slot at `index` with the product.
    /// Returns `Ok(false)` for an unknown slot. A failed lookup leaves the
    /// slot untouched.
    pub async fn scan_into_slot(
        &mut self,
        index: SlotIndex,
        barcode: &str,
        lookup: &dyn NutritionLookup,
    ) -> Result<bool, LookupError> {
        if self.food.slot(index).is_none() {
            return Ok(false);
        }

        let product = match lookup_barcode(lookup, barcode).await {
            Ok(product) => product,
            Err(err) => {
                log_warn!("Session food/{} lookup for slot {index} failed: {err}", self.id);
                return Err(err);
            }
        };

        match self.food.slot_mut(index) {
            Some(slot) => {
                slot.apply_product(&product);
                self.state.edited();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn to_pending(&self) -> Result<FoodDiaryEntry, ValidationError> {
        let time = self.time.trim();
        if !time.is_empty() && NaiveTime::parse_from_str(time, "%H:%M").is_err() {
            return Err(ValidationError::InvalidTime(self.time.clone()));
        }

        let entry = FoodDiaryEntry {
            date: self.date,
            time: time.to_string(),
            meal: self.meal.trim().to_string(),
            water_ml: parse_decimal("water", &self.water)?,
            food: validate_all(&self.food, FoodDraft::validate)?,
        };
        if entry.is_blank() {
            return Err(ValidationError::EmptyEntry);
        }
        Ok(entry)
    }

    pub async fn save(&mut self, repo: &DiaryRepository) -> Result<FoodDiaryEntry, PersistError> {
        let entry = self.to_pending()?;
        let session = format!("food/{}", self.id);
        run_save(&mut self.state, &session, repo.append_food(entry)).await
    }
}
