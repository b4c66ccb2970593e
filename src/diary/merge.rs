//! Reconciles a session's readings with the persisted entry for the same day.
//!
//! Bucket lists are concatenated existing-first and every mean is recomputed
//! over the concatenation. The merged entry replaces the old one and goes to
//! the end of the collection.

use crate::error::ValidationError;
use crate::models::{
    BpDayEntry, BpReading, BucketedSeries, DayEntry, DiaryDate, GlucoseDayEntry, GlucoseReading,
    Injection, Signal,
};

use super::bucket::{bucketize, BucketMap};

/// Validated blood pressure readings waiting to be saved.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBpEntry {
    pub date: DiaryDate,
    pub readings: Vec<BpReading>,
}

impl PendingBpEntry {
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingGlucoseEntry {
    pub date: DiaryDate,
    pub readings: Vec<GlucoseReading>,
    pub injections: Vec<Injection>,
    pub feel_sick: bool,
    pub hypo: bool,
    pub hypo_reason: String,
}

impl PendingGlucoseEntry {
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
            && self.injections.is_empty()
            && !self.feel_sick
            && self.hypo_reason.trim().is_empty()
    }
}

pub fn merge_bp(
    existing: Option<BpDayEntry>,
    pending: PendingBpEntry,
) -> Result<BpDayEntry, ValidationError> {
    let mut buckets = existing
        .map(BpDayEntry::into_buckets)
        .unwrap_or_default();
    buckets.append(bucketize(pending.readings));
    BpDayEntry::from_buckets(pending.date, buckets)
}

pub fn merge_glucose(
    existing: Option<GlucoseDayEntry>,
    pending: PendingGlucoseEntry,
) -> Result<GlucoseDayEntry, ValidationError> {
    let (mut readings, mut injections, feel_sick, hypo, reason) = match existing {
        Some(entry) => (
            entry.glucose_readings.into_buckets(),
            entry.injections.into_buckets(),
            entry.feel_sick,
            entry.hypo,
            entry.hypo_reason,
        ),
        None => (
            BucketMap::default(),
            BucketMap::default(),
            false,
            false,
            String::new(),
        ),
    };

    readings.append(bucketize(pending.readings));
    injections.append(bucketize(pending.injections));

    let new_reason = pending.hypo_reason.trim();
    let hypo_reason = if new_reason.is_empty() {
        reason
    } else {
        new_reason.to_string()
    };

    Ok(GlucoseDayEntry {
        key: pending.date.key(),
        date: pending.date,
        glucose_readings: BucketedSeries::from_buckets(readings, Signal::Glucose)?,
        injections: BucketedSeries::from_buckets(injections, Signal::InsulinUnits)?,
        feel_sick: feel_sick || pending.feel_sick,
        hypo: hypo || pending.hypo,
        hypo_reason,
    })
}

/// Merges into the entry for `date` (if any) and moves the result to the end
/// of `collection`. On error the collection is left as it was.
///
/// Only the first entry for a date is merged; collections written by this
/// crate never hold more than one.
pub fn upsert_by_date<E, F>(
    collection: &mut Vec<E>,
    date: DiaryDate,
    merge: F,
) -> Result<&E, ValidationError>
where
    E: DayEntry + Clone,
    F: FnOnce(Option<E>) -> Result<E, ValidationError>,
{
    let position = collection.iter().position(|entry| entry.date() == date);
    let merged = merge(position.map(|index| collection[index].clone()))?;

    if let Some(index) = position {
        collection.remove(index);
    }
    collection.push(merged);

    Ok(&collection[collection.len() - 1])
}
