//! Persisted day entries for the bucketed diaries.
//!
//! One entry per calendar day and diary kind. Per-bucket means are stored
//! denormalized next to the readings; an empty bucket stores `NaN`, written
//! to JSON as `null`.

use serde::{Deserialize, Serialize};

use crate::diary::bucket::{Bucket, BucketMap, BucketMeans};
use crate::error::ValidationError;

use super::date::DiaryDate;
use super::reading::{BpReading, GlucoseReading, Injection, Reading, Signal};

/// A persisted record keyed by calendar day.
pub trait DayEntry {
    fn date(&self) -> DiaryDate;
}

mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BpDayEntry {
    pub key: String,
    pub date: DiaryDate,
    pub morning: Vec<BpReading>,
    pub afternoon: Vec<BpReading>,
    pub evening: Vec<BpReading>,
    #[serde(with = "nan_as_null")]
    pub morning_systolic_avg: f64,
    #[serde(with = "nan_as_null")]
    pub morning_diastolic_avg: f64,
    #[serde(with = "nan_as_null")]
    pub afternoon_systolic_avg: f64,
    #[serde(with = "nan_as_null")]
    pub afternoon_diastolic_avg: f64,
    #[serde(with = "nan_as_null")]
    pub evening_systolic_avg: f64,
    #[serde(with = "nan_as_null")]
    pub evening_diastolic_avg: f64,
}

impl BpDayEntry {
    /// Builds the entry and recomputes every bucket mean from `buckets`.
    pub fn from_buckets(
        date: DiaryDate,
        buckets: BucketMap<BpReading>,
    ) -> Result<Self, ValidationError> {
        let systolic = BucketMeans::of(&buckets, Signal::Systolic)?;
        let diastolic = BucketMeans::of(&buckets, Signal::Diastolic)?;
        let BucketMap {
            morning,
            afternoon,
            evening,
        } = buckets;

        Ok(Self {
            key: date.key(),
            date,
            morning,
            afternoon,
            evening,
            morning_systolic_avg: systolic.morning,
            morning_diastolic_avg: diastolic.morning,
            afternoon_systolic_avg: systolic.afternoon,
            afternoon_diastolic_avg: diastolic.afternoon,
            evening_systolic_avg: systolic.evening,
            evening_diastolic_avg: diastolic.evening,
        })
    }

    pub fn into_buckets(self) -> BucketMap<BpReading> {
        BucketMap {
            morning: self.morning,
            afternoon: self.afternoon,
            evening: self.evening,
        }
    }

    pub fn readings(&self, bucket: Bucket) -> &[BpReading] {
        match bucket {
            Bucket::Morning => &self.morning,
            Bucket::Afternoon => &self.afternoon,
            Bucket::Evening => &self.evening,
        }
    }

    pub fn systolic_means(&self) -> BucketMeans {
        BucketMeans {
            morning: self.morning_systolic_avg,
            afternoon: self.afternoon_systolic_avg,
            evening: self.evening_systolic_avg,
        }
    }

    pub fn diastolic_means(&self) -> BucketMeans {
        BucketMeans {
            morning: self.morning_diastolic_avg,
            afternoon: self.afternoon_diastolic_avg,
            evening: self.evening_diastolic_avg,
        }
    }

    pub fn systolic_avg(&self, bucket: Bucket) -> f64 {
        self.systolic_means().get(bucket)
    }

    pub fn diastolic_avg(&self, bucket: Bucket) -> f64 {
        self.diastolic_means().get(bucket)
    }
}

impl DayEntry for BpDayEntry {
    fn date(&self) -> DiaryDate {
        self.date
    }
}

/// Bucketed readings of a single-signal kind together with their means.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketedSeries<R> {
    pub morning: Vec<R>,
    pub afternoon: Vec<R>,
    pub evening: Vec<R>,
    #[serde(with = "nan_as_null")]
    pub morning_avg: f64,
    #[serde(with = "nan_as_null")]
    pub afternoon_avg: f64,
    #[serde(with = "nan_as_null")]
    pub evening_avg: f64,
}

impl<R: Reading> BucketedSeries<R> {
    pub fn from_buckets(buckets: BucketMap<R>, signal: Signal) -> Result<Self, ValidationError> {
        let means = BucketMeans::of(&buckets, signal)?;
        let BucketMap {
            morning,
            afternoon,
            evening,
        } = buckets;

        Ok(Self {
            morning,
            afternoon,
            evening,
            morning_avg: means.morning,
            afternoon_avg: means.afternoon,
            evening_avg: means.evening,
        })
    }

    pub fn into_buckets(self) -> BucketMap<R> {
        BucketMap {
            morning: self.morning,
            afternoon: self.afternoon,
            evening: self.evening,
        }
    }

    pub fn means(&self) -> BucketMeans {
        BucketMeans {
            morning: self.morning_avg,
            afternoon: self.afternoon_avg,
            evening: self.evening_avg,
        }
    }

    pub fn len(&self) -> usize {
        self.morning.len() + self.afternoon.len() + self.evening.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlucoseDayEntry {
    pub key: String,
    pub date: DiaryDate,
    pub glucose_readings: BucketedSeries<GlucoseReading>,
    pub injections: BucketedSeries<Injection>,
    #[serde(default)]
    pub feel_sick: bool,
    #[serde(default)]
    pub hypo: bool,
    #[serde(default)]
    pub hypo_reason: String,
}

impl DayEntry for GlucoseDayEntry {
    fn date(&self) -> DiaryDate {
        self.date
    }
}
