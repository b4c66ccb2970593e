//! Time-of-day bucketing and per-bucket means.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::reading::{Reading, Signal};

/// First hour of the afternoon bucket.
pub const AFTERNOON_STARTS_AT: u32 = 12;
/// First hour of the evening bucket.
pub const EVENING_STARTS_AT: u32 = 17;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Morning,
    Afternoon,
    Evening,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Morning, Bucket::Afternoon, Bucket::Evening];

    pub fn for_hour(hour: u32) -> Self {
        if hour < AFTERNOON_STARTS_AT {
            Bucket::Morning
        } else if hour < EVENING_STARTS_AT {
            Bucket::Afternoon
        } else {
            Bucket::Evening
        }
    }

    pub fn of(timestamp: NaiveDateTime) -> Self {
        Self::for_hour(timestamp.hour())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Morning => "morning",
            Bucket::Afternoon => "afternoon",
            Bucket::Evening => "evening",
        }
    }
}

/// Readings of one day split by bucket, each list in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketMap<R> {
    pub morning: Vec<R>,
    pub afternoon: Vec<R>,
    pub evening: Vec<R>,
}

impl<R> Default for BucketMap<R> {
    fn default() -> Self {
        Self {
            morning: Vec::new(),
            afternoon: Vec::new(),
            evening: Vec::new(),
        }
    }
}

impl<R> BucketMap<R> {
    pub fn get(&self, bucket: Bucket) -> &[R] {
        match bucket {
            Bucket::Morning => &self.morning,
            Bucket::Afternoon => &self.afternoon,
            Bucket::Evening => &self.evening,
        }
    }

    pub fn get_mut(&mut self, bucket: Bucket) -> &mut Vec<R> {
        match bucket {
            Bucket::Morning => &mut self.morning,
            Bucket::Afternoon => &mut self.afternoon,
            Bucket::Evening => &mut self.evening,
        }
    }

    pub fn len(&self) -> usize {
        self.morning.len() + self.afternoon.len() + self.evening.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `later` bucket by bucket; readings already here stay first.
    pub fn append(&mut self, later: BucketMap<R>) {
        let BucketMap {
            morning,
            afternoon,
            evening,
        } = later;
        self.morning.extend(morning);
        self.afternoon.extend(afternoon);
        self.evening.extend(evening);
    }
}

/// Partitions readings by the hour of their timestamp. Every reading lands in
/// exactly one bucket and keeps its relative order.
pub fn bucketize<R, I>(readings: I) -> BucketMap<R>
where
    R: Reading,
    I: IntoIterator<Item = R>,
{
    let mut buckets = BucketMap::default();
    for reading in readings {
        buckets.get_mut(Bucket::of(reading.taken_at())).push(reading);
    }
    buckets
}

/// Arithmetic mean of `signal` over `readings`.
///
/// An empty slice yields `NaN`, the no-data sentinel. A reading without a
/// value for `signal` fails the whole computation rather than being skipped.
pub fn aggregate<R: Reading>(readings: &[R], signal: Signal) -> Result<f64, ValidationError> {
    if readings.is_empty() {
        return Ok(f64::NAN);
    }

    let mut sum = 0.0;
    for reading in readings {
        let value = reading.signal(signal).ok_or(ValidationError::MissingField {
            field: signal.as_str(),
        })?;
        if !value.is_finite() {
            return Err(ValidationError::InvalidNumber {
                field: signal.as_str(),
                value: value.to_string(),
            });
        }
        sum += value;
    }

    Ok(sum / readings.len() as f64)
}

/// Mean of one signal per bucket, `NaN` for an empty bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketMeans {
    pub morning: f64,
    pub afternoon: f64,
    pub evening: f64,
}

impl BucketMeans {
    /// Aggregates `signal` over every bucket of `buckets`.
    pub fn of<R: Reading>(buckets: &BucketMap<R>, signal: Signal) -> Result<Self, ValidationError> {
        let mut means = [f64::NAN; 3];
        for (mean, bucket) in means.iter_mut().zip(Bucket::ALL) {
            *mean = aggregate(buckets.get(bucket), signal)?;
        }
        let [morning, afternoon, evening] = means;
        Ok(Self {
            morning,
            afternoon,
            evening,
        })
    }

    pub fn get(&self, bucket: Bucket) -> f64 {
        match bucket {
            Bucket::Morning => self.morning,
            Bucket::Afternoon => self.afternoon,
            Bucket::Evening => self.evening,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reading::{Arm, BpReading, GlucoseReading};
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn bp(hour: u32, systolic: i32) -> BpReading {
        BpReading {
            timestamp: at(hour, 0),
            arm: Arm::Left,
            systolic: Some(systolic),
            diastolic: Some(80),
        }
    }

    #[test]
    fn hour_boundaries() {
        assert_eq!(Bucket::for_hour(0), Bucket::Morning);
        assert_eq!(Bucket::for_hour(11), Bucket::Morning);
        assert_eq!(Bucket::for_hour(12), Bucket::Afternoon);
        assert_eq!(Bucket::for_hour(16), Bucket::Afternoon);
        assert_eq!(Bucket::for_hour(17), Bucket::Evening);
        assert_eq!(Bucket::for_hour(23), Bucket::Evening);
        assert_eq!(Bucket::of(at(11, 59)), Bucket::Morning);
        assert_eq!(Bucket::of(at(16, 59)), Bucket::Afternoon);
    }

    #[test]
    fn bucketize_is_a_total_partition() {
        let readings: Vec<BpReading> = (0..24).map(|hour| bp(hour, 100 + hour as i32)).collect();
        let buckets = bucketize(readings.clone());

        assert_eq!(buckets.len(), readings.len());
        assert_eq!(buckets.morning.len(), 12);
        assert_eq!(buckets.afternoon.len(), 5);
        assert_eq!(buckets.evening.len(), 7);
        for bucket in Bucket::ALL {
            assert!(buckets
                .get(bucket)
                .iter()
                .all(|reading| Bucket::of(reading.timestamp) == bucket));
        }
    }

    #[test]
    fn bucketize_keeps_input_order_within_a_bucket() {
        let buckets = bucketize(vec![bp(9, 130), bp(7, 110), bp(13, 120), bp(8, 125)]);
        let systolic: Vec<_> = buckets.morning.iter().map(|r| r.systolic).collect();
        assert_eq!(systolic, vec![Some(130), Some(110), Some(125)]);
    }

    #[test]
    fn aggregate_is_the_mean() {
        let readings = vec![bp(8, 120), bp(9, 130), bp(10, 131)];
        assert_eq!(aggregate(&readings, Signal::Systolic).unwrap(), 127.0);
        assert_eq!(aggregate(&readings, Signal::Diastolic).unwrap(), 80.0);
    }

    #[test]
    fn aggregate_of_nothing_is_nan() {
        let readings: Vec<BpReading> = Vec::new();
        assert!(aggregate(&readings, Signal::Systolic).unwrap().is_nan());
    }

    #[test]
    fn aggregate_rejects_missing_values() {
        let readings = vec![
            GlucoseReading {
                timestamp: at(8, 0),
                value: Some(5.5),
            },
            GlucoseReading {
                timestamp: at(9, 0),
                value: None,
            },
        ];
        assert_eq!(
            aggregate(&readings, Signal::Glucose),
            Err(ValidationError::MissingField { field: "reading" })
        );
    }

    #[test]
    fn append_keeps_existing_readings_first() {
        let mut existing = bucketize(vec![bp(8, 120)]);
        existing.append(bucketize(vec![bp(9, 130), bp(18, 140)]));
        let systolic: Vec<_> = existing.morning.iter().map(|r| r.systolic).collect();
        assert_eq!(systolic, vec![Some(120), Some(130)]);
        assert_eq!(existing.evening.len(), 1);
    }

    #[test]
    fn means_cover_each_bucket() {
        let buckets = bucketize(vec![bp(8, 120), bp(9, 130), bp(18, 140)]);
        let means = BucketMeans::of(&buckets, Signal::Systolic).unwrap();
        assert_eq!(means.get(Bucket::Morning), 125.0);
        assert!(means.get(Bucket::Afternoon).is_nan());
        assert_eq!(means.evening, 140.0);
    }
}
