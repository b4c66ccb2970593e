//! Validated readings as they are persisted inside a day entry.
//!
//! The in-session slot index never reaches these types; it lives only in the
//! session buffer.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Numeric field of a reading that can be averaged per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Systolic,
    Diastolic,
    Glucose,
    InsulinUnits,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Systolic => "systolic",
            Signal::Diastolic => "diastolic",
            Signal::Glucose => "reading",
            Signal::InsulinUnits => "units",
        }
    }
}

/// Anything that can be bucketed by time of day and averaged.
pub trait Reading: Clone {
    fn taken_at(&self) -> NaiveDateTime;

    /// `None` when the reading does not carry `signal` or the value is absent.
    fn signal(&self, signal: Signal) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Arm {
    Left,
    Right,
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl Arm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arm::Left => "left",
            Arm::Right => "right",
            Arm::Unset => "",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BpReading {
    #[serde(rename = "time")]
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub arm: Arm,
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
}

impl Reading for BpReading {
    fn taken_at(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn signal(&self, signal: Signal) -> Option<f64> {
        match signal {
            Signal::Systolic => self.systolic.map(f64::from),
            Signal::Diastolic => self.diastolic.map(f64::from),
            _ => None,
        }
    }
}

/// Blood glucose in mmol/L.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlucoseReading {
    #[serde(rename = "time")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "reading")]
    pub value: Option<f64>,
}

impl Reading for GlucoseReading {
    fn taken_at(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn signal(&self, signal: Signal) -> Option<f64> {
        match signal {
            Signal::Glucose => self.value,
            _ => None,
        }
    }
}

/// Insulin injection; `kind` is free text (e.g. "rapid", "basal").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Injection {
    #[serde(rename = "time")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub units: Option<f64>,
}

impl Reading for Injection {
    fn taken_at(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn signal(&self, signal: Signal) -> Option<f64> {
        match signal {
            Signal::InsulinUnits => self.units,
            _ => None,
        }
    }
}
