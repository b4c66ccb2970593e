//! Form drafts for each slot kind and their validation into readings.
//!
//! Numeric form fields arrive as text. Parsing happens here, before any
//! bucketing or averaging runs.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::error::ValidationError;
use crate::models::{
    Arm, BpReading, FoodItem, GlucoseReading, Injection, NutrientKind, ProductRecord,
};

use super::buffer::SlotDraft;

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn parse_int(field: &'static str, value: &str) -> Result<Option<i32>, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i32>()
        .map(Some)
        .map_err(|_| ValidationError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

pub(crate) fn parse_decimal(
    field: &'static str,
    value: &str,
) -> Result<Option<f64>, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(Some(number)),
        _ => Err(ValidationError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

fn required<T>(field: &'static str, value: Option<T>) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::MissingField { field })
}

#[derive(Debug, Clone, PartialEq)]
pub struct BpDraft {
    pub time: NaiveDateTime,
    pub arm: Arm,
    pub systolic: String,
    pub diastolic: String,
}

#[derive(Debug, Clone)]
pub enum BpField {
    Time(NaiveDateTime),
    Arm(Arm),
    Systolic(String),
    Diastolic(String),
}

impl SlotDraft for BpDraft {
    type Field = BpField;

    fn blank(now: NaiveDateTime) -> Self {
        Self {
            time: now,
            arm: Arm::Unset,
            systolic: String::new(),
            diastolic: String::new(),
        }
    }

    fn set(&mut self, field: BpField) {
        match field {
            BpField::Time(time) => self.time = time,
            BpField::Arm(arm) => self.arm = arm,
            BpField::Systolic(value) => self.systolic = value,
            BpField::Diastolic(value) => self.diastolic = value,
        }
    }

    fn is_untouched(&self) -> bool {
        self.arm == Arm::Unset && blank(&self.systolic) && blank(&self.diastolic)
    }
}

impl BpDraft {
    pub fn validate(&self) -> Result<BpReading, ValidationError> {
        let systolic = required("systolic", parse_int("systolic", &self.systolic)?)?;
        let diastolic = required("diastolic", parse_int("diastolic", &self.diastolic)?)?;
        Ok(BpReading {
            timestamp: self.time,
            arm: self.arm,
            systolic: Some(systolic),
            diastolic: Some(diastolic),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlucoseDraft {
    pub time: NaiveDateTime,
    pub reading: String,
}

#[derive(Debug, Clone)]
pub enum GlucoseField {
    Time(NaiveDateTime),
    Reading(String),
}

impl SlotDraft for GlucoseDraft {
    type Field = GlucoseField;

    fn blank(now: NaiveDateTime) -> Self {
        Self {
            time: now,
            reading: String::new(),
        }
    }

    fn set(&mut self, field: GlucoseField) {
        match field {
            GlucoseField::Time(time) => self.time = time,
            GlucoseField::Reading(value) => self.reading = value,
        }
    }

    fn is_untouched(&self) -> bool {
        blank(&self.reading)
    }
}

impl GlucoseDraft {
    pub fn validate(&self) -> Result<GlucoseReading, ValidationError> {
        let value = required("reading", parse_decimal("reading", &self.reading)?)?;
        Ok(GlucoseReading {
            timestamp: self.time,
            value: Some(value),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InjectionDraft {
    pub time: NaiveDateTime,
    pub kind: String,
    pub units: String,
}

#[derive(Debug, Clone)]
pub enum InjectionField {
    Time(NaiveDateTime),
    Kind(String),
    Units(String),
}

impl SlotDraft for InjectionDraft {
    type Field = InjectionField;

    fn blank(now: NaiveDateTime) -> Self {
        Self {
            time: now,
            kind: String::new(),
            units: String::new(),
        }
    }

    fn set(&mut self, field: InjectionField) {
        match field {
            InjectionField::Time(time) => self.time = time,
            InjectionField::Kind(value) => self.kind = value,
            InjectionField::Units(value) => self.units = value,
        }
    }

    fn is_untouched(&self) -> bool {
        blank(&self.kind) && blank(&self.units)
    }
}

impl InjectionDraft {
    pub fn validate(&self) -> Result<Injection, ValidationError> {
        let units = required("units", parse_decimal("units", &self.units)?)?;
        Ok(Injection {
            timestamp: self.time,
            kind: self.kind.trim().to_string(),
            units: Some(units),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoodDraft {
    pub name: String,
    pub amount: String,
    pub nutrients: BTreeMap<NutrientKind, String>,
    pub scanned: Option<ProductRecord>,
}

#[derive(Debug, Clone)]
pub enum FoodField {
    Name(String),
    Amount(String),
    Nutrient(NutrientKind, String),
}

impl SlotDraft for FoodDraft {
    type Field = FoodField;

    fn blank(_now: NaiveDateTime) -> Self {
        Self {
            name: String::new(),
            amount: String::new(),
            nutrients: NutrientKind::ALL
                .iter()
                .map(|kind| (*kind, String::new()))
                .collect(),
            scanned: None,
        }
    }

    fn set(&mut self, field: FoodField) {
        match field {
            FoodField::Name(value) => self.name = value,
            FoodField::Amount(value) => self.amount = value,
            FoodField::Nutrient(kind, value) => {
                self.nutrients.insert(kind, value);
            }
        }
    }

    fn is_untouched(&self) -> bool {
        self.scanned.is_none()
            && blank(&self.name)
            && blank(&self.amount)
            && self.nutrients.values().all(|value| blank(value))
    }
}

impl FoodDraft {
    /// Prefills the slot from a scanned product. The user can still edit any
    /// field afterwards; nutrients missing from the product are left as typed.
    pub fn apply_product(&mut self, product: &ProductRecord) {
        if !product.name.trim().is_empty() {
            self.name = product.name.clone();
        }
        for (kind, value) in &product.nutrients {
            self.nutrients.insert(*kind, value.to_string());
        }
        self.scanned = Some(product.clone());
    }

    pub fn validate(&self) -> Result<FoodItem, ValidationError> {
        let amount_grams = parse_decimal("amount", &self.amount)?;
        let mut per_nutrient = BTreeMap::new();
        for kind in NutrientKind::ALL {
            let text = self.nutrients.get(&kind).map(String::as_str).unwrap_or("");
            per_nutrient.insert(kind, parse_decimal(kind.as_str(), text)?);
        }
        Ok(FoodItem {
            name: self.name.trim().to_string(),
            amount_grams,
            per_nutrient,
            scanned_item: self.scanned.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn bp_values_parse_as_integers() {
        let mut draft = BpDraft::blank(now());
        draft.set(BpField::Systolic(" 120 ".into()));
        draft.set(BpField::Diastolic("80".into()));
        let reading = draft.validate().unwrap();
        assert_eq!(reading.systolic, Some(120));
        assert_eq!(reading.diastolic, Some(80));
    }

    #[test]
    fn bp_garbage_is_a_validation_error() {
        let mut draft = BpDraft::blank(now());
        draft.set(BpField::Systolic("12O".into()));
        draft.set(BpField::Diastolic("80".into()));
        assert_eq!(
            draft.validate().unwrap_err(),
            ValidationError::InvalidNumber {
                field: "systolic",
                value: "12O".into()
            }
        );
    }

    #[test]
    fn half_filled_bp_slot_is_missing_a_field() {
        let mut draft = BpDraft::blank(now());
        draft.set(BpField::Systolic("120".into()));
        assert!(!draft.is_untouched());
        assert_eq!(
            draft.validate().unwrap_err(),
            ValidationError::MissingField { field: "diastolic" }
        );
    }

    #[test]
    fn glucose_accepts_decimals() {
        let mut draft = GlucoseDraft::blank(now());
        draft.set(GlucoseField::Reading("3.9".into()));
        assert_eq!(draft.validate().unwrap().value, Some(3.9));
    }

    #[test]
    fn scanned_product_fills_the_food_slot() {
        let mut draft = FoodDraft::blank(now());
        assert!(draft.is_untouched());

        let mut product = ProductRecord {
            name: "Oat biscuits".into(),
            ean_barcode: "5000168001142".into(),
            ..ProductRecord::default()
        };
        product.nutrients.insert(NutrientKind::Sugar, 16.6);
        draft.apply_product(&product);
        draft.set(FoodField::Amount("30".into()));

        let item = draft.validate().unwrap();
        assert_eq!(item.name, "Oat biscuits");
        assert_eq!(item.amount_grams, Some(30.0));
        assert_eq!(item.per_nutrient[&NutrientKind::Sugar], Some(16.6));
        assert_eq!(item.per_nutrient[&NutrientKind::Fat], None);
        assert!(item.scanned_item.is_some());
    }
}
