//! Food diary records. The food diary is append-only: one record per save,
//! never merged by date.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::date::DiaryDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NutrientKind {
    Proteins,
    Sugar,
    Fat,
    Carbohydrates,
    Fiber,
    Sodium,
}

impl NutrientKind {
    pub const ALL: [NutrientKind; 6] = [
        NutrientKind::Proteins,
        NutrientKind::Sugar,
        NutrientKind::Fat,
        NutrientKind::Carbohydrates,
        NutrientKind::Fiber,
        NutrientKind::Sodium,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NutrientKind::Proteins => "proteins",
            NutrientKind::Sugar => "sugar",
            NutrientKind::Fat => "fat",
            NutrientKind::Carbohydrates => "carbohydrates",
            NutrientKind::Fiber => "fiber",
            NutrientKind::Sodium => "sodium",
        }
    }

    /// Per-100g key in an Open Food Facts `nutriments` object.
    pub fn off_key(&self) -> &'static str {
        match self {
            NutrientKind::Proteins => "proteins_100g",
            NutrientKind::Sugar => "sugars_100g",
            NutrientKind::Fat => "fat_100g",
            NutrientKind::Carbohydrates => "carbohydrates_100g",
            NutrientKind::Fiber => "fiber_100g",
            NutrientKind::Sodium => "sodium_100g",
        }
    }
}

/// Product returned by the nutrition lookup for a scanned barcode.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    pub name: String,
    pub image: Option<String>,
    pub allergens: Option<String>,
    pub ingredients: Option<String>,
    pub countries: Option<String>,
    pub image_nutrition: Option<String>,
    pub nutriscore_score: Option<i64>,
    pub nutriscore_grade: Option<String>,
    pub nova_score: Option<i64>,
    pub product_url: String,
    pub api_url: String,
    pub ean_barcode: String,
    /// Values per 100 g.
    pub nutrients: BTreeMap<NutrientKind, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodItem {
    pub name: String,
    /// Grams eaten.
    #[serde(rename = "amount")]
    pub amount_grams: Option<f64>,
    /// Per 100 g; `None` when the user left the field blank.
    #[serde(rename = "nutrients")]
    pub per_nutrient: BTreeMap<NutrientKind, Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanned_item: Option<ProductRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodDiaryEntry {
    pub date: DiaryDate,
    /// `HH:MM`, empty when not entered.
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub meal: String,
    #[serde(rename = "water")]
    pub water_ml: Option<f64>,
    pub food: Vec<FoodItem>,
}

impl FoodDiaryEntry {
    /// True when nothing but the date was entered.
    pub fn is_blank(&self) -> bool {
        self.time.trim().is_empty()
            && self.meal.trim().is_empty()
            && self.water_ml.is_none()
            && self.food.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_alone_is_blank() {
        let mut entry = FoodDiaryEntry {
            date: DiaryDate::from_ymd(2024, 1, 5).unwrap(),
            time: " ".into(),
            meal: String::new(),
            water_ml: None,
            food: Vec::new(),
        };
        assert!(entry.is_blank());

        entry.water_ml = Some(250.0);
        assert!(!entry.is_blank());
    }

    #[test]
    fn persisted_field_names() {
        let entry = FoodDiaryEntry {
            date: DiaryDate::from_ymd(2024, 1, 5).unwrap(),
            time: "12:30".into(),
            meal: "Lunch".into(),
            water_ml: Some(330.0),
            food: vec![FoodItem {
                name: "Apple".into(),
                amount_grams: Some(150.0),
                per_nutrient: BTreeMap::from([(NutrientKind::Sugar, Some(10.4))]),
                scanned_item: None,
            }],
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["water"], 330.0);
        assert_eq!(json["food"][0]["amount"], 150.0);
        assert_eq!(json["food"][0]["nutrients"]["sugar"], 10.4);
        assert!(json["food"][0].get("scanned_item").is_none());
    }
}
